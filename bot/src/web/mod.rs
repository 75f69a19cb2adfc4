pub mod app_state;
pub mod relay;
pub mod router;
