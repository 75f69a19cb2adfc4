pub mod announcement;
pub mod capacity;
pub mod collage;
pub mod commands;
pub mod cup;
pub mod cup_engine;
pub mod dispatch;
pub mod effects;
pub mod events;
pub mod rate_limiter;
pub mod roster;
