/// Everything that can go wrong while running a cup.
///
/// None of these are fatal to the process: each one is scoped to the single
/// event or command that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CupError {
    /// The operation needs an active cup and there is none.
    NoActiveCup,
    /// The operation needs no active cup and one is running.
    Conflict,
    /// A referenced message or user does not exist upstream.
    NotFound(String),
    /// An admit would push the roster past the team size. Always resolved by
    /// rejecting the reaction, never shown to users.
    CapacityExceeded,
    /// A chat platform call failed.
    ExternalIo(String),
}

impl CupError {
    /// Text suitable for a private notice to the user who invoked a command.
    pub fn notice(&self) -> String {
        match self {
            CupError::NoActiveCup => "There is currently no cup in progress".into(),
            CupError::Conflict => "There is a cup in progress".into(),
            CupError::NotFound(what) => format!("Could not find {what}"),
            CupError::CapacityExceeded => "The team is already full".into(),
            CupError::ExternalIo(_) => "Discord did not respond, please try again".into(),
        }
    }
}

impl std::fmt::Display for CupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CupError::NoActiveCup => write!(f, "no active cup"),
            CupError::Conflict => write!(f, "a cup is already active"),
            CupError::NotFound(what) => write!(f, "not found: {what}"),
            CupError::CapacityExceeded => write!(f, "team size exceeded"),
            CupError::ExternalIo(msg) => write!(f, "chat platform error: {msg}"),
        }
    }
}

impl std::error::Error for CupError {}
