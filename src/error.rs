use thiserror::Error;

/// Errors raised by the drill engine and session state machine.
///
/// Every variant is returned before any state is mutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DrillError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("cannot pick from an empty sequence")]
    EmptyInput,
    #[error("cannot start a session with no items")]
    EmptyQueue,
}

pub type Result<T> = std::result::Result<T, DrillError>;
