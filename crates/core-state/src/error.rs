use core_events::ConfirmReason;
use thiserror::Error;

/// Failure of a view operation. Every variant leaves the view in the state
/// it had before the call.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conflict: {0}")]
    Conflict(ConfirmReason),
    #[error("not found: {found} of {requested} matches")]
    NotFound { found: u32, requested: u32 },
    #[error("operation cancelled")]
    Cancelled,
    #[error("window has unsaved changes")]
    Modified,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ViewError {
    /// Matches found before a `NotFound`; zero for every other variant.
    pub fn found(&self) -> u32 {
        match self {
            Self::NotFound { found, .. } => *found,
            _ => 0,
        }
    }
}
