use serde::Serialize;

/// Well-known failures that gate a mutating step before any network call
/// is issued. These are returned to the caller and leave the slice state
/// untouched.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepError {
    /// The wallet/provider handle is absent.
    #[error("no wallet provider connected")]
    MissingProvider,
    /// The action step was invoked before the approval step succeeded.
    #[error("action requires a completed approval")]
    NotApproved,
    /// Another step for this slice is still in flight.
    #[error("a step is already in progress")]
    StepInProgress,
}
