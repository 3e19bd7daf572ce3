use thiserror::Error;
use verinews_core::{CacheError, ClaimId, SessionStatus, VerifyError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("no claim with id {0} in the current session")]
    UnknownClaim(ClaimId),

    #[error("session is {}, claims are not available", .0.as_str())]
    NotReady(SessionStatus),

    /// A newer analysis started while this call was in flight; its result was
    /// discarded.
    #[error("session {started} was superseded by session {current}")]
    Superseded { started: u64, current: u64 },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl PipelineError {
    /// The classified remote or validation failure, if that is what this is.
    pub fn as_verify(&self) -> Option<&VerifyError> {
        match self {
            Self::Verify(e) => Some(e),
            _ => None,
        }
    }
}
