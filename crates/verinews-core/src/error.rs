use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified failure of a validation step or a remote call.
///
/// `Clone` so a failure can be stored on the claim's record and still be
/// returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum VerifyError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("rate limited by verification service{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("verification service error{}: {message}", status_hint(.status))]
    Service { status: Option<u16>, message: String },

    #[error("{}: {message}", transport_hint(.timed_out))]
    Transport { message: String, timed_out: bool },
}

fn retry_hint(secs: &Option<u64>) -> String {
    secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default()
}

fn transport_hint(timed_out: &bool) -> &'static str {
    if *timed_out {
        "request timed out"
    } else {
        "transport error"
    }
}

fn status_hint(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl VerifyError {
    /// Whether re-invoking the same operation unchanged can succeed.
    ///
    /// Validation failures need an edit first. Rate limits are retryable
    /// after a backoff, which the caller owns.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::RateLimited { .. } => "rate_limited",
            Self::Service { .. } => "service",
            Self::Transport { .. } => "transport",
        }
    }

    pub fn service(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = VerifyError::service(Some(502), "upstream search failed");
        assert_eq!(
            err.to_string(),
            "verification service error (502): upstream search failed"
        );

        let err = VerifyError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(
            err.to_string(),
            "rate limited by verification service (retry after 30s)"
        );

        let err = VerifyError::Transport {
            message: "deadline elapsed".into(),
            timed_out: true,
        };
        assert_eq!(err.to_string(), "request timed out: deadline elapsed");
    }

    #[test]
    fn only_validation_needs_an_edit() {
        assert!(!VerifyError::Validation("empty".into()).is_retryable());
        assert!(VerifyError::transport("connection refused").is_retryable());
        assert!(VerifyError::RateLimited { retry_after_secs: None }.is_retryable());
        assert!(VerifyError::service(None, "boom").is_retryable());
    }
}
