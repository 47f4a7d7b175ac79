use thiserror::Error;

/// Failure kinds raised by ingestion. They travel inside `anyhow::Error`;
/// callers recover them with `downcast_ref::<IngestError>()`.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("authentication failed: {0}")]
    AuthFailure(String),
    #[error("authentication rate limited by identity provider")]
    RateLimited,
    #[error("remote fetch failed ({what}): {reason}")]
    RemoteFetch { what: String, reason: String },
    #[error("store invariant violated: {0}")]
    InvariantViolation(String),
}

impl IngestError {
    pub fn remote(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        IngestError::RemoteFetch {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, IngestError::AuthFailure(_) | IngestError::RateLimited)
    }
}

/// Finds an `IngestError` anywhere in an error chain.
pub fn ingest_error(err: &anyhow::Error) -> Option<&IngestError> {
    err.chain().find_map(|cause| cause.downcast_ref::<IngestError>())
}
