// src/errors.rs

/// Job-level error taxonomy for a backfill run.
///
/// A missing price for one specific day is NOT represented here: the day
/// price fetcher degrades it to `None` and the engine records a gap. Only
/// range-level failures abort a job.
#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    /// The provider has no transfer history for the token, so no creation
    /// day can be resolved. Fatal for the job, never retried automatically.
    #[error("no transfer history found for token {token} on {network}")]
    NotFound { token: String, network: String },

    /// Upstream transport or format failure while resolving the creation
    /// day. Fatal for the job.
    #[error("market data provider error: {0}")]
    Provider(String),

    /// Record store failure during an existence check or a write. Aborts
    /// the job mid-range; days already committed stay valid and will be
    /// skipped on the next run.
    #[error("record store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl BackfillError {
    /// Short machine-readable tag for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            BackfillError::NotFound { .. } => "not_found",
            BackfillError::Provider(_) => "provider",
            BackfillError::Store(_) => "store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_token_and_network() {
        let err = BackfillError::NotFound {
            token: "0xdead".to_string(),
            network: "ethereum".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0xdead"));
        assert!(msg.contains("ethereum"));
        assert_eq!(err.kind(), "not_found");
    }
}
