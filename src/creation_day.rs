// src/creation_day.rs
//
// Date range resolver: the backfill range starts on the calendar day of the
// token's first recorded transfer event.

use chrono::{DateTime, Utc};
use log::info;

use crate::errors::BackfillError;
use crate::market_data::MarketDataProvider;

/// Resolves the token's creation timestamp from its earliest transfer.
///
/// Read-only and idempotent. `NotFound` when the provider has no transfer
/// history for the contract (unknown or invalid address), `Provider` when
/// the upstream call fails or returns an unparseable timestamp.
pub async fn resolve_creation_day(
    provider: &dyn MarketDataProvider,
    token_address: &str,
    network: &str,
) -> Result<DateTime<Utc>, BackfillError> {
    let timestamp = provider
        .earliest_transfer_timestamp(token_address, network)
        .await
        .map_err(|e| BackfillError::Provider(format!("{:#}", e)))?;

    match timestamp {
        Some(ts) => {
            info!("Token {} on {} first transferred at {}", token_address, network, ts);
            Ok(ts)
        }
        None => Err(BackfillError::NotFound {
            token: token_address.to_string(),
            network: network.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    #[tokio::test]
    async fn test_resolves_timestamp_from_provider() {
        let provider = MockProvider::with_creation("2023-01-01T07:21:35Z");
        let resolved = resolve_creation_day(&provider, "0xT1", "ethereum")
            .await
            .unwrap();
        assert_eq!(resolved.to_rfc3339(), "2023-01-01T07:21:35+00:00");
    }

    #[tokio::test]
    async fn test_missing_history_is_not_found() {
        let provider = MockProvider::without_history();
        let err = resolve_creation_day(&provider, "0xT2", "ethereum")
            .await
            .unwrap_err();
        assert!(matches!(err, BackfillError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_provider_error() {
        let provider = MockProvider::failing();
        let err = resolve_creation_day(&provider, "0xT1", "ethereum")
            .await
            .unwrap_err();
        assert!(matches!(err, BackfillError::Provider(_)));
    }
}
