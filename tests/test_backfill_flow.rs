//! End-to-end backfill flow over the public API, using the in-memory
//! provider and store fakes (no network, database, or queue required).

use std::sync::Arc;

use price_backfill_sdk::backfill::{BackfillEngine, BackfillRequest, JobStatus};
use price_backfill_sdk::settings::{BackfillSettings, Settings};
use price_backfill_sdk::testing::{MemoryStore, MockProvider};
use price_backfill_sdk::worker::run_job;

fn test_settings() -> BackfillSettings {
    BackfillSettings {
        min_request_interval_ms: 1,
        quote_currency: "usd".to_string(),
    }
}

/// The full request -> engine -> result path: a queue-shaped JSON request
/// is decoded, executed, and the reported counts match what was persisted.
#[tokio::test]
async fn test_request_to_result_flow() {
    let request: BackfillRequest =
        serde_json::from_str(r#"{"token_address":"0xT1","network":"Ethereum"}"#)
            .expect("queue payloads without an id must decode");

    let provider = MockProvider::with_creation("2023-01-01T07:21:35Z")
        .price_on("2023-01-01", 1.0)
        .price_on("2023-01-02", 1.1)
        .price_on("2023-01-03", 1.2);
    let store = Arc::new(MemoryStore::new());
    let engine = BackfillEngine::new(Arc::new(provider), store.clone(), &test_settings());

    let result = engine
        .backfill_until(&request, "2023-01-03".parse().unwrap())
        .await
        .unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.days_processed, 3);
    assert_eq!(result.days_saved, 3);

    // Stored under the normalized network name
    let records = store.records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.network == "ethereum"));

    // The result serializes to the shape the job source consumes
    let payload = serde_json::to_value(&result).unwrap();
    assert_eq!(payload["status"], "Completed");
    assert_eq!(payload["token_address"], "0xT1");
}

/// A failed resolution surfaces as a Failed result through the job runner
/// path, with nothing persisted.
#[tokio::test]
async fn test_failed_job_reports_through_runner() {
    let store = Arc::new(MemoryStore::new());
    let engine = BackfillEngine::new(
        Arc::new(MockProvider::without_history()),
        store.clone(),
        &test_settings(),
    );

    let request = BackfillRequest::new("0xT2", "polygon");
    let result = run_job(&engine, &request).await;

    assert_eq!(result.status, JobStatus::Failed);
    assert!(result.error.is_some());
    assert!(store.is_empty());
}

/// Settings defaults carry the full network mapping table and the pacing
/// floor the engine is built from.
#[test]
fn test_default_settings_support_the_major_networks() {
    let settings = Settings::from_file("no-such-config").unwrap();
    for (logical, provider_id) in [
        ("ethereum", "eth-mainnet"),
        ("polygon", "polygon-mainnet"),
        ("arbitrum", "arb-mainnet"),
        ("optimism", "opt-mainnet"),
    ] {
        assert_eq!(
            settings.provider.networks.get(logical).map(String::as_str),
            Some(provider_id)
        );
    }
    assert!(settings.backfill.min_request_interval_ms >= 500);
}
