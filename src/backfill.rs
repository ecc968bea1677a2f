// src/backfill.rs

use chrono::{NaiveDate, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::creation_day::resolve_creation_day;
use crate::database::PriceStore;
use crate::day_price::fetch_day_price;
use crate::errors::BackfillError;
use crate::market_data::MarketDataProvider;
use crate::metrics;
use crate::settings::BackfillSettings;

type ProviderRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One unit of work from the job source: backfill this token on this
/// network. Transient; consumed exactly once and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillRequest {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub token_address: String,
    pub network: String,
}

impl BackfillRequest {
    pub fn new(token_address: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_address: token_address.into(),
            network: network.into(),
        }
    }
}

/// Terminal state of one backfill job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed,
    Failed,
}

/// Completion summary reported back to the job source.
///
/// `days_saved == 0` is a valid outcome for a range that was already fully
/// backfilled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillResult {
    pub id: Uuid,
    pub token_address: String,
    pub network: String,
    pub status: JobStatus,
    pub days_processed: u32,
    pub days_saved: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackfillResult {
    pub fn failed(request: &BackfillRequest, error: &BackfillError) -> Self {
        Self {
            id: request.id,
            token_address: request.token_address.clone(),
            network: request.network.clone(),
            status: JobStatus::Failed,
            days_processed: 0,
            days_saved: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Day-by-day gap-filling of a token's daily price history.
///
/// The engine resolves the creation day, then walks every UTC calendar day
/// from it through today in strictly ascending order: existing records are
/// skipped (which is what makes re-runs idempotent and cheap), missing days
/// are fetched and persisted, and unavailable quotes are left as gaps for a
/// later re-run. All provider calls within a job are sequential and paced
/// by a token bucket, never issued concurrently.
pub struct BackfillEngine {
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn PriceStore>,
    limiter: ProviderRateLimiter,
    quote_currency: String,
}

impl BackfillEngine {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn PriceStore>,
        settings: &BackfillSettings,
    ) -> Self {
        // Settings clamp the interval to >= 500 ms, so the quota is never zero
        let period = Duration::from_millis(settings.min_request_interval_ms.max(1));
        let quota = Quota::with_period(period).expect("pacing interval must be non-zero");

        Self {
            provider,
            store,
            limiter: RateLimiter::direct(quota),
            quote_currency: settings.quote_currency.clone(),
        }
    }

    /// Backfills `[creation day, today]` for one token.
    pub async fn backfill(
        &self,
        request: &BackfillRequest,
    ) -> Result<BackfillResult, BackfillError> {
        self.backfill_until(request, Utc::now().date_naive()).await
    }

    /// Same as [`backfill`](Self::backfill) with an explicit upper bound,
    /// which keeps the range arithmetic deterministic under test.
    pub async fn backfill_until(
        &self,
        request: &BackfillRequest,
        today: NaiveDate,
    ) -> Result<BackfillResult, BackfillError> {
        let token = request.token_address.as_str();
        let network = request.network.as_str();

        // No partial backfill is possible without a start date; resolver
        // failures propagate unchanged.
        self.limiter.until_ready().await;
        let creation_ts = resolve_creation_day(self.provider.as_ref(), token, network).await?;
        let creation_day = creation_ts.date_naive();

        let mut days_processed: u32 = 0;
        let mut days_saved: u32 = 0;

        if creation_day > today {
            // Clock-skewed or future-dated creation timestamp: empty range,
            // zero days, still a successful job.
            info!(
                "Creation day {} for {} is after {}; nothing to backfill",
                creation_day, token, today
            );
        }

        let mut day = creation_day;
        while day <= today {
            let existing = self.store.find_one(token, network, day).await?;

            if existing.is_some() {
                // Already populated: no fetch, no write, no pacing delay
                debug!("[{}] {} already recorded, skipping", token, day);
            } else {
                self.limiter.until_ready().await;
                match fetch_day_price(
                    self.provider.as_ref(),
                    token,
                    network,
                    day,
                    &self.quote_currency,
                )
                .await
                {
                    Some(price) => {
                        self.store.create(token, network, day, price).await?;
                        days_saved += 1;
                        info!("[{}] Saved {} {} for {}", token, price, self.quote_currency, day);
                    }
                    None => {
                        // Gap; a later re-run may fill it once the provider has data
                        info!("[{}] No price available for {}", token, day);
                    }
                }
            }

            days_processed += 1;
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        metrics::increment_days_saved(days_saved);
        info!(
            "🎉 Backfill done for {} on {}: {} days processed, {} saved",
            token, network, days_processed, days_saved
        );

        Ok(BackfillResult {
            id: request.id,
            token_address: token.to_string(),
            network: network.to_string(),
            status: JobStatus::Completed,
            days_processed,
            days_saved,
            error: None,
        })
    }
}
