// src/day_price.rs
//
// Day price fetcher: one quoted price for one UTC calendar day, or nothing.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::warn;

use crate::market_data::MarketDataProvider;
use crate::metrics;

/// The `[00:00:00Z, +24h)` window covering a calendar day, as an inclusive
/// start / exclusive end instant pair.
pub fn day_window(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    (start, start + Duration::hours(24))
}

/// Fetches the quoted price for one calendar day.
///
/// Never fails the caller: a missing quote, a provider failure, or a bogus
/// value all degrade to `None` with a logged diagnostic, because a single
/// missing day must not abort the whole backfill. Retrying is the engine's
/// decision, not this function's.
pub async fn fetch_day_price(
    provider: &dyn MarketDataProvider,
    token_address: &str,
    network: &str,
    day: NaiveDate,
    currency: &str,
) -> Option<f64> {
    let (start, end) = day_window(day);

    let price = match provider
        .historical_price(token_address, network, start, end, currency)
        .await
    {
        Ok(price) => price,
        Err(e) => {
            warn!("No price for {} on {} ({}): {:#}", token_address, day, network, e);
            metrics::increment_provider_error("day_price");
            return None;
        }
    };

    match price {
        // A stored price must be a non-negative finite quote
        Some(value) if value.is_finite() && value >= 0.0 => Some(value),
        Some(value) => {
            warn!("Discarding invalid price {} for {} on {}", value, token_address, day);
            None
        }
        None => None,
    }
}
