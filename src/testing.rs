// src/testing.rs
//
// In-memory fakes for the provider and store seams. Used by the unit tests
// in this crate and by the integration tests under tests/; no network or
// database required.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::database::{PriceRecord, PriceStore};
use crate::market_data::MarketDataProvider;

/// Scripted [`MarketDataProvider`].
pub struct MockProvider {
    creation: Option<DateTime<Utc>>,
    fail_transfers: bool,
    prices: HashMap<NaiveDate, f64>,
    fail_prices: bool,
    pub transfer_calls: AtomicU32,
    pub price_calls: AtomicU32,
}

impl MockProvider {
    pub fn with_creation(timestamp: &str) -> Self {
        let creation = DateTime::parse_from_rfc3339(timestamp)
            .expect("test timestamp must be RFC 3339")
            .with_timezone(&Utc);
        Self {
            creation: Some(creation),
            fail_transfers: false,
            prices: HashMap::new(),
            fail_prices: false,
            transfer_calls: AtomicU32::new(0),
            price_calls: AtomicU32::new(0),
        }
    }

    /// Provider knows no transfers for the token.
    pub fn without_history() -> Self {
        Self {
            creation: None,
            ..Self::with_creation("2000-01-01T00:00:00Z")
        }
    }

    /// Every upstream call fails.
    pub fn failing() -> Self {
        Self {
            fail_transfers: true,
            fail_prices: true,
            ..Self::with_creation("2000-01-01T00:00:00Z")
        }
    }

    /// Quote `price` for the day starting at `day` (YYYY-MM-DD).
    pub fn price_on(mut self, day: &str, price: f64) -> Self {
        self.prices
            .insert(day.parse().expect("test day must be YYYY-MM-DD"), price);
        self
    }

    /// Price endpoint fails while the transfer endpoint keeps working.
    pub fn fail_prices(mut self) -> Self {
        self.fail_prices = true;
        self
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn earliest_transfer_timestamp(
        &self,
        _token_address: &str,
        _network: &str,
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_transfers {
            anyhow::bail!("simulated transfer lookup outage");
        }
        Ok(self.creation)
    }

    async fn historical_price(
        &self,
        _token_address: &str,
        _network: &str,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _currency: &str,
    ) -> anyhow::Result<Option<f64>> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_prices {
            anyhow::bail!("simulated price endpoint outage");
        }
        Ok(self.prices.get(&start.date_naive()).copied())
    }
}

/// HashMap-backed [`PriceStore`] enforcing the uniqueness invariant.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, String, NaiveDate), PriceRecord>>,
    /// When set, every store operation after this many successful calls
    /// fails, simulating a mid-range outage.
    fail_after: Option<u32>,
    pub calls: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(calls: u32) -> Self {
        Self {
            fail_after: Some(calls),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records, ordered by day.
    pub fn records(&self) -> Vec<PriceRecord> {
        let mut records: Vec<PriceRecord> =
            self.records.lock().unwrap().values().cloned().collect();
        records.sort_by_key(|r| (r.token_address.clone(), r.day));
        records
    }

    fn check_outage(&self) -> Result<(), sqlx::Error> {
        let seen = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if seen >= limit {
                return Err(sqlx::Error::PoolClosed);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn find_one(
        &self,
        token_address: &str,
        network: &str,
        day: NaiveDate,
    ) -> Result<Option<PriceRecord>, sqlx::Error> {
        self.check_outage()?;
        let key = (
            token_address.to_string(),
            crate::networks::normalize_network(network),
            day,
        );
        Ok(self.records.lock().unwrap().get(&key).cloned())
    }

    async fn create(
        &self,
        token_address: &str,
        network: &str,
        day: NaiveDate,
        price: f64,
    ) -> Result<PriceRecord, sqlx::Error> {
        self.check_outage()?;
        let network = crate::networks::normalize_network(network);
        let key = (token_address.to_string(), network.clone(), day);
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&key) {
            // Same shape of failure the unique constraint produces
            return Err(sqlx::Error::Protocol(format!(
                "duplicate price record for {} {} {}",
                token_address, network, day
            )));
        }
        let record = PriceRecord {
            token_address: token_address.to_string(),
            network,
            day,
            price,
            created_at: Utc::now(),
        };
        records.insert(key, record.clone());
        Ok(record)
    }
}
