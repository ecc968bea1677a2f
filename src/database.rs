// src/database.rs

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;

use crate::networks::normalize_network;
use crate::settings::DatabaseSettings;

/// PostgreSQL connection pool type alias.
pub type DbPool = Pool<Postgres>;

/// Database schema name.
pub const SCHEMA: &str = "price_backfill";

/// One observed price for one token on one network on one calendar day.
///
/// At most one record exists per (token_address, network, day): the engine
/// checks existence before every insert, and the table's unique constraint
/// enforces the same invariant against out-of-process writers. Records are
/// created once and never updated or deleted by this system.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub token_address: String,
    pub network: String,
    pub day: NaiveDate,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// Persistence seam for price history.
///
/// Errors stay `sqlx::Error` so the engine can propagate them as a fatal
/// `Store` failure without translation.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn find_one(
        &self,
        token_address: &str,
        network: &str,
        day: NaiveDate,
    ) -> Result<Option<PriceRecord>, sqlx::Error>;

    async fn create(
        &self,
        token_address: &str,
        network: &str,
        day: NaiveDate,
        price: f64,
    ) -> Result<PriceRecord, sqlx::Error>;
}

/// Connects to PostgreSQL with retries and ensures the schema exists.
///
/// The pool is owned by the caller (constructed once in the worker binary,
/// shared for the process lifetime, closed on shutdown).
pub async fn connect(settings: &DatabaseSettings) -> Result<DbPool> {
    let mut last_err: Option<anyhow::Error> = None;
    let max_attempts = settings.connect_max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect(&settings.url)
            .await
        {
            Ok(pool) => {
                log::info!(
                    "✅ Connected to record store (attempt {}/{})",
                    attempt,
                    max_attempts
                );
                if let Err(e) = initialize_database(&pool).await {
                    last_err = Some(e);
                } else {
                    return Ok(pool);
                }
            }
            Err(e) => {
                last_err = Some(e.into());
            }
        }
        // Backoff with cap to survive DNS/startup races in Compose
        let delay_ms = (1u64 << attempt.min(6)) * 200;
        log::warn!(
            "DB connect/init attempt {}/{} failed. Retrying in {} ms...",
            attempt,
            max_attempts,
            delay_ms
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Unknown DB connection error")))
}

/// Idempotent schema creation under an advisory lock.
pub async fn initialize_database(pool: &DbPool) -> Result<()> {
    const MIGRATION_LOCK_ID: i64 = 0x5052494345484953; // "PRICEHIS"

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(tx.as_mut())
        .await?;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", SCHEMA))
        .execute(tx.as_mut())
        .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.price_history (
            id BIGSERIAL PRIMARY KEY,
            token_address VARCHAR(66) NOT NULL,
            network VARCHAR(50) NOT NULL,
            day DATE NOT NULL,
            price DOUBLE PRECISION NOT NULL CHECK (price >= 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (token_address, network, day)
        )",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_price_history_token_network
             ON {}.price_history (token_address, network)",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    tx.commit().await?;
    log::info!("Record store schema ready ({})", SCHEMA);

    Ok(())
}

/// PostgreSQL-backed [`PriceStore`].
pub struct PostgresPriceStore {
    pool: DbPool,
}

impl PostgresPriceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<PriceRecord, sqlx::Error> {
        Ok(PriceRecord {
            token_address: row.try_get("token_address")?,
            network: row.try_get("network")?,
            day: row.try_get("day")?,
            price: row.try_get("price")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl PriceStore for PostgresPriceStore {
    async fn find_one(
        &self,
        token_address: &str,
        network: &str,
        day: NaiveDate,
    ) -> Result<Option<PriceRecord>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT token_address, network, day, price, created_at
                 FROM {}.price_history
                 WHERE token_address = $1 AND network = $2 AND day = $3",
            SCHEMA
        ))
        .bind(token_address)
        .bind(normalize_network(network))
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn create(
        &self,
        token_address: &str,
        network: &str,
        day: NaiveDate,
        price: f64,
    ) -> Result<PriceRecord, sqlx::Error> {
        let row = sqlx::query(&format!(
            "INSERT INTO {}.price_history (token_address, network, day, price)
                 VALUES ($1, $2, $3, $4)
                 RETURNING token_address, network, day, price, created_at",
            SCHEMA
        ))
        .bind(token_address)
        .bind(normalize_network(network))
        .bind(day)
        .bind(price)
        .fetch_one(&self.pool)
        .await?;

        Self::record_from_row(&row)
    }
}
