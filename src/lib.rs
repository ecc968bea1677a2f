//! # Price Backfill SDK
//!
//! A Rust library and worker service that backfills historical daily price
//! data for tokens on EVM-compatible networks, from each token's creation
//! date through the present, persisting one price record per
//! (token, network, day).
//!
//! ## Overview
//!
//! The core is the backfill algorithm: resolving the correct date range,
//! idempotent day-by-day gap-filling against a persistent store, pacing
//! outbound requests to the upstream market data provider, and producing a
//! deterministic completion summary.
//!
//! ## Architecture
//!
//! Control flow runs job source → job runner → backfill engine:
//!
//! ### Date Range Resolution
//! The first calendar day a price should exist for is the token's creation
//! day, discovered from its earliest on-chain transfer event.
//!
//! ### Day Price Fetching
//! Each missing day is quoted over its `[00:00Z, +24h)` window in a single
//! reference currency; an unavailable quote leaves a gap instead of failing
//! the job.
//!
//! ### Persistence
//! PostgreSQL holds the price history with a unique
//! (token, network, day) constraint backing up the engine's existence
//! checks.
//!
//! ### Job Consumption
//! A Redis-backed queue delivers requests to a single worker slot;
//! completion summaries flow back the same way.

// Core Types
/// Job-level error taxonomy
pub mod errors;
/// Logical network name -> provider identifier mapping
pub mod networks;

// Market Data Provider
/// Provider seam and the Alchemy-backed client
pub mod market_data;
/// Creation-day resolution from the earliest transfer event
pub mod creation_day;
/// Per-day price fetching over UTC day windows
pub mod day_price;

// Backfill Core
/// The day-by-day gap-filling engine
pub mod backfill;

// Infrastructure
/// PostgreSQL record store
pub mod database;
/// Redis-backed job queue transport
pub mod queue;
/// Single-slot job runner
pub mod worker;
/// Metrics and observability
pub mod metrics;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Test Support
/// In-memory provider and store fakes (no network or database required)
pub mod testing;

// Re-exports for convenience
pub use backfill::{BackfillEngine, BackfillRequest, BackfillResult, JobStatus};
pub use database::{PostgresPriceStore, PriceRecord, PriceStore};
pub use errors::BackfillError;
pub use market_data::{AlchemyMarketData, MarketDataProvider};
pub use queue::JobQueue;
pub use settings::Settings;
pub use worker::JobRunner;
