// src/queue.rs
//
// Job source transport: a Redis list carries backfill requests in and a
// second list carries completion results back out. Delivery semantics are
// the job source's contract; this module only moves payloads.

use anyhow::{Context, Result};
use log::{info, warn};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::backfill::{BackfillRequest, BackfillResult};
use crate::settings::QueueSettings;

pub struct JobQueue {
    conn: ConnectionManager,
    requests_key: String,
    results_key: String,
    pop_timeout_secs: u64,
}

impl JobQueue {
    pub async fn new(settings: &QueueSettings) -> Result<Self> {
        let client = Client::open(settings.url.as_str())
            .context("Failed to create Redis client for job queue")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to job queue")?;

        info!("✅ Job queue connected to {}", settings.url);

        Ok(Self {
            conn,
            requests_key: settings.requests_key.clone(),
            results_key: settings.results_key.clone(),
            pop_timeout_secs: settings.pop_timeout_secs,
        })
    }

    /// Enqueues one backfill request.
    pub async fn push_request(&mut self, request: &BackfillRequest) -> Result<()> {
        let payload =
            serde_json::to_string(request).context("Failed to serialize backfill request")?;
        self.conn
            .rpush::<_, _, ()>(&self.requests_key, payload)
            .await
            .context("Failed to enqueue backfill request")?;
        info!(
            "➕ Enqueued job {} ({} on {})",
            request.id, request.token_address, request.network
        );
        Ok(())
    }

    /// Blocking pop with the configured timeout.
    ///
    /// `Ok(None)` means the timeout elapsed with no work, which gives the
    /// worker loop a chance to observe its shutdown flag. A payload that
    /// fails to decode is dropped with a warning rather than wedging the
    /// queue head.
    pub async fn pop_request(&mut self) -> Result<Option<BackfillRequest>> {
        let popped: Option<(String, String)> = self
            .conn
            .blpop(&self.requests_key, self.pop_timeout_secs as f64)
            .await
            .context("Failed to pop from job queue")?;

        let Some((_, payload)) = popped else {
            return Ok(None);
        };

        match serde_json::from_str::<BackfillRequest>(&payload) {
            Ok(request) => Ok(Some(request)),
            Err(e) => {
                warn!("Dropping malformed job payload {:?}: {}", payload, e);
                Ok(None)
            }
        }
    }

    /// Reports a job outcome back to the job source.
    pub async fn push_result(&mut self, result: &BackfillResult) -> Result<()> {
        let payload =
            serde_json::to_string(result).context("Failed to serialize backfill result")?;
        self.conn
            .rpush::<_, _, ()>(&self.results_key, payload)
            .await
            .context("Failed to push backfill result")?;
        Ok(())
    }

    /// Test Redis connection.
    pub async fn health_check(&mut self) -> Result<()> {
        let pong: String = redis::cmd("PING")
            .query_async(&mut self.conn)
            .await
            .context("Job queue health check failed")?;

        if pong == "PONG" {
            Ok(())
        } else {
            anyhow::bail!("Unexpected Redis response: {}", pong)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::JobStatus;

    #[test]
    fn test_request_payload_round_trip() {
        let request = BackfillRequest::new("0xT1", "ethereum");
        let payload = serde_json::to_string(&request).unwrap();
        let decoded: BackfillRequest = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.id, request.id);
        assert_eq!(decoded.token_address, "0xT1");
        assert_eq!(decoded.network, "ethereum");
    }

    #[test]
    fn test_result_payload_round_trip() {
        let request = BackfillRequest::new("0xT1", "ethereum");
        let result = BackfillResult {
            id: request.id,
            token_address: request.token_address,
            network: request.network,
            status: JobStatus::Completed,
            days_processed: 10,
            days_saved: 4,
            error: None,
        };
        let payload = serde_json::to_string(&result).unwrap();
        let decoded: BackfillResult = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.status, JobStatus::Completed);
        assert_eq!(decoded.days_processed, 10);
        assert_eq!(decoded.days_saved, 4);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_queue_round_trip() {
        let settings = QueueSettings {
            requests_key: format!("backfill:test:{}", uuid::Uuid::new_v4()),
            pop_timeout_secs: 1,
            ..QueueSettings::default()
        };
        let mut queue = JobQueue::new(&settings).await.unwrap();
        queue.health_check().await.unwrap();

        let request = BackfillRequest::new("0xT1", "ethereum");
        queue.push_request(&request).await.unwrap();

        let popped = queue.pop_request().await.unwrap().unwrap();
        assert_eq!(popped.id, request.id);

        // Queue drained: the next pop times out empty
        assert!(queue.pop_request().await.unwrap().is_none());
    }
}
