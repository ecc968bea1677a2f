// src/market_data.rs

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::networks::provider_network;
use crate::settings::ProviderSettings;

/// Read-only access to the upstream market data provider.
///
/// Two operations back the whole backfill: the earliest on-chain transfer
/// for a token contract (creation-day resolution) and the quoted price over
/// a time window (per-day fetch). Both take the logical network name; the
/// implementation owns the logical -> provider identifier mapping.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Timestamp of the earliest transfer event involving the token
    /// contract, or `None` when the provider has no transfer history.
    async fn earliest_transfer_timestamp(
        &self,
        token_address: &str,
        network: &str,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Quoted price for the token over `[start, end)` in the given
    /// reference currency, or `None` when the provider has no quote.
    async fn historical_price(
        &self,
        token_address: &str,
        network: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        currency: &str,
    ) -> Result<Option<f64>>;
}

// ---- Alchemy wire models ----

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    id: u32,
    jsonrpc: &'static str,
    method: &'static str,
    params: [AssetTransfersParams<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetTransfersParams<'a> {
    from_block: &'static str,
    contract_addresses: [&'a str; 1],
    max_count: &'static str,
    order: &'static str,
    category: [&'static str; 1],
    with_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<AssetTransfersResult>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AssetTransfersResult {
    #[serde(default)]
    transfers: Vec<Transfer>,
}

#[derive(Debug, Deserialize)]
struct Transfer {
    metadata: Option<TransferMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferMetadata {
    block_timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoricalPriceRequest<'a> {
    address: &'a str,
    network: &'a str,
    start_time: String,
    end_time: String,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct HistoricalPriceResponse {
    #[serde(default)]
    data: Vec<PricePoint>,
}

#[derive(Debug, Deserialize)]
struct PricePoint {
    value: Option<String>,
}

/// Alchemy-backed implementation of [`MarketDataProvider`].
pub struct AlchemyMarketData {
    client: reqwest::Client,
    api_key: String,
    rpc_base_url: String,
    price_api_base_url: String,
    networks: HashMap<String, String>,
}

impl AlchemyMarketData {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client for market data provider")?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            rpc_base_url: settings.rpc_base_url.clone(),
            price_api_base_url: settings.price_api_base_url.clone(),
            networks: settings.networks.clone(),
        })
    }

    fn rpc_url(&self, logical_network: &str) -> String {
        let network_id = provider_network(&self.networks, logical_network);
        format!(
            "{}/{}",
            self.rpc_base_url.replace("{network}", &network_id),
            self.api_key
        )
    }

    fn price_url(&self) -> String {
        format!("{}/{}/tokens/historical", self.price_api_base_url, self.api_key)
    }
}

#[async_trait]
impl MarketDataProvider for AlchemyMarketData {
    async fn earliest_transfer_timestamp(
        &self,
        token_address: &str,
        network: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        // Single ascending erc20 transfer with metadata: the first transfer
        // ever recorded for the contract carries its creation-day timestamp.
        let request = JsonRpcRequest {
            id: 1,
            jsonrpc: "2.0",
            method: "alchemy_getAssetTransfers",
            params: [AssetTransfersParams {
                from_block: "0x0",
                contract_addresses: [token_address],
                max_count: "0x1",
                order: "asc",
                category: ["erc20"],
                with_metadata: true,
            }],
        };

        let url = self.rpc_url(network);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Transfer lookup request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Provider returned {} for transfer lookup: {}", status, body));
        }

        let payload: JsonRpcResponse = response
            .json()
            .await
            .context("Failed to decode transfer lookup response")?;

        if let Some(err) = payload.error {
            return Err(anyhow!("Provider RPC error {}: {}", err.code, err.message));
        }

        let timestamp = payload
            .result
            .and_then(|r| r.transfers.into_iter().next())
            .and_then(|t| t.metadata)
            .and_then(|m| m.block_timestamp);

        let Some(raw) = timestamp else {
            return Ok(None);
        };

        let parsed = DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| anyhow!("Invalid transfer timestamp {:?}: {}", raw, e))?;

        debug!("Earliest transfer for {} on {}: {}", token_address, network, parsed);
        Ok(Some(parsed))
    }

    async fn historical_price(
        &self,
        token_address: &str,
        network: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        currency: &str,
    ) -> Result<Option<f64>> {
        let network_id = provider_network(&self.networks, network);
        let request = HistoricalPriceRequest {
            address: token_address,
            network: &network_id,
            start_time: start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            end_time: end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            currency,
        };

        let response = self
            .client
            .post(self.price_url())
            .json(&request)
            .send()
            .await
            .context("Historical price request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Provider returned {} for price window: {}", status, body));
        }

        let payload: HistoricalPriceResponse = response
            .json()
            .await
            .context("Failed to decode historical price response")?;

        let Some(raw) = payload.data.into_iter().next().and_then(|p| p.value) else {
            return Ok(None);
        };

        match raw.parse::<f64>() {
            Ok(price) => Ok(Some(price)),
            Err(_) => {
                warn!("Provider returned non-numeric price {:?} for {}", raw, token_address);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::DEFAULT_NETWORK_MAP;

    fn test_settings() -> ProviderSettings {
        ProviderSettings {
            api_key: "test-key".to_string(),
            networks: DEFAULT_NETWORK_MAP.clone(),
            ..ProviderSettings::default()
        }
    }

    #[test]
    fn test_rpc_url_substitutes_mapped_network() {
        let provider = AlchemyMarketData::new(&test_settings()).unwrap();
        assert_eq!(
            provider.rpc_url("ethereum"),
            "https://eth-mainnet.g.alchemy.com/v2/test-key"
        );
        // Unmapped networks pass through unchanged
        assert_eq!(
            provider.rpc_url("base-mainnet"),
            "https://base-mainnet.g.alchemy.com/v2/test-key"
        );
    }

    #[test]
    fn test_transfer_response_decodes_block_timestamp() {
        let raw = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "transfers": [
                    {
                        "blockNum": "0x10d4f",
                        "category": "erc20",
                        "metadata": { "blockTimestamp": "2023-01-01T07:21:35.000Z" }
                    }
                ]
            }
        }"#;
        let payload: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        let ts = payload
            .result
            .unwrap()
            .transfers
            .into_iter()
            .next()
            .unwrap()
            .metadata
            .unwrap()
            .block_timestamp
            .unwrap();
        assert_eq!(ts, "2023-01-01T07:21:35.000Z");
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_transfer_response_decodes_empty_and_error() {
        let empty: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":{"transfers":[]}}"#).unwrap();
        assert!(empty.result.unwrap().transfers.is_empty());

        let err: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"bad address"}}"#,
        )
        .unwrap();
        let err = err.error.unwrap();
        assert_eq!(err.code, -32602);
        assert_eq!(err.message, "bad address");
    }

    #[test]
    fn test_price_response_decodes_first_value() {
        let raw = r#"{
            "data": [
                { "value": "1.2345", "timestamp": "2023-01-01T00:00:00Z" },
                { "value": "1.30", "timestamp": "2023-01-01T01:00:00Z" }
            ]
        }"#;
        let payload: HistoricalPriceResponse = serde_json::from_str(raw).unwrap();
        let value = payload.data.into_iter().next().unwrap().value.unwrap();
        assert_eq!(value.parse::<f64>().unwrap(), 1.2345);
    }

    #[test]
    fn test_price_response_tolerates_empty_data() {
        let payload: HistoricalPriceResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(payload.data.is_empty());
    }

    #[test]
    fn test_price_request_serializes_camel_case() {
        let start = DateTime::parse_from_rfc3339("2023-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let end = start + chrono::Duration::hours(24);
        let req = HistoricalPriceRequest {
            address: "0xabc",
            network: "eth-mainnet",
            start_time: start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            end_time: end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            currency: "usd",
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["startTime"], "2023-01-01T00:00:00Z");
        assert_eq!(json["endTime"], "2023-01-02T00:00:00Z");
        assert_eq!(json["network"], "eth-mainnet");
        assert_eq!(json["currency"], "usd");
    }
}
