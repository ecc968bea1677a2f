// src/networks.rs
//
// Logical network name -> provider network identifier mapping.
// Unknown names pass through unchanged so new networks work without a
// code change (the provider rejects genuinely bad identifiers itself).

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Built-in mapping for the major EVM-compatible chains.
pub static DEFAULT_NETWORK_MAP: Lazy<HashMap<String, String>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("ethereum".to_string(), "eth-mainnet".to_string());
    map.insert("polygon".to_string(), "polygon-mainnet".to_string());
    map.insert("arbitrum".to_string(), "arb-mainnet".to_string());
    map.insert("optimism".to_string(), "opt-mainnet".to_string());
    map
});

/// Resolves a logical network name to the provider-specific identifier.
///
/// Lookup is case-insensitive. Names missing from the table pass through
/// unchanged, casing preserved (forward-compatible with new networks).
pub fn provider_network(map: &HashMap<String, String>, logical: &str) -> String {
    let key = logical.trim().to_lowercase();
    match map.get(&key) {
        Some(provider_id) => provider_id.clone(),
        None => logical.trim().to_string(),
    }
}

/// Canonical form of a logical network name for storage and lookups.
pub fn normalize_network(logical: &str) -> String {
    logical.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_networks_map_to_provider_ids() {
        assert_eq!(
            provider_network(&DEFAULT_NETWORK_MAP, "ethereum"),
            "eth-mainnet"
        );
        assert_eq!(
            provider_network(&DEFAULT_NETWORK_MAP, "arbitrum"),
            "arb-mainnet"
        );
        assert_eq!(
            provider_network(&DEFAULT_NETWORK_MAP, "polygon"),
            "polygon-mainnet"
        );
        assert_eq!(
            provider_network(&DEFAULT_NETWORK_MAP, "optimism"),
            "opt-mainnet"
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(
            provider_network(&DEFAULT_NETWORK_MAP, "Ethereum"),
            "eth-mainnet"
        );
        assert_eq!(
            provider_network(&DEFAULT_NETWORK_MAP, "  ARBITRUM "),
            "arb-mainnet"
        );
    }

    #[test]
    fn test_unknown_network_passes_through_unchanged() {
        assert_eq!(provider_network(&DEFAULT_NETWORK_MAP, "base"), "base");
        // Casing of an unmapped name is preserved, only whitespace trimmed
        assert_eq!(
            provider_network(&DEFAULT_NETWORK_MAP, " Base-Sepolia "),
            "Base-Sepolia"
        );
    }

    #[test]
    fn test_normalize_network() {
        assert_eq!(normalize_network(" Ethereum "), "ethereum");
    }
}
