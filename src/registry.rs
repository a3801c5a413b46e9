//! Static registry of supported assets and chain endpoints.
//!
//! Built once from configuration and never mutated. Asset resolution is a
//! single lookup keyed by lowercased source contract address (or the native
//! marker) — matching is by registered descriptor, not a chain of hardcoded
//! address comparisons.

use std::collections::HashMap;

use eyre::{eyre, Result};

use crate::types::{AssetDescriptor, ChainEndpoint};

pub struct Registry {
    /// Keyed by lowercased source contract address or
    /// [`crate::types::NATIVE_MARKER`].
    assets: HashMap<String, AssetDescriptor>,
    /// Keyed by chain identifier.
    endpoints: HashMap<String, ChainEndpoint>,
    /// Lowercased bridge receiving wallet on the source chain.
    receiving_wallet: String,
}

impl Registry {
    pub fn new(
        receiving_wallet: &str,
        assets: Vec<AssetDescriptor>,
        endpoints: Vec<ChainEndpoint>,
    ) -> Result<Self> {
        if assets.is_empty() {
            return Err(eyre!("registry needs at least one asset"));
        }

        let mut asset_map = HashMap::new();
        for asset in assets {
            asset.validate().map_err(|e| eyre!(e))?;
            let key = asset.source_contract.to_lowercase();
            if asset_map.insert(key, asset.clone()).is_some() {
                return Err(eyre!(
                    "duplicate asset registration for {}",
                    asset.source_contract
                ));
            }
        }

        let mut endpoint_map = HashMap::new();
        for endpoint in endpoints {
            if endpoint_map
                .insert(endpoint.chain.clone(), endpoint.clone())
                .is_some()
            {
                return Err(eyre!("duplicate endpoint for chain {}", endpoint.chain));
            }
        }

        Ok(Self {
            assets: asset_map,
            endpoints: endpoint_map,
            receiving_wallet: receiving_wallet.to_lowercase(),
        })
    }

    /// Resolve an asset by source contract address or
    /// [`crate::types::NATIVE_MARKER`]. Case-insensitive on addresses.
    pub fn resolve_asset(&self, source_contract: &str) -> Option<&AssetDescriptor> {
        self.assets.get(&source_contract.to_lowercase())
    }

    pub fn endpoint(&self, chain: &str) -> Option<&ChainEndpoint> {
        self.endpoints.get(chain)
    }

    /// Whether `address` is the bridge's receiving wallet, ignoring case.
    pub fn is_receiving_wallet(&self, address: &str) -> bool {
        address.to_lowercase() == self.receiving_wallet
    }

    pub fn receiving_wallet(&self) -> &str {
        &self.receiving_wallet
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NATIVE_MARKER;

    fn assets() -> Vec<AssetDescriptor> {
        vec![
            AssetDescriptor {
                symbol: "WBTC".to_string(),
                source_contract: "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599".to_string(),
                destination_contract: None,
                source_decimals: 8,
                native_on_destination: true,
            },
            AssetDescriptor {
                symbol: "USDT".to_string(),
                source_contract: "0xdAC17F958D2ee523a2206206994597C13D831ec7".to_string(),
                destination_contract: Some(
                    "0x00000000000000000000000000000000000000aa".to_string(),
                ),
                source_decimals: 6,
                native_on_destination: false,
            },
        ]
    }

    fn registry() -> Registry {
        Registry::new("0xBridgeWallet00000000000000000000000000Ab", assets(), vec![]).unwrap()
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = registry();
        let asset = registry
            .resolve_asset("0X2260FAC5E5542A773AA44FBCFEDF7C193BC2C599")
            .unwrap();
        assert_eq!(asset.symbol, "WBTC");
    }

    #[test]
    fn test_resolve_unknown_is_none() {
        assert!(registry()
            .resolve_asset("0x0000000000000000000000000000000000000000")
            .is_none());
    }

    #[test]
    fn test_receiving_wallet_match_ignores_case() {
        let registry = registry();
        assert!(registry.is_receiving_wallet("0xBRIDGEWALLET00000000000000000000000000AB"));
        assert!(!registry.is_receiving_wallet("0xsomeoneelse"));
    }

    #[test]
    fn test_rejects_invariant_violation() {
        let bad = AssetDescriptor {
            symbol: "BAD".to_string(),
            source_contract: NATIVE_MARKER.to_string(),
            destination_contract: None,
            source_decimals: 18,
            native_on_destination: false,
        };
        assert!(Registry::new("0xw", vec![bad], vec![]).is_err());
    }

    #[test]
    fn test_rejects_duplicate_assets() {
        let mut duplicated = assets();
        duplicated.push(assets()[0].clone());
        assert!(Registry::new("0xw", duplicated, vec![]).is_err());
    }
}
