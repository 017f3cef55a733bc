use crate::types::{AggregatorError, Result};
use ethers::types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Decimals assumed for tokens the registry has no metadata for
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// Static configuration for one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,

    /// Token symbol -> contract address on this chain
    pub tokens: BTreeMap<String, Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

/// Chain-independent token metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMeta {
    pub decimals: u8,

    /// Reference USD price, used to value fees quoted in token units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_price: Option<Decimal>,
}

/// Chain and token registry consumed by the parser and the adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRegistry {
    chains: BTreeMap<String, ChainConfig>,

    #[serde(default)]
    tokens: BTreeMap<String, TokenMeta>,
}

impl ChainRegistry {
    /// Build a registry from chain entries; keys are lowercased
    pub fn new(chains: Vec<ChainConfig>, tokens: BTreeMap<String, TokenMeta>) -> Self {
        let chains = chains
            .into_iter()
            .map(|mut chain| {
                chain.name = chain.name.to_lowercase();
                chain.tokens = chain
                    .tokens
                    .into_iter()
                    .map(|(symbol, address)| (symbol.to_lowercase(), address))
                    .collect();
                (chain.name.clone(), chain)
            })
            .collect();
        let tokens = tokens
            .into_iter()
            .map(|(symbol, meta)| (symbol.to_lowercase(), meta))
            .collect();

        Self { chains, tokens }
    }

    /// Look up a chain by (case-insensitive) symbol
    pub fn chain(&self, symbol: &str) -> Option<&ChainConfig> {
        self.chains.get(&symbol.to_lowercase())
    }

    /// Address of `token` on `chain`
    pub fn token_address(&self, chain: &str, token: &str) -> Option<Address> {
        self.chain(chain)
            .and_then(|c| c.tokens.get(&token.to_lowercase()).copied())
    }

    pub fn token_decimals(&self, token: &str) -> u8 {
        self.tokens
            .get(&token.to_lowercase())
            .map(|meta| meta.decimals)
            .unwrap_or(DEFAULT_TOKEN_DECIMALS)
    }

    pub fn token_usd_price(&self, token: &str) -> Option<Decimal> {
        self.tokens
            .get(&token.to_lowercase())
            .and_then(|meta| meta.usd_price)
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Replace rpc urls for the given chain symbols
    pub fn apply_rpc_overrides(&mut self, overrides: &HashMap<String, String>) {
        for (symbol, url) in overrides {
            if let Some(chain) = self.chains.get_mut(&symbol.to_lowercase()) {
                debug!("Using rpc override for {}", chain.name);
                chain.rpc_url = Some(url.clone());
            }
        }
    }

    /// Export the registry to a JSON file
    pub fn export_to_file(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AggregatorError::RegistryError(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| {
            AggregatorError::RegistryError(format!("Failed to serialize registry: {}", e))
        })?;

        fs::write(path, json).map_err(|e| {
            AggregatorError::RegistryError(format!("Failed to write registry file: {}", e))
        })?;

        info!("Exported {} chains to {}", self.len(), path);
        Ok(())
    }

    /// Load a registry from a JSON file
    pub fn import_from_file(path: &str) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            AggregatorError::RegistryError(format!("Failed to read registry file: {}", e))
        })?;

        let parsed: ChainRegistry = serde_json::from_str(&json).map_err(|e| {
            AggregatorError::RegistryError(format!("Failed to parse registry: {}", e))
        })?;

        let registry = Self::new(parsed.chains.into_values().collect(), parsed.tokens);
        if registry.is_empty() {
            return Err(AggregatorError::RegistryError(format!(
                "Registry file {} lists no chains",
                path
            )));
        }

        info!("Imported {} chains from {}", registry.len(), path);
        Ok(registry)
    }
}

fn chain(name: &str, chain_id: u64, rpc_url: &str, tokens: &[(&str, &str)]) -> ChainConfig {
    ChainConfig {
        name: name.to_string(),
        chain_id,
        tokens: tokens
            .iter()
            .filter_map(|(symbol, addr)| {
                Address::from_str(addr)
                    .ok()
                    .map(|address| (symbol.to_string(), address))
            })
            .collect(),
        rpc_url: Some(rpc_url.to_string()),
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        let chains = vec![
            chain(
                "base",
                8453,
                "https://mainnet.base.org",
                &[
                    ("usdc", "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
                    ("eth", "0x4200000000000000000000000000000000000006"),
                ],
            ),
            chain(
                "mantle",
                5000,
                "https://rpc.mantle.xyz",
                &[
                    ("usdc", "0x09Bc4E0D864854c6aFB6eB9A9cdF58aC190D0dF9"),
                    ("eth", "0xdEAddEaDdeadDEadDEADDEAddEADDEAddead1111"),
                ],
            ),
            chain(
                "arbitrum",
                42161,
                "https://arb1.arbitrum.io/rpc",
                &[
                    ("usdc", "0xaf88d065e77c8cC2239327C5EDb3A432268e5831"),
                    ("eth", "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
                ],
            ),
            chain(
                "optimism",
                10,
                "https://mainnet.optimism.io",
                &[
                    ("usdc", "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
                    ("eth", "0x4200000000000000000000000000000000000006"),
                ],
            ),
            chain(
                "ethereum",
                1,
                "https://eth.llamarpc.com",
                &[
                    ("usdc", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
                    ("eth", "0x0000000000000000000000000000000000000000"),
                ],
            ),
        ];

        let mut tokens = BTreeMap::new();
        tokens.insert(
            "usdc".to_string(),
            TokenMeta {
                decimals: 6,
                usd_price: Some(Decimal::ONE),
            },
        );
        tokens.insert(
            "eth".to_string(),
            TokenMeta {
                decimals: 18,
                usd_price: None,
            },
        );

        Self::new(chains, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_lookups() {
        let registry = ChainRegistry::default();
        assert_eq!(registry.chain("BASE").unwrap().chain_id, 8453);
        assert_eq!(registry.chain("mantle").unwrap().chain_id, 5000);
        assert!(registry.chain("solana").is_none());

        let usdc = registry.token_address("base", "USDC").unwrap();
        assert_eq!(
            usdc,
            Address::from_str("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap()
        );
        assert!(registry.token_address("base", "dai").is_none());
    }

    #[test]
    fn test_token_metadata() {
        let registry = ChainRegistry::default();
        assert_eq!(registry.token_decimals("usdc"), 6);
        assert_eq!(registry.token_decimals("eth"), 18);
        assert_eq!(registry.token_decimals("unknown"), DEFAULT_TOKEN_DECIMALS);
        assert_eq!(registry.token_usd_price("usdc"), Some(Decimal::ONE));
        assert_eq!(registry.token_usd_price("eth"), None);
    }

    #[test]
    fn test_rpc_overrides() {
        let mut registry = ChainRegistry::default();
        let mut overrides = HashMap::new();
        overrides.insert("BASE".to_string(), "http://localhost:8545".to_string());
        overrides.insert("nowhere".to_string(), "http://ignored".to_string());
        registry.apply_rpc_overrides(&overrides);

        assert_eq!(
            registry.chain("base").unwrap().rpc_url.as_deref(),
            Some("http://localhost:8545")
        );
    }

    #[test]
    fn test_export_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry").join("chains.json");
        let path = path.to_str().unwrap();

        let registry = ChainRegistry::default();
        registry.export_to_file(path).unwrap();

        let loaded = ChainRegistry::import_from_file(path).unwrap();
        assert_eq!(loaded, registry);
    }

    #[test]
    fn test_import_rejects_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, r#"{"chains": {}}"#).unwrap();

        let result = ChainRegistry::import_from_file(path.to_str().unwrap());
        assert!(result.is_err());
    }
}
