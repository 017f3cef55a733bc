use crate::types::{AggregatorError, Provider, Result};
use ethers::types::Address;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Address quotes are requested for when the user supplies none
pub const DEFAULT_USER_ADDRESS: &str = "0xA830Cd34D83C10Ba3A8bB2F25ff8BBae9BcD0125";

#[derive(Debug, Clone)]
pub struct Config {
    /// Enabled providers, in outcome order
    pub providers: Vec<Provider>,

    pub lifi_api_url: String,

    pub lifi_api_key: Option<String>,

    pub squid_api_url: String,

    pub squid_integrator_id: String,

    pub stargate_api_url: String,

    pub across_api_url: String,

    /// (from, to) chain pairs served by Hyperlane warp routes
    pub hyperlane_routes: Vec<(String, String)>,

    pub user_address: Address,

    pub http_timeout_secs: u64,

    pub eth_price_usd: Decimal,

    pub registry_path: Option<String>,

    /// Keep provider response bodies on each quote
    pub retain_raw_quotes: bool,

    /// Chain symbol -> rpc url, from `<CHAIN>_RPC_URL`
    pub rpc_overrides: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let providers = match env::var("PROVIDERS") {
            Ok(list) => Self::parse_providers(&list)?,
            Err(_) => defaults.providers,
        };

        let squid_integrator_id = env::var("SQUID_INTEGRATOR_ID")
            .or_else(|_| env::var("INTEGRATOR_ID"))
            .ok()
            .filter(|id| !id.is_empty() && id != "INTEGRATOR_ID")
            .unwrap_or(defaults.squid_integrator_id);

        let hyperlane_routes = match env::var("HYPERLANE_ROUTES") {
            Ok(routes) => Self::parse_routes(&routes)?,
            Err(_) => defaults.hyperlane_routes,
        };

        let user_address = match env::var("USER_ADDRESS") {
            Ok(addr) => Self::parse_address(&addr)?,
            Err(_) => defaults.user_address,
        };

        let http_timeout_secs = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(secs) => secs
                .parse()
                .map_err(|_| AggregatorError::ConfigError("Invalid HTTP_TIMEOUT_SECS".to_string()))?,
            Err(_) => defaults.http_timeout_secs,
        };

        let eth_price_usd = match env::var("ETH_PRICE_USD") {
            Ok(price) => Decimal::from_str(price.trim())
                .map_err(|_| AggregatorError::ConfigError("Invalid ETH_PRICE_USD".to_string()))?,
            Err(_) => defaults.eth_price_usd,
        };

        let retain_raw_quotes = env::var("RETAIN_RAW_QUOTES")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        Ok(Self {
            providers,
            lifi_api_url: env::var("LIFI_API_URL").unwrap_or(defaults.lifi_api_url),
            lifi_api_key: env::var("LIFI_API_KEY").ok().filter(|k| !k.is_empty()),
            squid_api_url: env::var("SQUID_API_URL").unwrap_or(defaults.squid_api_url),
            squid_integrator_id,
            stargate_api_url: env::var("STARGATE_API_URL").unwrap_or(defaults.stargate_api_url),
            across_api_url: env::var("ACROSS_API_URL").unwrap_or(defaults.across_api_url),
            hyperlane_routes,
            user_address,
            http_timeout_secs,
            eth_price_usd,
            registry_path: env::var("REGISTRY_PATH").ok().filter(|p| !p.is_empty()),
            retain_raw_quotes,
            rpc_overrides: Self::collect_rpc_overrides(env::vars()),
        })
    }

    /// "lifi,squid" -> [Lifi, Squid], keeping order and dropping duplicates
    fn parse_providers(list: &str) -> Result<Vec<Provider>> {
        let mut providers = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let provider = Provider::from_str(name)
                .map_err(|_| AggregatorError::ConfigError(format!("Unknown provider in PROVIDERS: {}", name)))?;
            if !providers.contains(&provider) {
                providers.push(provider);
            }
        }

        if providers.is_empty() {
            return Err(AggregatorError::ConfigError(
                "PROVIDERS must name at least one provider".to_string(),
            ));
        }
        Ok(providers)
    }

    /// "base:arbitrum,arbitrum:base" -> [(base, arbitrum), (arbitrum, base)]
    fn parse_routes(routes: &str) -> Result<Vec<(String, String)>> {
        routes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|pair| match pair.split_once(':') {
                Some((from, to)) if !from.is_empty() && !to.is_empty() => {
                    Ok((from.trim().to_lowercase(), to.trim().to_lowercase()))
                }
                _ => Err(AggregatorError::ConfigError(format!(
                    "Invalid HYPERLANE_ROUTES entry: {}",
                    pair
                ))),
            })
            .collect()
    }

    fn collect_rpc_overrides(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
        vars.filter_map(|(key, value)| {
            let chain = key.strip_suffix("_RPC_URL")?;
            if chain.is_empty() || value.is_empty() {
                return None;
            }
            Some((chain.to_lowercase(), value))
        })
        .collect()
    }

    /// Parse an Ethereum address from string
    fn parse_address(addr_str: &str) -> Result<Address> {
        Address::from_str(addr_str.trim())
            .map_err(|_| AggregatorError::ConfigError(format!("Invalid address: {}", addr_str)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: vec![
                Provider::Lifi,
                Provider::Hyperlane,
                Provider::Squid,
                Provider::Stargate,
                Provider::Across,
            ],
            lifi_api_url: "https://li.quest/v1".to_string(),
            lifi_api_key: None,
            squid_api_url: "https://v2.api.squidrouter.com/v2".to_string(),
            squid_integrator_id: "test".to_string(),
            stargate_api_url: "https://stargate.finance/api/v1".to_string(),
            across_api_url: "https://app.across.to/api".to_string(),
            hyperlane_routes: vec![("base".to_string(), "arbitrum".to_string())],
            user_address: Address::from_str(DEFAULT_USER_ADDRESS).unwrap_or_default(),
            http_timeout_secs: 15,
            eth_price_usd: Decimal::from(3250),
            registry_path: None,
            retain_raw_quotes: false,
            rpc_overrides: HashMap::new(),
        }
    }
}
