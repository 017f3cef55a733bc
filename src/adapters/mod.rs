// Provider adapters.
//
// Each adapter turns a `QuoteContext` into a normalized `Quote` by calling
// one bridge provider. Adapters own their HTTP clients and timeouts; the
// aggregator only sees the `BridgeAdapter` trait.

pub mod across;
pub mod hyperlane;
pub mod lifi;
pub mod squid;
pub mod stargate;

pub use across::AcrossAdapter;
pub use hyperlane::HyperlaneAdapter;
pub use lifi::LifiAdapter;
pub use squid::SquidAdapter;
pub use stargate::StargateAdapter;

use crate::config::Config;
use crate::registry::ChainRegistry;
use crate::types::{
    AdapterError, AdapterResult, BridgeRequest, Provider, Quote, RawPayload, RequestError, Result,
};
use crate::utils;
use async_trait::async_trait;
use ethers::types::{Address, U256};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Places shown in `Quote::dest_amount_formatted`
const DISPLAY_PLACES: u32 = 6;

/// Longest error body kept from a failed HTTP call
const MAX_ERROR_BODY: usize = 300;

/// Credentials handed to every adapter invocation
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub lifi_api_key: Option<String>,
    pub squid_integrator_id: String,
}

impl From<&Config> for ProviderCredentials {
    fn from(config: &Config) -> Self {
        Self {
            lifi_api_key: config.lifi_api_key.clone(),
            squid_integrator_id: config.squid_integrator_id.clone(),
        }
    }
}

/// Everything an adapter needs to quote one request, resolved once per cycle
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteContext {
    pub request: BridgeRequest,

    /// Source amount in the token's smallest unit
    pub from_amount: U256,

    /// Token contract on the destination chain
    pub to_token: Address,

    pub decimals: u8,

    /// Reference USD price of the token, when known
    pub token_usd_price: Option<Decimal>,

    pub from_rpc_url: Option<String>,

    pub retain_raw: bool,
}

impl QuoteContext {
    pub fn new(
        request: &BridgeRequest,
        registry: &ChainRegistry,
        eth_price_usd: Decimal,
        retain_raw: bool,
    ) -> std::result::Result<Self, RequestError> {
        let to_token = registry
            .token_address(&request.to_chain, &request.token)
            .ok_or_else(|| RequestError::UnsupportedToken {
                token: request.token.clone(),
                chain: request.to_chain.clone(),
            })?;

        let decimals = registry.token_decimals(&request.token);
        let from_amount = utils::parse_token_amount(&request.amount, decimals)
            .map_err(|e| RequestError::InvalidAmount(e.to_string()))?;

        let token_usd_price = registry
            .token_usd_price(&request.token)
            .or_else(|| (request.token == "eth").then_some(eth_price_usd));

        let from_rpc_url = registry
            .chain(&request.from_chain)
            .and_then(|c| c.rpc_url.clone());

        Ok(Self {
            request: request.clone(),
            from_amount,
            to_token,
            decimals,
            token_usd_price,
            from_rpc_url,
            retain_raw,
        })
    }

    /// Value an amount of the bridged token in USD
    pub fn token_units_to_usd(&self, units: U256) -> Option<Decimal> {
        let price = self.token_usd_price?;
        utils::to_decimal(units, self.decimals).map(|amount| (amount * price).round_dp(6))
    }

    /// Build the normalized quote shared by all providers
    pub fn normalize(
        &self,
        provider: Provider,
        dest_amount: U256,
        duration_seconds: u64,
        gas_fee_usd: Decimal,
        total_fees_usd: Option<Decimal>,
        raw: serde_json::Value,
    ) -> Quote {
        Quote {
            provider,
            dest_amount,
            dest_decimals: self.decimals,
            dest_amount_formatted: utils::format_display_amount(
                dest_amount,
                self.decimals,
                DISPLAY_PLACES,
                &self.request.token,
            ),
            duration_seconds,
            gas_fee_usd,
            total_fees_usd,
            bridge_loss_percentage: utils::bridge_loss_percentage(
                self.from_amount,
                dest_amount,
                self.decimals,
            ),
            raw: self.retain_raw.then(|| RawPayload(raw)),
        }
    }
}

/// Interface every bridge provider integration implements
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BridgeAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Whether this provider can serve the chain pair at all.
    /// A `false` answer short-circuits to a failed outcome without a call.
    fn supports_route(&self, _request: &BridgeRequest) -> bool {
        true
    }

    async fn fetch_quote(
        &self,
        ctx: &QuoteContext,
        credentials: &ProviderCredentials,
    ) -> AdapterResult<Quote>;
}

/// Instantiate the adapters enabled in `config`, in configured order
pub fn build_adapters(config: &Config) -> Result<Vec<Arc<dyn BridgeAdapter>>> {
    let mut adapters: Vec<Arc<dyn BridgeAdapter>> = Vec::with_capacity(config.providers.len());

    for provider in &config.providers {
        let adapter: Arc<dyn BridgeAdapter> = match provider {
            Provider::Lifi => Arc::new(LifiAdapter::from_config(config)?),
            Provider::Squid => Arc::new(SquidAdapter::from_config(config)?),
            Provider::Stargate => Arc::new(StargateAdapter::from_config(config)?),
            Provider::Hyperlane => Arc::new(HyperlaneAdapter::from_config(config)),
            Provider::Across => Arc::new(AcrossAdapter::from_config(config)?),
        };
        adapters.push(adapter);
    }

    Ok(adapters)
}

/// USD cost entry, as LiFi and Squid report gas and fee costs
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UsdCost {
    #[serde(default, rename = "amountUSD")]
    pub amount_usd: Option<String>,
}

/// First gas cost figure, the way the providers' own UIs read it
pub(crate) fn first_cost_usd(costs: &[UsdCost]) -> Decimal {
    costs
        .first()
        .and_then(|c| c.amount_usd.as_deref())
        .and_then(utils::parse_usd)
        .unwrap_or(Decimal::ZERO)
}

pub(crate) fn total_cost_usd(costs: &[UsdCost]) -> Decimal {
    utils::sum_usd(costs.iter().filter_map(|c| c.amount_usd.as_deref()))
}

/// HTTP client with the shared headers and the adapter's own timeout
pub(crate) fn http_client(timeout_secs: u64) -> AdapterResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert("Accept", HeaderValue::from_static("application/json"));
    headers.insert("User-Agent", HeaderValue::from_static("bridge-quotes/0.1"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(AdapterError::Http)
}

/// Check the status and decode the body, keeping the untyped JSON alongside
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> AdapterResult<(T, serde_json::Value)> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(AdapterError::Status {
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY),
        });
    }

    let raw: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AdapterError::InvalidResponse(format!("invalid JSON: {}", e)))?;
    let typed = T::deserialize(&raw)
        .map_err(|e| AdapterError::InvalidResponse(format!("unexpected shape: {}", e)))?;

    Ok((typed, raw))
}

/// Parse a smallest-unit amount field from a provider response
pub(crate) fn parse_amount_field(field: &str, value: &str) -> AdapterResult<U256> {
    utils::parse_units(value)
        .ok_or_else(|| AdapterError::InvalidResponse(format!("{} is not an integer: {}", field, value)))
}

/// Provider durations arrive as integers or floats
pub(crate) fn duration_secs(value: Option<f64>, default: u64) -> u64 {
    match value {
        Some(secs) if secs.is_finite() && secs >= 0.0 => secs.round() as u64,
        _ => default,
    }
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_context_resolves_registry_data() {
        let ctx = context();
        assert_eq!(ctx.from_amount, U256::from(10_000_000u64));
        assert_eq!(ctx.decimals, 6);
        assert_eq!(ctx.token_usd_price, Some(Decimal::ONE));
        assert_eq!(ctx.from_rpc_url.as_deref(), Some("https://mainnet.base.org"));
    }

    #[test]
    fn test_context_rejects_missing_destination_token() {
        let mut request = request();
        request.token = "dai".to_string();
        let result = QuoteContext::new(&request, &ChainRegistry::default(), Decimal::ONE, false);
        assert!(matches!(result, Err(RequestError::UnsupportedToken { .. })));
    }

    #[test]
    fn test_eth_falls_back_to_configured_price() {
        let mut request = request();
        request.token = "eth".to_string();
        request.amount = "0.5".to_string();
        let ctx =
            QuoteContext::new(&request, &ChainRegistry::default(), Decimal::from(3000), false)
                .unwrap();
        assert_eq!(ctx.decimals, 18);
        assert_eq!(ctx.token_usd_price, Some(Decimal::from(3000)));
        assert_eq!(
            ctx.token_units_to_usd(U256::from(10u64).pow(U256::from(15u64))),
            Some(Decimal::from(3))
        );
    }

    #[test]
    fn test_normalize_computes_display_and_loss() {
        let ctx = context();
        let quote = ctx.normalize(
            Provider::Lifi,
            U256::from(9_980_000u64),
            45,
            Decimal::new(350, 2),
            None,
            serde_json::json!({"id": "q-1"}),
        );

        assert_eq!(quote.dest_amount_formatted, "9.980000 USDC");
        assert_eq!(quote.bridge_loss_percentage, Decimal::new(20, 2));
        assert_eq!(quote.duration_seconds, 45);
        assert!(quote.raw.is_none());

        let retaining = QuoteContext {
            retain_raw: true,
            ..ctx
        };
        let quote = retaining.normalize(
            Provider::Lifi,
            U256::from(9_980_000u64),
            45,
            Decimal::ZERO,
            None,
            serde_json::json!({"id": "q-1"}),
        );
        assert!(quote.raw.is_some());
    }

    #[test]
    fn test_cost_helpers() {
        let costs: Vec<UsdCost> =
            serde_json::from_value(serde_json::json!([{"amountUSD": "0.10"}, {"amountUSD": "0.006"}, {}]))
                .unwrap();
        assert_eq!(first_cost_usd(&costs), Decimal::new(10, 2));
        assert_eq!(total_cost_usd(&costs), Decimal::new(106, 3));
        assert_eq!(first_cost_usd(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_duration_and_truncate() {
        assert_eq!(duration_secs(Some(29.6), 120), 30);
        assert_eq!(duration_secs(None, 120), 120);
        assert_eq!(duration_secs(Some(-1.0), 120), 120);
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn test_build_adapters_follows_config_order() {
        let config = Config {
            providers: vec![Provider::Stargate, Provider::Hyperlane, Provider::Lifi],
            ..Config::default()
        };
        let adapters = build_adapters(&config).unwrap();
        let providers: Vec<Provider> = adapters.iter().map(|a| a.provider()).collect();
        assert_eq!(
            providers,
            vec![Provider::Stargate, Provider::Hyperlane, Provider::Lifi]
        );
    }
}
