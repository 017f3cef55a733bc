use super::{BridgeAdapter, ProviderCredentials, QuoteContext};
use crate::config::Config;
use crate::types::{AdapterError, AdapterResult, BridgeRequest, Provider, Quote};
use crate::utils;
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider as RpcProvider};
use ethers::types::U256;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Gas spent on the origin chain by a warp route transfer
const ORIGIN_GAS_UNITS: u64 = 300_000;

const ESTIMATED_DURATION_SECS: u64 = 300;

/// Hyperlane warp routes.
///
/// Warp routes move the token 1:1, so the quote is the origin gas cost alone,
/// read from the source chain's current gas price.
pub struct HyperlaneAdapter {
    routes: Vec<(String, String)>,
    eth_price_usd: Decimal,
    timeout: Duration,
}

impl HyperlaneAdapter {
    pub fn new(routes: Vec<(String, String)>, eth_price_usd: Decimal, timeout_secs: u64) -> Self {
        Self {
            routes,
            eth_price_usd,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.hyperlane_routes.clone(),
            config.eth_price_usd,
            config.http_timeout_secs,
        )
    }

    /// USD cost of the origin transaction at `gas_price` wei
    fn gas_fee_usd(&self, gas_price: U256) -> AdapterResult<Decimal> {
        let wei = gas_price
            .checked_mul(U256::from(ORIGIN_GAS_UNITS))
            .ok_or_else(|| AdapterError::Rpc(format!("gas price out of range: {}", gas_price)))?;
        let eth = utils::to_decimal(wei, 18)
            .ok_or_else(|| AdapterError::Rpc(format!("gas price out of range: {}", gas_price)))?;
        Ok((eth * self.eth_price_usd).round_dp(4))
    }

    async fn origin_gas_price(&self, rpc_url: &str) -> AdapterResult<U256> {
        let rpc = RpcProvider::<Http>::try_from(rpc_url)
            .map_err(|e| AdapterError::Rpc(format!("invalid rpc url {}: {}", rpc_url, e)))?;

        tokio::time::timeout(self.timeout, rpc.get_gas_price())
            .await
            .map_err(|_| AdapterError::Rpc(format!("gas price request to {} timed out", rpc_url)))?
            .map_err(|e| AdapterError::Rpc(e.to_string()))
    }

    fn to_quote(&self, ctx: &QuoteContext, gas_price: U256) -> AdapterResult<Quote> {
        let gas_fee = self.gas_fee_usd(gas_price)?;
        let raw = json!({
            "originGasUnits": ORIGIN_GAS_UNITS.to_string(),
            "originGasPrice": gas_price.to_string(),
            "route": ctx.request.route_label(),
        });

        Ok(ctx.normalize(
            Provider::Hyperlane,
            ctx.from_amount,
            ESTIMATED_DURATION_SECS,
            gas_fee,
            None,
            raw,
        ))
    }
}

#[async_trait]
impl BridgeAdapter for HyperlaneAdapter {
    fn provider(&self) -> Provider {
        Provider::Hyperlane
    }

    fn supports_route(&self, request: &BridgeRequest) -> bool {
        self.routes
            .iter()
            .any(|(from, to)| *from == request.from_chain && *to == request.to_chain)
    }

    async fn fetch_quote(
        &self,
        ctx: &QuoteContext,
        _credentials: &ProviderCredentials,
    ) -> AdapterResult<Quote> {
        let rpc_url = ctx.from_rpc_url.as_deref().ok_or_else(|| {
            AdapterError::Rpc(format!("no rpc url configured for {}", ctx.request.from_chain))
        })?;
        debug!("Hyperlane gas price for {} via {}", ctx.request.route_label(), rpc_url);

        let gas_price = self.origin_gas_price(rpc_url).await?;
        self.to_quote(ctx, gas_price)
    }
}
