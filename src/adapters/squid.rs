use super::{
    first_cost_usd, http_client, parse_amount_field, read_json, total_cost_usd, BridgeAdapter,
    ProviderCredentials, QuoteContext, UsdCost,
};
use crate::config::Config;
use crate::types::{AdapterResult, Provider, Quote};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Squid router, `POST /route`
pub struct SquidAdapter {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SquidRouteResponse {
    route: SquidRoute,
}

#[derive(Debug, Deserialize)]
struct SquidRoute {
    estimate: SquidEstimate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SquidEstimate {
    to_amount: String,
    #[serde(default)]
    estimated_route_duration: Option<f64>,
    #[serde(default)]
    gas_costs: Vec<UsdCost>,
    #[serde(default)]
    fee_costs: Vec<UsdCost>,
}

impl SquidAdapter {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> AdapterResult<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> AdapterResult<Self> {
        Self::new(&config.squid_api_url, config.http_timeout_secs)
    }

    fn to_quote(
        ctx: &QuoteContext,
        response: SquidRouteResponse,
        raw: serde_json::Value,
    ) -> AdapterResult<Quote> {
        let estimate = response.route.estimate;
        let dest_amount = parse_amount_field("route.estimate.toAmount", &estimate.to_amount)?;
        let gas_fee = first_cost_usd(&estimate.gas_costs);
        let fee_costs = total_cost_usd(&estimate.fee_costs);

        Ok(ctx.normalize(
            Provider::Squid,
            dest_amount,
            super::duration_secs(estimate.estimated_route_duration, 0),
            gas_fee,
            Some(gas_fee + fee_costs),
            raw,
        ))
    }
}

#[async_trait]
impl BridgeAdapter for SquidAdapter {
    fn provider(&self) -> Provider {
        Provider::Squid
    }

    async fn fetch_quote(
        &self,
        ctx: &QuoteContext,
        credentials: &ProviderCredentials,
    ) -> AdapterResult<Quote> {
        let request = &ctx.request;
        let url = format!("{}/route", self.endpoint);
        debug!("Squid route for {}: {}", request.route_label(), url);

        let body = json!({
            "fromAddress": format!("{:?}", request.user_address),
            "fromChain": request.from_chain_id.to_string(),
            "fromToken": format!("{:?}", request.token_address),
            "fromAmount": ctx.from_amount.to_string(),
            "toChain": request.to_chain_id.to_string(),
            "toToken": format!("{:?}", ctx.to_token),
            "toAddress": format!("{:?}", request.user_address),
        });

        let response = self
            .client
            .post(&url)
            .header("x-integrator-id", &credentials.squid_integrator_id)
            .json(&body)
            .send()
            .await?;

        let (route, raw) = read_json::<SquidRouteResponse>(response).await?;
        Self::to_quote(ctx, route, raw)
    }
}
