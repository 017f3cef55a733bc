use super::{
    http_client, parse_amount_field, read_json, total_cost_usd, BridgeAdapter,
    ProviderCredentials, QuoteContext, UsdCost,
};
use crate::config::Config;
use crate::types::{AdapterError, AdapterResult, Provider, Quote};
use async_trait::async_trait;
use ethers::types::U256;
use serde::Deserialize;
use tracing::debug;

/// Stargate reports no duration on some routes
const DEFAULT_DURATION_SECS: u64 = 120;

/// Minimum accepted output, in percent of the input
const MIN_OUTPUT_PERCENT: u64 = 95;

/// Stargate, `GET /quotes`
pub struct StargateAdapter {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct StargateQuotesResponse {
    #[serde(default)]
    quotes: Vec<StargateQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StargateQuote {
    dst_amount: String,
    #[serde(default)]
    duration: Option<StargateDuration>,
    #[serde(default)]
    fees: Vec<UsdCost>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StargateDuration {
    #[serde(default)]
    estimated: Option<f64>,
}

impl StargateAdapter {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> AdapterResult<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> AdapterResult<Self> {
        Self::new(&config.stargate_api_url, config.http_timeout_secs)
    }

    fn min_output(amount: U256) -> U256 {
        amount * U256::from(MIN_OUTPUT_PERCENT) / U256::from(100u64)
    }

    fn to_quote(
        ctx: &QuoteContext,
        response: StargateQuotesResponse,
        raw: serde_json::Value,
    ) -> AdapterResult<Quote> {
        let quote = response
            .quotes
            .into_iter()
            .next()
            .ok_or(AdapterError::NoRoutes)?;

        if let Some(error) = quote.error.filter(|e| !e.is_null()) {
            return Err(AdapterError::InvalidResponse(format!(
                "quote carries an error: {}",
                error
            )));
        }

        let dest_amount = parse_amount_field("quotes[0].dstAmount", &quote.dst_amount)?;
        let duration = super::duration_secs(
            quote.duration.and_then(|d| d.estimated),
            DEFAULT_DURATION_SECS,
        );

        Ok(ctx.normalize(
            Provider::Stargate,
            dest_amount,
            duration,
            total_cost_usd(&quote.fees),
            None,
            raw,
        ))
    }
}

#[async_trait]
impl BridgeAdapter for StargateAdapter {
    fn provider(&self) -> Provider {
        Provider::Stargate
    }

    async fn fetch_quote(
        &self,
        ctx: &QuoteContext,
        _credentials: &ProviderCredentials,
    ) -> AdapterResult<Quote> {
        let request = &ctx.request;
        let url = format!("{}/quotes", self.endpoint);
        debug!("Stargate quotes for {}: {}", request.route_label(), url);

        let user = format!("{:?}", request.user_address);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("srcToken", format!("{:?}", request.token_address)),
                ("dstToken", format!("{:?}", ctx.to_token)),
                ("srcAddress", user.clone()),
                ("dstAddress", user),
                ("srcChainKey", request.from_chain.clone()),
                ("dstChainKey", request.to_chain.clone()),
                ("srcAmount", ctx.from_amount.to_string()),
                ("dstAmountMin", Self::min_output(ctx.from_amount).to_string()),
            ])
            .send()
            .await?;

        let (quotes, raw) = read_json::<StargateQuotesResponse>(response).await?;
        Self::to_quote(ctx, quotes, raw)
    }
}
