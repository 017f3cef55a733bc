use super::{
    first_cost_usd, http_client, parse_amount_field, read_json, total_cost_usd, BridgeAdapter,
    ProviderCredentials, QuoteContext, UsdCost,
};
use crate::config::Config;
use crate::types::{AdapterResult, Provider, Quote};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// LI.FI aggregator, `GET /quote`
pub struct LifiAdapter {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct LifiQuoteResponse {
    estimate: LifiEstimate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiEstimate {
    to_amount: String,
    #[serde(default)]
    execution_duration: Option<f64>,
    #[serde(default)]
    gas_costs: Vec<UsdCost>,
    #[serde(default)]
    fee_costs: Vec<UsdCost>,
}

impl LifiAdapter {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> AdapterResult<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> AdapterResult<Self> {
        Self::new(&config.lifi_api_url, config.http_timeout_secs)
    }

    fn to_quote(
        ctx: &QuoteContext,
        response: LifiQuoteResponse,
        raw: serde_json::Value,
    ) -> AdapterResult<Quote> {
        let estimate = response.estimate;
        let dest_amount = parse_amount_field("estimate.toAmount", &estimate.to_amount)?;
        let gas_fee = first_cost_usd(&estimate.gas_costs);

        // Fee costs are only reported for routes that charge them
        let total_fees = (!estimate.fee_costs.is_empty())
            .then(|| gas_fee + total_cost_usd(&estimate.fee_costs));

        Ok(ctx.normalize(
            Provider::Lifi,
            dest_amount,
            super::duration_secs(estimate.execution_duration, 0),
            gas_fee,
            total_fees,
            raw,
        ))
    }
}

#[async_trait]
impl BridgeAdapter for LifiAdapter {
    fn provider(&self) -> Provider {
        Provider::Lifi
    }

    async fn fetch_quote(
        &self,
        ctx: &QuoteContext,
        credentials: &ProviderCredentials,
    ) -> AdapterResult<Quote> {
        let request = &ctx.request;
        let url = format!("{}/quote", self.endpoint);
        debug!("LiFi quote for {}: {}", request.route_label(), url);

        let mut call = self.client.get(&url).query(&[
            ("fromChain", request.from_chain_id.to_string()),
            ("toChain", request.to_chain_id.to_string()),
            ("fromToken", format!("{:?}", request.token_address)),
            ("toToken", format!("{:?}", ctx.to_token)),
            ("fromAmount", ctx.from_amount.to_string()),
            ("fromAddress", format!("{:?}", request.user_address)),
        ]);
        if let Some(key) = &credentials.lifi_api_key {
            call = call.header("x-lifi-api-key", key);
        }

        let (response, raw) = read_json::<LifiQuoteResponse>(call.send().await?).await?;
        Self::to_quote(ctx, response, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use ethers::types::U256;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn decode(raw: serde_json::Value) -> AdapterResult<Quote> {
        let response: LifiQuoteResponse = serde_json::from_value(raw.clone()).unwrap();
        LifiAdapter::to_quote(&context(), response, raw)
    }

    #[test]
    fn test_gas_only_quote() {
        let quote = decode(json!({
            "estimate": {
                "toAmount": "9980000",
                "executionDuration": 45,
                "gasCosts": [{"amountUSD": "3.50"}, {"amountUSD": "9.99"}]
            }
        }))
        .unwrap();

        assert_eq!(quote.dest_amount, U256::from(9_980_000u64));
        assert_eq!(quote.duration_seconds, 45);
        assert_eq!(quote.gas_fee_usd, Decimal::new(350, 2));
        assert_eq!(quote.total_fees_usd, None);
        assert_eq!(quote.bridge_loss_percentage, Decimal::new(20, 2));
    }

    #[test]
    fn test_fee_costs_add_to_gas() {
        let quote = decode(json!({
            "estimate": {
                "toAmount": "9980000",
                "executionDuration": 45.4,
                "gasCosts": [{"amountUSD": "0.20"}],
                "feeCosts": [{"amountUSD": "0.25"}, {"amountUSD": "0.05"}]
            }
        }))
        .unwrap();

        assert_eq!(quote.total_fees_usd, Some(Decimal::new(50, 2)));
        assert_eq!(quote.duration_seconds, 45);
    }

    #[test]
    fn test_non_numeric_amount_is_rejected() {
        assert!(decode(json!({"estimate": {"toAmount": "lots"}})).is_err());
    }
}
