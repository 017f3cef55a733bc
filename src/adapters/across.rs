use super::{
    http_client, parse_amount_field, read_json, BridgeAdapter, ProviderCredentials, QuoteContext,
};
use crate::config::Config;
use crate::types::{AdapterError, AdapterResult, Provider, Quote};
use crate::utils;
use async_trait::async_trait;
use ethers::types::U256;
use serde::Deserialize;
use tracing::debug;

/// Across protocol, `GET /suggested-fees`
pub struct AcrossAdapter {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestedFees {
    #[serde(default)]
    output_amount: Option<String>,
    total_relay_fee: FeeComponent,
    #[serde(default)]
    relayer_gas_fee: Option<FeeComponent>,
    #[serde(default)]
    estimated_fill_time_sec: Option<f64>,
    #[serde(default)]
    is_amount_too_low: bool,
    #[serde(default)]
    limits: Option<DepositLimits>,
}

#[derive(Debug, Deserialize)]
struct FeeComponent {
    total: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositLimits {
    #[serde(default)]
    min_deposit: Option<String>,
}

impl AcrossAdapter {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> AdapterResult<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> AdapterResult<Self> {
        Self::new(&config.across_api_url, config.http_timeout_secs)
    }

    fn to_quote(
        ctx: &QuoteContext,
        fees: SuggestedFees,
        raw: serde_json::Value,
    ) -> AdapterResult<Quote> {
        if fees.is_amount_too_low {
            let minimum = fees
                .limits
                .and_then(|l| l.min_deposit)
                .and_then(|m| utils::parse_units(&m))
                .map(|m| utils::format_token_amount(m, ctx.decimals))
                .unwrap_or_else(|| "unknown".to_string());
            return Err(AdapterError::AmountTooLow {
                amount: ctx.request.amount.clone(),
                minimum,
            });
        }

        let relay_fee = parse_amount_field("totalRelayFee.total", &fees.total_relay_fee.total)?;
        let dest_amount = match fees.output_amount.as_deref() {
            Some(output) => parse_amount_field("outputAmount", output)?,
            None => ctx.from_amount.checked_sub(relay_fee).ok_or_else(|| {
                AdapterError::InvalidResponse("relay fee exceeds the input amount".to_string())
            })?,
        };

        let gas_units = match &fees.relayer_gas_fee {
            Some(gas) => parse_amount_field("relayerGasFee.total", &gas.total)?,
            None => U256::zero(),
        };
        let to_usd = |units: U256| {
            ctx.token_units_to_usd(units).ok_or_else(|| {
                AdapterError::InvalidResponse(format!("no USD price for {}", ctx.request.token))
            })
        };

        Ok(ctx.normalize(
            Provider::Across,
            dest_amount,
            super::duration_secs(fees.estimated_fill_time_sec, 0),
            to_usd(gas_units)?,
            Some(to_usd(relay_fee)?),
            raw,
        ))
    }
}

#[async_trait]
impl BridgeAdapter for AcrossAdapter {
    fn provider(&self) -> Provider {
        Provider::Across
    }

    async fn fetch_quote(
        &self,
        ctx: &QuoteContext,
        _credentials: &ProviderCredentials,
    ) -> AdapterResult<Quote> {
        let request = &ctx.request;
        let url = format!("{}/suggested-fees", self.endpoint);
        debug!("Across suggested fees for {}: {}", request.route_label(), url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("inputToken", format!("{:?}", request.token_address)),
                ("outputToken", format!("{:?}", ctx.to_token)),
                ("originChainId", request.from_chain_id.to_string()),
                ("destinationChainId", request.to_chain_id.to_string()),
                ("amount", ctx.from_amount.to_string()),
            ])
            .send()
            .await?;

        let (fees, raw) = read_json::<SuggestedFees>(response).await?;
        Self::to_quote(ctx, fees, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn decode(raw: serde_json::Value) -> AdapterResult<Quote> {
        let fees: SuggestedFees = serde_json::from_value(raw.clone()).unwrap();
        AcrossAdapter::to_quote(&context(), fees, raw)
    }

    #[test]
    fn test_output_amount_and_fees_in_usd() {
        let quote = decode(json!({
            "outputAmount": "9995000",
            "totalRelayFee": {"pct": "500000000000000", "total": "5000"},
            "relayerGasFee": {"pct": "200000000000000", "total": "2000"},
            "estimatedFillTimeSec": 4,
            "isAmountTooLow": false
        }))
        .unwrap();

        assert_eq!(quote.dest_amount, U256::from(9_995_000u64));
        assert_eq!(quote.gas_fee_usd, Decimal::new(2, 3));
        assert_eq!(quote.total_fees_usd, Some(Decimal::new(5, 3)));
        assert_eq!(quote.duration_seconds, 4);
    }

    #[test]
    fn test_output_derived_from_relay_fee() {
        let quote = decode(json!({
            "totalRelayFee": {"total": "6000"},
            "estimatedFillTimeSec": 10
        }))
        .unwrap();
        assert_eq!(quote.dest_amount, U256::from(9_994_000u64));
        assert_eq!(quote.gas_fee_usd, Decimal::ZERO);
    }

    #[test]
    fn test_unpriced_token_fails() {
        let mut ctx = context();
        ctx.token_usd_price = None;
        let raw = json!({
            "outputAmount": "9995000",
            "totalRelayFee": {"total": "5000"},
            "relayerGasFee": {"total": "2000"}
        });
        let fees: SuggestedFees = serde_json::from_value(raw.clone()).unwrap();

        match AcrossAdapter::to_quote(&ctx, fees, raw) {
            Err(AdapterError::InvalidResponse(message)) => {
                assert_eq!(message, "no USD price for usdc");
            }
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_amount_too_low() {
        let result = decode(json!({
            "totalRelayFee": {"total": "0"},
            "isAmountTooLow": true,
            "limits": {"minDeposit": "25000000"}
        }));

        match result {
            Err(AdapterError::AmountTooLow { amount, minimum }) => {
                assert_eq!(amount, "10");
                assert_eq!(minimum, "25");
            }
            other => panic!("expected AmountTooLow, got {:?}", other),
        }
    }
}
