// Display payloads and action tokens.
//
// An action token is the only state that survives between two interactions:
// the chat transport hands it back verbatim when a button is pressed, and the
// request is rebuilt from it and the registry alone.
//
// Wire format, colon delimited, at most `MAX_TOKEN_BYTES` bytes:
//
// x1:<provider>:<amount>:<token>:<from>:<to>    execute
// r1:<amount>:<token>:<from>:<to>               refresh

use crate::types::{BridgeRequest, Provider, QuoteOutcome, RankedResult, TokenError};
use serde::Serialize;
use std::fmt::Write;
use std::str::FromStr;
use tracing::warn;

/// Button payload ceiling of the chat transport
pub const MAX_TOKEN_BYTES: usize = 64;

const EXECUTE_TAG: &str = "x1";
const REFRESH_TAG: &str = "r1";
const DELIMITER: char = ':';

/// The user-facing parts of a request, as carried by an action token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParams {
    pub amount: String,
    pub token: String,
    pub from_chain: String,
    pub to_chain: String,
}

impl RouteParams {
    pub fn from_request(request: &BridgeRequest) -> Self {
        Self {
            amount: request.amount.clone(),
            token: request.token.clone(),
            from_chain: request.from_chain.clone(),
            to_chain: request.to_chain.clone(),
        }
    }
}

/// A follow-up action offered with a quote summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionToken {
    /// Proceed with one provider's quote
    Execute { provider: Provider, route: RouteParams },

    /// Re-run the whole quote cycle
    Refresh { route: RouteParams },
}

impl ActionToken {
    pub fn route(&self) -> &RouteParams {
        match self {
            ActionToken::Execute { route, .. } | ActionToken::Refresh { route } => route,
        }
    }

    pub fn encode(&self) -> Result<String, TokenError> {
        let route = self.route();
        let mut fields = match self {
            ActionToken::Execute { provider, .. } => vec![EXECUTE_TAG, provider.as_str()],
            ActionToken::Refresh { .. } => vec![REFRESH_TAG],
        };
        fields.extend([
            route.amount.as_str(),
            route.token.as_str(),
            route.from_chain.as_str(),
            route.to_chain.as_str(),
        ]);

        for (idx, field) in fields.iter().enumerate() {
            if field.is_empty() {
                return Err(TokenError::EmptyField(idx));
            }
            if field.contains(DELIMITER) {
                return Err(TokenError::Delimiter(field.to_string()));
            }
        }

        let encoded = fields.join(":");
        if encoded.len() > MAX_TOKEN_BYTES {
            return Err(TokenError::TooLong {
                len: encoded.len(),
                max: MAX_TOKEN_BYTES,
            });
        }
        Ok(encoded)
    }

    /// Decode a token received from the transport. Anything that is not
    /// exactly a known shape is rejected.
    pub fn decode(data: &str) -> Result<Self, TokenError> {
        if data.len() > MAX_TOKEN_BYTES {
            return Err(TokenError::TooLong {
                len: data.len(),
                max: MAX_TOKEN_BYTES,
            });
        }

        let fields: Vec<&str> = data.split(DELIMITER).collect();
        let tag = fields[0];
        let expected = match tag {
            EXECUTE_TAG => 6,
            REFRESH_TAG => 5,
            other => return Err(TokenError::UnknownTag(other.to_string())),
        };

        if fields.len() != expected {
            return Err(TokenError::Arity {
                tag: tag.to_string(),
                expected,
                actual: fields.len(),
            });
        }
        if let Some(idx) = fields.iter().position(|f| f.is_empty()) {
            return Err(TokenError::EmptyField(idx));
        }

        let route_fields = &fields[expected - 4..];
        let route = RouteParams {
            amount: route_fields[0].to_string(),
            token: route_fields[1].to_string(),
            from_chain: route_fields[2].to_string(),
            to_chain: route_fields[3].to_string(),
        };

        match tag {
            EXECUTE_TAG => {
                let provider = Provider::from_str(fields[1])
                    .map_err(|_| TokenError::UnknownProvider(fields[1].to_string()))?;
                Ok(ActionToken::Execute { provider, route })
            }
            _ => Ok(ActionToken::Refresh { route }),
        }
    }
}

/// One button of a display payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionButton {
    pub label: String,

    /// Encoded [`ActionToken`]
    pub data: String,
}

/// Text plus actions, handed to whatever renders the chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayPayload {
    pub text: String,
    pub actions: Vec<ActionButton>,
}

impl DisplayPayload {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    /// Decoded actions, in button order
    pub fn tokens(&self) -> Vec<ActionToken> {
        self.actions
            .iter()
            .filter_map(|a| ActionToken::decode(&a.data).ok())
            .collect()
    }
}

pub fn provider_emoji(provider: Provider) -> &'static str {
    match provider {
        Provider::Lifi => "🔗",
        Provider::Hyperlane => "🚀",
        Provider::Squid => "🦑",
        Provider::Stargate => "⭐",
        Provider::Across => "🌉",
    }
}

fn rank_marker(rank: usize) -> String {
    match rank {
        1 => "⭐".to_string(),
        2..=9 => format!("{}\u{FE0F}\u{20E3}", rank),
        _ => format!("#{}", rank),
    }
}

/// Renders quote summaries, confirmations and error texts
#[derive(Debug, Clone, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Ranked summary with one execute action per successful quote and a
    /// trailing refresh action
    pub fn render_quotes(&self, request: &BridgeRequest, result: &RankedResult) -> DisplayPayload {
        let route = RouteParams::from_request(request);
        let mut text = Self::header(request);
        let mut actions = Vec::new();

        if !result.has_quotes() {
            text.push_str("❌ No quotes available. Please try again later.\n\n");
            text.push_str("**Errors:**\n");
            for failure in result.failures() {
                let _ = writeln!(
                    text,
                    "• {}: {}",
                    failure.provider,
                    failure.error.as_deref().unwrap_or("unknown error")
                );
            }
        } else {
            let blocks: Vec<String> = result
                .ranked_outcomes()
                .filter_map(|(ranking, outcome)| {
                    outcome
                        .quote
                        .as_ref()
                        .map(|quote| (ranking.rank, outcome.provider, quote))
                })
                .map(|(rank, provider, quote)| {
                    let mut block = format!(
                        "{} {} **{}**\n",
                        rank_marker(rank),
                        provider_emoji(provider),
                        provider.as_str().to_uppercase()
                    );
                    let _ = writeln!(block, "💰 Output: {}", quote.dest_amount_formatted);
                    let _ = writeln!(block, "⏱️ Time: {}s", quote.duration_seconds);
                    let _ = writeln!(block, "💸 Gas: ${}", quote.gas_fee_usd.round_dp(4));
                    if let (Some(fees), Some(total)) = (quote.fee_costs_usd(), quote.total_fees_usd) {
                        let _ = writeln!(block, "💳 Fees: ${}", fees.round_dp(4));
                        let _ = writeln!(block, "💵 Total: ${}", total.round_dp(4));
                    }
                    let _ = writeln!(block, "📉 Loss: {}%", quote.bridge_loss_percentage);
                    block
                })
                .collect();
            text.push_str(&blocks.join("\n"));

            for (ranking, outcome) in result.ranked_outcomes() {
                let token = ActionToken::Execute {
                    provider: outcome.provider,
                    route: route.clone(),
                };
                let star = if ranking.rank == 1 { "⭐ " } else { "" };
                let label = format!(
                    "{}{} {}",
                    star,
                    provider_emoji(outcome.provider),
                    outcome.provider.as_str().to_uppercase()
                );
                if let Some(button) = Self::button(label, &token) {
                    actions.push(button);
                }
            }
        }

        if let Some(button) = Self::refresh_button(&route) {
            actions.push(button);
        }

        DisplayPayload { text, actions }
    }

    /// Confirmation for an execute action. No transaction is sent.
    pub fn render_confirmation(&self, request: &BridgeRequest, outcome: &QuoteOutcome) -> DisplayPayload {
        let provider = outcome.provider;
        let route = RouteParams::from_request(request);

        let quote = match (&outcome.quote, outcome.success) {
            (Some(quote), true) => quote,
            _ => {
                let text = format!(
                    "❌ {} could not quote {} {} from {} to {}: {}\n",
                    provider.as_str().to_uppercase(),
                    request.amount,
                    request.token.to_uppercase(),
                    request.from_chain.to_uppercase(),
                    request.to_chain.to_uppercase(),
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                return DisplayPayload {
                    text,
                    actions: Self::refresh_button(&route).into_iter().collect(),
                };
            }
        };

        let mut text = format!(
            "{} **{} Bridge Confirmation**\n\n",
            provider_emoji(provider),
            provider.as_str().to_uppercase()
        );
        let _ = writeln!(text, "📤 From: {}", request.from_chain.to_uppercase());
        let _ = writeln!(text, "📥 To: {}", request.to_chain.to_uppercase());
        let _ = writeln!(
            text,
            "💰 Amount: {} {}",
            request.amount,
            request.token.to_uppercase()
        );
        let _ = writeln!(text, "📈 You'll receive: {}", quote.dest_amount_formatted);
        let _ = writeln!(text, "💸 Gas cost: ${}", quote.gas_fee_usd.round_dp(4));
        if let (Some(fees), Some(total)) = (quote.fee_costs_usd(), quote.total_fees_usd) {
            let _ = writeln!(text, "💳 Fee costs: ${}", fees.round_dp(4));
            let _ = writeln!(text, "💵 Total fees: ${}", total.round_dp(4));
        }
        let _ = writeln!(text, "⏱️ Estimated time: {}s\n", quote.duration_seconds);
        text.push_str("🔗 Please complete the transaction in your wallet.\n");
        text.push_str("⚠️ Quotes only: no transaction is executed.");

        DisplayPayload {
            text,
            actions: Self::refresh_button(&route).into_iter().collect(),
        }
    }

    pub fn usage_hint(&self) -> DisplayPayload {
        DisplayPayload::text_only(
            "❓ I didn't understand that.\n\n\
             Usage: `bridge <amount> <token> from <chain> to <chain>`\n\
             Example: `bridge 10 usdc from base to mantle`",
        )
    }

    pub fn invalid_action(&self) -> DisplayPayload {
        DisplayPayload::text_only(
            "⚠️ This action is invalid or has expired. Please send your bridge request again.",
        )
    }

    pub fn provider_unavailable(&self, provider: Provider) -> DisplayPayload {
        DisplayPayload::text_only(format!(
            "⚠️ {} is not enabled. Please refresh the quotes.",
            provider.as_str().to_uppercase()
        ))
    }

    fn header(request: &BridgeRequest) -> String {
        format!(
            "🌉 **Bridge Quotes: {} {}**\n📤 From: {}\n📥 To: {}\n\n",
            request.amount,
            request.token.to_uppercase(),
            request.from_chain.to_uppercase(),
            request.to_chain.to_uppercase()
        )
    }

    fn refresh_button(route: &RouteParams) -> Option<ActionButton> {
        let token = ActionToken::Refresh {
            route: route.clone(),
        };
        Self::button("🔄 Refresh Quotes".to_string(), &token)
    }

    fn button(label: String, token: &ActionToken) -> Option<ActionButton> {
        match token.encode() {
            Ok(data) => Some(ActionButton { label, data }),
            Err(e) => {
                warn!("Omitting action `{}`: {}", label, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Quote, Ranking};
    use ethers::types::{Address, U256};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn route() -> RouteParams {
        RouteParams {
            amount: "10".to_string(),
            token: "usdc".to_string(),
            from_chain: "base".to_string(),
            to_chain: "mantle".to_string(),
        }
    }

    fn request(amount: &str) -> BridgeRequest {
        BridgeRequest {
            amount: amount.to_string(),
            token: "usdc".to_string(),
            from_chain: "base".to_string(),
            to_chain: "mantle".to_string(),
            from_chain_id: 8453,
            to_chain_id: 5000,
            token_address: Address::zero(),
            user_address: Address::zero(),
        }
    }

    fn quote(provider: Provider, units: u64, gas: Decimal, total: Option<Decimal>) -> Quote {
        Quote {
            provider,
            dest_amount: U256::from(units),
            dest_decimals: 6,
            dest_amount_formatted: format!("{}.{:06} USDC", units / 1_000_000, units % 1_000_000),
            duration_seconds: 60,
            gas_fee_usd: gas,
            total_fees_usd: total,
            bridge_loss_percentage: Decimal::new(6, 2),
            raw: None,
        }
    }

    fn ranked(entries: Vec<QuoteOutcome>, order: &[usize]) -> RankedResult {
        let rankings = order
            .iter()
            .enumerate()
            .map(|(idx, &position)| Ranking {
                provider: entries[position].provider,
                score: 10.0 - idx as f64,
                rank: idx + 1,
                position,
            })
            .collect::<Vec<_>>();
        RankedResult {
            best_quote: order.first().map(|&p| entries[p].clone()),
            all_quotes: entries,
            rankings,
        }
    }

    #[test]
    fn test_token_wire_format() {
        let execute = ActionToken::Execute {
            provider: Provider::Stargate,
            route: route(),
        };
        assert_eq!(execute.encode().unwrap(), "x1:stargate:10:usdc:base:mantle");

        let refresh = ActionToken::Refresh { route: route() };
        assert_eq!(refresh.encode().unwrap(), "r1:10:usdc:base:mantle");
    }

    #[test]
    fn test_decode_round_trip() {
        for provider in Provider::ALL {
            let token = ActionToken::Execute {
                provider,
                route: route(),
            };
            assert_eq!(ActionToken::decode(&token.encode().unwrap()).unwrap(), token);
        }
        let refresh = ActionToken::Refresh { route: route() };
        assert_eq!(ActionToken::decode(&refresh.encode().unwrap()).unwrap(), refresh);
    }

    #[test]
    fn test_decode_rejects_wrong_arity() {
        assert_eq!(
            ActionToken::decode("x1:lifi:10:usdc:base"),
            Err(TokenError::Arity {
                tag: "x1".to_string(),
                expected: 6,
                actual: 5
            })
        );
        assert_eq!(
            ActionToken::decode("r1:10:usdc:base:mantle:extra"),
            Err(TokenError::Arity {
                tag: "r1".to_string(),
                expected: 5,
                actual: 6
            })
        );
    }

    #[test]
    fn test_decode_rejects_legacy_and_unknown_tags() {
        assert!(matches!(
            ActionToken::decode("bridge:lifi:10:usdc:base:mantle"),
            Err(TokenError::UnknownTag(_))
        ));
        assert!(matches!(
            ActionToken::decode("refresh:10:usdc:base:mantle"),
            Err(TokenError::UnknownTag(_))
        ));
        assert!(matches!(ActionToken::decode(""), Err(TokenError::UnknownTag(_))));
    }

    #[test]
    fn test_decode_rejects_bad_fields() {
        assert_eq!(
            ActionToken::decode("x1:wormhole:10:usdc:base:mantle"),
            Err(TokenError::UnknownProvider("wormhole".to_string()))
        );
        assert_eq!(
            ActionToken::decode("r1:10::base:mantle"),
            Err(TokenError::EmptyField(2))
        );
        let oversized = format!("r1:{}:usdc:base:mantle", "9".repeat(80));
        assert!(matches!(
            ActionToken::decode(&oversized),
            Err(TokenError::TooLong { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_unsafe_fields() {
        let mut bad = route();
        bad.token = "us:dc".to_string();
        assert!(matches!(
            ActionToken::Refresh { route: bad }.encode(),
            Err(TokenError::Delimiter(_))
        ));

        let mut long = route();
        long.amount = "1".repeat(60);
        assert!(matches!(
            ActionToken::Refresh { route: long }.encode(),
            Err(TokenError::TooLong { .. })
        ));
    }

    #[test]
    fn test_render_quotes_marks_best_and_builds_actions() {
        let entries = vec![
            QuoteOutcome::succeeded(quote(Provider::Lifi, 9_980_000, Decimal::new(350, 2), None)),
            QuoteOutcome::succeeded(quote(
                Provider::Squid,
                9_950_000,
                Decimal::new(350, 2),
                Some(Decimal::new(500, 2)),
            )),
            QuoteOutcome::succeeded(quote(Provider::Stargate, 9_994_000, Decimal::new(106, 3), None)),
            QuoteOutcome::failed(Provider::Hyperlane, "Route not supported: base -> mantle"),
        ];
        let result = ranked(entries, &[2, 0, 1]);

        let payload = ResponseEncoder::new().render_quotes(&request("10"), &result);

        assert!(payload.text.starts_with("🌉 **Bridge Quotes: 10 USDC**"));
        assert!(payload.text.contains("⭐ ⭐ **STARGATE**"));
        assert!(payload.text.contains("💰 Output: 9.994000 USDC"));
        assert!(payload.text.contains("💳 Fees: $1.50"));
        assert!(payload.text.contains("💵 Total: $5.00"));
        assert!(!payload.text.contains("HYPERLANE"));
        let stargate_at = payload.text.find("STARGATE").unwrap();
        let lifi_at = payload.text.find("LIFI").unwrap();
        assert!(stargate_at < lifi_at);

        let data: Vec<&str> = payload.actions.iter().map(|a| a.data.as_str()).collect();
        assert_eq!(
            data,
            vec![
                "x1:stargate:10:usdc:base:mantle",
                "x1:lifi:10:usdc:base:mantle",
                "x1:squid:10:usdc:base:mantle",
                "r1:10:usdc:base:mantle",
            ]
        );
        assert!(payload.actions[0].label.starts_with("⭐ "));
        assert!(payload.actions.iter().all(|a| a.data.len() <= MAX_TOKEN_BYTES));
    }

    #[test]
    fn test_render_no_quotes_lists_errors() {
        let result = ranked(
            vec![
                QuoteOutcome::failed(Provider::Lifi, "timeout"),
                QuoteOutcome::failed(Provider::Squid, "API request failed with status 502: x"),
            ],
            &[],
        );
        let payload = ResponseEncoder::new().render_quotes(&request("10"), &result);

        assert!(payload.text.contains("No quotes available"));
        assert!(payload.text.contains("• lifi: timeout"));
        assert!(payload.text.contains("• squid: API request failed"));
        assert_eq!(payload.actions.len(), 1);
        assert_eq!(payload.actions[0].data, "r1:10:usdc:base:mantle");
    }

    #[test]
    fn test_oversized_tokens_are_omitted() {
        let amount = "1".repeat(50);
        let result = ranked(
            vec![QuoteOutcome::succeeded(quote(Provider::Lifi, 1, Decimal::ONE, None))],
            &[0],
        );
        let payload = ResponseEncoder::new().render_quotes(&request(&amount), &result);
        assert!(payload.actions.is_empty());
        assert!(payload.text.contains("LIFI"));
    }

    #[test]
    fn test_confirmation() {
        let outcome = QuoteOutcome::succeeded(quote(
            Provider::Squid,
            9_950_000,
            Decimal::new(350, 2),
            Some(Decimal::new(500, 2)),
        ));
        let payload = ResponseEncoder::new().render_confirmation(&request("10"), &outcome);

        assert!(payload.text.starts_with("🦑 **SQUID Bridge Confirmation**"));
        assert!(payload.text.contains("📈 You'll receive: 9.950000 USDC"));
        assert!(payload.text.contains("💳 Fee costs: $1.50"));
        assert!(payload.text.contains("no transaction is executed"));
        assert_eq!(payload.actions.len(), 1);

        let failed = QuoteOutcome::failed(Provider::Lifi, "timeout");
        let payload = ResponseEncoder::new().render_confirmation(&request("10"), &failed);
        assert!(payload.text.contains("LIFI could not quote"));
        assert!(payload.text.contains("timeout"));
    }

    #[test]
    fn test_static_texts() {
        let encoder = ResponseEncoder::new();
        assert!(encoder.usage_hint().text.contains("bridge <amount> <token>"));
        assert!(encoder.usage_hint().actions.is_empty());
        assert!(encoder.invalid_action().text.contains("invalid or has expired"));
    }
}
