use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Custom error types for the bridge quote aggregator
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Math overflow or underflow")]
    MathError,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for aggregator operations
pub type Result<T> = std::result::Result<T, AggregatorError>;

/// Reasons a chat command does not become a [`BridgeRequest`].
///
/// `Unrecognized` is the structural (parse) failure; every other variant is a
/// validation failure against the chain registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("command does not match `bridge <amount> <token> from <chain> to <chain>`")]
    Unrecognized,

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Source and destination chain are both {0}")]
    SameChain(String),

    #[error("Token {token} is not supported on {chain}")]
    UnsupportedToken { token: String, chain: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl RequestError {
    /// True when the text had the right shape but named something the registry rejects
    pub fn is_validation(&self) -> bool {
        !matches!(self, RequestError::Unrecognized)
    }
}

/// Failure of a single provider adapter
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Route not supported: {from} -> {to}")]
    RouteUnsupported { from: String, to: String },

    #[error("No routes available")]
    NoRoutes,

    #[error("Amount {amount} is below the provider minimum of {minimum}")]
    AmountTooLow { amount: String, minimum: String },

    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Result type alias for adapter calls
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Action token encode/decode failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Unknown action tag: {0}")]
    UnknownTag(String),

    #[error("Action `{tag}` expects {expected} fields, got {actual}")]
    Arity {
        tag: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Empty field at position {0}")]
    EmptyField(usize),

    #[error("Field contains the delimiter: {0}")]
    Delimiter(String),

    #[error("Action token is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Bridge providers known to the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Lifi,
    Squid,
    Stargate,
    Hyperlane,
    Across,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Lifi,
        Provider::Squid,
        Provider::Stargate,
        Provider::Hyperlane,
        Provider::Across,
    ];

    /// Lowercase wire name, as used in action tokens and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Lifi => "lifi",
            Provider::Squid => "squid",
            Provider::Stargate => "stargate",
            Provider::Hyperlane => "hyperlane",
            Provider::Across => "across",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AggregatorError::ParseError(format!("unknown provider: {}", s)))
    }
}

/// A validated bridge request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    /// Amount as typed by the user, in human units
    pub amount: String,

    /// Lowercase token symbol
    pub token: String,

    /// Lowercase source chain symbol
    pub from_chain: String,

    /// Lowercase destination chain symbol
    pub to_chain: String,

    pub from_chain_id: u64,

    pub to_chain_id: u64,

    /// Token contract on the source chain
    pub token_address: Address,

    /// Address quotes are requested for
    pub user_address: Address,
}

impl BridgeRequest {
    /// "base -> mantle"
    pub fn route_label(&self) -> String {
        format!("{} -> {}", self.from_chain, self.to_chain)
    }
}

/// Provider-specific response body, kept only for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPayload(pub serde_json::Value);

/// Normalized quote produced by a provider adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub provider: Provider,

    /// Destination amount in the token's smallest unit
    #[serde(with = "crate::utils::u256_dec")]
    pub dest_amount: U256,

    /// Decimals of the destination token
    pub dest_decimals: u8,

    /// Display string, e.g. "9.994000 USDC"
    pub dest_amount_formatted: String,

    pub duration_seconds: u64,

    pub gas_fee_usd: Decimal,

    /// Aggregate fee (gas plus protocol fees) when the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_fees_usd: Option<Decimal>,

    /// Percentage of the input lost in transit; negative means a gain
    pub bridge_loss_percentage: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawPayload>,
}

impl Quote {
    /// Destination amount in human units
    pub fn dest_amount_human(&self) -> f64 {
        crate::utils::to_f64(self.dest_amount, self.dest_decimals)
    }

    /// Fee used for ranking: the aggregate fee when reported, else gas alone
    pub fn effective_fee_usd(&self) -> Decimal {
        self.total_fees_usd.unwrap_or(self.gas_fee_usd)
    }

    /// Protocol fees on top of gas, when the provider reports an aggregate fee
    pub fn fee_costs_usd(&self) -> Option<Decimal> {
        self.total_fees_usd
            .map(|total| (total - self.gas_fee_usd).max(Decimal::ZERO))
    }
}

/// Result of one adapter invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteOutcome {
    pub provider: Provider,
    pub success: bool,
    pub quote: Option<Quote>,
    pub error: Option<String>,
}

impl QuoteOutcome {
    pub fn succeeded(quote: Quote) -> Self {
        Self {
            provider: quote.provider,
            success: true,
            quote: Some(quote),
            error: None,
        }
    }

    pub fn failed(provider: Provider, error: impl Into<String>) -> Self {
        Self {
            provider,
            success: false,
            quote: None,
            error: Some(error.into()),
        }
    }
}

/// Score and 1-based rank of one successful quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub provider: Provider,
    pub score: f64,
    pub rank: usize,

    /// Index of the ranked outcome in `RankedResult::all_quotes`
    pub position: usize,
}

/// Outcome of one aggregation cycle, ordered best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub best_quote: Option<QuoteOutcome>,
    pub all_quotes: Vec<QuoteOutcome>,
    pub rankings: Vec<Ranking>,
}

impl RankedResult {
    /// Successful outcomes paired with their ranking, best first
    pub fn ranked_outcomes(&self) -> impl Iterator<Item = (&Ranking, &QuoteOutcome)> {
        self.rankings
            .iter()
            .filter_map(|r| self.all_quotes.get(r.position).map(|o| (r, o)))
    }

    /// Outcomes that did not produce a quote, in provider order
    pub fn failures(&self) -> impl Iterator<Item = &QuoteOutcome> {
        self.all_quotes.iter().filter(|o| !o.success)
    }

    pub fn rank_of(&self, provider: Provider) -> Option<usize> {
        self.rankings
            .iter()
            .find(|r| r.provider == provider)
            .map(|r| r.rank)
    }

    pub fn has_quotes(&self) -> bool {
        self.best_quote.is_some()
    }
}
