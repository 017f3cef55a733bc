// Cross-chain bridge quote aggregator
//
// Parses chat-style bridge commands, queries several bridge providers
// concurrently, ranks their quotes and renders a summary with stateless
// follow-up actions.

pub mod adapters;
pub mod aggregator;
pub mod config;
pub mod encoder;
pub mod parser;
pub mod ranking;
pub mod registry;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use adapters::{build_adapters, BridgeAdapter, ProviderCredentials, QuoteContext};
pub use aggregator::QuoteAggregator;
pub use config::Config;
pub use encoder::{ActionButton, ActionToken, DisplayPayload, ResponseEncoder, RouteParams};
pub use parser::RequestParser;
pub use ranking::{RankingEngine, ScoreWeights};
pub use registry::{ChainConfig, ChainRegistry, TokenMeta};
pub use types::{
    AdapterError, AggregatorError, BridgeRequest, Provider, Quote, QuoteOutcome, RankedResult,
    Ranking, RequestError, Result, TokenError,
};

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Main entry point: one instance serves any number of independent interactions.
///
/// No state is kept between calls. A follow-up action is rebuilt from its
/// token and the registry alone.
pub struct BridgeQuoter {
    config: Config,
    registry: Arc<ChainRegistry>,
    parser: RequestParser,
    aggregator: QuoteAggregator,
    ranking: RankingEngine,
    encoder: ResponseEncoder,
}

impl BridgeQuoter {
    /// Create a quoter with the registry and adapters described by `config`
    pub fn new(config: Config) -> Result<Self> {
        let mut registry = match &config.registry_path {
            Some(path) if Path::new(path).exists() => ChainRegistry::import_from_file(path)?,
            Some(path) => {
                warn!("Registry file {} not found, using built-in chains", path);
                ChainRegistry::default()
            }
            None => ChainRegistry::default(),
        };
        registry.apply_rpc_overrides(&config.rpc_overrides);

        let adapters = build_adapters(&config)?;
        Ok(Self::with_parts(config, registry, adapters))
    }

    /// Create a quoter from explicit parts
    pub fn with_parts(
        config: Config,
        registry: ChainRegistry,
        adapters: Vec<Arc<dyn BridgeAdapter>>,
    ) -> Self {
        let registry = Arc::new(registry);
        let parser = RequestParser::new(Arc::clone(&registry), config.user_address);
        let aggregator = QuoteAggregator::from_config(&config, Arc::clone(&registry), adapters);

        Self {
            config,
            registry,
            parser,
            aggregator,
            ranking: RankingEngine::default(),
            encoder: ResponseEncoder::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// Enabled providers, in outcome order
    pub fn providers(&self) -> Vec<Provider> {
        self.aggregator.providers()
    }

    pub fn parse(&self, text: &str) -> Option<BridgeRequest> {
        self.parser.parse(text)
    }

    pub fn try_parse(&self, text: &str) -> std::result::Result<BridgeRequest, RequestError> {
        self.parser.try_parse(text)
    }

    /// Aggregate and rank quotes for a request
    pub async fn quote(&self, request: &BridgeRequest) -> RankedResult {
        let outcomes = self.aggregator.aggregate(request).await;
        self.ranking.rank(outcomes)
    }

    pub fn render(&self, request: &BridgeRequest, result: &RankedResult) -> DisplayPayload {
        self.encoder.render_quotes(request, result)
    }

    /// Answer a chat message: a quote summary, or the usage hint
    pub async fn handle_text(&self, text: &str) -> DisplayPayload {
        match self.parser.try_parse(text) {
            Ok(request) => {
                let result = self.quote(&request).await;
                self.render(&request, &result)
            }
            Err(e) => {
                debug!("Showing usage hint: {}", e);
                self.encoder.usage_hint()
            }
        }
    }

    /// Answer a button press carrying an action token
    pub async fn handle_action(&self, data: &str) -> DisplayPayload {
        let token = match ActionToken::decode(data) {
            Ok(token) => token,
            Err(e) => {
                warn!("Rejected action token {:?}: {}", data, e);
                return self.encoder.invalid_action();
            }
        };

        let route = token.route();
        let request = match self.parser.try_reconstruct(
            &route.amount,
            &route.token,
            &route.from_chain,
            &route.to_chain,
        ) {
            Ok(request) => request,
            Err(e) => {
                warn!("Action token {:?} no longer valid: {}", data, e);
                return self.encoder.invalid_action();
            }
        };

        match token {
            ActionToken::Refresh { .. } => {
                let result = self.quote(&request).await;
                self.render(&request, &result)
            }
            ActionToken::Execute { provider, .. } => {
                match self.aggregator.aggregate_provider(&request, provider).await {
                    Some(outcome) => self.encoder.render_confirmation(&request, &outcome),
                    None => self.encoder.provider_unavailable(provider),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_quoter() {
        let quoter = BridgeQuoter::new(Config::default()).unwrap();
        assert_eq!(quoter.providers(), Config::default().providers);
        assert_eq!(quoter.registry().len(), 5);
    }

    #[test]
    fn test_registry_file_and_rpc_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chains.json");
        ChainRegistry::default()
            .export_to_file(path.to_str().unwrap())
            .unwrap();

        let mut config = Config {
            registry_path: Some(path.to_str().unwrap().to_string()),
            ..Config::default()
        };
        config
            .rpc_overrides
            .insert("base".to_string(), "http://localhost:8545".to_string());

        let quoter = BridgeQuoter::new(config).unwrap();
        assert_eq!(
            quoter.registry().chain("base").unwrap().rpc_url.as_deref(),
            Some("http://localhost:8545")
        );
    }

    #[tokio::test]
    async fn test_unrecognized_text_gets_usage_hint() {
        let quoter = BridgeQuoter::with_parts(Config::default(), ChainRegistry::default(), Vec::new());
        let payload = quoter.handle_text("what's the weather").await;
        assert!(payload.text.contains("Usage"));
        assert!(payload.actions.is_empty());
    }

    #[tokio::test]
    async fn test_bad_action_tokens_fail_closed() {
        let quoter = BridgeQuoter::with_parts(Config::default(), ChainRegistry::default(), Vec::new());

        for data in [
            "x1:lifi:10:usdc:base",
            "bridge:lifi:10:usdc:base:mantle",
            "r1:10:usdc:base:solana",
        ] {
            let payload = quoter.handle_action(data).await;
            assert!(payload.text.contains("invalid or has expired"), "{}", data);
        }
    }

    #[tokio::test]
    async fn test_execute_for_disabled_provider() {
        let quoter = BridgeQuoter::with_parts(Config::default(), ChainRegistry::default(), Vec::new());
        let payload = quoter.handle_action("x1:squid:10:usdc:base:mantle").await;
        assert!(payload.text.contains("SQUID is not enabled"));
    }
}
