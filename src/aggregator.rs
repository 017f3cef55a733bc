// Fail-isolated fan-out over the configured adapters.
//
// Every adapter runs in its own task. Whatever happens inside one task (an
// error, a malformed response, a panic) ends up as a failed `QuoteOutcome`
// in that adapter's slot and never disturbs the others.

use crate::adapters::{BridgeAdapter, ProviderCredentials, QuoteContext};
use crate::config::Config;
use crate::registry::ChainRegistry;
use crate::types::{AdapterError, BridgeRequest, Provider, QuoteOutcome};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

pub struct QuoteAggregator {
    adapters: Vec<Arc<dyn BridgeAdapter>>,
    credentials: Arc<ProviderCredentials>,
    registry: Arc<ChainRegistry>,
    eth_price_usd: Decimal,
    retain_raw: bool,
}

impl QuoteAggregator {
    pub fn new(
        adapters: Vec<Arc<dyn BridgeAdapter>>,
        credentials: ProviderCredentials,
        registry: Arc<ChainRegistry>,
        eth_price_usd: Decimal,
        retain_raw: bool,
    ) -> Self {
        Self {
            adapters,
            credentials: Arc::new(credentials),
            registry,
            eth_price_usd,
            retain_raw,
        }
    }

    pub fn from_config(
        config: &Config,
        registry: Arc<ChainRegistry>,
        adapters: Vec<Arc<dyn BridgeAdapter>>,
    ) -> Self {
        Self::new(
            adapters,
            ProviderCredentials::from(config),
            registry,
            config.eth_price_usd,
            config.retain_raw_quotes,
        )
    }

    /// Providers in outcome order
    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.iter().map(|a| a.provider()).collect()
    }

    /// Query every adapter concurrently.
    ///
    /// Returns one outcome per configured adapter, in configured order,
    /// regardless of completion order or individual failures.
    pub async fn aggregate(&self, request: &BridgeRequest) -> Vec<QuoteOutcome> {
        info!(
            "Aggregating {} {} {} across {} providers",
            request.amount,
            request.token,
            request.route_label(),
            self.adapters.len()
        );

        let ctx = match self.context(request) {
            Ok(ctx) => ctx,
            Err(reason) => {
                warn!("Cannot quote {}: {}", request.route_label(), reason);
                return self
                    .adapters
                    .iter()
                    .map(|a| QuoteOutcome::failed(a.provider(), reason.clone()))
                    .collect();
            }
        };

        let tasks: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| {
                tokio::spawn(run_adapter(
                    Arc::clone(adapter),
                    Arc::clone(&ctx),
                    Arc::clone(&self.credentials),
                ))
            })
            .collect();

        let outcomes: Vec<QuoteOutcome> = join_all(tasks)
            .await
            .into_iter()
            .zip(&self.adapters)
            .map(|(joined, adapter)| settle(adapter.provider(), joined))
            .collect();

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        info!(
            "{} of {} providers returned a quote for {}",
            succeeded,
            outcomes.len(),
            request.route_label()
        );

        outcomes
    }

    /// Query a single provider with the same isolation as [`aggregate`].
    /// `None` when the provider is not configured.
    ///
    /// [`aggregate`]: QuoteAggregator::aggregate
    pub async fn aggregate_provider(
        &self,
        request: &BridgeRequest,
        provider: Provider,
    ) -> Option<QuoteOutcome> {
        let adapter = self.adapters.iter().find(|a| a.provider() == provider)?;

        let ctx = match self.context(request) {
            Ok(ctx) => ctx,
            Err(reason) => return Some(QuoteOutcome::failed(provider, reason)),
        };

        let joined = tokio::spawn(run_adapter(
            Arc::clone(adapter),
            ctx,
            Arc::clone(&self.credentials),
        ))
        .await;

        Some(settle(provider, joined))
    }

    fn context(&self, request: &BridgeRequest) -> Result<Arc<QuoteContext>, String> {
        QuoteContext::new(request, &self.registry, self.eth_price_usd, self.retain_raw)
            .map(Arc::new)
            .map_err(|e| e.to_string())
    }
}

async fn run_adapter(
    adapter: Arc<dyn BridgeAdapter>,
    ctx: Arc<QuoteContext>,
    credentials: Arc<ProviderCredentials>,
) -> QuoteOutcome {
    let provider = adapter.provider();

    if !adapter.supports_route(&ctx.request) {
        let error = AdapterError::RouteUnsupported {
            from: ctx.request.from_chain.clone(),
            to: ctx.request.to_chain.clone(),
        };
        debug!("{}: {}", provider, error);
        return QuoteOutcome::failed(provider, error.to_string());
    }

    debug!("Requesting {} quote", provider);
    match adapter.fetch_quote(&ctx, &credentials).await {
        Ok(mut quote) => {
            quote.provider = provider;
            debug!(
                "{} quoted {} (gas ${}, {}s)",
                provider, quote.dest_amount_formatted, quote.gas_fee_usd, quote.duration_seconds
            );
            QuoteOutcome::succeeded(quote)
        }
        Err(e) => {
            warn!("{} quote failed: {}", provider, e);
            QuoteOutcome::failed(provider, e.to_string())
        }
    }
}

fn settle(provider: Provider, joined: Result<QuoteOutcome, JoinError>) -> QuoteOutcome {
    joined.unwrap_or_else(|e| {
        warn!("{} adapter task failed: {}", provider, e);
        QuoteOutcome::failed(provider, format!("adapter task failed: {}", e))
    })
}
