use crate::types::{Quote, QuoteOutcome, RankedResult, Ranking};
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

/// Weights of the composite quote score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Per unit of destination amount, in human units
    pub amount: f64,

    /// Per USD of fee below `fee_ceiling_usd`
    pub fee: f64,

    /// Per percentage point of loss below `loss_ceiling_pct`
    pub loss: f64,

    pub fee_ceiling_usd: f64,

    pub loss_ceiling_pct: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            amount: 0.6,
            fee: 0.3,
            loss: 0.1,
            fee_ceiling_usd: 10.0,
            loss_ceiling_pct: 5.0,
        }
    }
}

/// Scores successful quotes and orders them best first
#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    weights: ScoreWeights,
}

impl RankingEngine {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// amount·w_a + max(0, fee_ceiling − fee)·w_f + max(0, loss_ceiling − loss)·w_l
    pub fn score(&self, quote: &Quote) -> f64 {
        let w = &self.weights;
        let amount = quote.dest_amount_human();
        let fee = quote.effective_fee_usd().to_f64().unwrap_or(0.0);
        let loss = quote.bridge_loss_percentage.to_f64().unwrap_or(0.0);

        w.amount * amount.max(0.0)
            + w.fee * (w.fee_ceiling_usd - fee).max(0.0)
            + w.loss * (w.loss_ceiling_pct - loss).max(0.0)
    }

    /// Rank the successful outcomes. Ties keep the order of `outcomes`.
    ///
    /// `all_quotes` keeps every outcome in input order; `rankings`
    /// point back into it by position.
    pub fn rank(&self, outcomes: Vec<QuoteOutcome>) -> RankedResult {
        let mut scored: Vec<(usize, &QuoteOutcome, f64)> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| o.success)
            .filter_map(|(i, o)| o.quote.as_ref().map(|q| (i, o, self.score(q))))
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.2.total_cmp(&a.2));

        let rankings: Vec<Ranking> = scored
            .iter()
            .enumerate()
            .map(|(idx, (position, outcome, score))| Ranking {
                provider: outcome.provider,
                score: *score,
                rank: idx + 1,
                position: *position,
            })
            .collect();

        for ranking in &rankings {
            debug!(
                "#{} {} score {:.4}",
                ranking.rank, ranking.provider, ranking.score
            );
        }

        let best_quote = rankings
            .first()
            .and_then(|r| outcomes.get(r.position))
            .cloned();

        RankedResult {
            best_quote,
            all_quotes: outcomes,
            rankings,
        }
    }
}
