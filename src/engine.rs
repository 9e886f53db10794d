//! FocusEngine: base ranking followed by the optional advisory pass

use crate::advisor::RankingAdvisor;
use crate::config::RankingConfig;
use crate::error::RankResult;
use crate::ranking::{RankOutcome, RankingEngine};
use crate::reranker::{LlmReranker, RerankContext};
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// One ranking request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankRequest {
    pub tasks: Vec<Task>,
    /// Mode name, `"auto"`, or `None` for the configured default
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub weights: Option<WeightConfig>,
    /// Set to false to skip the advisory pass even when it is enabled
    #[serde(default)]
    pub advisory: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankStats {
    pub tasks_received: usize,
    pub tasks_scored: usize,
    pub path: FilterPath,
    pub advisory_calls: usize,
    pub sources: SourceSummary,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankResponse {
    pub mode: String,
    pub results: Vec<RankedResult>,
    pub stats: RankStats,
}

/// Main focus engine (thread-safe via Arc)
pub struct FocusEngine {
    ranking: RankingEngine,
    reranker: LlmReranker,
}

pub type SharedFocusEngine = Arc<FocusEngine>;

impl FocusEngine {
    pub fn new(config: RankingConfig, advisor: Option<Arc<dyn RankingAdvisor>>) -> SharedFocusEngine {
        let reranker = LlmReranker::new(advisor, config.reranking(), config.pricing.clone());
        let ranking = RankingEngine::new(Arc::new(config));
        Arc::new(Self::from_parts(ranking, reranker))
    }

    /// Assemble from pre-built stages, e.g. a ranking engine with a custom pre-filter
    pub fn from_parts(ranking: RankingEngine, reranker: LlmReranker) -> Self {
        Self { ranking, reranker }
    }

    pub fn config(&self) -> &RankingConfig {
        self.ranking.config()
    }

    pub fn advisory_enabled(&self) -> bool {
        self.reranker.settings().enabled
    }

    /// Base ranking only
    pub fn rank(
        &self,
        tasks: &[Task],
        mode: Option<&str>,
        limit: usize,
        weights: Option<&WeightConfig>,
    ) -> RankOutcome {
        self.ranking.rank(tasks, mode, limit, weights)
    }

    pub async fn rank_with_advisory(&self, req: RankRequest) -> RankResult<RankResponse> {
        self.rank_with_advisory_at(req, Utc::now()).await
    }

    pub async fn rank_with_advisory_at(&self, req: RankRequest, now: DateTime<Utc>) -> RankResult<RankResponse> {
        let start = Instant::now();
        let limit = req.limit.unwrap_or(self.config().default_limit);
        let advisory = req.advisory.unwrap_or(true) && self.advisory_enabled();

        info!(
            "Ranking request: {} tasks, mode={:?}, limit={}, advisory={}",
            req.tasks.len(),
            req.mode,
            limit,
            advisory
        );

        // Widen the base pool so reranking can promote from below the cut
        let base_limit = if advisory && limit > 0 {
            limit.saturating_mul(2).max(self.reranker.settings().candidate_limit)
        } else {
            limit
        };

        let base = self.ranking.rank_at(
            &req.tasks,
            req.mode.as_deref(),
            base_limit,
            req.weights.as_ref(),
            now,
        );

        let (results, sources, advisory_calls) = if advisory {
            let tasks_by_id: HashMap<String, Task> = base
                .results
                .iter()
                .filter_map(|r| req.tasks.iter().find(|t| t.id == r.task_id))
                .map(|t| (t.id.clone(), t.clone()))
                .collect();

            let ctx = RerankContext {
                mode: &base.mode,
                user_profile: &self.config().user_profile,
                limit,
                now,
            };
            let outcome = self.reranker.rerank(base.results, &tasks_by_id, &ctx).await?;
            (outcome.results, outcome.summary, outcome.advisory_calls)
        } else {
            let summary = SourceSummary::tally(&base.results);
            (base.results, summary, 0)
        };

        let stats = RankStats {
            tasks_received: req.tasks.len(),
            tasks_scored: base.scored,
            path: base.path,
            advisory_calls,
            sources,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Ranking complete: {} results in '{}' mode ({} base, {} reranked, {} enhanced, {} fallback, ${:.4} spent)",
            results.len(),
            base.mode,
            stats.sources.base,
            stats.sources.gpt_reranked,
            stats.sources.gpt_enhanced,
            stats.sources.fallback,
            stats.sources.spent_usd
        );

        Ok(RankResponse {
            mode: base.mode,
            results,
            stats,
        })
    }
}
