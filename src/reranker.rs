//! Cost-bounded, confidence-filtered advisory reranking of top candidates.
//!
//! Candidates are sent to the advisor one at a time in rank order so every
//! affordability check sees the spend of all earlier calls. A failure on one
//! candidate never aborts the batch unless `fallback_on_error` is off.

use crate::advisor::RankingAdvisor;
use crate::config::{GptRerankingConfig, PriceTable};
use crate::cost::CostTracker;
use crate::error::{RankError, RankResult};
use crate::parsing::ParserChain;
use crate::prompts::{build_request, prompt_template, render_prompt};
use crate::ranking::{preview, sort_by_score};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-run inputs besides the base ranking
#[derive(Debug, Clone)]
pub struct RerankContext<'a> {
    pub mode: &'a str,
    pub user_profile: &'a str,
    pub limit: usize,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RerankOutcome {
    pub results: Vec<RankedResult>,
    pub summary: SourceSummary,
    pub advisory_calls: usize,
}

pub struct LlmReranker {
    advisor: Option<Arc<dyn RankingAdvisor>>,
    parsers: ParserChain,
    settings: GptRerankingConfig,
    pricing: PriceTable,
}

impl LlmReranker {
    pub fn new(
        advisor: Option<Arc<dyn RankingAdvisor>>,
        settings: GptRerankingConfig,
        pricing: PriceTable,
    ) -> Self {
        Self {
            advisor,
            parsers: ParserChain::default(),
            settings,
            pricing,
        }
    }

    pub fn with_parsers(mut self, parsers: ParserChain) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn settings(&self) -> &GptRerankingConfig {
        &self.settings
    }

    /// The advisor to use this run, or why there is none
    fn active_advisor(&self) -> Result<&Arc<dyn RankingAdvisor>, &'static str> {
        if !self.settings.enabled {
            return Err("advisory reranking is disabled in configuration");
        }
        if self.settings.candidate_limit == 0 {
            return Err("candidate limit is 0");
        }
        match &self.advisor {
            Some(advisor) if advisor.is_available() => Ok(advisor),
            Some(advisor) => {
                warn!("Advisor '{}' is unavailable", advisor.name());
                Err("advisor unavailable")
            }
            None => Err("no advisor configured"),
        }
    }

    pub async fn rerank(
        &self,
        mut base_results: Vec<RankedResult>,
        tasks_by_id: &HashMap<String, Task>,
        ctx: &RerankContext<'_>,
    ) -> RankResult<RerankOutcome> {
        let advisor = match self.active_advisor() {
            Ok(advisor) => advisor,
            Err(reason) => {
                info!("Skipping advisory reranking: {}", reason);
                base_results.truncate(ctx.limit);
                let summary = SourceSummary::tally(&base_results);
                return Ok(RerankOutcome {
                    results: base_results,
                    summary,
                    advisory_calls: 0,
                });
            }
        };

        let split = self.settings.candidate_limit.min(base_results.len());
        let tail = base_results.split_off(split);
        let candidates = base_results;

        info!(
            "Advisory reranking {} candidates with '{}' (model {}, cost limit ${:.3}, mode {})",
            candidates.len(),
            advisor.name(),
            self.settings.model,
            self.settings.cost_limit_per_run_usd,
            ctx.mode
        );

        let mut tracker = CostTracker::new(
            self.settings.cost_limit_per_run_usd,
            self.pricing.clone(),
            self.settings.max_tokens,
        );
        let template = prompt_template();
        let timeout = Duration::try_from_secs_f64(self.settings.timeout).unwrap_or(DEFAULT_TIMEOUT);

        let mut processed = Vec::with_capacity(candidates.len() + tail.len());
        let mut cost_stopped = false;
        let mut advisory_calls = 0;

        for base in &candidates {
            if cost_stopped {
                processed.push(fallback(base, CandidateOutcome::CostSkipped, None, None, 0.0));
                continue;
            }

            let Some(task) = tasks_by_id.get(&base.task_id) else {
                self.recover(RankError::Data {
                    task_id: base.task_id.clone(),
                    reason: "not present in task list".to_string(),
                })?;
                processed.push(fallback(base, CandidateOutcome::MissingTask, None, None, 0.0));
                continue;
            };

            let estimate = tracker.estimate(task, &template, &self.settings.model);
            if !tracker.can_afford(estimate) {
                warn!(
                    "Cost limit reached at task {}: ${:.4} spent + ${:.4} estimated > ${:.3}",
                    task.id,
                    tracker.spent(),
                    estimate,
                    tracker.limit()
                );
                cost_stopped = true;
                processed.push(fallback(base, CandidateOutcome::CostSkipped, None, None, 0.0));
                continue;
            }

            let request = build_request(task, base, ctx.mode, ctx.user_profile, ctx.now.date_naive());
            let prompt = render_prompt(&request);
            advisory_calls += 1;

            let reply = match tokio::time::timeout(timeout, advisor.advise(&request, &prompt)).await {
                Err(_) => {
                    tracker.record(estimate);
                    self.recover(RankError::AdvisoryTimeout {
                        task_id: task.id.clone(),
                        timeout_secs: timeout.as_secs_f64(),
                    })?;
                    processed.push(fallback(base, CandidateOutcome::TimedOut, None, None, estimate));
                    continue;
                }
                Ok(Err(e)) => {
                    tracker.record(estimate);
                    let detail = format!("{:#}", e);
                    self.recover(RankError::AdvisoryTransport {
                        task_id: task.id.clone(),
                        reason: detail.clone(),
                    })?;
                    processed.push(fallback(
                        base,
                        CandidateOutcome::TransportError,
                        None,
                        Some(detail),
                        estimate,
                    ));
                    continue;
                }
                Ok(Ok(reply)) => reply,
            };

            let cost = reply.cost_usd.unwrap_or(estimate);
            tracker.record(cost);

            let verdict = match self.parsers.parse(&reply.text) {
                Ok(verdict) => verdict,
                Err(reason) => {
                    self.recover(RankError::AdvisoryParse {
                        task_id: task.id.clone(),
                        reason: reason.clone(),
                    })?;
                    processed.push(fallback(
                        base,
                        CandidateOutcome::ParseError,
                        Some(reply.model),
                        Some(reason),
                        cost,
                    ));
                    continue;
                }
            };

            let result = self.apply_verdict(base, verdict, reply.model, cost);
            info!(
                "Advisory for task {}: base {:.3} -> {:.3} ({}) | {}",
                task.id,
                base.score,
                result.score,
                result.source,
                preview(&task.content, 50)
            );
            processed.push(result);
        }

        let mut combined = processed;
        combined.extend(tail);
        sort_by_score(&mut combined);

        combined.truncate(ctx.limit);

        // Counts describe the returned results, same as the degraded path
        let mut summary = SourceSummary::tally(&combined);
        summary.spent_usd = tracker.spent();
        info!(
            "Advisory reranking done: {} base, {} reranked, {} enhanced, {} fallback ({} cost-skipped) in top {}, {} calls, ${:.4} spent",
            summary.base,
            summary.gpt_reranked,
            summary.gpt_enhanced,
            summary.fallback,
            summary.cost_skipped,
            combined.len(),
            advisory_calls,
            summary.spent_usd
        );

        Ok(RerankOutcome {
            results: combined,
            summary,
            advisory_calls,
        })
    }

    /// Confidence filter: a verdict at or above the threshold replaces the base score
    fn apply_verdict(&self, base: &RankedResult, verdict: LlmVerdict, model: String, cost: f64) -> RankedResult {
        let threshold = self.settings.confidence_threshold;

        if verdict.confidence < threshold {
            info!(
                "Low confidence for task {}: {:.2} < {:.2}, keeping base score",
                base.task_id, verdict.confidence, threshold
            );
            let note = AdvisoryNote {
                outcome: CandidateOutcome::LowConfidence,
                detail: Some(CandidateOutcome::LowConfidence.describe().to_string()),
                verdict: Some(verdict),
                model: Some(model),
                cost_usd: cost,
            };
            return base.with_advisory(base.score, base.explanation.clone(), RankingSource::Fallback, note);
        }

        let score = verdict.rerank_score.unwrap_or(base.score);
        let source = CandidateOutcome::Accepted.source(base.score, Some(&verdict));
        let explanation = verdict.explanation.clone();
        let note = AdvisoryNote {
            outcome: CandidateOutcome::Accepted,
            verdict: Some(verdict),
            detail: None,
            model: Some(model),
            cost_usd: cost,
        };
        base.with_advisory(score, explanation, source, note)
    }

    /// Absorb a per-candidate failure, or escalate it in strict mode
    fn recover(&self, err: RankError) -> RankResult<()> {
        if self.settings.fallback_on_error {
            warn!("{}; using base score", err);
            Ok(())
        } else {
            Err(err.into_strict())
        }
    }
}

fn fallback(
    base: &RankedResult,
    outcome: CandidateOutcome,
    model: Option<String>,
    detail: Option<String>,
    cost: f64,
) -> RankedResult {
    let note = AdvisoryNote {
        outcome,
        verdict: None,
        detail: Some(detail.unwrap_or_else(|| outcome.describe().to_string())),
        model,
        cost_usd: cost,
    };
    base.with_advisory(base.score, base.explanation.clone(), RankingSource::Fallback, note)
}
