//! Weighted combination of criterion scores into one composite score

use crate::config::RankingConfig;
use crate::scoring::{self, LabelMatch};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Minimum normalized contribution for a criterion to be named in the explanation
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// At most this many reasons make it into an explanation
pub const MAX_REASONS: usize = 2;

pub struct CompositeScorer<'a> {
    config: &'a RankingConfig,
    now: DateTime<Utc>,
}

impl<'a> CompositeScorer<'a> {
    pub fn new(config: &'a RankingConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    /// Score one task. Missing task fields resolve through fallback values.
    pub fn score(&self, task: &Task, profile: &ModeProfile, weights: &WeightConfig) -> RankedResult {
        let today = self.now.date_naive();
        let fallback = &self.config.fallback_weights;

        let mut raw = BTreeMap::new();
        raw.insert(Criterion::Priority, scoring::priority_score(task, self.config));
        raw.insert(Criterion::DueDate, scoring::due_date_score(task, self.config, today));
        raw.insert(
            Criterion::Age,
            scoring::age_score(task, self.now, self.config.age_horizon_days),
        );
        raw.insert(
            Criterion::LabelPreference,
            scoring::label_affinity_score(task, profile, fallback),
        );

        let total_weight = weights.total();
        let components: BTreeMap<Criterion, f64> = raw
            .iter()
            .map(|(criterion, value)| {
                let contribution = if total_weight > 0.0 {
                    usable_weight(weights.get(*criterion)) * value.clamp(0.0, 1.0) / total_weight
                } else {
                    0.0
                };
                (*criterion, contribution)
            })
            .collect();

        let score = components.values().sum::<f64>().clamp(0.0, 1.0);
        let explanation = self.explain(task, profile, &raw, &components);

        if self.config.logging.verbose_scoring {
            debug!(
                "Scored task {}: {:.3} (priority {:.3}, due {:.3}, age {:.3}, labels {:.3}) - {}",
                task.id,
                score,
                components[&Criterion::Priority],
                components[&Criterion::DueDate],
                components[&Criterion::Age],
                components[&Criterion::LabelPreference],
                explanation
            );
        }

        RankedResult {
            task_id: task.id.clone(),
            score,
            explanation: explanation.clone(),
            components,
            raw_components: raw,
            source: RankingSource::Base,
            base_score: score,
            base_explanation: explanation,
            advisory: None,
        }
    }

    fn explain(
        &self,
        task: &Task,
        profile: &ModeProfile,
        raw: &BTreeMap<Criterion, f64>,
        components: &BTreeMap<Criterion, f64>,
    ) -> String {
        let mut significant: Vec<(Criterion, f64)> = components
            .iter()
            .filter(|(_, c)| **c >= SIGNIFICANCE_THRESHOLD)
            .map(|(k, v)| (*k, *v))
            .collect();
        significant.sort_by(|a, b| b.1.total_cmp(&a.1));

        let reasons: Vec<String> = significant
            .iter()
            .take(MAX_REASONS)
            .map(|(criterion, _)| self.reason(*criterion, task, profile, raw[criterion]))
            .collect();

        if reasons.is_empty() {
            "standard scoring".to_string()
        } else {
            reasons.join("; ")
        }
    }

    fn reason(&self, criterion: Criterion, task: &Task, profile: &ModeProfile, raw: f64) -> String {
        match criterion {
            Criterion::Priority => match task.priority {
                Some(p) if raw > 0.7 => format!("high priority (p{})", p),
                Some(p) => format!("priority p{}", p),
                None => "no priority set".to_string(),
            },
            Criterion::DueDate => match &task.due {
                Some(due) => scoring::due_bucket(due, self.now.date_naive()).label().to_string(),
                None => "no due date".to_string(),
            },
            Criterion::Age => match task.created_at {
                Some(created) if raw > 0.5 => {
                    format!("older task ({} days)", (self.now - created).num_days())
                }
                Some(_) => "recent task".to_string(),
                None => "unknown age".to_string(),
            },
            Criterion::LabelPreference => match scoring::label_match(task, profile) {
                LabelMatch::Preferred(labels) => format!("preferred labels: {}", labels.join(", ")),
                LabelMatch::Excluded(labels) => format!("excluded labels: {}", labels.join(", ")),
                LabelMatch::Neutral => "no preferred labels".to_string(),
                LabelMatch::Unlabeled => "no labels".to_string(),
            },
        }
    }
}
