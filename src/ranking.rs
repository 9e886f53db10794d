//! Ranking engine: filter, score, sort and truncate a task collection

use crate::composite::CompositeScorer;
use crate::config::RankingConfig;
use crate::filters::{is_passive, LabelQueryFilter, TaskFilter};
use crate::mode::{resolve_mode, ResolvedMode};
use crate::types::*;
use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one ranking call
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutcome {
    pub mode: String,
    pub path: FilterPath,
    /// Number of tasks that were scored
    pub scored: usize,
    pub results: Vec<RankedResult>,
}

/// Stateless per call; holds only read-only configuration
pub struct RankingEngine {
    config: Arc<RankingConfig>,
    prefilter: Option<Box<dyn TaskFilter>>,
}

impl RankingEngine {
    pub fn new(config: Arc<RankingConfig>) -> Self {
        Self {
            config,
            prefilter: None,
        }
    }

    /// Replace the mode's label queries with a caller-supplied pre-filter
    pub fn with_prefilter(mut self, filter: Box<dyn TaskFilter>) -> Self {
        self.prefilter = Some(filter);
        self
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn resolve_mode(&self, mode: Option<&str>, now: DateTime<Utc>) -> ResolvedMode {
        resolve_mode(mode, &self.config, now.with_timezone(&Local).naive_local())
    }

    pub fn rank(
        &self,
        tasks: &[Task],
        mode: Option<&str>,
        limit: usize,
        weight_overrides: Option<&WeightConfig>,
    ) -> RankOutcome {
        self.rank_at(tasks, mode, limit, weight_overrides, Utc::now())
    }

    /// Rank against an explicit clock. Output is deterministic for fixed inputs.
    pub fn rank_at(
        &self,
        tasks: &[Task],
        mode: Option<&str>,
        limit: usize,
        weight_overrides: Option<&WeightConfig>,
        now: DateTime<Utc>,
    ) -> RankOutcome {
        let resolved = self.resolve_mode(mode, now);
        let weights = weight_overrides.copied().unwrap_or(resolved.weights);

        if limit == 0 {
            debug!("Rank limit is 0, returning no results");
            return RankOutcome {
                mode: resolved.name,
                path: FilterPath::Unfiltered,
                scored: 0,
                results: vec![],
            };
        }

        let rankable: Vec<&Task> = tasks
            .iter()
            .filter(|t| !is_passive(t, &self.config.filtering.passive_labels))
            .collect();
        let passive_count = tasks.len() - rankable.len();

        let (candidates, path) = self.apply_prefilter(rankable, &resolved);

        info!(
            "Ranking {} of {} tasks in '{}' mode ({} passive excluded, path {:?})",
            candidates.len(),
            tasks.len(),
            resolved.name,
            passive_count,
            path
        );

        let scorer = CompositeScorer::new(&self.config, now);
        let mut results: Vec<RankedResult> = candidates
            .iter()
            .map(|task| scorer.score(task, &resolved.profile, &weights))
            .collect();
        let scored = results.len();

        if self.config.logging.log_candidates {
            for (task, result) in candidates.iter().zip(&results) {
                debug!(
                    "Candidate {} scored {:.3} - {} | {}",
                    task.id,
                    result.score,
                    result.explanation,
                    preview(&task.content, 50)
                );
            }
        }

        sort_by_score(&mut results);
        results.truncate(limit);

        for (i, r) in results.iter().enumerate() {
            info!("Rank #{}: task {} (score {:.3}) - {}", i + 1, r.task_id, r.score, r.explanation);
        }

        RankOutcome {
            mode: resolved.name,
            path,
            scored,
            results,
        }
    }

    fn apply_prefilter<'t>(
        &self,
        rankable: Vec<&'t Task>,
        resolved: &ResolvedMode,
    ) -> (Vec<&'t Task>, FilterPath) {
        let mode_filter;
        let filter: &dyn TaskFilter = match &self.prefilter {
            Some(custom) => custom.as_ref(),
            None if self.config.filtering.enabled => {
                match LabelQueryFilter::from_queries(&resolved.name, &resolved.profile.filters) {
                    Some(f) => {
                        mode_filter = f;
                        &mode_filter
                    }
                    None => return (rankable, FilterPath::Unfiltered),
                }
            }
            None => return (rankable, FilterPath::Unfiltered),
        };

        let filtered: Vec<&Task> = rankable.iter().copied().filter(|t| filter.matches(t)).collect();
        if !filtered.is_empty() {
            return (filtered, FilterPath::Filtered);
        }

        if self.config.filtering.fallback_to_full_backlog {
            info!(
                "Pre-filter '{}' matched no tasks, falling back to the full backlog",
                filter.name()
            );
            (rankable, FilterPath::FallbackToFull)
        } else {
            info!("Pre-filter '{}' matched no tasks", filter.name());
            (filtered, FilterPath::Filtered)
        }
    }
}

/// Descending by score; equal scores keep their input order
pub fn sort_by_score(results: &mut [RankedResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 13, 10, 0, 0).unwrap()
    }

    fn task(id: &str, priority: Option<u8>, labels: &[&str]) -> Task {
        let mut t = Task::new(id, format!("task {}", id));
        t.priority = priority;
        t.labels = labels.iter().map(|s| s.to_string()).collect();
        t
    }

    fn engine() -> RankingEngine {
        RankingEngine::new(Arc::new(RankingConfig::default()))
    }

    #[test]
    fn test_limit_zero_is_empty() {
        let tasks = vec![task("1", Some(1), &[])];
        let outcome = engine().rank_at(&tasks, Some("work"), 0, None, now());
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_limit_larger_than_candidates_returns_all() {
        let tasks = vec![task("1", Some(1), &["work"]), task("2", Some(2), &["work"])];
        let outcome = engine().rank_at(&tasks, Some("work"), 10, None, now());
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].task_id, "1");
    }

    #[test]
    fn test_ties_keep_input_order() {
        let tasks: Vec<Task> = ["c", "a", "b", "d"].iter().map(|id| task(id, Some(2), &["work"])).collect();
        let outcome = engine().rank_at(&tasks, Some("work"), 10, None, now());
        let ids: Vec<&str> = outcome.results.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_prefilter_falls_back_to_full_set() {
        // No task carries @work, so the work mode query matches nothing
        let tasks = vec![task("1", Some(1), &["errand"]), task("2", None, &[])];
        let outcome = engine().rank_at(&tasks, Some("work"), 5, None, now());
        assert_eq!(outcome.path, FilterPath::FallbackToFull);
        assert_eq!(outcome.results.len(), 2);
    }

    #[test]
    fn test_prefilter_narrows_candidates() {
        let tasks = vec![
            task("1", Some(1), &["errand"]),
            task("2", Some(4), &["work"]),
            task("3", Some(1), &["work", "today"]),
        ];
        let outcome = engine().rank_at(&tasks, Some("work"), 5, None, now());
        assert_eq!(outcome.path, FilterPath::Filtered);
        let ids: Vec<&str> = outcome.results.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn test_custom_prefilter() {
        struct OnlyPriorityOne;
        impl TaskFilter for OnlyPriorityOne {
            fn name(&self) -> &str {
                "p1"
            }
            fn matches(&self, task: &Task) -> bool {
                task.priority == Some(1)
            }
        }

        let tasks = vec![task("1", Some(2), &[]), task("2", Some(1), &[])];
        let outcome = engine()
            .with_prefilter(Box::new(OnlyPriorityOne))
            .rank_at(&tasks, Some("personal"), 5, None, now());
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].task_id, "2");
    }

    #[test]
    fn test_passive_tasks_are_not_ranked() {
        let tasks = vec![task("1", Some(1), &["link"]), task("2", Some(3), &[])];
        let outcome = engine().rank_at(&tasks, Some("personal"), 5, None, now());
        let ids: Vec<&str> = outcome.results.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn test_weight_overrides_change_order() {
        let mut config = RankingConfig::default();
        config.filtering.enabled = false;
        let engine = RankingEngine::new(Arc::new(config));
        let tasks = vec![task("high", Some(1), &[]), task("labelled", Some(4), &["work"])];

        let default = engine.rank_at(&tasks, Some("work"), 2, None, now());
        assert_eq!(default.results[0].task_id, "high");

        let labels_only = WeightConfig {
            priority: 0.0,
            due_date: 0.0,
            age: 0.0,
            label_preference: 1.0,
        };
        let overridden = engine.rank_at(&tasks, Some("work"), 2, Some(&labels_only), now());
        assert_eq!(overridden.results[0].task_id, "labelled");
    }

    #[test]
    fn test_rank_is_idempotent() {
        let tasks = vec![
            task("1", Some(3), &["work"]),
            task("2", Some(1), &[]),
            task("3", None, &["personal"]),
        ];
        let first = engine().rank_at(&tasks, Some("work"), 3, None, now());
        let second = engine().rank_at(&tasks, Some("work"), 3, None, now());
        assert_eq!(first, second);
    }
}
