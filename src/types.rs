//! Core type definitions for focus ranking

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Read-only view of a task pulled from the task manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub content: String,
    /// 1 = most urgent, 4 = least
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub due: Option<Due>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub section_id: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            priority: None,
            due: None,
            labels: vec![],
            created_at: None,
            section_id: None,
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Due {
    pub date: NaiveDate,
    /// Present only when the due date carries a time of day
    #[serde(default)]
    pub datetime: Option<DateTime<Utc>>,
    /// Human phrasing from the task manager ("tomorrow", "every monday")
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

impl Due {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            datetime: None,
            string: None,
            is_recurring: false,
        }
    }

    pub fn has_time(&self) -> bool {
        self.datetime.is_some()
    }
}

/// The four fixed scoring criteria
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Priority,
    DueDate,
    Age,
    LabelPreference,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::Priority,
        Criterion::DueDate,
        Criterion::Age,
        Criterion::LabelPreference,
    ];
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Criterion::Priority => "priority",
            Criterion::DueDate => "due_date",
            Criterion::Age => "age",
            Criterion::LabelPreference => "label_preference",
        };
        f.write_str(name)
    }
}

/// Outer weight per criterion. Expected to sum to 1.0 but never assumed to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    pub priority: f64,
    pub due_date: f64,
    pub age: f64,
    pub label_preference: f64,
}

impl WeightConfig {
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Priority => self.priority,
            Criterion::DueDate => self.due_date,
            Criterion::Age => self.age,
            Criterion::LabelPreference => self.label_preference,
        }
    }

    /// Sum of the usable (finite, non-negative) weights
    pub fn total(&self) -> f64 {
        Criterion::ALL
            .iter()
            .map(|c| usable_weight(self.get(*c)))
            .sum()
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            priority: 0.4,
            due_date: 0.3,
            age: 0.1,
            label_preference: 0.2,
        }
    }
}

pub(crate) fn usable_weight(w: f64) -> f64 {
    if w.is_finite() && w > 0.0 {
        w
    } else {
        0.0
    }
}

/// Component scores substituted when a task lacks the datum a criterion needs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackWeights {
    pub no_priority: f64,
    pub no_due_date: f64,
    pub no_preferred_labels: f64,
}

impl Default for FallbackWeights {
    fn default() -> Self {
        Self {
            no_priority: 0.3,
            no_due_date: 0.2,
            no_preferred_labels: 0.1,
        }
    }
}

/// Named scoring context
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Work,
    Personal,
    Weekend,
    Evening,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Work => "work",
            Mode::Personal => "personal",
            Mode::Weekend => "weekend",
            Mode::Evening => "evening",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(Mode::Work),
            "personal" => Ok(Mode::Personal),
            "weekend" => Ok(Mode::Weekend),
            "evening" => Ok(Mode::Evening),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Label preferences and weights for one mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeProfile {
    /// Label queries such as `@work & !@today`
    pub filters: Vec<String>,
    pub preferred_labels: Vec<String>,
    pub excluded_labels: Vec<String>,
    /// Falls back to the global scoring weights when absent
    pub weights: Option<WeightConfig>,
}

/// Where a result's final score came from
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingSource {
    Base,
    GptReranked,
    GptEnhanced,
    Fallback,
}

impl RankingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingSource::Base => "base",
            RankingSource::GptReranked => "gpt_reranked",
            RankingSource::GptEnhanced => "gpt_enhanced",
            RankingSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RankingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Prioritize,
    #[default]
    Standard,
    Defer,
}

impl Recommendation {
    /// Lenient parse; anything unrecognized is `Standard`
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "prioritize" => Recommendation::Prioritize,
            "defer" => Recommendation::Defer,
            _ => Recommendation::Standard,
        }
    }
}

/// Parsed advisory response for one candidate. Provisional until the
/// confidence filter has seen it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmVerdict {
    pub explanation: String,
    pub confidence: f64,
    /// `None` when the advisor offered no usable score
    pub rerank_score: Option<f64>,
    pub reasoning: String,
    pub urgency_indicators: Vec<String>,
    pub mode_alignment: String,
    pub recommendation: Recommendation,
}

/// Per-candidate disposition within a reranking run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOutcome {
    Accepted,
    LowConfidence,
    CostSkipped,
    TimedOut,
    TransportError,
    ParseError,
    MissingTask,
}

impl CandidateOutcome {
    pub fn source(&self, base_score: f64, verdict: Option<&LlmVerdict>) -> RankingSource {
        match self {
            CandidateOutcome::Accepted => match verdict.and_then(|v| v.rerank_score) {
                Some(score) if (score - base_score).abs() > SIGNIFICANT_SCORE_CHANGE => {
                    RankingSource::GptReranked
                }
                _ => RankingSource::GptEnhanced,
            },
            _ => RankingSource::Fallback,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            CandidateOutcome::Accepted => "advisory score accepted",
            CandidateOutcome::LowConfidence => "low confidence, base score used",
            CandidateOutcome::CostSkipped => "skipped, cost limit",
            CandidateOutcome::TimedOut => "fallback, timeout",
            CandidateOutcome::TransportError => "fallback, error",
            CandidateOutcome::ParseError => "fallback, parse error",
            CandidateOutcome::MissingTask => "fallback, task not found",
        }
    }
}

/// Minimum score movement for an accepted verdict to count as a rerank
pub const SIGNIFICANT_SCORE_CHANGE: f64 = 0.05;

/// What the advisory pass said about one result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryNote {
    pub outcome: CandidateOutcome,
    pub verdict: Option<LlmVerdict>,
    pub detail: Option<String>,
    pub model: Option<String>,
    pub cost_usd: f64,
}

/// One ranked task. Never mutated after construction; reranking builds new values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub task_id: String,
    pub score: f64,
    pub explanation: String,
    /// Weighted, normalized contribution per criterion (sums to `base_score`)
    pub components: BTreeMap<Criterion, f64>,
    /// Raw component score per criterion, each in [0,1]
    pub raw_components: BTreeMap<Criterion, f64>,
    pub source: RankingSource,
    pub base_score: f64,
    pub base_explanation: String,
    pub advisory: Option<AdvisoryNote>,
}

impl RankedResult {
    pub(crate) fn with_advisory(
        &self,
        score: f64,
        explanation: String,
        source: RankingSource,
        note: AdvisoryNote,
    ) -> Self {
        Self {
            task_id: self.task_id.clone(),
            score,
            explanation,
            components: self.components.clone(),
            raw_components: self.raw_components.clone(),
            source,
            base_score: self.base_score,
            base_explanation: self.base_explanation.clone(),
            advisory: Some(note),
        }
    }
}

/// Spend accounting for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostState {
    pub limit_usd: f64,
    pub spent_usd: f64,
}

impl CostState {
    pub fn new(limit_usd: f64) -> Self {
        Self {
            limit_usd,
            spent_usd: 0.0,
        }
    }
}

/// Which candidate set the ranking engine ended up scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPath {
    Unfiltered,
    Filtered,
    FallbackToFull,
}

/// Counts of results per source for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceSummary {
    pub base: usize,
    pub gpt_reranked: usize,
    pub gpt_enhanced: usize,
    pub fallback: usize,
    pub cost_skipped: usize,
    pub spent_usd: f64,
}

impl SourceSummary {
    pub fn tally(results: &[RankedResult]) -> Self {
        let mut summary = Self::default();
        for r in results {
            match r.source {
                RankingSource::Base => summary.base += 1,
                RankingSource::GptReranked => summary.gpt_reranked += 1,
                RankingSource::GptEnhanced => summary.gpt_enhanced += 1,
                RankingSource::Fallback => summary.fallback += 1,
            }
            if let Some(note) = &r.advisory {
                if note.outcome == CandidateOutcome::CostSkipped {
                    summary.cost_skipped += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_deserializes_with_missing_fields() {
        let task: Task = serde_json::from_str(r#"{"id": "42", "content": "Call the bank"}"#).unwrap();
        assert_eq!(task.priority, None);
        assert!(task.due.is_none());
        assert!(task.labels.is_empty());
    }

    #[test]
    fn test_due_with_time() {
        let due: Due = serde_json::from_str(
            r#"{"date": "2024-03-01", "datetime": "2024-03-01T15:00:00Z", "string": "mar 1 3pm"}"#,
        )
        .unwrap();
        assert!(due.has_time());
        assert_eq!(due.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_weight_total_ignores_negative() {
        let w = WeightConfig {
            priority: 0.5,
            due_date: -1.0,
            age: f64::NAN,
            label_preference: 0.25,
        };
        assert!((w.total() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Work".parse::<Mode>(), Ok(Mode::Work));
        assert!("gardening".parse::<Mode>().is_err());
    }

    #[test]
    fn test_advisory_score_leaves_components_on_base() {
        let components = BTreeMap::from([(Criterion::Priority, 0.4), (Criterion::DueDate, 0.1)]);
        let base = RankedResult {
            task_id: "1".to_string(),
            score: 0.5,
            explanation: "priority p1".to_string(),
            components: components.clone(),
            raw_components: BTreeMap::new(),
            source: RankingSource::Base,
            base_score: 0.5,
            base_explanation: "priority p1".to_string(),
            advisory: None,
        };
        let note = AdvisoryNote {
            outcome: CandidateOutcome::Accepted,
            verdict: None,
            detail: None,
            model: None,
            cost_usd: 0.0,
        };
        let reranked = base.with_advisory(0.9, "urgent".to_string(), RankingSource::GptReranked, note);

        let sum: f64 = reranked.components.values().sum();
        assert!((sum - reranked.base_score).abs() < 1e-12);
        assert_eq!(reranked.score, 0.9);
        assert_eq!(reranked.components, components);
    }

    #[test]
    fn test_accepted_source_depends_on_score_movement() {
        let verdict = LlmVerdict {
            explanation: String::new(),
            confidence: 0.9,
            rerank_score: Some(0.83),
            reasoning: String::new(),
            urgency_indicators: vec![],
            mode_alignment: String::new(),
            recommendation: Recommendation::Standard,
        };
        assert_eq!(
            CandidateOutcome::Accepted.source(0.80, Some(&verdict)),
            RankingSource::GptEnhanced
        );
        assert_eq!(
            CandidateOutcome::Accepted.source(0.70, Some(&verdict)),
            RankingSource::GptReranked
        );
        assert_eq!(
            CandidateOutcome::TimedOut.source(0.70, Some(&verdict)),
            RankingSource::Fallback
        );
    }
}
