//! Ranking configuration: weights, buckets, mode profiles, reranking limits.
//!
//! Every field has a default so a partial JSON file (or none at all) still
//! yields a usable configuration. Loading never fails the caller; malformed
//! input is logged and replaced by defaults.

use crate::error::{RankError, RankResult};
use crate::types::*;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub version: String,
    pub default_limit: usize,
    pub default_mode: String,
    pub user_profile: String,
    pub scoring_weights: WeightConfig,
    pub fallback_weights: FallbackWeights,
    /// Priority level ("1".."4") to component score
    pub priority_scores: BTreeMap<String, f64>,
    pub due_date_scores: DueDateScores,
    pub age_horizon_days: f64,
    pub mode_settings: BTreeMap<String, ModeProfile>,
    pub filtering: FilteringConfig,
    pub time_based_modes: TimeBasedModes,
    /// Absent block behaves as `enabled: false`
    pub gpt_reranking: Option<GptRerankingConfig>,
    pub pricing: PriceTable,
    pub logging: LoggingConfig,
}

impl Default for RankingConfig {
    fn default() -> Self {
        let priority_scores = [("1", 1.0), ("2", 0.8), ("3", 0.6), ("4", 0.4)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        Self {
            version: "4.0".to_string(),
            default_limit: 3,
            default_mode: "personal".to_string(),
            user_profile: "I'm a productivity-focused user who values efficient task management."
                .to_string(),
            scoring_weights: WeightConfig::default(),
            fallback_weights: FallbackWeights::default(),
            priority_scores,
            due_date_scores: DueDateScores::default(),
            age_horizon_days: crate::scoring::DEFAULT_AGE_HORIZON_DAYS,
            mode_settings: default_mode_settings(),
            filtering: FilteringConfig::default(),
            time_based_modes: TimeBasedModes::default(),
            gpt_reranking: None,
            pricing: PriceTable::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_mode_settings() -> BTreeMap<String, ModeProfile> {
    let mut modes = BTreeMap::new();
    modes.insert(
        "work".to_string(),
        ModeProfile {
            filters: labels(&["@work & !@today"]),
            preferred_labels: labels(&["work", "meeting", "urgent"]),
            excluded_labels: labels(&["personal"]),
            weights: None,
        },
    );
    modes.insert(
        "personal".to_string(),
        ModeProfile {
            filters: labels(&["@personal & !@today"]),
            preferred_labels: labels(&["personal", "health", "family"]),
            excluded_labels: labels(&["work"]),
            weights: None,
        },
    );
    modes.insert(
        "weekend".to_string(),
        ModeProfile {
            filters: vec![],
            preferred_labels: labels(&["home", "personal", "family", "health", "leisure"]),
            excluded_labels: labels(&["work", "meeting", "deadline"]),
            weights: None,
        },
    );
    modes.insert(
        "evening".to_string(),
        ModeProfile {
            filters: vec![],
            preferred_labels: labels(&["personal", "home", "family", "admin"]),
            excluded_labels: labels(&["work", "meeting"]),
            weights: None,
        },
    );
    modes
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DueDateScores {
    pub overdue: f64,
    pub today: f64,
    pub tomorrow: f64,
    pub this_week: f64,
    pub future: f64,
}

impl Default for DueDateScores {
    fn default() -> Self {
        Self {
            overdue: 1.0,
            today: 0.9,
            tomorrow: 0.7,
            this_week: 0.5,
            future: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilteringConfig {
    pub enabled: bool,
    pub fallback_to_full_backlog: bool,
    /// Tasks carrying only these labels are reference items, never ranked
    pub passive_labels: Vec<String>,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_to_full_backlog: true,
            passive_labels: labels(&["link"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBasedModes {
    pub enabled: bool,
    /// Inclusive hour range
    pub weekday_work_hours: [u32; 2],
    pub evening_hours: [u32; 2],
    /// 0 = Monday .. 6 = Sunday
    pub weekend_days: Vec<u32>,
}

impl Default for TimeBasedModes {
    fn default() -> Self {
        Self {
            enabled: true,
            weekday_work_hours: [9, 17],
            evening_hours: [18, 22],
            weekend_days: vec![5, 6],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GptRerankingConfig {
    pub enabled: bool,
    pub model: String,
    pub candidate_limit: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Seconds
    pub timeout: f64,
    pub cost_limit_per_run_usd: f64,
    pub confidence_threshold: f64,
    pub fallback_on_error: bool,
}

impl Default for GptRerankingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "gpt-3.5-turbo".to_string(),
            candidate_limit: 10,
            max_tokens: 500,
            temperature: 0.3,
            timeout: 30.0,
            cost_limit_per_run_usd: 0.10,
            confidence_threshold: 0.7,
            fallback_on_error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// USD per 1K tokens, keyed by model name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTable(pub BTreeMap<String, ModelPricing>);

pub const DEFAULT_PRICING_MODEL: &str = "gpt-3.5-turbo";

impl PriceTable {
    /// Unknown models are charged at the default model's rate
    pub fn for_model(&self, model: &str) -> ModelPricing {
        self.0
            .get(model)
            .or_else(|| self.0.get(DEFAULT_PRICING_MODEL))
            .copied()
            .unwrap_or(ModelPricing {
                input_per_1k: 0.0015,
                output_per_1k: 0.002,
            })
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        let table = [
            ("gpt-3.5-turbo", 0.0015, 0.002),
            ("gpt-4", 0.03, 0.06),
            ("gpt-4-turbo", 0.01, 0.03),
            ("gpt-4o-mini", 0.00015, 0.0006),
        ]
        .into_iter()
        .map(|(name, input, output)| {
            (
                name.to_string(),
                ModelPricing {
                    input_per_1k: input,
                    output_per_1k: output,
                },
            )
        })
        .collect();
        Self(table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose_scoring: bool,
    pub log_candidates: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbose_scoring: false,
            log_candidates: true,
        }
    }
}

impl RankingConfig {
    /// Load from a JSON file, falling back to defaults on any problem
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(config) => {
                info!("Loaded ranking config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; using default ranking config", e);
                Self::default()
            }
        }
    }

    pub fn try_load(path: impl AsRef<Path>) -> RankResult<Self> {
        let path = path.as_ref();
        Self::read_file(path)
            .map(Self::sanitize)
            .map_err(|e| RankError::Configuration {
                reason: format!("{:#}", e),
            })
    }

    fn read_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> RankResult<Self> {
        serde_json::from_str::<Self>(text)
            .map(Self::sanitize)
            .map_err(|e| RankError::Configuration {
                reason: e.to_string(),
            })
    }

    /// Repair out-of-range numbers so scoring stays within [0,1]
    pub fn sanitize(mut self) -> Self {
        self.scoring_weights = sanitize_weights(self.scoring_weights, "scoring_weights");
        for (name, profile) in self.mode_settings.iter_mut() {
            if let Some(w) = profile.weights {
                profile.weights = Some(sanitize_weights(w, &format!("mode_settings.{}", name)));
            }
        }

        let fb = &mut self.fallback_weights;
        fb.no_priority = unit(fb.no_priority, "fallback_weights.no_priority");
        fb.no_due_date = unit(fb.no_due_date, "fallback_weights.no_due_date");
        fb.no_preferred_labels = unit(fb.no_preferred_labels, "fallback_weights.no_preferred_labels");

        for (level, score) in self.priority_scores.iter_mut() {
            *score = unit(*score, &format!("priority_scores.{}", level));
        }

        let due = &mut self.due_date_scores;
        due.overdue = unit(due.overdue, "due_date_scores.overdue");
        due.today = unit(due.today, "due_date_scores.today");
        due.tomorrow = unit(due.tomorrow, "due_date_scores.tomorrow");
        due.this_week = unit(due.this_week, "due_date_scores.this_week");
        due.future = unit(due.future, "due_date_scores.future");

        if !(self.age_horizon_days.is_finite() && self.age_horizon_days > 0.0) {
            warn!(
                "age_horizon_days {} is invalid, using {}",
                self.age_horizon_days,
                crate::scoring::DEFAULT_AGE_HORIZON_DAYS
            );
            self.age_horizon_days = crate::scoring::DEFAULT_AGE_HORIZON_DAYS;
        }

        if let Some(gpt) = self.gpt_reranking.as_mut() {
            gpt.confidence_threshold = unit(gpt.confidence_threshold, "gpt_reranking.confidence_threshold");
            if !(gpt.timeout.is_finite() && gpt.timeout > 0.0) {
                warn!("gpt_reranking.timeout {} is invalid, using 30s", gpt.timeout);
                gpt.timeout = 30.0;
            }
            if !(gpt.cost_limit_per_run_usd.is_finite() && gpt.cost_limit_per_run_usd >= 0.0) {
                warn!("gpt_reranking.cost_limit_per_run_usd is invalid, disabling spend");
                gpt.cost_limit_per_run_usd = 0.0;
            }
        }

        self
    }

    /// Reranking settings, with an absent block meaning disabled
    pub fn reranking(&self) -> GptRerankingConfig {
        self.gpt_reranking.clone().unwrap_or_default()
    }

    pub fn priority_score(&self, level: u8) -> Option<f64> {
        self.priority_scores.get(&level.to_string()).copied()
    }
}

fn sanitize_weights(w: WeightConfig, field: &str) -> WeightConfig {
    WeightConfig {
        priority: non_negative(w.priority, &format!("{}.priority", field)),
        due_date: non_negative(w.due_date, &format!("{}.due_date", field)),
        age: non_negative(w.age, &format!("{}.age", field)),
        label_preference: non_negative(w.label_preference, &format!("{}.label_preference", field)),
    }
}

fn non_negative(x: f64, field: &str) -> f64 {
    if x.is_finite() && x >= 0.0 {
        x
    } else {
        warn!("{} = {} is not a non-negative number, using 0", field, x);
        0.0
    }
}

fn unit(x: f64, field: &str) -> f64 {
    if x.is_finite() && (0.0..=1.0).contains(&x) {
        x
    } else {
        let repaired = if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 };
        warn!("{} = {} is outside [0,1], using {}", field, x, repaired);
        repaired
    }
}
