//! Per-criterion scoring functions for tasks

use crate::config::{DueDateScores, RankingConfig};
use crate::types::*;
use chrono::{DateTime, NaiveDate, Utc};

/// Days until the age component saturates at 1.0
pub const DEFAULT_AGE_HORIZON_DAYS: f64 = 30.0;

/// Last day (counted from today) that still falls in the "this week" bucket
pub const THIS_WEEK_HORIZON_DAYS: i64 = 7;

/// Age component for tasks with no known creation time
pub const UNKNOWN_AGE_SCORE: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueBucket {
    Overdue,
    Today,
    Tomorrow,
    ThisWeek,
    Future,
}

impl DueBucket {
    pub fn label(&self) -> &'static str {
        match self {
            DueBucket::Overdue => "overdue",
            DueBucket::Today => "due today",
            DueBucket::Tomorrow => "due tomorrow",
            DueBucket::ThisWeek => "due this week",
            DueBucket::Future => "due later",
        }
    }

    pub fn score(&self, scores: &DueDateScores) -> f64 {
        match self {
            DueBucket::Overdue => scores.overdue,
            DueBucket::Today => scores.today,
            DueBucket::Tomorrow => scores.tomorrow,
            DueBucket::ThisWeek => scores.this_week,
            DueBucket::Future => scores.future,
        }
    }
}

/// Bucket a due date relative to `today` by calendar day
pub fn due_bucket(due: &Due, today: NaiveDate) -> DueBucket {
    let days = (due.date - today).num_days();
    match days {
        d if d < 0 => DueBucket::Overdue,
        0 => DueBucket::Today,
        1 => DueBucket::Tomorrow,
        d if d <= THIS_WEEK_HORIZON_DAYS => DueBucket::ThisWeek,
        _ => DueBucket::Future,
    }
}

pub fn priority_score(task: &Task, config: &RankingConfig) -> f64 {
    task.priority
        .and_then(|level| config.priority_score(level))
        .unwrap_or(config.fallback_weights.no_priority)
}

pub fn due_date_score(task: &Task, config: &RankingConfig, today: NaiveDate) -> f64 {
    match &task.due {
        Some(due) => due_bucket(due, today).score(&config.due_date_scores),
        None => config.fallback_weights.no_due_date,
    }
}

/// Linear ramp from 0 at creation to 1 at `horizon_days`, saturating
pub fn age_score(task: &Task, now: DateTime<Utc>, horizon_days: f64) -> f64 {
    let Some(created) = task.created_at else {
        return UNKNOWN_AGE_SCORE;
    };
    let horizon = if horizon_days > 0.0 {
        horizon_days
    } else {
        DEFAULT_AGE_HORIZON_DAYS
    };
    let days_old = (now - created).num_seconds() as f64 / 86_400.0;
    (days_old / horizon).clamp(0.0, 1.0)
}

/// How a task's labels relate to a mode profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelMatch {
    /// Any excluded label wins over preferred ones
    Excluded(Vec<String>),
    Preferred(Vec<String>),
    Neutral,
    Unlabeled,
}

pub fn label_match(task: &Task, profile: &ModeProfile) -> LabelMatch {
    if task.labels.is_empty() {
        return LabelMatch::Unlabeled;
    }

    let contains = |set: &[String], label: &str| set.iter().any(|s| s.eq_ignore_ascii_case(label));

    let excluded: Vec<String> = task
        .labels
        .iter()
        .filter(|l| contains(&profile.excluded_labels, l))
        .cloned()
        .collect();
    if !excluded.is_empty() {
        return LabelMatch::Excluded(excluded);
    }

    let preferred: Vec<String> = task
        .labels
        .iter()
        .filter(|l| contains(&profile.preferred_labels, l))
        .cloned()
        .collect();
    if preferred.is_empty() {
        LabelMatch::Neutral
    } else {
        LabelMatch::Preferred(preferred)
    }
}

pub fn label_affinity_score(task: &Task, profile: &ModeProfile, fallback: &FallbackWeights) -> f64 {
    match label_match(task, profile) {
        LabelMatch::Excluded(_) => 0.0,
        LabelMatch::Preferred(_) => 1.0,
        LabelMatch::Neutral | LabelMatch::Unlabeled => fallback.no_preferred_labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 13, 10, 0, 0).unwrap()
    }

    fn due_in(days: i64) -> Due {
        Due::on(now().date_naive() + Duration::days(days))
    }

    fn work_profile() -> ModeProfile {
        ModeProfile {
            preferred_labels: vec!["work".to_string(), "urgent".to_string()],
            excluded_labels: vec!["personal".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_priority_levels_strictly_decrease() {
        let config = RankingConfig::default();
        let scores: Vec<f64> = (1..=4)
            .map(|p| {
                let mut t = Task::new("t", "x");
                t.priority = Some(p);
                priority_score(&t, &config)
            })
            .collect();
        assert_eq!(scores, vec![1.0, 0.8, 0.6, 0.4]);
    }

    #[test]
    fn test_missing_or_unknown_priority_uses_fallback() {
        let config = RankingConfig::default();
        let mut t = Task::new("t", "x");
        assert_eq!(priority_score(&t, &config), 0.3);
        t.priority = Some(9);
        assert_eq!(priority_score(&t, &config), 0.3);
    }

    #[test]
    fn test_due_buckets() {
        let today = now().date_naive();
        assert_eq!(due_bucket(&due_in(-1), today), DueBucket::Overdue);
        assert_eq!(due_bucket(&due_in(0), today), DueBucket::Today);
        assert_eq!(due_bucket(&due_in(1), today), DueBucket::Tomorrow);
        assert_eq!(due_bucket(&due_in(2), today), DueBucket::ThisWeek);
    }

    #[test]
    fn test_this_week_boundary_is_inclusive_of_day_seven() {
        let today = now().date_naive();
        assert_eq!(due_bucket(&due_in(THIS_WEEK_HORIZON_DAYS), today), DueBucket::ThisWeek);
        assert_eq!(due_bucket(&due_in(THIS_WEEK_HORIZON_DAYS + 1), today), DueBucket::Future);
    }

    #[test]
    fn test_timed_due_earlier_today_is_not_overdue() {
        let mut due = due_in(0);
        due.datetime = Some(now() - Duration::hours(2));
        assert_eq!(due_bucket(&due, now().date_naive()), DueBucket::Today);
    }

    #[test]
    fn test_no_due_date_uses_fallback() {
        let config = RankingConfig::default();
        let t = Task::new("t", "x");
        assert_eq!(due_date_score(&t, &config, now().date_naive()), 0.2);
    }

    #[test]
    fn test_age_ramp_and_saturation() {
        let mut t = Task::new("t", "x");
        t.created_at = Some(now() - Duration::days(15));
        assert!((age_score(&t, now(), 30.0) - 0.5).abs() < 1e-9);

        t.created_at = Some(now() - Duration::days(30));
        assert_eq!(age_score(&t, now(), 30.0), 1.0);

        t.created_at = Some(now() - Duration::days(400));
        assert_eq!(age_score(&t, now(), 30.0), 1.0);
    }

    #[test]
    fn test_age_is_monotonic() {
        let mut previous = -1.0;
        for days in 0..60 {
            let mut t = Task::new("t", "x");
            t.created_at = Some(now() - Duration::days(days));
            let score = age_score(&t, now(), 30.0);
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn test_age_unknown_or_future_creation() {
        let mut t = Task::new("t", "x");
        assert_eq!(age_score(&t, now(), 30.0), UNKNOWN_AGE_SCORE);
        t.created_at = Some(now() + Duration::days(3));
        assert_eq!(age_score(&t, now(), 30.0), 0.0);
    }

    #[test]
    fn test_excluded_label_overrides_preferred() {
        let fallback = FallbackWeights::default();
        let mut t = Task::new("t", "x");
        t.labels = vec!["work".to_string(), "personal".to_string()];
        assert_eq!(label_affinity_score(&t, &work_profile(), &fallback), 0.0);
        assert!(matches!(label_match(&t, &work_profile()), LabelMatch::Excluded(_)));
    }

    #[test]
    fn test_label_affinity_cases() {
        let fallback = FallbackWeights::default();
        let mut t = Task::new("t", "x");
        assert_eq!(label_affinity_score(&t, &work_profile(), &fallback), 0.1);

        t.labels = vec!["errand".to_string()];
        assert_eq!(label_affinity_score(&t, &work_profile(), &fallback), 0.1);

        t.labels = vec!["Work".to_string()];
        assert_eq!(label_affinity_score(&t, &work_profile(), &fallback), 1.0);
    }
}
