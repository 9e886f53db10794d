//! Mode resolution, including time-of-day auto detection

use crate::config::{RankingConfig, TimeBasedModes};
use crate::types::*;
use chrono::{Datelike, NaiveDateTime, Timelike};
use tracing::{debug, warn};

pub const AUTO_MODE: &str = "auto";

/// Mode name plus the profile and weights it selects
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMode {
    pub name: String,
    pub profile: ModeProfile,
    pub weights: WeightConfig,
}

/// Pick a mode from local wall-clock time
pub fn detect_mode(local: NaiveDateTime, rules: &TimeBasedModes) -> Mode {
    let weekday = local.weekday().num_days_from_monday();
    let hour = local.hour();
    let within = |range: [u32; 2]| range[0] <= hour && hour <= range[1];

    if rules.weekend_days.contains(&weekday) {
        Mode::Weekend
    } else if within(rules.evening_hours) {
        Mode::Evening
    } else if within(rules.weekday_work_hours) {
        Mode::Work
    } else {
        Mode::Personal
    }
}

/// Resolve a requested mode name against the configured profiles.
///
/// `None` means the configured default. `"auto"` detects from `local_now`.
/// Unknown names fall back to the default mode rather than failing.
pub fn resolve_mode(
    requested: Option<&str>,
    config: &RankingConfig,
    local_now: NaiveDateTime,
) -> ResolvedMode {
    let default_name = config.default_mode.trim().to_ascii_lowercase();

    let wanted = match requested.map(|m| m.trim().to_ascii_lowercase()) {
        Some(m) if !m.is_empty() => m,
        _ => default_name.clone(),
    };

    let known = |m: &str| config.mode_settings.contains_key(m) || m.parse::<Mode>().is_ok();
    let auto = || {
        if config.time_based_modes.enabled {
            let detected = detect_mode(local_now, &config.time_based_modes);
            debug!("Auto-detected mode '{}' at {}", detected, local_now);
            detected.to_string()
        } else {
            Mode::Personal.to_string()
        }
    };

    let name = if wanted == AUTO_MODE {
        auto()
    } else if known(&wanted) {
        wanted
    } else if default_name == AUTO_MODE {
        warn!("Unknown mode '{}', detecting from the clock", wanted);
        auto()
    } else if known(&default_name) {
        warn!("Unknown mode '{}', using default mode '{}'", wanted, default_name);
        default_name
    } else {
        warn!("Unknown mode '{}' and default '{}', using '{}'", wanted, default_name, Mode::Personal);
        Mode::Personal.to_string()
    };

    let profile = match config.mode_settings.get(&name) {
        Some(profile) => profile.clone(),
        None => {
            debug!("No profile configured for mode '{}', using global weights", name);
            ModeProfile::default()
        }
    };
    let weights = profile.weights.unwrap_or(config.scoring_weights);

    ResolvedMode {
        name,
        profile,
        weights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_detect_mode_by_time() {
        let rules = TimeBasedModes::default();
        // 2024-03-13 is a Wednesday, 2024-03-16 a Saturday
        assert_eq!(detect_mode(at(2024, 3, 13, 10), &rules), Mode::Work);
        assert_eq!(detect_mode(at(2024, 3, 13, 17), &rules), Mode::Work);
        assert_eq!(detect_mode(at(2024, 3, 13, 19), &rules), Mode::Evening);
        assert_eq!(detect_mode(at(2024, 3, 13, 6), &rules), Mode::Personal);
        assert_eq!(detect_mode(at(2024, 3, 13, 23), &rules), Mode::Personal);
        assert_eq!(detect_mode(at(2024, 3, 16, 10), &rules), Mode::Weekend);
    }

    #[test]
    fn test_evening_wins_over_overlapping_work_hours() {
        let rules = TimeBasedModes {
            weekday_work_hours: [9, 19],
            ..TimeBasedModes::default()
        };
        assert_eq!(detect_mode(at(2024, 3, 13, 18), &rules), Mode::Evening);
        assert_eq!(detect_mode(at(2024, 3, 13, 17), &rules), Mode::Work);
    }

    #[test]
    fn test_unknown_mode_falls_back_to_default() {
        let config = RankingConfig::default();
        let resolved = resolve_mode(Some("gardening"), &config, at(2024, 3, 13, 10));
        assert_eq!(resolved.name, "personal");
        assert!(resolved.profile.preferred_labels.contains(&"family".to_string()));
    }

    #[test]
    fn test_auto_mode_uses_clock() {
        let config = RankingConfig::default();
        let resolved = resolve_mode(Some("AUTO"), &config, at(2024, 3, 16, 12));
        assert_eq!(resolved.name, "weekend");
    }

    #[test]
    fn test_mode_weights_override_global() {
        let mut config = RankingConfig::default();
        let custom = WeightConfig {
            priority: 0.1,
            due_date: 0.1,
            age: 0.1,
            label_preference: 0.7,
        };
        config.mode_settings.get_mut("work").unwrap().weights = Some(custom);
        let resolved = resolve_mode(Some("work"), &config, at(2024, 3, 13, 10));
        assert_eq!(resolved.weights, custom);

        let personal = resolve_mode(None, &config, at(2024, 3, 13, 10));
        assert_eq!(personal.weights, config.scoring_weights);
    }

    #[test]
    fn test_auto_as_default_mode() {
        let mut config = RankingConfig::default();
        config.default_mode = "auto".to_string();
        assert_eq!(resolve_mode(None, &config, at(2024, 3, 13, 19)).name, "evening");
        assert_eq!(resolve_mode(Some("gardening"), &config, at(2024, 3, 13, 10)).name, "work");

        config.time_based_modes.enabled = false;
        assert_eq!(resolve_mode(None, &config, at(2024, 3, 13, 19)).name, "personal");
    }

    #[test]
    fn test_known_mode_without_profile_gets_empty_profile() {
        let mut config = RankingConfig::default();
        config.mode_settings.remove("evening");
        let resolved = resolve_mode(Some("evening"), &config, at(2024, 3, 13, 10));
        assert_eq!(resolved.name, "evening");
        assert!(resolved.profile.preferred_labels.is_empty());
        assert_eq!(resolved.weights, config.scoring_weights);
    }
}
