//! Advisory response parsers.
//!
//! Responses go through an ordered chain of strategies. Each strategy says
//! whether it can handle a payload; the first one that parses successfully wins.

use crate::types::*;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

/// Urgency indicators beyond this many are dropped
pub const MAX_URGENCY_INDICATORS: usize = 10;

static EXPLANATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)EXPLANATION:\s*(.+?)\s*(?:CONFIDENCE:|RERANK_SCORE:|$)").unwrap()
});
static CONFIDENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CONFIDENCE:\s*([0-9]*\.?[0-9]+)").unwrap());
static RERANK_SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RERANK_SCORE:\s*([0-9]*\.?[0-9]+)").unwrap());

pub trait VerdictParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_parse(&self, payload: &str) -> bool;

    fn parse(&self, payload: &str) -> Result<LlmVerdict, String>;
}

/// Loosely typed fields stay raw: models quote numbers and mix list item types
#[derive(Debug, Deserialize)]
struct RawVerdict {
    explanation: String,
    confidence: Value,
    #[serde(default)]
    rerank_score: Option<Value>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    urgency_indicators: Option<Value>,
    #[serde(default)]
    mode_alignment: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
}

/// A JSON number, or a string holding one
fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Structured JSON responses, tolerating prose around the object
pub struct JsonVerdictParser;

impl JsonVerdictParser {
    fn json_slice(payload: &str) -> Option<&str> {
        let start = payload.find('{')?;
        let end = payload.rfind('}')?;
        (end > start).then(|| &payload[start..=end])
    }
}

impl VerdictParser for JsonVerdictParser {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_parse(&self, payload: &str) -> bool {
        Self::json_slice(payload).is_some()
    }

    fn parse(&self, payload: &str) -> Result<LlmVerdict, String> {
        let slice = Self::json_slice(payload).ok_or("no JSON object found")?;
        let raw: RawVerdict = serde_json::from_str(slice).map_err(|e| e.to_string())?;

        let explanation = raw.explanation.trim().to_string();
        if explanation.is_empty() {
            return Err("empty explanation".to_string());
        }

        let confidence = lenient_number(&raw.confidence)
            .ok_or_else(|| format!("confidence is not a number: {}", raw.confidence))?;

        let urgency_indicators = match raw.urgency_indicators {
            Some(Value::Array(items)) => items
                .iter()
                .take(MAX_URGENCY_INDICATORS)
                .map(lenient_text)
                .collect(),
            _ => vec![],
        };

        Ok(LlmVerdict {
            reasoning: raw
                .reasoning
                .map(|r| r.trim().to_string())
                .unwrap_or_else(|| explanation.clone()),
            explanation,
            confidence: clamp_confidence(confidence),
            rerank_score: raw
                .rerank_score
                .as_ref()
                .and_then(lenient_number)
                .filter(|s| in_unit_range(*s)),
            urgency_indicators,
            mode_alignment: raw
                .mode_alignment
                .map(|m| m.trim().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            recommendation: raw
                .recommendation
                .map(|r| Recommendation::parse_lenient(&r))
                .unwrap_or_default(),
        })
    }
}

/// Older free-text format with `EXPLANATION:` / `CONFIDENCE:` / `RERANK_SCORE:` markers
pub struct LegacyTextParser;

impl VerdictParser for LegacyTextParser {
    fn name(&self) -> &'static str {
        "legacy_text"
    }

    fn can_parse(&self, payload: &str) -> bool {
        payload.contains("EXPLANATION:")
    }

    fn parse(&self, payload: &str) -> Result<LlmVerdict, String> {
        let explanation = EXPLANATION_RE
            .captures(payload)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or("no EXPLANATION marker")?;

        let number = |re: &Regex| {
            re.captures(payload)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
        };

        // Without a stated confidence the verdict cannot pass the filter
        let confidence = number(&CONFIDENCE_RE).map(clamp_confidence).unwrap_or(0.0);
        let rerank_score = number(&RERANK_SCORE_RE).filter(|s| in_unit_range(*s));

        Ok(LlmVerdict {
            reasoning: explanation.clone(),
            explanation,
            confidence,
            rerank_score,
            urgency_indicators: vec![],
            mode_alignment: "unknown".to_string(),
            recommendation: Recommendation::Standard,
        })
    }
}

/// Ordered strategies; first success wins
pub struct ParserChain {
    parsers: Vec<Box<dyn VerdictParser>>,
}

impl ParserChain {
    pub fn new(parsers: Vec<Box<dyn VerdictParser>>) -> Self {
        Self { parsers }
    }

    pub fn parse(&self, payload: &str) -> Result<LlmVerdict, String> {
        let mut failures = Vec::new();

        for parser in &self.parsers {
            if !parser.can_parse(payload) {
                continue;
            }
            match parser.parse(payload) {
                Ok(verdict) => {
                    debug!("Advisory response parsed by '{}' strategy", parser.name());
                    return Ok(verdict);
                }
                Err(e) => failures.push(format!("{}: {}", parser.name(), e)),
            }
        }

        if failures.is_empty() {
            Err("no parser recognized the response".to_string())
        } else {
            Err(failures.join("; "))
        }
    }
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::new(vec![Box::new(JsonVerdictParser), Box::new(LegacyTextParser)])
    }
}

fn clamp_confidence(c: f64) -> f64 {
    if c.is_finite() {
        c.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn in_unit_range(s: f64) -> bool {
    s.is_finite() && (0.0..=1.0).contains(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_response() {
        let payload = r#"{
            "explanation": "This task needs immediate attention due to urgency indicators",
            "confidence": 0.9,
            "rerank_score": 0.85,
            "reasoning": "Detected urgent keywords",
            "urgency_indicators": ["urgent", "immediate"],
            "mode_alignment": "high priority alignment",
            "recommendation": "prioritize"
        }"#;
        let verdict = ParserChain::default().parse(payload).unwrap();
        assert_eq!(
            verdict.explanation,
            "This task needs immediate attention due to urgency indicators"
        );
        assert_eq!(verdict.confidence, 0.9);
        assert_eq!(verdict.rerank_score, Some(0.85));
        assert_eq!(verdict.reasoning, "Detected urgent keywords");
        assert_eq!(verdict.urgency_indicators, vec!["urgent", "immediate"]);
        assert_eq!(verdict.recommendation, Recommendation::Prioritize);
    }

    #[test]
    fn test_json_surrounded_by_prose() {
        let payload = "Sure! Here you go:\n{\"explanation\": \"Fine\", \"confidence\": 0.75}\nThanks.";
        let verdict = ParserChain::default().parse(payload).unwrap();
        assert_eq!(verdict.explanation, "Fine");
        assert_eq!(verdict.rerank_score, None);
        assert_eq!(verdict.recommendation, Recommendation::Standard);
        assert_eq!(verdict.mode_alignment, "unknown");
    }

    #[test]
    fn test_out_of_range_values() {
        let payload = r#"{"explanation": "x", "confidence": 4.2, "rerank_score": 1.7, "recommendation": "YOLO"}"#;
        let verdict = ParserChain::default().parse(payload).unwrap();
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.rerank_score, None);
        assert_eq!(verdict.recommendation, Recommendation::Standard);
    }

    #[test]
    fn test_quoted_numbers_and_mixed_indicators() {
        let payload = r#"{
            "explanation": "Due soon",
            "confidence": "0.85",
            "rerank_score": " 0.6 ",
            "urgency_indicators": ["deadline", 3, true]
        }"#;
        let verdict = ParserChain::default().parse(payload).unwrap();
        assert_eq!(verdict.confidence, 0.85);
        assert_eq!(verdict.rerank_score, Some(0.6));
        assert_eq!(verdict.urgency_indicators, vec!["deadline", "3", "true"]);
    }

    #[test]
    fn test_non_numeric_confidence_is_rejected() {
        let err = ParserChain::default()
            .parse(r#"{"explanation": "x", "confidence": "high"}"#)
            .unwrap_err();
        assert!(err.contains("confidence is not a number"));

        // A non-list indicators field is ignored rather than failing the verdict
        let verdict = ParserChain::default()
            .parse(r#"{"explanation": "x", "confidence": 0.8, "urgency_indicators": "urgent"}"#)
            .unwrap();
        assert!(verdict.urgency_indicators.is_empty());
    }

    #[test]
    fn test_urgency_indicators_capped() {
        let indicators: Vec<String> = (0..15).map(|i| format!("\"u{}\"", i)).collect();
        let payload = format!(
            r#"{{"explanation": "x", "confidence": 0.8, "urgency_indicators": [{}]}}"#,
            indicators.join(",")
        );
        let verdict = ParserChain::default().parse(&payload).unwrap();
        assert_eq!(verdict.urgency_indicators.len(), MAX_URGENCY_INDICATORS);
    }

    #[test]
    fn test_legacy_text_response() {
        let payload = "
        EXPLANATION: This task should be prioritized
        CONFIDENCE: 0.8
        RERANK_SCORE: 0.65
        ";
        let verdict = ParserChain::default().parse(payload).unwrap();
        assert_eq!(verdict.explanation, "This task should be prioritized");
        assert_eq!(verdict.confidence, 0.8);
        assert_eq!(verdict.rerank_score, Some(0.65));
    }

    #[test]
    fn test_broken_json_falls_through_to_legacy() {
        let payload = "EXPLANATION: Looks routine {not json} CONFIDENCE: 0.72";
        let verdict = ParserChain::default().parse(payload).unwrap();
        assert_eq!(verdict.explanation, "Looks routine {not json}");
        assert_eq!(verdict.confidence, 0.72);
        assert_eq!(verdict.rerank_score, None);
    }

    #[test]
    fn test_legacy_without_confidence_scores_zero() {
        let verdict = ParserChain::default().parse("EXPLANATION: no idea").unwrap();
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn test_unparseable_response() {
        assert!(ParserChain::default().parse("I think it's fine.").is_err());
        let err = ParserChain::default().parse("{\"confidence\": 0.9}").unwrap_err();
        assert!(err.starts_with("json:"));
    }
}
