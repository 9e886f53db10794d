//! Advisory collaborators consulted during reranking

use crate::prompts::AdvisoryRequest;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

/// Raw reply from an advisor; parsing happens in the reranker
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryReply {
    pub text: String,
    pub model: String,
    /// Actual spend when the advisor knows it
    pub cost_usd: Option<f64>,
}

/// Trait for pluggable LLM advisors
#[async_trait]
pub trait RankingAdvisor: Send + Sync {
    fn name(&self) -> &'static str;

    /// False when the advisor cannot be reached at all (e.g. no credentials)
    fn is_available(&self) -> bool {
        true
    }

    async fn advise(&self, request: &AdvisoryRequest, prompt: &str) -> Result<AdvisoryReply>;
}

/// Offline advisor using keyword heuristics, for demos and dry runs
pub struct MockAdvisor;

impl MockAdvisor {
    fn verdict(request: &AdvisoryRequest) -> serde_json::Value {
        let content = request.task.content.to_lowercase();
        let mode = request.context.mode.as_str();
        let base = request.context.base_score;

        if content.contains("urgent") || content.contains("critical") {
            json!({
                "explanation": format!("This task contains urgent indicators and should be prioritized in {} mode", mode),
                "confidence": 0.9,
                "rerank_score": (base + 0.1).min(1.0),
                "reasoning": "Detected urgency keywords requiring immediate attention",
                "urgency_indicators": ["urgent", "critical"],
                "mode_alignment": "high priority alignment with current mode",
                "recommendation": "prioritize"
            })
        } else if content.contains("meeting") {
            json!({
                "explanation": format!("Meeting tasks require coordination and should be prioritized in {} mode", mode),
                "confidence": 0.8,
                "rerank_score": (base + 0.05).min(1.0),
                "reasoning": "Meeting tasks require coordination and timing",
                "urgency_indicators": ["meeting"],
                "mode_alignment": "requires time coordination",
                "recommendation": "prioritize"
            })
        } else if mode == "work" && ["work", "project", "deadline"].iter().any(|w| content.contains(w)) {
            json!({
                "explanation": format!("Work-related task aligns well with current {} mode", mode),
                "confidence": 0.7,
                "rerank_score": (base + 0.03).min(1.0),
                "reasoning": "Task content matches work mode context",
                "urgency_indicators": ["deadline", "project"],
                "mode_alignment": "strong alignment with work mode",
                "recommendation": "standard"
            })
        } else {
            json!({
                "explanation": format!("Standard task prioritization for {} mode", mode),
                "confidence": 0.6,
                "rerank_score": base,
                "reasoning": "No specific urgency or mode indicators detected",
                "urgency_indicators": [],
                "mode_alignment": "neutral alignment",
                "recommendation": "standard"
            })
        }
    }
}

#[async_trait]
impl RankingAdvisor for MockAdvisor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn advise(&self, request: &AdvisoryRequest, _prompt: &str) -> Result<AdvisoryReply> {
        Ok(AdvisoryReply {
            text: Self::verdict(request).to_string(),
            model: "mock".to_string(),
            cost_usd: Some(0.0),
        })
    }
}
