//! Advisory request construction and prompt rendering

use crate::scoring::due_bucket;
use crate::types::*;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Structured request sent to the advisor for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub task: TaskPayload,
    pub context: ContextPayload,
    pub request: RequestFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub content: String,
    pub priority: Option<u8>,
    pub due_date: String,
    pub due_bucket: Option<String>,
    pub labels: Vec<String>,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPayload {
    pub mode: String,
    pub user_profile: String,
    pub base_score: f64,
    pub base_explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFlags {
    pub analyze_task_priority: bool,
    pub provide_explanation: bool,
    pub suggest_rerank_score: bool,
    pub confidence_assessment: bool,
}

impl Default for RequestFlags {
    fn default() -> Self {
        Self {
            analyze_task_priority: true,
            provide_explanation: true,
            suggest_rerank_score: true,
            confidence_assessment: true,
        }
    }
}

/// Fixed instruction text wrapped around every request; also the basis for cost estimates
pub const RERANK_INSTRUCTIONS: &str = "\
INSTRUCTIONS:
1. Analyze the task's priority in the context of the current mode
2. Consider the user profile and base ranking explanation
3. Provide a clear, human-readable explanation for your recommendation
4. Assess your confidence in the analysis (0.0-1.0)
5. Suggest a rerank score (0.0-1.0) if the base score should be adjusted

REQUIRED JSON RESPONSE FORMAT:
{
  \"explanation\": \"Why this task should or should not be prioritized\",
  \"confidence\": 0.85,
  \"rerank_score\": 0.5,
  \"reasoning\": \"Brief technical reasoning for score adjustment\",
  \"urgency_indicators\": [\"detected\", \"urgency\", \"signals\"],
  \"mode_alignment\": \"how well this task fits the current mode\",
  \"recommendation\": \"prioritize|defer|standard\"
}

Respond ONLY with valid JSON. Do not include any text before or after the JSON response.";

pub const PROMPT_PREAMBLE: &str =
    "You are a productivity assistant analyzing task prioritization. Please analyze this task and provide a JSON response.";

pub fn build_request(
    task: &Task,
    base: &RankedResult,
    mode: &str,
    user_profile: &str,
    today: NaiveDate,
) -> AdvisoryRequest {
    let (due_date, bucket) = match &task.due {
        Some(due) => (
            due.string.clone().unwrap_or_else(|| due.date.to_string()),
            Some(due_bucket(due, today).label().to_string()),
        ),
        None => ("No due date".to_string(), None),
    };

    AdvisoryRequest {
        task: TaskPayload {
            content: task.content.clone(),
            priority: task.priority,
            due_date,
            due_bucket: bucket,
            labels: task.labels.clone(),
            id: task.id.clone(),
        },
        context: ContextPayload {
            mode: mode.to_string(),
            user_profile: user_profile.to_string(),
            base_score: base.score,
            base_explanation: base.explanation.clone(),
        },
        request: RequestFlags::default(),
    }
}

pub fn render_prompt(request: &AdvisoryRequest) -> String {
    let data = serde_json::to_string_pretty(request).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{}\n\nINPUT DATA:\n{}\n\nCurrent mode: {}\n\n{}",
        PROMPT_PREAMBLE, data, request.context.mode, RERANK_INSTRUCTIONS
    )
}

/// Static portion of the prompt, used when estimating cost before rendering
pub fn prompt_template() -> String {
    format!("{}\n\nINPUT DATA:\n\n{}", PROMPT_PREAMBLE, RERANK_INSTRUCTIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn base(score: f64, explanation: &str) -> RankedResult {
        RankedResult {
            task_id: "test_123".to_string(),
            score,
            explanation: explanation.to_string(),
            components: BTreeMap::new(),
            raw_components: BTreeMap::new(),
            source: RankingSource::Base,
            base_score: score,
            base_explanation: explanation.to_string(),
            advisory: None,
        }
    }

    #[test]
    fn test_prompt_embeds_valid_json_block() {
        let mut task = Task::new("test_123", "URGENT: Fix critical bug");
        task.priority = Some(1);
        task.labels = vec!["work".to_string(), "urgent".to_string()];
        let today = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        let mut due = Due::on(today);
        due.string = Some("today".to_string());
        task.due = Some(due);

        let request = build_request(&task, &base(0.85, "high priority task"), "work", "Engineer", today);
        let prompt = render_prompt(&request);

        assert!(prompt.contains("INPUT DATA:"));
        assert!(prompt.contains("REQUIRED JSON RESPONSE FORMAT:"));

        let start = prompt.find("INPUT DATA:\n").unwrap() + "INPUT DATA:\n".len();
        let end = prompt.find("\n\nCurrent mode:").unwrap();
        let parsed: AdvisoryRequest = serde_json::from_str(&prompt[start..end]).unwrap();
        assert_eq!(parsed.task.content, "URGENT: Fix critical bug");
        assert_eq!(parsed.task.priority, Some(1));
        assert_eq!(parsed.task.due_date, "today");
        assert_eq!(parsed.task.due_bucket.as_deref(), Some("due today"));
        assert_eq!(parsed.context.mode, "work");
        assert_eq!(parsed.context.base_score, 0.85);
        assert!(parsed.request.suggest_rerank_score);
    }

    #[test]
    fn test_request_without_due_date() {
        let task = Task::new("9", "Read a book");
        let today = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        let request = build_request(&task, &base(0.3, "standard scoring"), "evening", "", today);
        assert_eq!(request.task.due_date, "No due date");
        assert!(request.task.due_bucket.is_none());
    }
}
