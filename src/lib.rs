//! focusrank - Task focus ranking
//!
//! Picks the few tasks worth promoting into a "Today" list:
//! - Composite scoring over priority, due date, age and label affinity
//! - Mode-aware weights and label preferences (work/personal/weekend/evening)
//! - Optional LLM advisory reranking under cost and confidence limits
//! - Deterministic fallback to the base ranking on any advisory failure

pub mod types;
pub mod error;
pub mod config;
pub mod mode;
pub mod filters;
pub mod scoring;
pub mod composite;
pub mod ranking;
pub mod cost;
pub mod prompts;
pub mod parsing;
pub mod advisor;
pub mod http_advisor;
pub mod reranker;
pub mod engine;
pub mod server;

pub use types::*;
pub use error::{RankError, RankResult};
pub use config::{GptRerankingConfig, PriceTable, RankingConfig};
pub use filters::{LabelQuery, LabelQueryFilter, TaskFilter};
pub use composite::CompositeScorer;
pub use ranking::{RankOutcome, RankingEngine};
pub use cost::CostTracker;
pub use parsing::{ParserChain, VerdictParser};
pub use advisor::{AdvisoryReply, MockAdvisor, RankingAdvisor};
pub use http_advisor::OpenAiAdvisor;
pub use reranker::{LlmReranker, RerankContext, RerankOutcome};
pub use engine::{FocusEngine, RankRequest, RankResponse, SharedFocusEngine};
