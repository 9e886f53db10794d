//! Pre-filters applied to the candidate set before scoring

use crate::types::*;
use tracing::warn;

/// Pluggable pre-filter
pub trait TaskFilter: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, task: &Task) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelTerm {
    label: String,
    negated: bool,
}

/// Label query in the task manager's syntax: `@work & !@today | @urgent`.
///
/// `|` separates alternatives; each alternative is an `&` conjunction of
/// `@label` terms, optionally negated with `!`. Labels compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelQuery {
    source: String,
    alternatives: Vec<Vec<LabelTerm>>,
}

impl LabelQuery {
    pub fn parse(query: &str) -> Result<Self, String> {
        let mut alternatives = Vec::new();

        for alternative in query.split('|') {
            let mut terms = Vec::new();
            for raw in alternative.split('&') {
                let mut term = raw.trim();
                let negated = term.starts_with('!');
                if negated {
                    term = term[1..].trim_start();
                }
                let label = term
                    .strip_prefix('@')
                    .ok_or_else(|| format!("expected '@label' in '{}', found '{}'", query, raw.trim()))?;
                if label.is_empty() || label.contains(char::is_whitespace) {
                    return Err(format!("invalid label '{}' in '{}'", label, query));
                }
                terms.push(LabelTerm {
                    label: label.to_ascii_lowercase(),
                    negated,
                });
            }
            alternatives.push(terms);
        }

        Ok(Self {
            source: query.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.alternatives.iter().any(|terms| {
            terms
                .iter()
                .all(|term| task.has_label(&term.label) != term.negated)
        })
    }
}

/// Keeps tasks matching any of a mode's label queries
#[derive(Debug, Clone)]
pub struct LabelQueryFilter {
    name: String,
    queries: Vec<LabelQuery>,
}

impl LabelQueryFilter {
    /// Build from raw queries; unparseable ones are dropped with a warning.
    /// Returns `None` when nothing usable remains.
    pub fn from_queries(name: impl Into<String>, queries: &[String]) -> Option<Self> {
        let parsed: Vec<LabelQuery> = queries
            .iter()
            .filter_map(|q| match LabelQuery::parse(q) {
                Ok(query) => Some(query),
                Err(e) => {
                    warn!("Ignoring label filter: {}", e);
                    None
                }
            })
            .collect();

        if parsed.is_empty() {
            None
        } else {
            Some(Self {
                name: name.into(),
                queries: parsed,
            })
        }
    }
}

impl TaskFilter for LabelQueryFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, task: &Task) -> bool {
        self.queries.iter().any(|q| q.matches(task))
    }
}

/// Tasks whose labels are all passive (e.g. bare links) are reference items
pub fn is_passive(task: &Task, passive_labels: &[String]) -> bool {
    !task.labels.is_empty()
        && task
            .labels
            .iter()
            .all(|l| passive_labels.iter().any(|p| p.eq_ignore_ascii_case(l)))
}
