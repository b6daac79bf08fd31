//! User-defined rules: deterministic trigger/response pairs.
//!
//! Rules are evaluated on the raw user input before any LLM reasoning.
//! The highest-priority match wins; ties break toward the newest rule.

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// How a rule trigger is matched against user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Input equals the trigger, ignoring surrounding whitespace and case
    Exact,
    /// Input contains the trigger as a case-insensitive substring
    Contains,
    /// Input matches the trigger as a case-insensitive multiline regex
    Regex,
}

/// A single user-defined rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub trigger: String,
    pub trigger_kind: TriggerKind,
    pub response: String,
    #[serde(default)]
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

/// The outcome of a successful rule match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule_id: String,
    pub response: String,
}

impl Rule {
    /// Validate the trigger for the given kind. Invalid regex patterns are
    /// rejected here so they never reach the matcher.
    pub fn validate_trigger(trigger: &str, kind: TriggerKind) -> Result<(), MemoryError> {
        if trigger.trim().is_empty() {
            return Err(MemoryError::InvalidRule("empty trigger".into()));
        }
        if kind == TriggerKind::Regex {
            RegexBuilder::new(trigger)
                .case_insensitive(true)
                .multi_line(true)
                .build()
                .map_err(|e| MemoryError::InvalidRule(format!("invalid regex '{trigger}': {e}")))?;
        }
        Ok(())
    }

    /// Check whether the raw user input matches this rule's trigger.
    pub fn matches(&self, input: &str) -> bool {
        match self.trigger_kind {
            TriggerKind::Exact => {
                input.trim().to_lowercase() == self.trigger.trim().to_lowercase()
            }
            TriggerKind::Contains => input
                .to_lowercase()
                .contains(&self.trigger.to_lowercase()),
            TriggerKind::Regex => RegexBuilder::new(&self.trigger)
                .case_insensitive(true)
                .multi_line(true)
                .build()
                .map(|re| re.is_match(input))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(trigger: &str, kind: TriggerKind) -> Rule {
        Rule {
            id: "rule_1".into(),
            trigger: trigger.into(),
            trigger_kind: kind,
            response: "matched".into(),
            priority: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn exact_ignores_whitespace_and_case() {
        let r = rule("cekrek", TriggerKind::Exact);
        assert!(r.matches("cekrek"));
        assert!(r.matches("  CeKrEk  "));
        assert!(!r.matches("cekrek please"));
    }

    #[test]
    fn contains_is_substring() {
        let r = rule("deploy", TriggerKind::Contains);
        assert!(r.matches("please DEPLOY to staging"));
        assert!(!r.matches("depl oy"));
    }

    #[test]
    fn regex_is_case_insensitive_multiline() {
        let r = rule(r"^status:\s*red$", TriggerKind::Regex);
        assert!(r.matches("everything fine\nSTATUS: red"));
        assert!(!r.matches("status is red"));
    }

    #[test]
    fn invalid_regex_rejected_at_validation() {
        let err = Rule::validate_trigger("([unclosed", TriggerKind::Regex).unwrap_err();
        assert!(err.to_string().contains("invalid regex"));
        // Exact and contains accept the same string
        assert!(Rule::validate_trigger("([unclosed", TriggerKind::Contains).is_ok());
    }

    #[test]
    fn empty_trigger_rejected() {
        assert!(Rule::validate_trigger("   ", TriggerKind::Exact).is_err());
    }
}
