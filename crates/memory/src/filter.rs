//! Memory filter: classifies a completed interaction before storage.
//!
//! Classification is purely deterministic: surface patterns and counts,
//! never an LLM call. The filter decides whether an interaction becomes a
//! rule, a fact, an experience, or nothing at all, and extracts the
//! structured fields for rules and facts.
//!
//! Patterns cover both English and Indonesian phrasings.

use regex::{Regex, RegexBuilder};

/// What kind of memory an interaction should become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryClass {
    /// Permanent behavioral instruction
    Rule,
    /// Long-term user information
    Fact,
    /// Episodic task memory
    Experience,
    /// Should not be stored
    Useless,
}

/// Extracted trigger/response pair for a rule-defining utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDraft {
    pub trigger: String,
    pub response: String,
}

/// Extracted category/value pair for a fact-stating utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactDraft {
    pub category: String,
    pub value: String,
}

/// Minimum trimmed input length worth remembering.
const MIN_INPUT_LEN: usize = 3;

const USELESS_PATTERNS: &[&str] = &[
    // Greetings
    r"^(halo|hai|hello|hi|hey|selamat pagi|selamat siang|selamat malam)\b",
    // Thanks
    r"^(terima kasih|thanks|thank you|makasih)\b",
    // Short acknowledgements
    r"^(ok|oke|baik|ya|yup|sure|good|nice|cool)\s*$",
    // Wellbeing smalltalk
    r"(apa kabar|how are you|what's up)",
];

const RULE_PATTERNS: &[&str] = &[
    r"jika\s+.*\s+(maka|lalu|jawab|respon|balas)",
    r"kalau\s+.*\s+(maka|lalu|jawab|respon|balas)",
    r"if\s+.*\s+(then|respond|answer|say)",
    r"when\s+.*\s+(then|respond|answer|say)",
    r"selalu\s+(jawab|respon|balas)",
    r"always\s+(respond|answer|say)",
];

const FACT_PATTERNS: &[&str] = &[
    r"(nama\s+saya|my\s+name\s+is)\s+\w+",
    r"saya\s+(suka|tidak\s+suka|lebih\s+suka)",
    r"i\s+(like|dislike|prefer|love|hate)\s+",
    r"saya\s+(tinggal|bekerja)\s+di",
    r"i\s+(live|work)\s+(in|at)\s+",
];

/// Signals that the assistant produced a concrete solution artifact.
const SOLUTION_INDICATORS: &[&str] = &[
    "berhasil", "sukses", "selesai", "completed", "success", "solusi", "solution",
];

pub struct MemoryFilter {
    useless: Vec<Regex>,
    rules: Vec<Regex>,
    facts: Vec<Regex>,
    rule_extract_id: Regex,
    rule_extract_en: Regex,
    fact_name: Regex,
    fact_preference_id: Regex,
    fact_preference_en: Regex,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("static pattern must compile")
        })
        .collect()
}

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("static pattern must compile")
}

impl MemoryFilter {
    pub fn new() -> Self {
        Self {
            useless: compile(USELESS_PATTERNS),
            rules: compile(RULE_PATTERNS),
            facts: compile(FACT_PATTERNS),
            rule_extract_id: ci(
                r#"(?:jika|kalau)\s+(?:saya\s+)?(?:bilang\s+)?['"]?([^'"]+?)['"]?\s*,?\s*(?:maka\s+)?(?:jawab|respon|balas)\s+['"]?([^'"]+)['"]?"#,
            ),
            rule_extract_en: ci(
                r#"(?:if|when)\s+(?:i\s+)?(?:say\s+)?['"]?([^'"]+?)['"]?\s*,?\s*(?:then\s+)?(?:respond|answer|say)\s+['"]?([^'"]+)['"]?"#,
            ),
            fact_name: ci(r"(?:nama\s+saya|my\s+name\s+is)\s+(\w+)"),
            fact_preference_id: ci(r"saya\s+(?:suka|tidak\s+suka|lebih\s+suka)\s+(.+)"),
            fact_preference_en: ci(r"i\s+(?:like|dislike|prefer|love|hate)\s+(.+)"),
        }
    }

    /// Classify one completed interaction.
    ///
    /// `actions_count` is the number of tool calls the task executed;
    /// `success` is the task-level outcome.
    pub fn classify(
        &self,
        user_input: &str,
        assistant_text: &str,
        success: bool,
        actions_count: usize,
    ) -> MemoryClass {
        let trimmed = user_input.trim();

        // 1. Too short or chatter
        if trimmed.len() < MIN_INPUT_LEN || self.is_useless(trimmed) {
            return MemoryClass::Useless;
        }

        // 2. Rule definition
        if self.rules.iter().any(|re| re.is_match(trimmed)) {
            return MemoryClass::Rule;
        }

        // 3. Fact about the user
        if self.facts.iter().any(|re| re.is_match(trimmed)) {
            return MemoryClass::Fact;
        }

        // 4. Valuable experience: used tools, failed (worth learning from),
        //    or produced a concrete solution artifact
        if actions_count >= 1 || !success || self.has_solution_artifact(assistant_text) {
            return MemoryClass::Experience;
        }

        MemoryClass::Useless
    }

    fn is_useless(&self, input: &str) -> bool {
        self.useless.iter().any(|re| re.is_match(input))
    }

    fn has_solution_artifact(&self, assistant_text: &str) -> bool {
        if assistant_text.contains("```") {
            return true;
        }
        let lower = assistant_text.to_lowercase();
        SOLUTION_INDICATORS.iter().any(|s| lower.contains(s))
    }

    /// Extract (trigger, response) from a rule-defining utterance.
    /// Returns None when the utterance does not parse as a rule template.
    pub fn extract_rule(&self, user_input: &str) -> Option<RuleDraft> {
        for re in [&self.rule_extract_id, &self.rule_extract_en] {
            if let Some(caps) = re.captures(user_input) {
                let trigger = caps.get(1)?.as_str().trim().to_string();
                let response = caps.get(2)?.as_str().trim().to_string();
                if !trigger.is_empty() && !response.is_empty() {
                    return Some(RuleDraft { trigger, response });
                }
            }
        }
        None
    }

    /// Extract (category, value) from a fact-stating utterance.
    pub fn extract_fact(&self, user_input: &str) -> Option<FactDraft> {
        if let Some(caps) = self.fact_name.captures(user_input) {
            return Some(FactDraft {
                category: "name".into(),
                value: format!("User's name is {}", caps.get(1)?.as_str()),
            });
        }
        for re in [&self.fact_preference_id, &self.fact_preference_en] {
            if re.is_match(user_input) {
                return Some(FactDraft {
                    category: "preference".into(),
                    value: user_input.trim().to_string(),
                });
            }
        }
        if self.facts.iter().any(|re| re.is_match(user_input)) {
            return Some(FactDraft {
                category: "general".into(),
                value: user_input.trim().to_string(),
            });
        }
        None
    }
}

impl Default for MemoryFilter {
    fn default() -> Self {
        Self::new()
    }
}
