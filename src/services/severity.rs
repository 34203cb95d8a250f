//! Severity classification from heterogeneous analyzer signals.
//!
//! Two total functions: keyword classification over free text and threshold
//! classification over CVSS-like scores. Both are total: unrecognized
//! input maps to `low`, never an error. The keyword tables are a config
//! artifact so misclassifications can be corrected without code changes.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::models::project::RiskLevel;

/// Keyword tiers driving text classification. Matching is case-insensitive
/// substring search; tiers are checked critical, then high, then medium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityRules {
    pub critical_keywords: Vec<String>,
    pub high_keywords: Vec<String>,
    pub medium_keywords: Vec<String>,
}

impl Default for SeverityRules {
    fn default() -> Self {
        Self {
            critical_keywords: to_vec(&[
                "critical",
                "severe",
                "hardcoded password",
                "remote code execution",
                "rce",
            ]),
            high_keywords: to_vec(&[
                "high",
                "dangerous",
                "exploit",
                "buffer overflow",
                "sql injection",
                "authentication bypass",
                "privilege escalation",
                "backdoor",
                "malware",
            ]),
            medium_keywords: to_vec(&[
                "medium",
                "warning",
                "vulnerable",
                "weak",
                "insecure",
                "deprecated",
                "outdated",
                "misconfiguration",
            ]),
        }
    }
}

fn to_vec(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl SeverityRules {
    /// Load rule overrides from a JSON file; falls back to the defaults if
    /// the file is absent or malformed (a broken override must not take the
    /// worker down).
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(rules) => rules,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Invalid severity rules file, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Severity rules file unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Classify free text into a risk level. First matching tier wins.
    pub fn classify(&self, text: &str) -> RiskLevel {
        let lower = text.to_lowercase();
        if self.critical_keywords.iter().any(|k| lower.contains(k.as_str())) {
            RiskLevel::Critical
        } else if self.high_keywords.iter().any(|k| lower.contains(k.as_str())) {
            RiskLevel::High
        } else if self.medium_keywords.iter().any(|k| lower.contains(k.as_str())) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

static DEFAULT_RULES: LazyLock<SeverityRules> = LazyLock::new(SeverityRules::default);

/// Classify with the default keyword tables.
pub fn classify(text: &str) -> RiskLevel {
    DEFAULT_RULES.classify(text)
}

/// Map a CVSS-like 0-10 score to a risk level.
pub fn score_to_level(score: f64) -> RiskLevel {
    if score >= 9.0 {
        RiskLevel::Critical
    } else if score >= 7.0 {
        RiskLevel::High
    } else if score >= 4.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Normalize a free-form severity label from a CSV column. Numeric labels
/// map via their rough CVSS band; unknown labels land on `medium` because a
/// tool that bothered to emit a severity column meant something by it.
pub fn normalize_label(label: &str) -> RiskLevel {
    match label.trim().to_lowercase().as_str() {
        "critical" | "crit" | "9" | "10" => RiskLevel::Critical,
        "high" | "h" | "7" | "8" => RiskLevel::High,
        "medium" | "med" | "m" | "5" | "6" => RiskLevel::Medium,
        "low" | "l" | "1" | "2" | "3" | "4" => RiskLevel::Low,
        _ => RiskLevel::Medium,
    }
}
