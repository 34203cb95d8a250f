//! Parser for the grep-able log the analyzer emits with its `-g` flag.
//!
//! One flagged line per observation. A line is promoted to a finding when it
//! carries one of a fixed keyword set; a CVE identifier on a flagged line
//! additionally yields a CVE record.

use serde_json::json;

use super::{extract_location, extract_title, ParsedArtifact, CVE_RE};
use crate::models::cve::NewCveFinding;
use crate::models::finding::NewFinding;
use crate::services::severity::SeverityRules;

const TRIGGER_KEYWORDS: &[&str] = &["vulnerability", "cve-", "exploit"];

/// Scan the grep log content line by line.
pub fn parse(rules: &SeverityRules, content: &str) -> ParsedArtifact {
    let mut out = ParsedArtifact::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let lower = line.to_lowercase();
        if !TRIGGER_KEYWORDS.iter().any(|k| lower.contains(k)) {
            continue;
        }

        let mut finding = NewFinding::new("security", extract_title(line), rules.classify(line));
        finding.description = line.to_string();
        finding.file_path = extract_location(line);
        finding.metadata = json!({"source": "grep_log", "raw_line": line});
        out.findings.push(finding);

        if let Some(m) = CVE_RE.find(line) {
            out.cves.push(NewCveFinding {
                cve_id: m.as_str().to_string(),
                software_name: String::new(),
                software_version: String::new(),
                description: line.to_string(),
                severity_score: 0.0,
                severity_level: rules.classify(line),
                references: Vec::new(),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::RiskLevel;

    fn rules() -> SeverityRules {
        SeverityRules::default()
    }

    #[test]
    fn flagged_line_yields_finding_and_cve() {
        let content = "[2024-01-01] CVE-2023-1234 exploit found in httpd\n";
        let out = parse(&rules(), content);

        assert_eq!(out.findings.len(), 1);
        let f = &out.findings[0];
        assert_eq!(f.finding_type, "security");
        assert_eq!(f.severity, RiskLevel::High);
        assert_eq!(f.title, "CVE-2023-1234 exploit found in httpd");

        assert_eq!(out.cves.len(), 1);
        assert_eq!(out.cves[0].cve_id, "CVE-2023-1234");
    }

    #[test]
    fn unflagged_lines_are_ignored() {
        let content = "starting module S10\nfilesystem mounted read-only\n";
        let out = parse(&rules(), content);
        assert!(out.findings.is_empty());
        assert!(out.cves.is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let out = parse(&rules(), "\n\n   \n");
        assert!(out.findings.is_empty());
    }

    #[test]
    fn vulnerability_keyword_without_cve() {
        let content = "vulnerability in web interface allows weak auth\n";
        let out = parse(&rules(), content);
        assert_eq!(out.findings.len(), 1);
        assert!(out.cves.is_empty());
        assert_eq!(out.findings[0].severity, RiskLevel::Medium);
    }

    #[test]
    fn parsing_is_idempotent() {
        // Same input, same field values, no wall-clock dependence.
        let content = "[ts] vulnerability: exploit in /bin/sh detected\n";
        let a = parse(&rules(), content);
        let b = parse(&rules(), content);
        assert_eq!(a.findings, b.findings);
        assert_eq!(a.cves, b.cves);
    }
}
