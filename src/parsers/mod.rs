//! Artifact parsers for normalizing external analyzer output.
//!
//! The analyzer writes dozens of loosely structured files into its log
//! directory: a grep-able log, CSV tables, per-module text reports, and
//! JSON bundles. Each submodule here is a set of pure functions
//! `(artifact, content) -> ParsedArtifact` with no shared mutable state, so
//! every sub-parser is unit-testable in isolation. Dispatch is by artifact
//! shape and filename, never by content sniffing.

pub mod csv_report;
pub mod grep_log;
pub mod json_report;
pub mod module_report;

use std::sync::LazyLock;

use regex::Regex;

use crate::models::cve::NewCveFinding;
use crate::models::finding::NewFinding;

/// Records extracted from a single artifact, plus any recoverable parse
/// notes. A malformed artifact never aborts the run; it contributes notes
/// instead of records.
#[derive(Debug, Default)]
pub struct ParsedArtifact {
    pub findings: Vec<NewFinding>,
    pub cves: Vec<NewCveFinding>,
    /// Structured side data keyed for the job summary (open ports, SBOM
    /// payloads, emulation facts).
    pub summary: serde_json::Map<String, serde_json::Value>,
    pub notes: Vec<String>,
}

impl ParsedArtifact {
    /// Fold another artifact's output into this one.
    pub fn merge(&mut self, other: ParsedArtifact) {
        self.findings.extend(other.findings);
        self.cves.extend(other.cves);
        self.summary.extend(other.summary);
        self.notes.extend(other.notes);
    }
}

/// CVE identifiers as the analyzer prints them.
pub static CVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CVE-\d{4}-\d+").expect("static regex"));

/// CWE identifiers in static-analysis output.
pub static CWE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CWE-\d+").expect("static regex"));

/// Derive a finding title from a raw log line: drop a leading bracketed
/// timestamp, cap at 100 characters.
pub fn extract_title(line: &str) -> String {
    let mut line = line.trim();
    if let Some(idx) = line.find(']') {
        if line.starts_with('[') && idx < 30 {
            line = line[idx + 1..].trim();
        }
    }
    truncate(line, 100)
}

/// Cap a string at `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Best-effort file location extraction: the first whitespace-separated
/// token that looks like a path.
pub fn extract_location(line: &str) -> Option<String> {
    line.split_whitespace()
        .find(|word| word.contains('/') && (word.contains('.') || word.starts_with('/')))
        .map(|word| word.to_string())
}
