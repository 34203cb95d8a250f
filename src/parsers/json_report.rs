//! Parsers for JSON bundles: web-report exports and SBOM files.
//!
//! Both are parsed as generic objects rather than typed schemas; the
//! analyzer's JSON shape is its own moving target, so only the fields we
//! map are touched and the raw bundle is retained for traceability.

use serde_json::{json, Value};

use super::ParsedArtifact;
use crate::models::finding::NewFinding;
use crate::models::project::RiskLevel;

/// Parse a web-report JSON bundle. A top-level `findings` array maps each
/// element's fields directly onto a finding. Malformed JSON becomes a note.
pub fn parse_web_report(filename: &str, data: &[u8]) -> ParsedArtifact {
    let mut out = ParsedArtifact::default();

    let root: Value = match serde_json::from_slice(data) {
        Ok(value) => value,
        Err(e) => {
            out.notes.push(format!("{filename}: invalid JSON: {e}"));
            return out;
        }
    };

    let Some(entries) = root.get("findings").and_then(Value::as_array) else {
        return out;
    };

    for entry in entries {
        let mut f = NewFinding::new(
            "security_issue",
            entry.get("title").and_then(Value::as_str).unwrap_or(""),
            entry
                .get("severity")
                .and_then(Value::as_str)
                .map(parse_severity_field)
                .unwrap_or(RiskLevel::Low),
        );
        if let Some(desc) = entry.get("description").and_then(Value::as_str) {
            f.description = desc.to_string();
        }
        f.file_path = entry
            .get("file_path")
            .and_then(Value::as_str)
            .map(str::to_string);
        f.content = entry
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string);
        f.metadata = json!({"source": "web_report", "report_file": filename});
        out.findings.push(f);
    }

    out
}

/// Parse an SBOM export: every named component becomes one low-severity
/// software-component finding, and the whole bundle lands in the summary.
pub fn parse_sbom(filename: &str, data: &[u8]) -> ParsedArtifact {
    let mut out = ParsedArtifact::default();

    let root: Value = match serde_json::from_slice(data) {
        Ok(value) => value,
        Err(e) => {
            out.notes.push(format!("{filename}: invalid JSON: {e}"));
            return out;
        }
    };

    if let Some(components) = root.get("components").and_then(Value::as_array) {
        for component in components {
            let Some(name) = component.get("name").and_then(Value::as_str) else {
                continue;
            };
            let version = component
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or("");

            let mut f = NewFinding::new(
                "software_component",
                format!("Software Component: {name}"),
                RiskLevel::Low,
            );
            f.description = format!("Component: {name}, Version: {version}");
            f.metadata = json!({
                "source": "sbom",
                "component": name,
                "version": version,
            });
            out.findings.push(f);
        }
    }

    out.summary.insert("sbom_data".to_string(), root);
    out
}

/// A web report's severity field is free text from the analyzer; anything
/// unrecognized is `low`, never an error.
fn parse_severity_field(raw: &str) -> RiskLevel {
    match raw.to_lowercase().as_str() {
        "critical" => RiskLevel::Critical,
        "high" => RiskLevel::High,
        "medium" => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_report_findings_are_mapped() {
        let data = br#"{
            "findings": [
                {
                    "title": "Telnet enabled",
                    "description": "telnetd listening",
                    "severity": "high",
                    "file_path": "/etc/init.d/telnetd",
                    "content": "telnetd -l /bin/sh"
                },
                {"title": "Info banner", "severity": "bogus"}
            ]
        }"#;
        let out = parse_web_report("report.json", data);

        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.findings[0].title, "Telnet enabled");
        assert_eq!(out.findings[0].severity, RiskLevel::High);
        assert_eq!(
            out.findings[0].file_path.as_deref(),
            Some("/etc/init.d/telnetd")
        );
        // Unrecognized severity defaults to low.
        assert_eq!(out.findings[1].severity, RiskLevel::Low);
    }

    #[test]
    fn web_report_without_findings_array() {
        let out = parse_web_report("report.json", br#"{"meta": {}}"#);
        assert!(out.findings.is_empty());
        assert!(out.notes.is_empty());
    }

    #[test]
    fn malformed_json_becomes_note() {
        let out = parse_web_report("report.json", b"{truncated");
        assert!(out.findings.is_empty());
        assert_eq!(out.notes.len(), 1);
        assert!(out.notes[0].contains("invalid JSON"));
    }

    #[test]
    fn sbom_components_become_findings() {
        let data = br#"{
            "bomFormat": "CycloneDX",
            "components": [
                {"name": "busybox", "version": "1.30.1"},
                {"name": "openssl", "version": "1.0.2k"},
                {"version": "no-name-skipped"}
            ]
        }"#;
        let out = parse_sbom("sbom.json", data);

        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.findings[0].title, "Software Component: busybox");
        assert_eq!(out.findings[0].severity, RiskLevel::Low);
        assert_eq!(out.findings[0].metadata["version"], "1.30.1");
        // Raw bundle is retained for traceability.
        assert_eq!(out.summary["sbom_data"]["bomFormat"], "CycloneDX");
    }
}
