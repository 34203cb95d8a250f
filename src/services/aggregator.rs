//! Report aggregation over one analyzer log directory.
//!
//! Enumerates every known artifact category, dispatches each file to the
//! matching parser, and merges the results with summary counters. The
//! directory contents are the sole input; re-running over the same
//! directory yields the same record set. No severity logic lives here.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;
use walkdir::WalkDir;

use crate::models::cve::NewCveFinding;
use crate::models::finding::NewFinding;
use crate::models::osint::NewOsintResult;
use crate::models::project::RiskLevel;
use crate::parsers::{csv_report, grep_log, json_report, module_report, ParsedArtifact};
use crate::services::severity::SeverityRules;

/// Merged output of one aggregation pass.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    pub findings: Vec<NewFinding>,
    pub cves: Vec<NewCveFinding>,
    pub osint: Vec<NewOsintResult>,
    pub summary: serde_json::Map<String, serde_json::Value>,
    pub parse_errors: Vec<String>,
}

impl AnalysisReport {
    pub fn count_by_severity(&self, level: RiskLevel) -> usize {
        self.findings.iter().filter(|f| f.severity == level).count()
            + self
                .cves
                .iter()
                .filter(|c| c.severity_level == level)
                .count()
    }

    /// All severity levels across findings and CVE matches, for risk
    /// aggregation.
    pub fn severity_levels(&self) -> impl Iterator<Item = RiskLevel> + '_ {
        self.findings
            .iter()
            .map(|f| f.severity)
            .chain(self.cves.iter().map(|c| c.severity_level))
    }
}

/// Name of the grep-able log written by the analyzer's `-g` flag.
const GREP_LOG: &str = "fw_grep.log";

/// Module reports the analyzer reliably produces, parsed explicitly before
/// the catch-all sweep.
const WELL_KNOWN_REPORTS: &[&str] = &[
    "S115_usermode_emulator.txt",
    "S116_qemu_version_check.txt",
    "S120_cve_search.txt",
    "S25_kernel_check.txt",
    "S40_weak_perm_check.txt",
];

/// SBOM export filenames, in preference order; only the first hit is used.
const SBOM_FILES: &[&str] = &["sbom.json", "f15_sbom.json", "cyclonedx_sbom.json"];

/// Module-prefixed artifacts picked up by the catch-all sweep: P (pre), S
/// (static), F (finishing), L (live) modules.
static MODULE_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[PSFL]\d+").expect("static regex"));

/// Walk one log directory and merge every parseable artifact.
pub fn aggregate(rules: &SeverityRules, log_dir: &Path) -> AnalysisReport {
    let mut merged = ParsedArtifact::default();
    let mut processed: HashSet<PathBuf> = HashSet::new();

    // Grep-able log.
    let grep_path = log_dir.join(GREP_LOG);
    if grep_path.is_file() {
        match fs::read_to_string(&grep_path) {
            Ok(content) => merged.merge(grep_log::parse(rules, &content)),
            Err(e) => merged.notes.push(format!("{GREP_LOG}: {e}")),
        }
        processed.insert(grep_path);
    }

    // CSV tables, anywhere under the log directory.
    for path in sorted_files(log_dir, true) {
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            match fs::read(&path) {
                Ok(data) => merged.merge(csv_report::parse(&file_name(&path), &data)),
                Err(e) => merged.notes.push(format!("{}: {e}", path.display())),
            }
            processed.insert(path);
        }
    }

    // Well-known module reports.
    for name in WELL_KNOWN_REPORTS {
        let path = log_dir.join(name);
        if path.is_file() && processed.insert(path.clone()) {
            parse_module_file(rules, &path, &mut merged);
        }
    }

    // Catch-all sweep for remaining module-prefixed artifacts.
    for path in sorted_files(log_dir, false) {
        if processed.contains(&path) {
            continue;
        }
        if MODULE_FILE_RE.is_match(&file_name(&path)) {
            parse_module_file(rules, &path, &mut merged);
            processed.insert(path);
        }
    }

    // Web report JSON bundles.
    let web_dir = log_dir.join("html-report");
    if web_dir.is_dir() {
        for path in sorted_files(&web_dir, false) {
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
                match fs::read(&path) {
                    Ok(data) => merged.merge(json_report::parse_web_report(&file_name(&path), &data)),
                    Err(e) => merged.notes.push(format!("{}: {e}", path.display())),
                }
            }
        }
    }

    // SBOM export, first match only.
    for name in SBOM_FILES {
        let path = log_dir.join(name);
        if !path.is_file() {
            continue;
        }
        match fs::read(&path) {
            Ok(data) => merged.merge(json_report::parse_sbom(name, &data)),
            Err(e) => merged.notes.push(format!("{name}: {e}")),
        }
        break;
    }

    into_report(merged, log_dir)
}

fn parse_module_file(rules: &SeverityRules, path: &Path, merged: &mut ParsedArtifact) {
    match fs::read_to_string(path) {
        Ok(content) => {
            let mut artifact = module_report::parse(rules, &file_name(path), &content);
            let path_str = path.display().to_string();
            for finding in &mut artifact.findings {
                if finding.file_path.is_none() {
                    finding.file_path = Some(path_str.clone());
                }
            }
            merged.merge(artifact);
        }
        Err(e) => merged.notes.push(format!("{}: {e}", path.display())),
    }
}

/// Files under `dir`, sorted by path for deterministic output.
fn sorted_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    WalkDir::new(dir)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn into_report(merged: ParsedArtifact, log_dir: &Path) -> AnalysisReport {
    let mut report = AnalysisReport {
        findings: merged.findings,
        cves: merged.cves,
        osint: Vec::new(),
        summary: merged.summary,
        parse_errors: merged.notes,
    };

    report.summary.insert(
        "total_findings".to_string(),
        json!(report.findings.len()),
    );
    report
        .summary
        .insert("total_cves".to_string(), json!(report.cves.len()));
    report
        .summary
        .insert("total_osint".to_string(), json!(report.osint.len()));
    for (key, level) in [
        ("critical_count", RiskLevel::Critical),
        ("high_count", RiskLevel::High),
        ("medium_count", RiskLevel::Medium),
        ("low_count", RiskLevel::Low),
    ] {
        report
            .summary
            .insert(key.to_string(), json!(report.count_by_severity(level)));
    }
    report.summary.insert(
        "log_directory".to_string(),
        json!(log_dir.display().to_string()),
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn aggregates_across_artifact_categories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        write(dir, "fw_grep.log", "[2024-01-01] CVE-2023-1234 exploit found in httpd\n");
        write(
            dir,
            "cve_report.csv",
            "id,software,version,score,description\nCVE-2022-9999,busybox,1.30,9.8,heap overflow\n",
        );
        write(dir, "S40_weak_perm_check.txt", "weak permission FOUND on /etc/shadow\n");
        write(dir, "sbom.json", r#"{"components": [{"name": "zlib", "version": "1.2.8"}]}"#);

        let report = aggregate(&SeverityRules::default(), dir);

        // grep finding + perm finding + sbom component
        assert_eq!(report.findings.len(), 3);
        // grep CVE + csv CVE
        assert_eq!(report.cves.len(), 2);
        assert_eq!(report.summary["total_findings"], 3);
        assert_eq!(report.summary["total_cves"], 2);
        assert_eq!(report.summary["critical_count"], 1);
        assert!(report.parse_errors.is_empty());
    }

    #[test]
    fn corrupt_artifact_is_skipped_with_note() {
        // One corrupt CSV among valid ones must not abort the run.
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        write(
            dir,
            "cve_a.csv",
            "id,software,version,score\nCVE-2020-0001,httpd,2.4,7.5\n",
        );
        write(dir, "cve_b.csv", "id,software,version,score\n\"unterminated,quote\n");
        write(
            dir,
            "cve_c.csv",
            "id,software,version,score\nCVE-2020-0002,sshd,7.4,5.0\n",
        );

        let report = aggregate(&SeverityRules::default(), dir);
        assert_eq!(report.cves.len(), 2);
        assert!(!report.parse_errors.is_empty());
    }

    #[test]
    fn rerun_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(dir, "fw_grep.log", "vulnerability: weak auth in admin panel\n");
        write(dir, "L15_nmap.txt", "23/tcp open telnet\n");

        let a = aggregate(&SeverityRules::default(), dir);
        let b = aggregate(&SeverityRules::default(), dir);
        assert_eq!(a.findings, b.findings);
        assert_eq!(a.cves, b.cves);
    }

    #[test]
    fn empty_directory_yields_empty_report() {
        let tmp = tempfile::tempdir().unwrap();
        let report = aggregate(&SeverityRules::default(), tmp.path());
        assert!(report.findings.is_empty());
        assert!(report.cves.is_empty());
        assert_eq!(report.summary["total_findings"], 0);
    }

    #[test]
    fn web_report_directory_is_scanned() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::create_dir(dir.join("html-report")).unwrap();
        write(
            dir,
            "html-report/data.json",
            r#"{"findings": [{"title": "XSS in login page", "severity": "medium"}]}"#,
        );

        let report = aggregate(&SeverityRules::default(), dir);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].title, "XSS in login page");
    }

    #[test]
    fn only_first_sbom_file_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write(dir, "sbom.json", r#"{"components": [{"name": "a"}]}"#);
        write(dir, "f15_sbom.json", r#"{"components": [{"name": "b"}]}"#);

        let report = aggregate(&SeverityRules::default(), dir);
        let sbom_findings: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.finding_type == "software_component")
            .collect();
        assert_eq!(sbom_findings.len(), 1);
        assert_eq!(sbom_findings[0].title, "Software Component: a");
    }
}
