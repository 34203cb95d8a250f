//! Parser for the analyzer's CSV tables.
//!
//! Column semantics depend on the filename: `*cve*` files carry CVE matches
//! `[id, software, version, score, description]`; `*vuln*` / `*finding*`
//! files carry generic findings `[title, description, severity]`. The first
//! row is always a header. Rows that do not fit become notes, never errors.

use serde_json::json;

use super::{ParsedArtifact, CVE_RE};
use crate::models::cve::NewCveFinding;
use crate::models::finding::NewFinding;
use crate::services::severity;

/// Dispatch a CSV artifact by filename. Files matching neither naming
/// convention produce an empty result. Severity comes from the table's own
/// score or label columns, so no keyword rules are involved here.
pub fn parse(filename: &str, data: &[u8]) -> ParsedArtifact {
    let lower = filename.to_lowercase();
    if lower.contains("cve") {
        parse_cve_table(filename, data)
    } else if lower.contains("vuln") || lower.contains("finding") {
        parse_finding_table(filename, data)
    } else {
        ParsedArtifact::default()
    }
}

fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data)
}

fn parse_cve_table(filename: &str, data: &[u8]) -> ParsedArtifact {
    let mut out = ParsedArtifact::default();

    for (i, row) in reader(data).records().enumerate() {
        let record = match row {
            Ok(record) => record,
            Err(e) => {
                out.notes.push(format!("{filename}: row {i}: {e}"));
                continue;
            }
        };
        if record.len() < 4 {
            if !record.iter().all(|f| f.trim().is_empty()) {
                out.notes
                    .push(format!("{filename}: row {i}: expected 4+ columns"));
            }
            continue;
        }

        let cve_id = record[0].trim().to_string();
        if !CVE_RE.is_match(&cve_id) {
            out.notes
                .push(format!("{filename}: row {i}: not a CVE id: {cve_id:?}"));
            continue;
        }

        let score = record[3].trim().parse::<f64>().unwrap_or(0.0);
        let mut cve = NewCveFinding::from_score(
            cve_id,
            record[1].trim().to_string(),
            record[2].trim().to_string(),
            score,
        );
        if let Some(desc) = record.get(4) {
            cve.description = desc.trim().to_string();
        }
        out.cves.push(cve);
    }

    out
}

fn parse_finding_table(filename: &str, data: &[u8]) -> ParsedArtifact {
    let mut out = ParsedArtifact::default();

    for (i, row) in reader(data).records().enumerate() {
        let record = match row {
            Ok(record) => record,
            Err(e) => {
                out.notes.push(format!("{filename}: row {i}: {e}"));
                continue;
            }
        };
        if record.len() < 3 {
            if !record.iter().all(|f| f.trim().is_empty()) {
                out.notes
                    .push(format!("{filename}: row {i}: expected 3+ columns"));
            }
            continue;
        }

        let mut finding = NewFinding::new(
            "vulnerability",
            record[0].trim(),
            severity::normalize_label(record[2].trim()),
        );
        finding.description = record[1].trim().to_string();
        finding.metadata = json!({"source": "csv_report", "csv_file": filename});
        out.findings.push(finding);
    }

    out
}
