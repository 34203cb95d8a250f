//! Parsers for per-module text reports.
//!
//! The analyzer names each artifact with an internal module id (a letter
//! plus number prefix, e.g. `S120_cve_search.txt`). That naming convention
//! is a black-box contract of the tool, so everything here is table-driven:
//! a prefix dispatch table selects a specialized handler, and a category
//! table maps module names to finding categories. New module types are rows
//! in those tables, not new branches.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use super::{extract_title, ParsedArtifact, CVE_RE, CWE_RE};
use crate::models::cve::NewCveFinding;
use crate::models::finding::NewFinding;
use crate::models::project::RiskLevel;
use crate::services::severity::SeverityRules;

type ModuleHandler = fn(&SeverityRules, &str, &str, &mut ParsedArtifact);

/// Module-id prefix -> specialized handler. Checked in order; the first
/// matching prefix wins. Everything else falls through to the generic
/// line scanner.
static MODULE_DISPATCH: &[(&str, ModuleHandler)] = &[
    ("S115", parse_usermode_emulation),
    ("S120_cwe", parse_cwe_checker),
    ("L10", parse_system_emulation),
    ("L15", parse_network_scan),
    ("L20", parse_snmp_check),
    ("L22", parse_upnp_hnap),
    ("L23", parse_vnc_check),
    ("L25", parse_web_check),
];

/// Module-name substring -> finding category for generic reports.
static CATEGORY_TABLE: &[(&str, &str)] = &[
    ("cve", "CVE Analysis"),
    ("qemu", "Emulation"),
    ("emulator", "Emulation"),
    ("kernel", "Kernel Analysis"),
    ("perm", "Permission Analysis"),
    ("network", "Network Analysis"),
    ("nmap", "Network Analysis"),
    ("web", "Web Analysis"),
    ("http", "Web Analysis"),
    ("crypto", "Cryptographic Analysis"),
];

static PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/(tcp|udp)").expect("static regex"));

/// Ports whose exposure on an embedded device warrants elevated attention.
const HIGH_RISK_PORTS: &[&str] = &[
    "21", "22", "23", "25", "53", "80", "110", "135", "139", "143", "443", "445", "993", "995",
    "1433", "1521", "3306", "3389", "5432", "5900", "6379", "8080", "8443",
];

/// Category label for a module filename, via the lookup table.
pub fn module_category(module_name: &str) -> &'static str {
    let lower = module_name.to_lowercase();
    CATEGORY_TABLE
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, category)| *category)
        .unwrap_or("General")
}

/// Parse one module report, dispatching on the module-id prefix.
pub fn parse(rules: &SeverityRules, module_name: &str, content: &str) -> ParsedArtifact {
    let mut out = ParsedArtifact::default();
    let handler = MODULE_DISPATCH
        .iter()
        .find(|(prefix, _)| module_name.starts_with(prefix))
        .map(|(_, handler)| *handler)
        .unwrap_or(parse_generic);
    handler(rules, module_name, content, &mut out);
    out
}

fn scan_lines<'a>(content: &'a str) -> impl Iterator<Item = &'a str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

fn provenance(source: &str, module: &str) -> serde_json::Value {
    json!({"source": source, "module": module})
}

/// Generic line scanner for modules without a specialized handler.
fn parse_generic(rules: &SeverityRules, module: &str, content: &str, out: &mut ParsedArtifact) {
    let module_is_cve = module.to_lowercase().contains("cve");

    for line in scan_lines(content) {
        if module_is_cve && line.contains("CVE-") {
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
            continue;
        }

        let lower = line.to_lowercase();
        if line.contains("FOUND") || line.contains("DETECTED") {
            let mut f = NewFinding::new(module_category(module), extract_title(line), rules.classify(line));
            f.description = line.to_string();
            f.metadata = json!({"source": "module_report", "module": module, "raw_line": line});
            out.findings.push(f);
        } else if ["password", "secret", "credential", "private key"]
            .iter()
            .any(|k| lower.contains(k))
        {
            let mut f = NewFinding::new("credential_finding", "Potential Credential Found", RiskLevel::Medium);
            f.description = line.to_string();
            f.metadata = provenance("static_analysis", module);
            out.findings.push(f);
        } else if ["binary", "executable", "library"].iter().any(|k| lower.contains(k)) {
            let mut f = NewFinding::new("binary_analysis", "Binary Analysis Result", RiskLevel::Low);
            f.description = line.to_string();
            f.metadata = provenance("static_analysis", module);
            out.findings.push(f);
        }
    }
}

/// S115: user-mode emulation. Version banners observed during emulation.
fn parse_usermode_emulation(
    _rules: &SeverityRules,
    module: &str,
    content: &str,
    out: &mut ParsedArtifact,
) {
    for line in scan_lines(content) {
        if line.to_lowercase().contains("version") {
            let mut f = NewFinding::new(
                "version_detection",
                "Version detected via emulation",
                RiskLevel::Low,
            );
            f.description = line.to_string();
            f.metadata = provenance("emulation", module);
            out.findings.push(f);
        }
    }
}

/// S120: CWE-checker output. One finding per CWE-tagged line.
fn parse_cwe_checker(_rules: &SeverityRules, module: &str, content: &str, out: &mut ParsedArtifact) {
    for line in scan_lines(content) {
        let Some(m) = CWE_RE.find(line) else {
            continue;
        };
        let lower = line.to_lowercase();
        let severity = if lower.contains("critical") {
            RiskLevel::Critical
        } else if lower.contains("high") {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        };
        let mut f = NewFinding::new("cwe_finding", format!("CWE Finding: {}", m.as_str()), severity);
        f.description = line.to_string();
        f.metadata = provenance("cwe_checker", module);
        out.findings.push(f);
    }
}

/// L10: full-system emulation status and detected services.
fn parse_system_emulation(
    _rules: &SeverityRules,
    module: &str,
    content: &str,
    out: &mut ParsedArtifact,
) {
    let mut services: Vec<String> = Vec::new();

    for line in scan_lines(content) {
        let lower = line.to_lowercase();
        if lower.contains("emulation")
            && (lower.contains("successful") || lower.contains("started") || lower.contains("running"))
        {
            let mut f = NewFinding::new("system_emulation", "System Emulation Status", RiskLevel::Low);
            f.description = line.to_string();
            f.metadata = provenance("system_emulation", module);
            out.findings.push(f);
        }

        if lower.contains("service") && (lower.contains("detected") || lower.contains("running")) {
            let name = extract_service_name(line);
            services.push(name.clone());
            let mut f = NewFinding::new(
                "service_detection",
                format!("Service Detected: {name}"),
                RiskLevel::Low,
            );
            f.description = line.to_string();
            f.metadata = json!({"source": "system_emulation", "module": module, "service_name": name});
            out.findings.push(f);
        }
    }

    if !services.is_empty() {
        out.summary
            .insert("system_emulation".to_string(), json!({"services": services}));
    }
}

/// L15: nmap port scan results.
fn parse_network_scan(_rules: &SeverityRules, module: &str, content: &str, out: &mut ParsedArtifact) {
    let mut open_ports: Vec<serde_json::Value> = Vec::new();

    for line in scan_lines(content) {
        let Some(caps) = PORT_RE.captures(line) else {
            continue;
        };
        let port = caps[1].to_string();
        let protocol = caps[2].to_string();
        let service = extract_service_name(line);
        let severity = if HIGH_RISK_PORTS.contains(&port.as_str()) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let port_info = json!({"port": port, "protocol": protocol, "service": service});
        open_ports.push(port_info.clone());

        let mut f = NewFinding::new("open_port", format!("Open Port: {port}"), severity);
        f.description = line.to_string();
        f.metadata = json!({"source": "network_scan", "module": module, "port_info": port_info});
        out.findings.push(f);
    }

    if !open_ports.is_empty() {
        out.summary.insert(
            "network_scan".to_string(),
            json!({"total_ports": open_ports.len(), "open_ports": open_ports}),
        );
    }
}

/// L20: SNMP checks. Default community strings are the interesting part.
fn parse_snmp_check(_rules: &SeverityRules, module: &str, content: &str, out: &mut ParsedArtifact) {
    for line in scan_lines(content) {
        let lower = line.to_lowercase();
        if !lower.contains("community") {
            continue;
        }
        if lower.contains("public") || lower.contains("private") || lower.contains("default") {
            let severity = if lower.contains("public") {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            };
            let mut f = NewFinding::new("snmp_community", "SNMP Community String Found", severity);
            f.description = line.to_string();
            f.metadata = provenance("snmp_check", module);
            out.findings.push(f);
        }
    }
}

/// L22: UPnP discovery and HNAP probing.
fn parse_upnp_hnap(_rules: &SeverityRules, module: &str, content: &str, out: &mut ParsedArtifact) {
    for line in scan_lines(content) {
        let lower = line.to_lowercase();
        if lower.contains("upnp") && lower.contains("device") {
            let mut f = NewFinding::new("upnp_device", "UPnP Device Discovered", RiskLevel::Medium);
            f.description = line.to_string();
            f.metadata = provenance("upnp_check", module);
            out.findings.push(f);
        }
        if lower.contains("hnap") && (lower.contains("vulnerable") || lower.contains("exploit")) {
            let mut f = NewFinding::new("hnap_vulnerability", "HNAP Vulnerability Found", RiskLevel::High);
            f.description = line.to_string();
            f.metadata = provenance("upnp_check", module);
            out.findings.push(f);
        }
    }
}

/// L23: VNC authentication checks.
fn parse_vnc_check(_rules: &SeverityRules, module: &str, content: &str, out: &mut ParsedArtifact) {
    for line in scan_lines(content) {
        let lower = line.to_lowercase();
        if !lower.contains("vnc") {
            continue;
        }
        if lower.contains("no auth") || lower.contains("authentication") || lower.contains("bypass") {
            let severity = if lower.contains("no auth") {
                RiskLevel::Critical
            } else {
                RiskLevel::High
            };
            let mut f = NewFinding::new("vnc_vulnerability", "VNC Authentication Issue", severity);
            f.description = line.to_string();
            f.metadata = provenance("vnc_check", module);
            out.findings.push(f);
        }
    }
}

/// L25: web application checks (nikto, testssl and friends).
fn parse_web_check(rules: &SeverityRules, module: &str, content: &str, out: &mut ParsedArtifact) {
    for line in scan_lines(content) {
        let lower = line.to_lowercase();
        if lower.contains("nikto")
            && (lower.contains("vulnerability") || lower.contains("issue") || lower.contains("warning"))
        {
            let mut f = NewFinding::new(
                "web_vulnerability",
                "Web Application Vulnerability",
                rules.classify(line),
            );
            f.description = line.to_string();
            f.metadata = json!({"source": "web_check", "module": module, "tool": "nikto"});
            out.findings.push(f);
        } else if lower.contains("ssl")
            && (lower.contains("vulnerable") || lower.contains("weak") || lower.contains("insecure"))
        {
            let mut f = NewFinding::new("ssl_vulnerability", "SSL/TLS Vulnerability", rules.classify(line));
            f.description = line.to_string();
            f.metadata = json!({"source": "web_check", "module": module, "tool": "testssl"});
            out.findings.push(f);
        }
    }
}

/// Pull a service name out of a scan line: `service:` markers first, then
/// the token following a `port/proto` column.
fn extract_service_name(line: &str) -> String {
    for marker in ["service:", "Service:"] {
        if let Some(idx) = line.find(marker) {
            let rest = line[idx + marker.len()..].trim();
            if let Some(name) = rest.split_whitespace().next() {
                return name.to_string();
            }
        }
    }
    let tokens: Vec<&str> = line.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if PORT_RE.is_match(token) {
            if let Some(next) = tokens.get(i + 1) {
                // Skip the nmap state column if present.
                let candidate = if *next == "open" || *next == "closed" || *next == "filtered" {
                    tokens.get(i + 2)
                } else {
                    Some(next)
                };
                if let Some(name) = candidate {
                    return name.to_string();
                }
            }
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> SeverityRules {
        SeverityRules::default()
    }

    #[test]
    fn category_table_lookup() {
        assert_eq!(module_category("S120_cve_search.txt"), "CVE Analysis");
        assert_eq!(module_category("S116_qemu_version_check.txt"), "Emulation");
        assert_eq!(module_category("S25_kernel_check.txt"), "Kernel Analysis");
        assert_eq!(module_category("S40_weak_perm_check.txt"), "Permission Analysis");
        assert_eq!(module_category("L15_nmap_scan.txt"), "Network Analysis");
        assert_eq!(module_category("S21_crypto_material.txt"), "Cryptographic Analysis");
        assert_eq!(module_category("S99_misc.txt"), "General");
    }

    #[test]
    fn cve_module_lines_become_cves() {
        let content = "# module header\nCVE-2019-0708 bluekeep rdp exploit\n";
        let out = parse(&rules(), "S24_cve_lookup.txt", content);
        assert_eq!(out.cves.len(), 1);
        assert_eq!(out.cves[0].cve_id, "CVE-2019-0708");
        assert_eq!(out.cves[0].severity_level, RiskLevel::High);
    }

    #[test]
    fn found_marker_yields_categorized_finding() {
        let content = "weak permission FOUND on /etc/init.d/rcS\n";
        let out = parse(&rules(), "S40_weak_perm_check.txt", content);
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].finding_type, "Permission Analysis");
        assert_eq!(out.findings[0].severity, RiskLevel::Medium);
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        let content = "# comment FOUND\n\n   \n";
        let out = parse(&rules(), "S40_weak_perm_check.txt", content);
        assert!(out.findings.is_empty());
    }

    #[test]
    fn credential_keywords_fall_back_to_credential_finding() {
        let content = "default password admin stored in config\n";
        let out = parse(&rules(), "S50_authentication_check.txt", content);
        assert_eq!(out.findings[0].finding_type, "credential_finding");
        assert_eq!(out.findings[0].severity, RiskLevel::Medium);
    }

    #[test]
    fn binary_keywords_fall_back_to_binary_analysis() {
        let content = "stripped executable without stack canary\n";
        let out = parse(&rules(), "S12_binary_protection.txt", content);
        assert_eq!(out.findings[0].finding_type, "binary_analysis");
        assert_eq!(out.findings[0].severity, RiskLevel::Low);
    }

    #[test]
    fn cwe_checker_severity_from_line() {
        let content = "CWE-787 out of bounds write, critical impact\nCWE-476 null deref\n";
        let out = parse(&rules(), "S120_cwe_checker.txt", content);
        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.findings[0].severity, RiskLevel::Critical);
        assert_eq!(out.findings[0].title, "CWE Finding: CWE-787");
        assert_eq!(out.findings[1].severity, RiskLevel::Medium);
    }

    #[test]
    fn emulation_version_lines() {
        let content = "BusyBox v1.30.1 version banner printed\nno banner here\n";
        let out = parse(&rules(), "S115_usermode_emulator.txt", content);
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].finding_type, "version_detection");
    }

    #[test]
    fn network_scan_high_risk_port() {
        let content = "23/tcp open telnet\n49152/tcp open upnp\n";
        let out = parse(&rules(), "L15_emulated_checks_nmap.txt", content);
        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.findings[0].finding_type, "open_port");
        assert_eq!(out.findings[0].severity, RiskLevel::Medium);
        assert_eq!(out.findings[1].severity, RiskLevel::Low);
        let scan = &out.summary["network_scan"];
        assert_eq!(scan["total_ports"], 2);
        assert_eq!(scan["open_ports"][0]["service"], "telnet");
    }

    #[test]
    fn snmp_public_community_is_high() {
        let content = "community string 'public' accepted\n";
        let out = parse(&rules(), "L20_snmp_checks.txt", content);
        assert_eq!(out.findings[0].finding_type, "snmp_community");
        assert_eq!(out.findings[0].severity, RiskLevel::High);
    }

    #[test]
    fn vnc_no_auth_is_critical() {
        let content = "VNC server accepts connections with no auth\n";
        let out = parse(&rules(), "L23_vnc_checks.txt", content);
        assert_eq!(out.findings[0].severity, RiskLevel::Critical);
    }

    #[test]
    fn upnp_and_hnap_lines() {
        let content = "UPnP device advertised on LAN\nHNAP endpoint vulnerable to bypass\n";
        let out = parse(&rules(), "L22_upnp_hnap_checks.txt", content);
        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.findings[0].finding_type, "upnp_device");
        assert_eq!(out.findings[1].finding_type, "hnap_vulnerability");
    }

    #[test]
    fn web_check_tools() {
        let content = "nikto reported issue: outdated server header\nssl cipher suite is weak\n";
        let out = parse(&rules(), "L25_web_checks.txt", content);
        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.findings[0].finding_type, "web_vulnerability");
        assert_eq!(out.findings[1].finding_type, "ssl_vulnerability");
    }

    #[test]
    fn service_name_extraction() {
        assert_eq!(extract_service_name("23/tcp open telnet"), "telnet");
        assert_eq!(extract_service_name("running service: httpd on port 80"), "httpd");
        assert_eq!(extract_service_name("nothing useful"), "unknown");
    }
}
