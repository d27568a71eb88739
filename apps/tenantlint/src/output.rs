//! Output rendering for scan reports.
//!
//! Supports `human` (default) and `json` outputs. The human form groups
//! violations under a header per file, keeps tool warnings in their own
//! section, and ends with a totals banner. The JSON form is the serialized
//! `ScanReport` plus a `should_fail` flag.

use crate::models::{Severity, Violation};
use crate::report::ScanReport;
use owo_colors::OwoColorize;
use serde_json::Value as JsonVal;
use std::fmt::Write as _;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

/// Print a scan report in the requested format.
pub fn print_report(report: &ScanReport, output: &str) {
    match output {
        "json" => match compose_report_json(report).and_then(|v| serde_json::to_string_pretty(&v)) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("{} failed to serialize report: {}", crate::utils::error_prefix(), e),
        },
        _ => print!("{}", render_text(report, use_colors(output))),
    }
}

/// Compose the JSON object (pure) for testing/snapshot purposes.
pub fn compose_report_json(report: &ScanReport) -> Result<JsonVal, serde_json::Error> {
    let mut out = serde_json::to_value(report)?;
    if let JsonVal::Object(map) = &mut out {
        map.insert("should_fail".into(), JsonVal::Bool(report.should_fail()));
    }
    Ok(out)
}

fn severity_tag(severity: Severity, color: bool) -> (String, String) {
    match severity {
        Severity::Critical if color => (
            "✖".red().to_string(),
            "⟦critical⟧".red().bold().to_string(),
        ),
        Severity::Warning if color => (
            "▲".yellow().to_string(),
            "⟦warn⟧".yellow().bold().to_string(),
        ),
        Severity::Critical => ("✖".to_string(), "⟦critical⟧".to_string()),
        Severity::Warning => ("▲".to_string(), "⟦warn⟧".to_string()),
    }
}

fn violation_line(v: &Violation, color: bool) -> String {
    let (icon, sev) = severity_tag(v.severity, color);
    let site = &v.call_site;
    let pos = format!("{}:{}", site.location.line, site.location.column);
    let pos = if color { pos.bright_black().to_string() } else { pos };
    format!(
        "  {} {} {} ❲{}❳ {}.{} — {}",
        icon, sev, pos, v.kind, site.entity_name, site.method, site.source_snippet
    )
}

/// Render the human-readable report.
pub fn render_text(report: &ScanReport, color: bool) -> String {
    let mut out = String::new();
    let header = format!("tenantlint — tenant isolation scan of {}", report.root);
    if color {
        let _ = writeln!(out, "{}", header.bold());
    } else {
        let _ = writeln!(out, "{}", header);
    }

    for file in &report.files {
        let _ = writeln!(out);
        if color {
            let _ = writeln!(out, "{}", file.file.bold().underline());
        } else {
            let _ = writeln!(out, "{}", file.file);
        }
        for v in &file.violations {
            let _ = writeln!(out, "{}", violation_line(v, color));
        }
    }

    if !report.skipped.is_empty() || !report.warnings.is_empty() {
        let _ = writeln!(out);
        if color {
            let _ = writeln!(out, "{}", "Tool warnings".cyan().bold());
        } else {
            let _ = writeln!(out, "Tool warnings");
        }
        let icon = if color { "◆".blue().to_string() } else { "◆".to_string() };
        for s in &report.skipped {
            let _ = writeln!(out, "  {} ⟦skipped⟧ {} — {}", icon, s.file, s.reason);
        }
        for w in &report.warnings {
            let _ = writeln!(out, "  {} ⟦{}⟧ {} — {}", icon, w.code, w.file, w.message);
        }
    }

    if report.incomplete {
        let notice = if report.walk_truncated {
            format!(
                "Scan incomplete: the deadline stopped the directory walk; {} discovered file(s) not analyzed. Results are partial.",
                report.unscanned
            )
        } else {
            format!(
                "Scan incomplete: {} file(s) not analyzed before the deadline. Results are partial.",
                report.unscanned
            )
        };
        let _ = writeln!(out);
        if color {
            let _ = writeln!(out, "{}", notice.yellow().bold());
        } else {
            let _ = writeln!(out, "{}", notice);
        }
    }

    let summary = format!(
        "— Summary — critical={} warnings={} files={} scanned={} skipped={}",
        report.critical_count,
        report.warning_count,
        report.files.len(),
        report.files_scanned,
        report.skipped.len()
    );
    let _ = writeln!(out);
    if color {
        let banner = if report.should_fail() {
            summary.red().bold().to_string()
        } else {
            summary.green().bold().to_string()
        };
        let _ = writeln!(out, "{}", banner);
    } else {
        let _ = writeln!(out, "{}", summary);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallSite, Location, OperationKind, SkippedFile, ToolWarning, ViolationKind};
    use crate::report::ScanOutcome;

    fn sample() -> ScanReport {
        let v = Violation {
            kind: ViolationKind::MissingScopeKey,
            severity: Severity::Critical,
            call_site: CallSite {
                entity_name: "student".into(),
                operation_kind: OperationKind::ReadMany,
                method: "findMany".into(),
                location: Location {
                    file: "src/a.ts".into(),
                    line: 3,
                    column: 10,
                },
                source_snippet: "return db.student.findMany();".into(),
                offset: 0,
            },
            message: "student.findMany has no tenant scope key in reach".into(),
        };
        ScanReport::build(
            ".",
            ScanOutcome {
                violations: vec![v],
                files_scanned: 2,
                skipped: vec![SkippedFile {
                    file: "big.ts".into(),
                    reason: "too large".into(),
                }],
                warnings: vec![ToolWarning {
                    file: "broken.ts".into(),
                    code: "malformed-source".into(),
                    message: "syntax errors".into(),
                }],
                unscanned: 0,
                walk_truncated: false,
            },
        )
    }

    #[test]
    fn test_render_text_sections() {
        let text = render_text(&sample(), false);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("tenantlint"));
        assert!(lines.contains(&"src/a.ts"));
        assert!(lines.contains(
            &"  ✖ ⟦critical⟧ 3:10 ❲missing-scope-key❳ student.findMany — return db.student.findMany();"
        ));
        assert!(lines.contains(&"Tool warnings"));
        assert!(lines.contains(&"  ◆ ⟦skipped⟧ big.ts — too large"));
        assert!(lines.contains(&"  ◆ ⟦malformed-source⟧ broken.ts — syntax errors"));
        assert!(!text.contains("Scan incomplete"));
        assert_eq!(
            *lines.last().unwrap(),
            "— Summary — critical=1 warnings=0 files=1 scanned=2 skipped=1"
        );
    }

    #[test]
    fn test_render_text_incomplete_notice() {
        let report = ScanReport::build(
            ".",
            ScanOutcome {
                unscanned: 4,
                ..ScanOutcome::default()
            },
        );
        let text = render_text(&report, false);
        assert!(text.contains("Scan incomplete: 4 file(s)"));
        assert!(!text.contains("Tool warnings"));

        let truncated = ScanReport::build(
            ".",
            ScanOutcome {
                walk_truncated: true,
                ..ScanOutcome::default()
            },
        );
        assert!(render_text(&truncated, false).contains("stopped the directory walk"));
    }

    #[test]
    fn test_compose_report_json_shape() {
        let out = compose_report_json(&sample()).unwrap();
        assert_eq!(out["critical_count"], 1);
        assert_eq!(out["should_fail"], true);
        assert_eq!(out["files"][0]["file"], "src/a.ts");
        assert_eq!(out["files"][0]["violations"][0]["type"], "MissingScopeKey");
        assert_eq!(
            out["files"][0]["violations"][0]["callSite"]["location"]["column"],
            10
        );
        assert_eq!(out["skipped"][0]["file"], "big.ts");
        assert_eq!(out["warnings"][0]["code"], "malformed-source");
        assert_eq!(out["incomplete"], false);
    }
}
