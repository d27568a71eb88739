//! End-to-end scans through the library and the binary.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;
use tenantlint::config::Settings;
use tenantlint::models::Severity;
use tenantlint::output::render_text;
use tenantlint::scan::run_scan;

fn fixture(root: &Path) {
    // Keep config discovery inside the fixture.
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::write(
        root.join("a.ts"),
        "export async function load(id: string) {\n  return db.student.findMany({ where: { id } });\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("b.ts"),
        "export async function load(schoolId: string, id: string) {\n  return db.student.findMany({ where: { schoolId, id } });\n}\n",
    )
    .unwrap();
}

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tenantlint"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_two_file_fixture_reports_only_a() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    let report = run_scan(&Settings::for_root(dir.path())).unwrap();
    assert_eq!(report.critical_count, 1);
    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file, "a.ts");
    let v = &report.files[0].violations[0];
    assert_eq!(v.severity, Severity::Critical);
    assert_eq!(v.call_site.location.line, 2);
    assert!(report.should_fail());

    let text = render_text(&report, false);
    assert!(text.lines().any(|l| l == "a.ts"));
    assert!(!text.lines().any(|l| l == "b.ts"));
}

#[test]
fn test_same_fixture_in_window_mode() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    let mut settings = Settings::for_root(dir.path());
    settings.mode = tenantlint::config::Mode::Window;
    let report = run_scan(&settings).unwrap();
    assert_eq!(report.critical_count, 1);
    assert_eq!(report.files[0].file, "a.ts");
}

#[test]
fn test_three_files_aggregate() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src/api")).unwrap();
    fs::write(root.join("src/one.ts"), "db.student.findMany();\n").unwrap();
    fs::write(
        root.join("src/two.ts"),
        "db.grade.create({ data: {} });\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\ndb.grade.delete({ where: { id: 1 } });\n",
    )
    .unwrap();
    fs::write(
        root.join("src/api/three.js"),
        "module.exports = () => prisma.$executeRaw`DELETE FROM grades`;\n",
    )
    .unwrap();
    let report = run_scan(&Settings::for_root(root)).unwrap();
    assert_eq!(report.critical_count, 4);
    let files: Vec<(&str, usize)> = report
        .files
        .iter()
        .map(|f| (f.file.as_str(), f.violations.len()))
        .collect();
    assert_eq!(
        files,
        vec![("src/api/three.js", 1), ("src/one.ts", 1), ("src/two.ts", 2)]
    );
}

#[test]
fn test_binary_exits_one_on_critical() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    let out = bin()
        .args(["scan", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("critical=1"));
}

#[test]
fn test_binary_json_output() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    let out = bin()
        .args(["scan", dir.path().to_str().unwrap(), "--output", "json"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["critical_count"], 1);
    assert_eq!(v["should_fail"], true);
    assert_eq!(v["files"][0]["file"], "a.ts");
}

#[test]
fn test_binary_exits_zero_when_clean_and_excluded() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    let out = bin()
        .args(["scan", dir.path().to_str().unwrap(), "--exclude", "a.ts"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn test_binary_exits_two_on_bad_root() {
    let dir = tempdir().unwrap();
    let out = bin()
        .args(["scan", dir.path().join("missing").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("scan root not found"));
}
