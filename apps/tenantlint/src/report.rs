//! Report aggregation.
//!
//! Collects violations from every scanned file into an immutable
//! `ScanReport`: grouped by file, ordered by position, with run totals.

use crate::models::{Severity, SkippedFile, ToolWarning, Violation};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Violations found in one file, ordered by line then column.
pub struct FileReport {
    pub file: String,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Terminal artifact of a scan run.
pub struct ScanReport {
    pub root: String,
    /// Files with at least one violation, ordered by relative path.
    pub files: Vec<FileReport>,
    pub critical_count: usize,
    pub warning_count: usize,
    pub files_scanned: usize,
    pub skipped: Vec<SkippedFile>,
    pub warnings: Vec<ToolWarning>,
    /// True when the deadline stopped the scan before every file was read.
    pub incomplete: bool,
    /// Files never analyzed because of the deadline.
    pub unscanned: usize,
    /// The deadline stopped the directory walk, so files beyond it were
    /// never discovered and are not counted in `unscanned`.
    pub walk_truncated: bool,
}

/// Everything a scan produced, before aggregation.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub violations: Vec<Violation>,
    pub files_scanned: usize,
    pub skipped: Vec<SkippedFile>,
    pub warnings: Vec<ToolWarning>,
    pub unscanned: usize,
    pub walk_truncated: bool,
}

impl ScanOutcome {
    /// Fold another outcome into this one.
    pub fn merge(mut self, other: ScanOutcome) -> Self {
        self.violations.extend(other.violations);
        self.files_scanned += other.files_scanned;
        self.skipped.extend(other.skipped);
        self.warnings.extend(other.warnings);
        self.unscanned += other.unscanned;
        self.walk_truncated |= other.walk_truncated;
        self
    }
}

impl ScanReport {
    /// Aggregate an outcome. Ordering is independent of the order files
    /// were analyzed in.
    pub fn build(root: impl Into<String>, outcome: ScanOutcome) -> Self {
        let mut grouped: BTreeMap<String, Vec<Violation>> = BTreeMap::new();
        let mut critical_count = 0;
        let mut warning_count = 0;
        for v in outcome.violations {
            match v.severity {
                Severity::Critical => critical_count += 1,
                Severity::Warning => warning_count += 1,
            }
            grouped
                .entry(v.call_site.location.file.clone())
                .or_default()
                .push(v);
        }
        let files = grouped
            .into_iter()
            .map(|(file, mut violations)| {
                violations.sort_by(|a, b| {
                    let (la, lb) = (&a.call_site.location, &b.call_site.location);
                    (la.line, la.column, &a.call_site.method)
                        .cmp(&(lb.line, lb.column, &b.call_site.method))
                });
                FileReport { file, violations }
            })
            .collect();

        let mut skipped = outcome.skipped;
        skipped.sort_by(|a, b| a.file.cmp(&b.file));
        let mut warnings = outcome.warnings;
        warnings.sort_by(|a, b| (&a.file, &a.code).cmp(&(&b.file, &b.code)));

        Self {
            root: root.into(),
            files,
            critical_count,
            warning_count,
            files_scanned: outcome.files_scanned,
            skipped,
            warnings,
            incomplete: outcome.unscanned > 0 || outcome.walk_truncated,
            unscanned: outcome.unscanned,
            walk_truncated: outcome.walk_truncated,
        }
    }

    /// True when at least one critical violation was found.
    pub fn should_fail(&self) -> bool {
        self.critical_count > 0
    }

    pub fn violation_count(&self) -> usize {
        self.critical_count + self.warning_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallSite, Location, OperationKind, ViolationKind};

    fn violation(file: &str, line: usize, severity: Severity) -> Violation {
        Violation {
            kind: ViolationKind::MissingScopeKey,
            severity,
            call_site: CallSite {
                entity_name: "student".into(),
                operation_kind: OperationKind::ReadMany,
                method: "findMany".into(),
                location: Location {
                    file: file.into(),
                    line,
                    column: 1,
                },
                source_snippet: String::new(),
                offset: 0,
            },
            message: "m".into(),
        }
    }

    #[test]
    fn test_groups_by_file_and_counts_across_files() {
        let outcome = ScanOutcome {
            violations: vec![
                violation("src/c.ts", 9, Severity::Critical),
                violation("src/a.ts", 20, Severity::Critical),
                violation("src/b.ts", 3, Severity::Warning),
                violation("src/a.ts", 4, Severity::Critical),
                violation("src/c.ts", 1, Severity::Critical),
            ],
            files_scanned: 5,
            ..ScanOutcome::default()
        };
        let report = ScanReport::build(".", outcome);
        assert_eq!(report.critical_count, 4);
        assert_eq!(report.warning_count, 1);
        let files: Vec<_> = report.files.iter().map(|f| f.file.as_str()).collect();
        assert_eq!(files, vec!["src/a.ts", "src/b.ts", "src/c.ts"]);
        let a_lines: Vec<_> = report.files[0]
            .violations
            .iter()
            .map(|v| v.call_site.location.line)
            .collect();
        assert_eq!(a_lines, vec![4, 20]);
        assert!(report.should_fail());
        assert!(!report.incomplete);
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let vs = vec![
            violation("b.ts", 2, Severity::Critical),
            violation("a.ts", 7, Severity::Critical),
            violation("a.ts", 3, Severity::Warning),
        ];
        let mut reversed = vs.clone();
        reversed.reverse();
        let one = ScanReport::build(
            ".",
            ScanOutcome {
                violations: vs,
                ..ScanOutcome::default()
            },
        );
        let two = ScanReport::build(
            ".",
            ScanOutcome {
                violations: reversed,
                ..ScanOutcome::default()
            },
        );
        assert_eq!(one, two);
    }

    #[test]
    fn test_warnings_only_do_not_fail() {
        let report = ScanReport::build(
            ".",
            ScanOutcome {
                violations: vec![violation("a.ts", 1, Severity::Warning)],
                ..ScanOutcome::default()
            },
        );
        assert!(!report.should_fail());
        assert_eq!(report.violation_count(), 1);
    }

    #[test]
    fn test_merge_and_incomplete() {
        let left = ScanOutcome {
            files_scanned: 2,
            skipped: vec![SkippedFile {
                file: "z.ts".into(),
                reason: "r".into(),
            }],
            ..ScanOutcome::default()
        };
        let right = ScanOutcome {
            files_scanned: 1,
            unscanned: 3,
            ..ScanOutcome::default()
        };
        let report = ScanReport::build(".", left.merge(right));
        assert_eq!(report.files_scanned, 3);
        assert_eq!(report.unscanned, 3);
        assert!(report.incomplete);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.files.is_empty());
        assert!(!report.walk_truncated);
    }

    #[test]
    fn test_truncated_walk_is_incomplete_without_unscanned() {
        let report = ScanReport::build(
            ".",
            ScanOutcome {
                files_scanned: 1,
                walk_truncated: true,
                ..ScanOutcome::default()
            },
        );
        assert!(report.incomplete);
        assert_eq!(report.unscanned, 0);
        assert!(!report.should_fail());
    }
}
