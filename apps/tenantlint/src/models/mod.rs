//! Shared data models for extraction, classification, and reporting.
//!
//! `ScanTarget` and `CallSite` live only for one scan run; `Violation` is the
//! unit the report aggregates.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A source file read from disk. Immutable once loaded.
pub struct ScanTarget {
    pub path: PathBuf,
    /// Path relative to the scan root with `/` separators, used in reports.
    pub display: String,
    pub source: String,
}

impl ScanTarget {
    /// Read `path` as UTF-8 text.
    pub fn load(path: &Path, root: &Path) -> io::Result<Self> {
        let source = fs::read_to_string(path)?;
        Ok(Self::from_source(path, root, source))
    }

    pub fn from_source(path: &Path, root: &Path, source: String) -> Self {
        Self {
            path: path.to_path_buf(),
            display: crate::utils::display_path(path, root),
            source,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
/// The kind of tenant-sensitive operation a call site performs.
pub enum OperationKind {
    Read,
    ReadMany,
    Write,
    WriteMany,
    Delete,
    DeleteMany,
    Aggregate,
    RawQuery,
}

impl OperationKind {
    /// Map an ORM method name to its operation kind. Returns `None` for verbs
    /// outside the tracked set.
    pub fn from_verb(verb: &str) -> Option<Self> {
        let kind = match verb {
            "findFirst" | "findFirstOrThrow" | "findUnique" | "findUniqueOrThrow" => Self::Read,
            "findMany" => Self::ReadMany,
            "create" | "update" | "upsert" => Self::Write,
            "createMany" | "updateMany" => Self::WriteMany,
            "delete" => Self::Delete,
            "deleteMany" => Self::DeleteMany,
            "count" | "aggregate" | "groupBy" => Self::Aggregate,
            _ => return None,
        };
        Some(kind)
    }

    /// Parse a configuration token such as `aggregate` or `read-many`.
    pub fn parse_token(token: &str) -> Option<Self> {
        let norm: String = token
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let kind = match norm.as_str() {
            "read" => Self::Read,
            "readmany" => Self::ReadMany,
            "write" => Self::Write,
            "writemany" => Self::WriteMany,
            "delete" => Self::Delete,
            "deletemany" => Self::DeleteMany,
            "aggregate" => Self::Aggregate,
            "rawquery" => Self::RawQuery,
            _ => return None,
        };
        Some(kind)
    }
}

/// All verbs recognized on structured data-access calls.
pub const OPERATION_VERBS: &[&str] = &[
    "findFirst",
    "findFirstOrThrow",
    "findUnique",
    "findUniqueOrThrow",
    "findMany",
    "create",
    "createMany",
    "update",
    "updateMany",
    "upsert",
    "delete",
    "deleteMany",
    "count",
    "aggregate",
    "groupBy",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Where a call site was found. `line` and `column` are 1-indexed.
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One tenant-sensitive operation discovered in a file.
pub struct CallSite {
    #[serde(rename = "entityName")]
    pub entity_name: String,
    #[serde(rename = "operationKind")]
    pub operation_kind: OperationKind,
    /// Method as written at the call site, e.g. `findMany` or `$queryRaw`.
    pub method: String,
    pub location: Location,
    #[serde(rename = "sourceSnippet")]
    pub source_snippet: String,
    /// Byte offset of the call chain start within the file.
    #[serde(skip)]
    pub offset: usize,
}

impl CallSite {
    pub fn is_raw(&self) -> bool {
        self.operation_kind == OperationKind::RawQuery
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    MissingScopeKey,
    UnscopedRawQuery,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingScopeKey => f.write_str("missing-scope-key"),
            Self::UnscopedRawQuery => f.write_str("unscoped-raw-query"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Critical,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => f.write_str("critical"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A call site judged unscoped and classified.
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub severity: Severity,
    #[serde(rename = "callSite")]
    pub call_site: CallSite,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A file that could not be analyzed; surfaced in the report.
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A recoverable tooling problem, kept apart from violations.
pub struct ToolWarning {
    pub file: String,
    pub code: String,
    pub message: String,
}
