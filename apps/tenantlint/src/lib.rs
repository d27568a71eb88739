//! Tenantlint core library.
//!
//! Static analysis for multi-tenant codebases: finds ORM data-access calls
//! and raw queries that reach tenant-owned data without a tenant scope key,
//! and reports them for CI gating.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `walker`: Source file discovery with pruning and ignore files.
//! - `extract`: Call-site extraction for structured calls and raw queries.
//! - `exempt`: Entities allowed to skip tenant scoping.
//! - `window`: Line-window scope heuristic and the scope matcher.
//! - `syntax`: Syntax-tree scope analysis with lexical resolution.
//! - `classify`: Violation kind and severity.
//! - `report`: Aggregation into a `ScanReport`.
//! - `scan`: The parallel pipeline tying the above together.
//! - `output`: Human/JSON printers.
//! - `models`: Shared data models.
//! - `errors`, `logging`, `utils`: Supporting pieces.
pub mod classify;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exempt;
pub mod extract;
pub mod logging;
pub mod models;
pub mod output;
pub mod report;
pub mod scan;
pub mod syntax;
pub mod utils;
pub mod walker;
pub mod window;
