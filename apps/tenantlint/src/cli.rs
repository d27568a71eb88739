//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tenantlint",
    version,
    about = "Tenant isolation analyzer for ORM data access",
    long_about = "Tenantlint — a static analyzer that flags data-access calls and raw queries reaching tenant-owned data without a tenant scope key.\n\nConfiguration precedence: CLI > tenantlint.toml > defaults.",
    after_help = "Examples:\n  tenantlint scan\n  tenantlint scan apps/web --exclude 'legacy/**,**/*.test.ts'\n  tenantlint scan --output json --timeout 60",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase log verbosity (-v info, -vv debug)")]
    pub verbose: u8,
    #[arg(short, long, global = true, action = clap::ArgAction::SetTrue, help = "Only log errors")]
    pub quiet: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(
        about = "Show version",
        long_about = "Print the current tenantlint version."
    )]
    Version,
    /// Scan a source tree for unscoped tenant data access
    #[command(
        about = "Scan for tenant isolation violations",
        long_about = "Walk the root, extract data-access and raw-query call sites, and report those with no tenant scope key in reach. Exits 1 when a critical violation is found, 2 on fatal errors or an incomplete scan.",
        after_help = "Examples:\n  tenantlint scan src\n  tenantlint scan --mode window --before 3 --after 20"
    )]
    Scan {
        #[arg(help = "Root directory to scan (default: current dir)")]
        root: Option<String>,
        #[arg(long, help = "Comma-separated globs to exclude, added to the configured set")]
        exclude: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Reserved; automatic fixes are not available")]
        fix: bool,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Analysis mode: syntax|window (default: syntax)")]
        mode: Option<String>,
        #[arg(long, help = "Window lines before a call site (default: 5)")]
        before: Option<usize>,
        #[arg(long, help = "Window lines after a call site (default: 12)")]
        after: Option<usize>,
        #[arg(long, help = "Abort after this many seconds and report the scan as incomplete")]
        timeout: Option<u64>,
        #[arg(long, help = "Path to tenantlint.toml|yaml (default: discovered from root)")]
        config: Option<String>,
    },
}

/// Split a comma-separated `--exclude` value.
pub fn split_globs(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}
