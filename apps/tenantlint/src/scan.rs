//! Scan pipeline: walk, extract, judge, classify, aggregate.
//!
//! Files are analyzed in parallel. Each worker returns its own
//! `ScanOutcome`; outcomes are merged in a single reduction and then
//! ordered by `ScanReport::build`, so scheduling never shows in the report.

use crate::classify::{classify, Policy};
use crate::config::{Mode, Settings};
use crate::errors::ScanError;
use crate::exempt::ExemptionSet;
use crate::extract::Extractor;
use crate::models::{ScanTarget, SkippedFile, ToolWarning};
use crate::report::{ScanOutcome, ScanReport};
use crate::syntax::SyntaxAnalyzer;
use crate::utils::{display_path, LineIndex};
use crate::walker::{self, WalkFilter};
use crate::window::{self, ScopeMatcher, WindowSize};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Read-only state shared by every worker.
struct Pipeline<'a> {
    root: &'a Path,
    matcher: ScopeMatcher,
    extractor: Extractor,
    exempt: &'a ExemptionSet,
    policy: Policy,
    mode: Mode,
    window: WindowSize,
    max_file_size: u64,
    deadline: Option<Instant>,
}

/// Run a full scan with `settings`.
///
/// Errors only for fatal conditions (invalid root, walk failure, invalid
/// patterns). Per-file problems end up in the report.
pub fn run_scan(settings: &Settings) -> Result<ScanReport, ScanError> {
    let started = Instant::now();
    let deadline = settings.timeout.map(|t| started + t);
    let pipeline = Pipeline {
        root: &settings.root,
        matcher: ScopeMatcher::new(&settings.scope_keys, &settings.scope_helpers)?,
        extractor: Extractor::new(&settings.data_access_roots, &settings.raw_query_methods)?,
        exempt: &settings.exempt,
        policy: Policy {
            warn_on: settings.warn_on.clone(),
        },
        mode: settings.mode,
        window: settings.window,
        max_file_size: settings.max_file_size,
        deadline,
    };
    let filter = WalkFilter {
        extensions: settings.extensions.clone(),
        skip_dirs: settings.skip_dirs.clone(),
        exclude: settings.exclude.clone(),
        respect_gitignore: settings.respect_gitignore,
    };
    let mut files = walker::walk(&settings.root, &filter)?;
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut walk_truncated = false;
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            walk_truncated = true;
            break;
        }
        match files.next() {
            Some(path) => paths.push(path?),
            None => break,
        }
    }
    tracing::info!(
        root = %settings.root.display(),
        files = paths.len(),
        mode = %settings.mode,
        "scan started"
    );

    let mut outcome = paths
        .par_iter()
        .map(|path| pipeline.analyze(path))
        .reduce(ScanOutcome::default, ScanOutcome::merge);
    outcome.walk_truncated = walk_truncated;

    let report = ScanReport::build(settings.root.display().to_string(), outcome);
    if report.incomplete {
        tracing::warn!(
            unscanned = report.unscanned,
            walk_truncated = report.walk_truncated,
            "deadline reached, scan incomplete"
        );
    }
    tracing::info!(
        files_scanned = report.files_scanned,
        critical = report.critical_count,
        warning = report.warning_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scan finished"
    );
    Ok(report)
}

impl Pipeline<'_> {
    fn analyze(&self, path: &Path) -> ScanOutcome {
        let mut out = ScanOutcome::default();
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            out.unscanned = 1;
            return out;
        }
        let display = display_path(path, self.root);
        match fs::metadata(path) {
            Ok(meta) if meta.len() > self.max_file_size => {
                out.skipped.push(SkippedFile {
                    file: display,
                    reason: format!(
                        "file is {} bytes, larger than the {} byte limit",
                        meta.len(),
                        self.max_file_size
                    ),
                });
                return out;
            }
            Ok(_) => {}
            Err(err) => {
                out.skipped.push(unreadable(display, &err));
                return out;
            }
        }
        let target = match ScanTarget::load(path, self.root) {
            Ok(t) => t,
            Err(err) => {
                out.skipped.push(unreadable(display, &err));
                return out;
            }
        };
        out.files_scanned = 1;

        let sites = self
            .extractor
            .extract(&target, self.exempt, self.window.after);
        if sites.is_empty() {
            return out;
        }
        tracing::debug!(file = %target.display, sites = sites.len(), "call sites found");

        let analyzer = match self.mode {
            Mode::Window => None,
            Mode::Syntax => match SyntaxAnalyzer::parse(&target, &self.matcher) {
                Ok(a) => Some(a),
                Err(err) => {
                    tracing::warn!(file = %target.display, error = %err, "falling back to line window");
                    out.warnings.push(ToolWarning {
                        file: target.display.clone(),
                        code: err.code().to_string(),
                        message: format!("{err}; analyzed with the line window"),
                    });
                    None
                }
            },
        };
        let lines = LineIndex::new(&target.source);
        for site in sites {
            let scoped = analyzer
                .as_ref()
                .and_then(|a| a.judge(&site))
                .unwrap_or_else(|| window::is_scoped(&site, &lines, self.window, &self.matcher));
            if !scoped {
                out.violations.push(classify(site, &self.policy));
            }
        }
        out
    }
}

fn unreadable(file: String, err: &std::io::Error) -> SkippedFile {
    tracing::warn!(file = %file, error = %err, "unreadable file skipped");
    SkippedFile {
        file,
        reason: err.to_string(),
    }
}
