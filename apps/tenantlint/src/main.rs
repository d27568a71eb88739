//! Tenantlint CLI binary entry point.
//! Resolves configuration, runs the scan, prints the report, and maps the
//! outcome to an exit code.

use clap::Parser;
use std::path::PathBuf;
use tenantlint::cli::{split_globs, Cli, Commands};
use tenantlint::config::{self, Overrides};
use tenantlint::{logging, output, scan, utils};

/// No critical violations.
const EXIT_CLEAN: i32 = 0;
/// At least one critical violation.
const EXIT_VIOLATIONS: i32 = 1;
/// Fatal error, or a scan cut short by the deadline.
const EXIT_FATAL: i32 = 2;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Scan {
            root,
            exclude,
            fix,
            output,
            mode,
            before,
            after,
            timeout,
            config: config_file,
        } => {
            if fix {
                eprintln!(
                    "{} --fix is reserved; no automatic fixes are applied.",
                    utils::note_prefix()
                );
            }
            let overrides = Overrides {
                config: config_file.map(PathBuf::from),
                exclude: split_globs(exclude.as_deref()),
                mode,
                output,
                before,
                after,
                timeout_secs: timeout,
            };
            let eff = match config::resolve_effective(root.as_deref(), &overrides) {
                Ok(eff) => eff,
                Err(e) => {
                    tracing::error!(code = e.code(), "configuration failed");
                    eprintln!("{} {}", utils::error_prefix(), e);
                    std::process::exit(EXIT_FATAL);
                }
            };
            if eff.output != "json" {
                match eff.config_path.as_ref() {
                    Some(p) => eprintln!("{} Using config {}", utils::info_prefix(), p.display()),
                    None => eprintln!(
                        "{} No tenantlint.toml found; using defaults.",
                        utils::note_prefix()
                    ),
                }
            }
            let report = match scan::run_scan(&eff.settings) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(code = e.code(), "scan aborted");
                    eprintln!("{} {}", utils::error_prefix(), e);
                    std::process::exit(EXIT_FATAL);
                }
            };
            output::print_report(&report, &eff.output);
            let code = if report.should_fail() {
                EXIT_VIOLATIONS
            } else if report.incomplete {
                EXIT_FATAL
            } else {
                EXIT_CLEAN
            };
            std::process::exit(code);
        }
    }
}
