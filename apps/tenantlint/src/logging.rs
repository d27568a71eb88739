//! Diagnostic logging via `tracing`.
//!
//! Logs go to stderr so stdout stays reserved for the report. The default
//! level is `warn`; `-v` raises it, `-q` lowers it to errors only, and
//! `TENANTLINT_LOG` (an `EnvFilter` directive string) overrides both.

use tracing_subscriber::filter::{EnvFilter, LevelFilter};

pub const LOG_ENV: &str = "TENANTLINT_LOG";

/// Level selected by the verbosity flags.
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbose, quiet).into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_flags() {
        assert_eq!(level_for(0, false), LevelFilter::WARN);
        assert_eq!(level_for(1, false), LevelFilter::INFO);
        assert_eq!(level_for(2, false), LevelFilter::DEBUG);
        assert_eq!(level_for(5, false), LevelFilter::TRACE);
        assert_eq!(level_for(3, true), LevelFilter::ERROR);
    }
}
