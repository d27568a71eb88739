//! Configuration discovery and effective settings resolution.
//!
//! Tenantlint reads `tenantlint.toml|yaml|yml` from the scan root (or the
//! closest ancestor) and merges it with CLI flags to produce `Effective`.
//! Defaults:
//! - `scope_keys`: `schoolId`, `school_id`, `tenantId`, `tenant_id`
//! - `scope_helpers`: `getTenantContext`, `getSchoolContext`, `requireTenant`
//! - `data_access_roots`: `prisma`, `db`, `tx`
//! - `exempt`: see `exempt::DEFAULT_EXEMPT`
//! - `mode`: `syntax`, falling back to the line window per file
//! - `window`: 5 lines before, 12 after
//! - `output`: `human`
//!
//! Overrides precedence: CLI > config file > defaults. `--exclude` extends
//! the configured exclude list instead of replacing it.

use crate::errors::ScanError;
use crate::exempt::ExemptionSet;
use crate::models::OperationKind;
use crate::window::WindowSize;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_FILES: &[&str] = &["tenantlint.toml", "tenantlint.yaml", "tenantlint.yml"];

pub const DEFAULT_SCOPE_KEYS: &[&str] = &["schoolId", "school_id", "tenantId", "tenant_id"];
pub const DEFAULT_SCOPE_HELPERS: &[&str] = &["getTenantContext", "getSchoolContext", "requireTenant"];
pub const DEFAULT_ROOTS: &[&str] = &["prisma", "db", "tx"];
pub const DEFAULT_RAW_METHODS: &[&str] = &[
    "$queryRaw",
    "$queryRawUnsafe",
    "$executeRaw",
    "$executeRawUnsafe",
    "rawQuery",
    "rawExecute",
];
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];
/// Directory names pruned before descent, in addition to hidden directories.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "out",
    "coverage",
    "vendor",
    "target",
    ".next",
    ".turbo",
    ".vercel",
];
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;

#[derive(Debug, Default, Deserialize, Clone)]
/// Window section under `[window]`.
pub struct WindowCfg {
    pub before: Option<usize>,
    pub after: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Severity section under `[severity]`.
pub struct SeverityCfg {
    /// Operation kinds reported as warnings instead of critical.
    pub warn_on: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `tenantlint.toml|yaml`.
pub struct TenantlintConfig {
    pub scope_keys: Option<Vec<String>>,
    pub scope_helpers: Option<Vec<String>>,
    pub data_access_roots: Option<Vec<String>>,
    pub raw_query_methods: Option<Vec<String>>,
    pub exempt: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub skip_dirs: Option<Vec<String>>,
    pub mode: Option<String>,
    pub output: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_file_size: Option<u64>,
    pub respect_gitignore: Option<bool>,
    pub window: Option<WindowCfg>,
    pub severity: Option<SeverityCfg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How call sites are judged.
pub enum Mode {
    /// Parse the file and resolve scope evidence through the syntax tree.
    #[default]
    Syntax,
    /// Line-window heuristic only.
    Window,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "syntax" | "ast" => Ok(Self::Syntax),
            "window" => Ok(Self::Window),
            other => Err(format!("unknown mode '{other}' (expected syntax|window)")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => f.write_str("syntax"),
            Self::Window => f.write_str("window"),
        }
    }
}

#[derive(Debug, Clone)]
/// Analyzer settings for one run. Read-only once resolved.
pub struct Settings {
    pub root: PathBuf,
    pub scope_keys: Vec<String>,
    pub scope_helpers: Vec<String>,
    pub data_access_roots: Vec<String>,
    pub raw_query_methods: Vec<String>,
    pub exempt: ExemptionSet,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub skip_dirs: Vec<String>,
    pub mode: Mode,
    pub window: WindowSize,
    pub warn_on: Vec<OperationKind>,
    pub timeout: Option<Duration>,
    pub max_file_size: u64,
    pub respect_gitignore: bool,
}

impl Settings {
    /// Default settings for scanning `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scope_keys: owned(DEFAULT_SCOPE_KEYS),
            scope_helpers: owned(DEFAULT_SCOPE_HELPERS),
            data_access_roots: owned(DEFAULT_ROOTS),
            raw_query_methods: owned(DEFAULT_RAW_METHODS),
            exempt: ExemptionSet::defaults(),
            extensions: owned(DEFAULT_EXTENSIONS),
            exclude: Vec::new(),
            skip_dirs: owned(DEFAULT_SKIP_DIRS),
            mode: Mode::default(),
            window: WindowSize::default(),
            warn_on: Vec::new(),
            timeout: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            respect_gitignore: true,
        }
    }
}

#[derive(Debug, Default, Clone)]
/// Values supplied on the command line. `None` defers to config/defaults.
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub exclude: Vec<String>,
    pub mode: Option<String>,
    pub output: Option<String>,
    pub before: Option<usize>,
    pub after: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub settings: Settings,
    pub output: String,
    /// Config file that contributed, if any.
    pub config_path: Option<PathBuf>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Walk upward from `start` to find a config file.
///
/// Stops at the first directory holding a `tenantlint.*` file or a `.git`
/// directory; returns `None` when neither yields a config.
pub fn discover_config(start: &Path) -> Option<PathBuf> {
    let mut cur = start;
    loop {
        for name in CONFIG_FILES {
            let candidate = cur.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if cur.join(".git").exists() {
            return None;
        }
        cur = cur.parent()?;
    }
}

/// Load a config file, choosing the parser by extension.
pub fn load_config(path: &Path) -> Result<TenantlintConfig, ScanError> {
    let text = fs::read_to_string(path).map_err(|source| ScanError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let parsed = if is_yaml {
        serde_yaml::from_str(&text).map_err(|e| e.to_string())
    } else {
        toml::from_str(&text).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| ScanError::ConfigParse {
        path: path.to_path_buf(),
        message,
    })
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli_root: Option<&str>, cli: &Overrides) -> Result<Effective, ScanError> {
    let root = PathBuf::from(cli_root.unwrap_or("."));
    // Absolute, so config discovery can climb past the working directory.
    // A missing root is reported by the walker.
    let root = fs::canonicalize(&root).unwrap_or(root);
    let config_path = match cli.config.as_ref() {
        Some(p) => Some(p.clone()),
        None => discover_config(&root),
    };
    let cfg = match config_path.as_ref() {
        Some(p) => load_config(p)?,
        None => TenantlintConfig::default(),
    };

    let mut settings = Settings::for_root(root);
    if let Some(keys) = cfg.scope_keys {
        settings.scope_keys = keys;
    }
    if let Some(helpers) = cfg.scope_helpers {
        settings.scope_helpers = helpers;
    }
    if let Some(roots) = cfg.data_access_roots {
        settings.data_access_roots = roots;
    }
    if let Some(methods) = cfg.raw_query_methods {
        settings.raw_query_methods = methods;
    }
    if let Some(names) = cfg.exempt {
        settings.exempt = ExemptionSet::new(names);
    }
    if let Some(exts) = cfg.extensions {
        settings.extensions = exts
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
    }
    if let Some(dirs) = cfg.skip_dirs {
        settings.skip_dirs = dirs;
    }
    settings.exclude = cfg.exclude;
    settings
        .exclude
        .extend(cli.exclude.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));

    if let Some(mode) = cli.mode.as_deref().or(cfg.mode.as_deref()) {
        settings.mode = mode.parse().map_err(|message| ScanError::InvalidSetting {
            key: "mode".into(),
            message,
        })?;
    }
    let win = cfg.window.unwrap_or_default();
    settings.window = WindowSize {
        before: cli.before.or(win.before).unwrap_or(settings.window.before),
        after: cli.after.or(win.after).unwrap_or(settings.window.after),
    };
    if let Some(tokens) = cfg.severity.and_then(|s| s.warn_on) {
        settings.warn_on = tokens
            .iter()
            .map(|t| {
                OperationKind::parse_token(t).ok_or_else(|| ScanError::InvalidSetting {
                    key: "severity.warn_on".into(),
                    message: format!("unknown operation kind '{t}'"),
                })
            })
            .collect::<Result<_, _>>()?;
    }
    settings.timeout = cli
        .timeout_secs
        .or(cfg.timeout_secs)
        .filter(|s| *s > 0)
        .map(Duration::from_secs);
    settings.max_file_size = cfg.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE);
    settings.respect_gitignore = cfg.respect_gitignore.unwrap_or(true);

    if settings.scope_keys.iter().all(|k| k.trim().is_empty()) {
        return Err(ScanError::InvalidSetting {
            key: "scope_keys".into(),
            message: "at least one scope key is required".into(),
        });
    }

    let output = cli
        .output
        .clone()
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());
    if output != "human" && output != "json" {
        return Err(ScanError::InvalidSetting {
            key: "output".into(),
            message: format!("unknown output '{output}' (expected human|json)"),
        });
    }

    Ok(Effective {
        settings,
        output,
        config_path,
    })
}
