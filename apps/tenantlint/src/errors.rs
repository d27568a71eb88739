//! Error types.
//!
//! `ScanError` is fatal: the run aborts and no report is produced. Per-file
//! problems are not errors here; they surface as `SkippedFile` or
//! `ToolWarning` entries in the report.

use std::path::PathBuf;

/// Fatal errors that abort a scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scan root not found: {}", path.display())]
    RootNotFound { path: PathBuf },

    #[error("scan root is not a directory: {}", path.display())]
    RootNotDirectory { path: PathBuf },

    #[error("failed to walk {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },

    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("invalid exclude glob '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("invalid setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },

    #[error("failed to build matcher: {0}")]
    Pattern(#[from] regex::Error),
}

impl ScanError {
    /// Stable code for machine consumers and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RootNotFound { .. } => "ROOT_NOT_FOUND",
            Self::RootNotDirectory { .. } => "ROOT_NOT_DIRECTORY",
            Self::Walk { .. } => "WALK_FAILED",
            Self::ConfigRead { .. } => "CONFIG_READ",
            Self::ConfigParse { .. } => "CONFIG_PARSE",
            Self::InvalidGlob { .. } => "INVALID_GLOB",
            Self::InvalidSetting { .. } => "INVALID_SETTING",
            Self::Pattern(_) => "INVALID_PATTERN",
        }
    }
}

/// Why a syntax tree could not be used for a file.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("no grammar for extension '{extension}'")]
    UnsupportedLanguage { extension: String },

    #[error("grammar could not be loaded: {message}")]
    Language { message: String },

    #[error("parser produced no tree")]
    NoTree,

    #[error("source has syntax errors near line {line}")]
    Malformed { line: usize },
}

impl SyntaxError {
    /// Code used for the tool warning raised when a file falls back to the
    /// line window.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedLanguage { .. } => "unsupported-language",
            Self::Language { .. } => "grammar-unavailable",
            Self::NoTree => "parse-failed",
            Self::Malformed { .. } => "malformed-source",
        }
    }
}
