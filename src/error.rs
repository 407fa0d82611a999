use std::path::PathBuf;
use thiserror::Error;

/// Fatal, fail-fast errors: bad inputs and bad configuration. Semantic
/// approximations (unresolved dispatch, division by zero, unknown statement
/// effects) are never errors — the analyses handle those conservatively and
/// keep going.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error in {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported program format version {version}: {reason}")]
    UnsupportedVersion { version: String, reason: String },

    #[error("Unresolved reference in program: {what}")]
    Resolve { what: String },

    #[error("Program has no entry method")]
    MissingEntry,

    #[error("Unknown analysis pass '{id}'")]
    UnknownPass { id: String },

    #[error("Config error: {0}")]
    Config(String),
}

/// A non-fatal warning surfaced alongside results.
#[derive(Debug, Clone)]
pub struct AnalyzerWarning {
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// A taint-config entry names a method the program does not declare.
    UnmatchedConfigMethod,
    /// A requested pass could not run and was skipped.
    PassSkipped,
}

impl AnalyzerWarning {
    pub fn unmatched_config_method(name: &str) -> Self {
        Self {
            kind: WarningKind::UnmatchedConfigMethod,
            message: format!("taint config names unknown method '{name}' — entry ignored"),
        }
    }

    pub fn pass_skipped(pass: &str, reason: &str) -> Self {
        Self {
            kind: WarningKind::PassSkipped,
            message: format!("pass '{pass}' skipped: {reason}"),
        }
    }
}
