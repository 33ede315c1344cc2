use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Registry,
    Render,
    Conversion,
    Read,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Registry => "registry",
            Stage::Render => "render",
            Stage::Conversion => "conversion",
            Stage::Read => "read",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum FilingKitError {
    #[error("Invalid entity identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid year {year}: must be between {min} and {max}")]
    InvalidYear { year: i32, min: i32, max: i32 },

    #[error("Invalid filing category: {0:?} (expected 10-K, 10-Q, 8-K or DEF 14A)")]
    InvalidFilingCategory(String),

    #[error("Path {path:?} escapes the {workspace} workspace")]
    PathEscape {
        path: String,
        workspace: &'static str,
    },

    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("No {category} filing found for CIK {entity_id} in {fiscal_year}")]
    FilingNotFound {
        entity_id: String,
        fiscal_year: i32,
        category: String,
    },

    #[error("Registry unavailable for {url}: {reason}")]
    RegistryUnavailable { url: String, reason: String },

    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("Conversion failed: {0}")]
    ConversionError(String),

    #[error("Invalid range: start {start}, length {length}")]
    InvalidRange { start: i64, length: i64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl FilingKitError {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            FilingKitError::InvalidIdentifier(_)
            | FilingKitError::InvalidYear { .. }
            | FilingKitError::InvalidFilingCategory(_)
            | FilingKitError::PathEscape { .. }
            | FilingKitError::InvalidRange { .. }
            | FilingKitError::ConfigError(_) => Stage::Validation,
            FilingKitError::FilingNotFound { .. }
            | FilingKitError::RegistryUnavailable { .. }
            | FilingKitError::JsonError(_) => Stage::Registry,
            FilingKitError::RenderError(_) => Stage::Render,
            FilingKitError::ConversionError(_) => Stage::Conversion,
            FilingKitError::SourceNotFound(_) | FilingKitError::FileError(_) => Stage::Read,
        }
    }

    /// Whether the error was raised by input validation, before any I/O.
    pub fn is_validation(&self) -> bool {
        self.stage() == Stage::Validation
    }
}

pub type Result<T> = std::result::Result<T, FilingKitError>;
