//! Error types for the experiment data readers.
//!
//! Every module that produces an error imports its error type from here
//! rather than defining it inline, keeping the hierarchy centralised.
//!
//! ## Hierarchy
//!
//! ```text
//! ReaderError (top-level)
//! ├── ConfigError   (option validation / config file loading)
//! └── DatasetError  (taxonomy, data loading, I/O, format)
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Convenient `Result` alias used by reader-level functions.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Top-level error type for the experiment data layer.
///
/// Lower-level functions in [`crate::config`], [`crate::ground_truth`] and
/// the readers return their module-specific error types which coerce into
/// `ReaderError` via [`From`].
#[derive(Debug, Error)]
pub enum ReaderError {
    /// A configuration validation or loading error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A dataset loading or access error.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

/// Errors produced when loading or validating a [`ReaderConfig`].
///
/// [`ReaderConfig`]: crate::config::ReaderConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read or written.
    #[error("Cannot access config file `{path}`: {source}")]
    FileAccess {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{path}`: {source}")]
    Parse {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue { field, reason: reason.into() }
    }
}

/// Errors produced while loading or streaming experiment data.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The caller asked for a taxonomy this crate does not define.
    #[error("Unknown emotion taxonomy `{requested}` (expected `neutral_ekman` or `three`)")]
    InvalidTaxonomy {
        /// The rejected taxonomy name.
        requested: String,
    },

    /// A supported option combination that is not implemented.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A required data file or directory was not found on disk.
    #[error("Data not found at `{path}`: {message}")]
    DataNotFound {
        /// Path that was expected to contain data.
        path: PathBuf,
        /// Additional context.
        message: String,
    },

    /// A file was found but its contents do not match the expected format.
    #[error("Invalid data format in `{path}`: {message}")]
    InvalidFormat {
        /// Path of the malformed file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// A CSV file is missing a required column.
    #[error("Missing column `{column}` in `{path}`")]
    MissingColumn {
        /// Path of the CSV file.
        path: PathBuf,
        /// The column that was expected.
        column: String,
    },

    /// A low-level I/O error while reading a data file.
    #[error("I/O error reading `{path}`: {source}")]
    Io {
        /// Path being read when the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A CSV parse error.
    #[error("CSV error in `{path}`: {source}")]
    Csv {
        /// Path being parsed when the error occurred.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// A JSON parse error in a ground-truth trace.
    #[error("JSON error in `{path}`: {source}")]
    Json {
        /// Path being parsed when the error occurred.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl DatasetError {
    /// Construct a [`DatasetError::DataNotFound`].
    pub fn not_found<S: Into<String>>(path: impl Into<PathBuf>, msg: S) -> Self {
        DatasetError::DataNotFound { path: path.into(), message: msg.into() }
    }

    /// Construct a [`DatasetError::InvalidFormat`].
    pub fn invalid_format<S: Into<String>>(path: impl Into<PathBuf>, msg: S) -> Self {
        DatasetError::InvalidFormat { path: path.into(), message: msg.into() }
    }

    /// Construct a [`DatasetError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io { path: path.into(), source }
    }

    /// Construct a [`DatasetError::NotImplemented`].
    pub fn not_implemented<S: Into<String>>(msg: S) -> Self {
        DatasetError::NotImplemented(msg.into())
    }
}
