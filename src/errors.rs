//! Error types for Userscript Fetcher
//!
//! This module defines error types for all components of the application.
//! Transfer and parse errors are clonable because they are fanned out through
//! the downloader's awaitable signals to every waiter.

use std::path::PathBuf;
use thiserror::Error;

/// Network transfer errors
///
/// One transfer failing is fatal to the whole install attempt, so these carry
/// the URL that failed for the single per-attempt error report.
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    /// Server returned a non-success status
    #[error("Server returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Request failed at the network level
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Transfer was aborted before completion
    #[error("Transfer aborted: {url}")]
    Aborted { url: String },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

impl TransferError {
    /// Wrap a reqwest error, flattening it to a clonable message
    pub fn request(url: &url::Url, error: &reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            message: error.to_string(),
        }
    }

    /// The URL the failed transfer was targeting
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Request { url, .. }
            | Self::Aborted { url }
            | Self::InvalidUrl { url, .. } => url,
        }
    }
}

/// Script header parsing errors
///
/// Only fatal once the primary transfer has fully completed; while bytes are
/// still arriving these are swallowed and the parse is retried on the next
/// chunk.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    /// No recognisable metadata header in a complete script
    #[error("Script has no metadata header block")]
    HeaderMissing,

    /// Header block was opened but never closed
    #[error("Script metadata header is not closed")]
    HeaderNotClosed,

    /// Header is missing the required name directive
    #[error("Script metadata header has no @name")]
    MissingName,

    /// A directive line could not be understood
    #[error("Malformed metadata directive at line {line}: {content}")]
    MalformedDirective { line: usize, content: String },

    /// Two resources were declared with the same name
    #[error("Duplicate resource name: {name}")]
    DuplicateResource { name: String },

    /// A directive referenced an unparseable URL
    #[error("Invalid URL in metadata directive: {value} - {error}")]
    InvalidUrl { value: String, error: String },
}

/// Installed-script registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Another installed script already uses this name/namespace pair
    #[error("A script named {name:?} already exists in namespace {namespace:?}")]
    Conflict { name: String, namespace: String },

    /// No installed script with the given identifier
    #[error("No installed script with uuid {uuid}")]
    NotFound { uuid: uuid::Uuid },

    /// Registry directory not found or inaccessible
    #[error("Registry directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// I/O error reading or writing script records
    #[error("Registry file I/O error")]
    Io(#[from] std::io::Error),

    /// Script record serialization error
    #[error("Script record serialization error")]
    Json(#[from] serde_json::Error),

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be written
    #[error("Failed to write configuration")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Failure of one install attempt
///
/// Clonable so the same failure can reject both the metadata signal and the
/// completion signal, and be observed by any number of waiters.
#[derive(Error, Debug, Clone)]
pub enum InstallError {
    /// A transfer failed or was aborted
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The script header could not be parsed from the complete body
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The attempt was started without a script source
    #[error("Install attempt has neither a script URL nor inline content")]
    NoSource,
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Install attempt error
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Registry error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Install(InstallError::Transfer(_)) => "transfer",
            AppError::Install(InstallError::Parse(_)) => "parse",
            AppError::Install(InstallError::NoSource) => "install",
            AppError::Registry(_) => "registry",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

impl From<TransferError> for AppError {
    fn from(error: TransferError) -> Self {
        AppError::Install(InstallError::Transfer(error))
    }
}

impl From<ParseError> for AppError {
    fn from(error: ParseError) -> Self {
        AppError::Install(InstallError::Parse(error))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Transfer result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Parse result type alias
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Registry result type alias
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Install attempt result type alias
pub type InstallResult<T> = std::result::Result<T, InstallError>;
