//! Application-wide error types.
//!
//! Library modules return [`Result`] with the [`Error`] enum below, while
//! the CLI uses `anyhow` for convenient error propagation.
//!
//! Only failures that stop an operation are represented here. Degenerate
//! tag values, persistence conflicts and unmatched albums are ordinary
//! outcomes and never surface as an [`Error`].

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local store or external catalog query error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The tag container (or raw audio stream) of a file cannot be opened.
    /// Fatal for that file only; the scan skips it.
    #[error("Unreadable metadata for {path}: {message}")]
    UnreadableMetadata { path: PathBuf, message: String },

    /// Aggregation called without any tracks.
    #[error("No tracks to aggregate in {0}")]
    EmptyAlbum(PathBuf),

    /// External catalog returned something we cannot use
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Report writing error
    #[error("Report error: {0}")]
    Report(#[from] csv::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an unreadable-metadata error.
    pub fn unreadable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UnreadableMetadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}
