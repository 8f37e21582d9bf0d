use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all operations in `retoken`.
///
/// Per-file I/O problems are wrapped in [`Error::Processing`] so the caller can
/// report the offending path and keep going with the rest of the tree.
#[derive(Error, Debug)]
pub enum Error {
    /// An error related to file system I/O.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred while parsing a YAML configuration file.
    #[error("Config parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A general configuration-related error.
    #[error("Config error: {0}")]
    Config(String),

    /// An error that occurred while reading or rewriting a single file.
    #[error("File processing failed for {path}: {source}")]
    Processing {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An error from the `ignore` crate, which is used for directory traversal.
    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),

    /// An error that occurred while building the Rayon thread pool.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// An error related to CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An error related to JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An invalid progress bar template.
    #[error("Progress template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}

impl Error {
    /// Wraps any error as a processing failure for `path`.
    pub fn processing<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Processing {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// A convenient type alias for `Result<T, retoken::errors::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Config(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Config(s.to_string())
    }
}
