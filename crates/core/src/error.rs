use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog does not exist: {}", .0.display())]
    CatalogNotFound(PathBuf),

    #[error("catalog has no '{0}' entry in its meta table (not an F-Spot catalog?)")]
    MetadataMissing(String),

    #[error("catalog version '{value}' is not a valid version number")]
    MetadataMalformed { value: String },

    #[error("cannot decode '{value}': escaped bytes are not valid UTF-8")]
    Encoding { value: String },

    #[error("failed to commit {what}: {source}")]
    CommitFailed {
        what: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to back up catalog to {}: {source}", .path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog backup failed earlier in this run; refusing to modify the catalog")]
    BackupUnavailable,

    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("tag '{0}' is not set on any of the selected photos")]
    TagNotSet(String),

    #[error("rating must be between 0 and 5, got {0}")]
    InvalidRating(i64),

    #[error("cannot execute '{0}' — is it installed?")]
    MissingBinary(String),
}

pub type Result<T> = std::result::Result<T, Error>;
