use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Malformed index text
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Version on line {line} has no preceding package line")]
    VersionWithoutPackage { line: usize },
}

/// Failure while ingesting a single triple
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to decompress {path:?}: {source}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read index {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed index {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Failed to insert records: {0}")]
    Insert(#[from] rusqlite::Error),

    #[error("Ingest task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Index store is not connected")]
    Unavailable,

    #[error("Index store has never been built, run a rebuild first")]
    NotInitialized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Filesystem error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No index could be ingested ({attempted} attempted), last failure: {source}")]
    NothingIngested {
        attempted: usize,
        #[source]
        source: IngestError,
    },

    #[error("Rebuild did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Staging task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Index store lock poisoned")]
    LockPoisoned,
}
