use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::index::error::StoreError;

/// Build file values that must be present after extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Branch,
    VersionCurrent,
    Package,
    PinToken,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Field::Branch => "branch (FROM <distro>:<branch>)",
            Field::VersionCurrent => "version (LABEL version=\"...\")",
            Field::Package => "package name (LABEL name=\"...\")",
            Field::PinToken => "version pin (<package>=<version>)",
        };
        f.write_str(description)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Missing {0}")]
    Missing(Field),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Failed to resolve version: {0}")]
    Store(#[from] StoreError),

    #[error("{package}={version} is already pinned, the build file looks partially updated")]
    VersionConflict { package: String, version: String },
}

/// Failure while processing one build file
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?}: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
