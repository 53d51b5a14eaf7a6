//! Dockerfile model
//!
//! A build file pins one Alpine package. The model pulls out where the image
//! comes from (`FROM alpine:edge`), which package it ships
//! (`LABEL name="curl"`, `LABEL version="8.5.0"`) and the literal pin used to
//! install it (`curl=8.5.0-r0`), then rewrites those strings when the index
//! knows a newer version.
//!
//! - [`extract`]: single-pass extraction from Dockerfile text
//! - [`patch`]: version resolution and text rewriting
//! - [`error`]: extraction, update and file errors

pub mod error;
pub mod extract;
pub mod patch;

use std::path::Path;

use indexmap::IndexSet;

pub use error::{TargetError, ExtractError, Field, UpdateError};
pub use patch::UpdateOutcome;

/// File name looked up in each target directory
pub const BUILD_FILE_NAME: &str = "Dockerfile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFile {
    /// Raw lines split on `\n`, joined back verbatim on output
    lines: Vec<String>,
    distro: String,
    branch: String,
    package: String,
    version_current: String,
    version_new: String,
    pin_token: String,
    repositories: IndexSet<String>,
}

impl BuildFile {
    /// Extract the model from Dockerfile text
    pub fn parse(content: &str) -> Result<Self, ExtractError> {
        extract::extract(content)
    }

    pub fn read(path: &Path) -> Result<Self, TargetError> {
        let content = std::fs::read_to_string(path).map_err(|source| TargetError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content).map_err(|source| TargetError::Extract {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), TargetError> {
        std::fs::write(path, self.to_text()).map_err(|source| TargetError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn distro(&self) -> &str {
        &self.distro
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn version_current(&self) -> &str {
        &self.version_current
    }

    /// Best version seen by the last update, empty before that or when none was found
    pub fn version_new(&self) -> &str {
        &self.version_new
    }

    pub fn pin_token(&self) -> &str {
        &self.pin_token
    }

    pub fn repositories(&self) -> &IndexSet<String> {
        &self.repositories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOCKERFILE: &str = "FROM alpine:edge\nLABEL name=\"curl\"\nLABEL version=\"1.2.3\"\nRUN apk add --no-cache curl=1.2.3-r0\n";

    #[test]
    fn read_and_write_round_trip_unchanged_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(BUILD_FILE_NAME);
        std::fs::write(&path, DOCKERFILE).unwrap();

        let build_file = BuildFile::read(&path).unwrap();
        build_file.write(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), DOCKERFILE);
    }

    #[test]
    fn read_reports_missing_file() {
        let temp_dir = TempDir::new().unwrap();

        let result = BuildFile::read(&temp_dir.path().join(BUILD_FILE_NAME));

        assert!(matches!(result, Err(TargetError::Read { .. })));
    }

    #[test]
    fn read_reports_extraction_failure_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(BUILD_FILE_NAME);
        std::fs::write(&path, "FROM alpine\n").unwrap();

        let result = BuildFile::read(&path);

        match result {
            Err(TargetError::Extract { path: error_path, source }) => {
                assert_eq!(error_path, path);
                assert_eq!(source, ExtractError::Missing(Field::Branch));
            }
            other => panic!("expected extraction error, got {other:?}"),
        }
    }
}
