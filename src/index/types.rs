//! Common types for the index mirror

use std::fmt;

/// A single (branch, repository, architecture) combination, e.g. `edge/main/x86_64`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub branch: String,
    pub repository: String,
    pub architecture: String,
}

impl Triple {
    pub fn new(branch: &str, repository: &str, architecture: &str) -> Self {
        Self {
            branch: branch.to_string(),
            repository: repository.to_string(),
            architecture: architecture.to_string(),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.branch, self.repository, self.architecture
        )
    }
}

/// One package version as published in one triple's index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexRecord {
    pub package: String,
    pub branch: String,
    pub repository: String,
    pub architecture: String,
    pub version: String,
}

impl IndexRecord {
    pub fn new(triple: &Triple, package: &str, version: &str) -> Self {
        Self {
            package: package.to_string(),
            branch: triple.branch.clone(),
            repository: triple.repository.clone(),
            architecture: triple.architecture.clone(),
            version: version.to_string(),
        }
    }
}
