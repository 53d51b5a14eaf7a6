//! Parameter space of upstream indices
//!
//! Every configured branch is combined with every repository and
//! architecture, except that stable branches never carry the `testing`
//! repository. Upstream does not publish those archives, so they are dropped
//! before anything is downloaded.

use crate::config::{IndexConfig, LATEST_STABLE_BRANCH, TESTING_REPOSITORY};
use crate::index::types::Triple;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpace {
    branches: Vec<String>,
    repositories: Vec<String>,
    architectures: Vec<String>,
}

impl ParameterSpace {
    pub fn new(branches: Vec<String>, repositories: Vec<String>, architectures: Vec<String>) -> Self {
        Self {
            branches,
            repositories,
            architectures,
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(
            config.branches.clone(),
            config.repositories.clone(),
            config.architectures.clone(),
        )
    }

    /// All fetchable triples, branch-major, in configuration order
    pub fn triples(&self) -> Vec<Triple> {
        let mut triples = Vec::new();
        for branch in &self.branches {
            for repository in &self.repositories {
                if is_excluded(branch, repository) {
                    continue;
                }
                for architecture in &self.architectures {
                    triples.push(Triple::new(branch, repository, architecture));
                }
            }
        }
        triples
    }
}

/// Whether upstream never publishes `repository` for `branch`
pub fn is_excluded(branch: &str, repository: &str) -> bool {
    repository == TESTING_REPOSITORY && is_stable_branch(branch)
}

/// `latest-stable` or a release branch such as `v3.19` / `3.19`
pub fn is_stable_branch(branch: &str) -> bool {
    if branch == LATEST_STABLE_BRANCH {
        return true;
    }
    let release = branch.strip_prefix('v').unwrap_or(branch);
    release.starts_with(|c: char| c.is_ascii_digit())
}
