//! Best-candidate lookup across repositories

#[cfg(test)]
use mockall::automock;

use crate::index::error::StoreError;
use crate::index::store::IndexStore;
use crate::index::types::IndexRecord;
use crate::index::version::is_newer;

/// Trait for looking up a package in the mirrored index
#[cfg_attr(test, automock)]
pub trait IndexQuery: Send + Sync {
    /// At most one record for `package` on `branch` in any of `repositories`
    fn query(
        &self,
        package: &str,
        branch: &str,
        repositories: &[String],
    ) -> Result<Option<IndexRecord>, StoreError>;
}

impl IndexQuery for IndexStore {
    fn query(
        &self,
        package: &str,
        branch: &str,
        repositories: &[String],
    ) -> Result<Option<IndexRecord>, StoreError> {
        IndexStore::query(self, package, branch, repositories)
    }
}

/// The version chosen for a package and the repository it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub version: String,
    pub repository: String,
}

/// Find the greatest version of `package` on `branch` across `repositories`
///
/// Repositories are queried one by one in the given order. The greatest
/// version wins; on equal versions the first repository is kept. `Ok(None)`
/// means no repository has the package, while an `Err` means the index itself
/// could not be consulted.
pub fn resolve_version<'a, Q: IndexQuery + ?Sized>(
    index: &Q,
    package: &str,
    branch: &str,
    repositories: impl IntoIterator<Item = &'a str>,
) -> Result<Option<Candidate>, StoreError> {
    let mut best: Option<Candidate> = None;

    for repository in repositories {
        let Some(record) = index.query(package, branch, &[repository.to_string()])? else {
            continue;
        };

        let current = best.as_ref().map(|c| c.version.as_str()).unwrap_or("");
        if is_newer(&record.version, current) {
            tracing::debug!(
                "{}/{} {}: {} > {:?}",
                branch,
                repository,
                package,
                record.version,
                current
            );
            best = Some(Candidate {
                version: record.version,
                repository: repository.to_string(),
            });
        }
    }

    Ok(best)
}
