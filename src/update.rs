//! Per-directory bump driver

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::dockerfile::{BUILD_FILE_NAME, BuildFile, TargetError, UpdateOutcome};
use crate::index::resolver::IndexQuery;

/// What happened to one build file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSummary {
    pub path: PathBuf,
    pub package: String,
    pub outcome: UpdateOutcome,
    /// Whether the rewritten text was written back
    pub saved: bool,
}

impl fmt::Display for TargetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            UpdateOutcome::Updated { from, to } => {
                write!(f, "YES {} {} -> {}", self.package, from, to)
            }
            UpdateOutcome::AlreadyUpToDate { current, candidate } => write!(
                f,
                "NO {} {} -> {}",
                self.package,
                current,
                candidate.as_deref().unwrap_or("<package not found>")
            ),
        }
    }
}

/// Read `dir/Dockerfile`, bump its pin against `index` and optionally save it
pub fn process_target<Q: IndexQuery + ?Sized>(
    dir: &Path,
    index: &Q,
    save: bool,
) -> Result<TargetSummary, TargetError> {
    let path = dir.join(BUILD_FILE_NAME);
    let mut build_file = BuildFile::read(&path)?;
    debug!(
        "{:?}: {} {} on {}:{} ({:?})",
        path,
        build_file.package(),
        build_file.version_current(),
        build_file.distro(),
        build_file.branch(),
        build_file.repositories()
    );

    let outcome = build_file.update(index)?;

    let saved = save && outcome.is_updated();
    if saved {
        build_file.write(&path)?;
        info!("Saved {:?}", path);
    }

    Ok(TargetSummary {
        path,
        package: build_file.package().to_string(),
        outcome,
        saved,
    })
}

/// Process every directory; a failing target does not stop the others
pub fn process_targets<Q: IndexQuery + ?Sized>(
    dirs: &[PathBuf],
    index: &Q,
    save: bool,
) -> Vec<(PathBuf, Result<TargetSummary, TargetError>)> {
    dirs.iter()
        .map(|dir| {
            let result = process_target(dir, index, save);
            if let Err(e) = &result {
                error!("{:?}: {}", dir, e);
            }
            (dir.clone(), result)
        })
        .collect()
}
