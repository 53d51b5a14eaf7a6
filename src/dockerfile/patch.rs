//! Version bump of a [`BuildFile`]

use tracing::{debug, info};

use super::BuildFile;
use super::error::UpdateError;
use crate::index::resolver::{IndexQuery, resolve_version};
use crate::index::version::is_newer;

/// Result of a successful update attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The text now carries `to` in place of `from`
    Updated { from: String, to: String },
    /// Nothing changed; `candidate` is the best version found, if any
    AlreadyUpToDate {
        current: String,
        candidate: Option<String>,
    },
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

impl BuildFile {
    /// Look up the best version of the package and rewrite the text when it is newer
    pub fn update<Q: IndexQuery + ?Sized>(&mut self, index: &Q) -> Result<UpdateOutcome, UpdateError> {
        let candidate = resolve_version(
            index,
            &self.package,
            &self.branch,
            self.repositories.iter().map(String::as_str),
        )?;

        self.apply_version(candidate.map(|c| c.version).unwrap_or_default())
    }

    /// Rewrite the text for `version_new` when it is newer than the current version
    ///
    /// The pin token is replaced before the bare version, so a new version
    /// containing the old one is never rewritten twice.
    pub fn apply_version(&mut self, version_new: String) -> Result<UpdateOutcome, UpdateError> {
        self.version_new = version_new;

        if !is_newer(&self.version_new, &self.version_current) {
            debug!(
                "{}: {} is current (candidate {:?})",
                self.package, self.version_current, self.version_new
            );
            return Ok(UpdateOutcome::AlreadyUpToDate {
                current: self.version_current.clone(),
                candidate: (!self.version_new.is_empty()).then(|| self.version_new.clone()),
            });
        }

        if pin_carries(&self.pin_token, &self.version_new) {
            return Err(UpdateError::VersionConflict {
                package: self.package.clone(),
                version: self.version_new.clone(),
            });
        }

        let new_pin = format!("{}={}", self.package, self.version_new);
        for line in self.lines.iter_mut() {
            *line = rewrite_line(
                line,
                &self.pin_token,
                &new_pin,
                &self.version_current,
                &self.version_new,
            );
        }

        let from = std::mem::replace(&mut self.version_current, self.version_new.clone());
        self.pin_token = new_pin;

        info!("{}: {} -> {}", self.package, from, self.version_current);
        Ok(UpdateOutcome::Updated {
            from,
            to: self.version_current.clone(),
        })
    }
}

/// Whether the pin already names `version`, exactly or with a `-rN` style suffix
fn pin_carries(pin_token: &str, version: &str) -> bool {
    let pinned = pin_token.split_once('=').map_or("", |(_, value)| value);
    pinned == version
        || pinned
            .strip_prefix(version)
            .is_some_and(|rest| rest.starts_with('-'))
}

fn rewrite_line(line: &str, pin: &str, new_pin: &str, current: &str, new: &str) -> String {
    line.split(pin)
        .map(|segment| segment.replace(current, new))
        .collect::<Vec<_>>()
        .join(new_pin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::error::StoreError;
    use crate::index::resolver::MockIndexQuery;
    use crate::index::types::{IndexRecord, Triple};
    use mockall::predicate::eq;
    use rstest::rstest;

    const CURL: &str = "FROM alpine:edge\nLABEL name=\"curl\"\nLABEL version=\"1.2.3\"\nRUN apk add --no-cache curl=1.2.3-r0\n";

    fn index_with(versions: &'static [(&'static str, Option<&'static str>)]) -> MockIndexQuery {
        let mut mock = MockIndexQuery::new();
        for &(repository, version) in versions {
            mock.expect_query()
                .with(eq("curl"), eq("edge"), eq(vec![repository.to_string()]))
                .returning(move |package, branch, _| {
                    Ok(version.map(|v| {
                        IndexRecord::new(&Triple::new(branch, repository, "x86_64"), package, v)
                    }))
                });
        }
        mock
    }

    #[test]
    fn update_rewrites_label_and_pin() {
        let mut build_file = BuildFile::parse(CURL).unwrap();
        let index = index_with(&[("main", Some("1.3.0")), ("community", None)]);

        let outcome = build_file.update(&index).unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::Updated {
                from: "1.2.3".to_string(),
                to: "1.3.0".to_string()
            }
        );
        assert_eq!(
            build_file.to_text(),
            "FROM alpine:edge\nLABEL name=\"curl\"\nLABEL version=\"1.3.0\"\nRUN apk add --no-cache curl=1.3.0\n"
        );
        assert_eq!(build_file.version_current(), "1.3.0");
        assert_eq!(build_file.pin_token(), "curl=1.3.0");
    }

    #[test]
    fn update_twice_is_a_no_op() {
        let mut build_file = BuildFile::parse(CURL).unwrap();
        let index = index_with(&[("main", Some("1.3.0")), ("community", None)]);
        build_file.update(&index).unwrap();
        let after_first = build_file.to_text();

        let outcome = build_file.update(&index).unwrap();

        assert!(!outcome.is_updated());
        assert_eq!(build_file.to_text(), after_first);

        let mut reparsed = BuildFile::parse(&after_first).unwrap();
        assert!(!reparsed.update(&index).unwrap().is_updated());
    }

    #[rstest]
    #[case::equal(Some("1.2.3"), Some("1.2.3"))]
    #[case::older(Some("1.2.0"), Some("1.2.0"))]
    #[case::not_found(None, None)]
    fn update_leaves_text_untouched(
        #[case] found: Option<&'static str>,
        #[case] candidate: Option<&str>,
    ) {
        let mut build_file = BuildFile::parse(CURL).unwrap();
        let mut index = MockIndexQuery::new();
        index
            .expect_query()
            .returning(move |package, branch, repositories| {
                Ok(found.map(|v| {
                    IndexRecord::new(&Triple::new(branch, &repositories[0], "x86_64"), package, v)
                }))
            });

        let outcome = build_file.update(&index).unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::AlreadyUpToDate {
                current: "1.2.3".to_string(),
                candidate: candidate.map(String::from)
            }
        );
        assert_eq!(build_file.to_text(), CURL);
    }

    #[test]
    fn update_queries_testing_when_referenced() {
        let content = "FROM alpine:edge\n\
            LABEL name=\"curl\" version=\"1.2.3\"\n\
            RUN echo https://dl-cdn.alpinelinux.org/alpine/edge/testing >> /etc/apk/repositories\n\
            RUN apk add curl=1.2.3-r0\n";
        let mut build_file = BuildFile::parse(content).unwrap();
        let index = index_with(&[
            ("main", Some("1.2.3")),
            ("community", None),
            ("testing", Some("1.4.0")),
        ]);

        let outcome = build_file.update(&index).unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::Updated {
                from: "1.2.3".to_string(),
                to: "1.4.0".to_string()
            }
        );
    }

    #[test]
    fn update_propagates_store_errors() {
        let mut build_file = BuildFile::parse(CURL).unwrap();
        let mut index = MockIndexQuery::new();
        index
            .expect_query()
            .returning(|_, _, _| Err(StoreError::NotInitialized));

        let result = build_file.update(&index);

        assert!(matches!(
            result,
            Err(UpdateError::Store(StoreError::NotInitialized))
        ));
        assert_eq!(build_file.to_text(), CURL);
    }

    #[test]
    fn apply_version_detects_partially_updated_file() {
        let content = "FROM alpine:edge\nLABEL name=curl version=1.2.3\nRUN apk add curl=1.3.0-r0\n";
        let mut build_file = BuildFile::parse(content).unwrap();

        let result = build_file.apply_version("1.3.0".to_string());

        assert!(matches!(
            result,
            Err(UpdateError::VersionConflict { ref package, ref version })
                if package == "curl" && version == "1.3.0"
        ));
        assert_eq!(build_file.to_text(), content);
    }

    #[test]
    fn apply_version_with_old_version_inside_new_one() {
        let content = "FROM alpine:edge\nLABEL name=foo version=1.2\nRUN apk add foo=1.2-r0\n";
        let mut build_file = BuildFile::parse(content).unwrap();

        build_file.apply_version("1.2.1".to_string()).unwrap();

        assert_eq!(
            build_file.to_text(),
            "FROM alpine:edge\nLABEL name=foo version=1.2.1\nRUN apk add foo=1.2.1\n"
        );
    }

    #[test]
    fn apply_version_uses_lexicographic_order() {
        let content = "FROM alpine:edge\nLABEL name=foo version=9.0\nRUN apk add foo=9.0-r0\n";
        let mut build_file = BuildFile::parse(content).unwrap();

        let outcome = build_file.apply_version("10.0".to_string()).unwrap();

        assert!(!outcome.is_updated());
    }

    #[rstest]
    #[case::exact("curl=1.3.0", "1.3.0", true)]
    #[case::release_suffix("curl=1.3.0-r1", "1.3.0", true)]
    #[case::older("curl=1.2.3-r0", "1.3.0", false)]
    #[case::prefix_only("curl=1.3.01", "1.3.0", false)]
    fn pin_carries_cases(#[case] pin: &str, #[case] version: &str, #[case] expected: bool) {
        assert_eq!(pin_carries(pin, version), expected);
    }
}
