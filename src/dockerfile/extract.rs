//! Dockerfile extraction
//!
//! One pass over the lines collects:
//! - `FROM [--flag ...] [registry/]distro:branch[@digest]`
//! - `LABEL key=value ...` pairs, of which `name` and `version` are kept
//! - `<name>=<value>` words on any line as pin candidates
//!
//! An untagged `FROM` (`scratch`, a previous stage) only changes the distro,
//! the branch of an earlier tagged stage is kept. The pin is the first
//! candidate whose name equals the package label, wherever it appears
//! relative to the labels.

use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;

use super::BuildFile;
use super::error::{ExtractError, Field};
use crate::config::{BASE_REPOSITORIES, TESTING_REPOSITORY};

/// Match: key="quoted value" | key=value
static LABEL_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z0-9_.\-]+)=(?:"([^"]*)"|'([^']*)'|(\S*))"#).unwrap());

/// Characters shell syntax leaves around a pin word
const PIN_TRIM_CHARS: &[char] = &['"', '\'', ';', ',', '\\', '(', ')'];

pub(crate) fn extract(content: &str) -> Result<BuildFile, ExtractError> {
    let lines: Vec<String> = content.split('\n').map(String::from).collect();

    let mut scan = Scan::default();
    for line in &lines {
        scan.line(line.trim_end_matches('\r'));
    }

    let testing_marker = format!("{}/{}", scan.branch, TESTING_REPOSITORY);
    let uses_testing = !scan.branch.is_empty() && content.contains(&testing_marker);

    scan.finish(lines, uses_testing)
}

#[derive(Debug, Default)]
struct Scan {
    distro: String,
    branch: String,
    package: String,
    version_current: String,
    /// (name, whole token) in order of appearance
    pin_candidates: Vec<(String, String)>,
}

impl Scan {
    fn line(&mut self, line: &str) {
        let mut words = line.split_whitespace();
        let Some(instruction) = words.next() else {
            return;
        };

        if instruction.eq_ignore_ascii_case("FROM") {
            self.from(words);
        } else if instruction.eq_ignore_ascii_case("LABEL") {
            self.label(line);
        }
        self.pins(line);
    }

    fn from<'a>(&mut self, mut words: impl Iterator<Item = &'a str>) {
        let Some(image) = words.find(|word| !word.starts_with("--")) else {
            return;
        };

        let image = image.split('@').next().unwrap_or(image);
        let name = image.rsplit('/').next().unwrap_or(image);

        match name.split_once(':') {
            Some((distro, branch)) => {
                self.distro = distro.to_string();
                self.branch = branch.to_string();
            }
            None => self.distro = name.to_string(),
        }
    }

    fn label(&mut self, line: &str) {
        for caps in LABEL_PAIR_RE.captures_iter(line) {
            let key = &caps[1];
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());

            if key.eq_ignore_ascii_case("version") {
                self.version_current = value.to_string();
            } else if key.eq_ignore_ascii_case("name") {
                self.package = value.to_string();
            }
        }
    }

    fn pins(&mut self, line: &str) {
        for word in line.split_whitespace() {
            let token = word.trim_matches(PIN_TRIM_CHARS);
            if let Some((name, value)) = token.split_once('=') {
                if !name.is_empty() && !value.is_empty() {
                    self.pin_candidates
                        .push((name.to_string(), token.to_string()));
                }
            }
        }
    }

    fn finish(self, lines: Vec<String>, uses_testing: bool) -> Result<BuildFile, ExtractError> {
        if self.branch.is_empty() {
            return Err(ExtractError::Missing(Field::Branch));
        }
        if self.version_current.is_empty() {
            return Err(ExtractError::Missing(Field::VersionCurrent));
        }
        if self.package.is_empty() {
            return Err(ExtractError::Missing(Field::Package));
        }

        let package = self.package;
        let pin_token = self
            .pin_candidates
            .into_iter()
            .find(|(name, _)| *name == package)
            .map(|(_, token)| token)
            .ok_or(ExtractError::Missing(Field::PinToken))?;

        let mut repositories: IndexSet<String> =
            BASE_REPOSITORIES.iter().map(|r| r.to_string()).collect();
        if uses_testing {
            repositories.insert(TESTING_REPOSITORY.to_string());
        }

        Ok(BuildFile {
            lines,
            distro: self.distro,
            branch: self.branch,
            package,
            version_current: self.version_current,
            version_new: String::new(),
            pin_token,
            repositories,
        })
    }
}
