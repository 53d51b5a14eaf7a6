//! APKINDEX parser
//!
//! The index is a sequence of `key:value` lines grouped per package. Only two
//! keys matter here:
//!
//! ```text
//! P:curl
//! V:8.5.0-r0
//! ```
//!
//! A `P` line opens a package and the following `V` line completes it. Every
//! other line (checksums, dependencies, sizes, blank separators) is skipped.

use crate::index::error::ParseError;
use crate::index::types::{IndexRecord, Triple};

/// Width of the `P:` / `V:` prefix in front of each value
const FIELD_PREFIX_LEN: usize = 2;

/// Parse one decompressed index into records for `triple`, in file order
pub fn parse_index(content: &str, triple: &Triple) -> Result<Vec<IndexRecord>, ParseError> {
    let mut records = Vec::new();
    let mut package: Option<&str> = None;

    for (line_num, line) in content.lines().enumerate() {
        match line.as_bytes().first() {
            Some(b'P') => package = Some(field_value(line)),
            Some(b'V') => {
                let Some(name) = package else {
                    return Err(ParseError::VersionWithoutPackage { line: line_num + 1 });
                };
                records.push(IndexRecord::new(triple, name, field_value(line)));
            }
            _ => {}
        }
    }

    Ok(records)
}

fn field_value(line: &str) -> &str {
    line.get(FIELD_PREFIX_LEN..).unwrap_or("")
}
