//! Fake Alpine mirror
//!
//! Builds real `APKINDEX.tar.gz` archives and serves them from a mockito
//! server under `/{branch}/{repository}/{architecture}/APKINDEX.tar.gz`.

use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::{Mock, ServerGuard};
use tempfile::TempDir;

use alpine_bump::config::IndexConfig;
use alpine_bump::index::{IndexFetcher, IndexLayout, IndexStore, ParameterSpace};

/// APKINDEX text for `(name, version)` pairs, in the upstream stanza layout
pub fn index_text(packages: &[(&str, &str)]) -> String {
    packages
        .iter()
        .map(|(name, version)| {
            format!("C:Q1abcdefghijklmnopqrstuvwxyz=\nP:{name}\nV:{version}\nA:x86_64\nS:1024\nT:{name} package\n\n")
        })
        .collect()
}

fn tar_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, data.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(data).unwrap();
    gz.finish().unwrap()
}

/// Gzipped tarball carrying `DESCRIPTION` and `APKINDEX`
pub fn index_archive(packages: &[(&str, &str)]) -> Vec<u8> {
    gzip(&tar_bytes(&[
        ("DESCRIPTION", "v3.19.0-test"),
        ("APKINDEX", &index_text(packages)),
    ]))
}

pub fn archive_path(branch: &str, repository: &str, architecture: &str) -> String {
    format!("/{branch}/{repository}/{architecture}/APKINDEX.tar.gz")
}

/// Serve an index for one triple, expected to be fetched `hits` times
pub async fn serve_index(
    server: &mut ServerGuard,
    (branch, repository, architecture): (&str, &str, &str),
    packages: &[(&str, &str)],
    hits: usize,
) -> Mock {
    server
        .mock("GET", archive_path(branch, repository, architecture).as_str())
        .with_status(200)
        .with_header("content-type", "application/gzip")
        .with_body(index_archive(packages))
        .expect(hits)
        .create_async()
        .await
}

/// Index configuration pointing at `base_url`
pub fn index_config(
    base_url: &str,
    branches: &[&str],
    repositories: &[&str],
    architectures: &[&str],
) -> IndexConfig {
    IndexConfig {
        base_url: base_url.to_string(),
        branches: strings(branches),
        repositories: strings(repositories),
        architectures: strings(architectures),
        ..IndexConfig::default()
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn create_test_store(temp_dir: &TempDir) -> IndexStore {
    IndexStore::open(IndexLayout::new(
        temp_dir.path().join("db").join("alpine"),
        "alpine",
        "APKINDEX",
    ))
    .unwrap()
}

pub fn fetcher_and_space(config: &IndexConfig) -> (IndexFetcher, ParameterSpace) {
    (
        IndexFetcher::from_config(config).unwrap(),
        ParameterSpace::from_config(config),
    )
}

pub fn write_dockerfile(dir: &Path, content: &str) {
    std::fs::write(dir.join("Dockerfile"), content).unwrap();
}
