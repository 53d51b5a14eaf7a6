//! Upstream index download and on-disk layout

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::bufread::MultiGzDecoder;
use tracing::{debug, warn};

use crate::config::{Config, IndexConfig};
use crate::index::error::{FetchError, IngestError};
use crate::index::types::Triple;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const ARCHIVE_EXTENSION: &str = ".tar.gz";
const STAGING_SUFFIX: &str = ".staging";
const PREVIOUS_SUFFIX: &str = ".previous";

/// Where a mirrored index tree lives on disk
///
/// ```text
/// {root}/{distro}.db
/// {root}/{branch}/{repository}/{architecture}/APKINDEX.tar.gz
/// {root}/{branch}/{repository}/{architecture}/APKINDEX
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLayout {
    root: PathBuf,
    distro: String,
    index_filename: String,
}

impl IndexLayout {
    pub fn new(root: PathBuf, distro: &str, index_filename: &str) -> Self {
        Self {
            root,
            distro: distro.to_string(),
            index_filename: index_filename.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.index_root(),
            &config.index.distro,
            &config.index.index_filename,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(format!("{}.db", self.distro))
    }

    pub fn triple_dir(&self, triple: &Triple) -> PathBuf {
        self.root
            .join(&triple.branch)
            .join(&triple.repository)
            .join(&triple.architecture)
    }

    pub fn archive_path(&self, triple: &Triple) -> PathBuf {
        self.triple_dir(triple)
            .join(format!("{}{}", self.index_filename, ARCHIVE_EXTENSION))
    }

    pub fn index_path(&self, triple: &Triple) -> PathBuf {
        self.triple_dir(triple).join(&self.index_filename)
    }

    /// Sibling tree a rebuild fills before it replaces this one
    pub fn staging(&self) -> Self {
        self.sibling(STAGING_SUFFIX)
    }

    /// Sibling tree holding the replaced store while a rebuild swaps trees
    pub fn previous(&self) -> Self {
        self.sibling(PREVIOUS_SUFFIX)
    }

    fn sibling(&self, suffix: &str) -> Self {
        let mut root = self.root.clone().into_os_string();
        root.push(suffix);
        Self {
            root: PathBuf::from(root),
            ..self.clone()
        }
    }
}

/// Downloads and unpacks one index archive per triple
pub struct IndexFetcher {
    client: reqwest::Client,
    base_url: String,
    index_filename: String,
}

impl IndexFetcher {
    pub fn new(base_url: &str, index_filename: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index_filename: index_filename.to_string(),
        })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self, FetchError> {
        Self::new(&config.base_url, &config.index_filename)
    }

    /// `{base}/{branch}/{repository}/{architecture}/{indexFilename}.tar.gz`
    pub fn url(&self, triple: &Triple) -> String {
        format!(
            "{}/{}/{}/{}/{}{}",
            self.base_url,
            triple.branch,
            triple.repository,
            triple.architecture,
            self.index_filename,
            ARCHIVE_EXTENSION
        )
    }

    /// Download the archive for `triple` below `layout` and unpack it in place
    ///
    /// Returns the path of the decompressed index. Existing files for the same
    /// triple are overwritten. No retries are attempted.
    pub async fn fetch(&self, triple: &Triple, layout: &IndexLayout) -> Result<PathBuf, IngestError> {
        let dir = layout.triple_dir(triple);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| FetchError::Io {
                path: dir.clone(),
                source,
            })?;

        let url = self.url(triple);
        debug!("Downloading {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Index mirror returned status {}: {}", status, url);
            return Err(FetchError::Status { url, status }.into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;

        let archive = layout.archive_path(triple);
        tokio::fs::write(&archive, &body)
            .await
            .map_err(|source| FetchError::Io {
                path: archive.clone(),
                source,
            })?;

        {
            let archive = archive.clone();
            let dir = dir.clone();
            tokio::task::spawn_blocking(move || unpack_archive(&archive, &dir)).await??;
        }

        let index = layout.index_path(triple);
        if !index.is_file() {
            return Err(IngestError::Decompress {
                path: archive,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("archive does not contain {}", self.index_filename),
                ),
            });
        }

        debug!("Unpacked {} bytes from {} into {:?}", body.len(), url, dir);
        Ok(index)
    }
}

/// Unpack every regular file of a (possibly multi-member) `.tar.gz` into `dir`
///
/// Signed APKINDEX archives are two gzip members back to back, and the first
/// tar stream has no end-of-archive marker.
pub fn unpack_archive(archive: &Path, dir: &Path) -> Result<(), IngestError> {
    let decompress_error = |source: std::io::Error| IngestError::Decompress {
        path: archive.to_path_buf(),
        source,
    };

    let file = File::open(archive).map_err(decompress_error)?;
    let gz = MultiGzDecoder::new(BufReader::new(file));
    let mut tar = tar::Archive::new(gz);
    tar.set_ignore_zeros(true);

    for entry in tar.entries().map_err(decompress_error)? {
        let mut entry = entry.map_err(decompress_error)?;
        if entry.header().entry_type() != tar::EntryType::Regular {
            continue;
        }
        entry.unpack_in(dir).map_err(decompress_error)?;
    }

    Ok(())
}
