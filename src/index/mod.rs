//! Alpine package index mirror
//!
//! Downloads the upstream `APKINDEX` archives for every configured
//! (branch, repository, architecture) triple, stores the package versions in a
//! local SQLite database and answers "what is the newest version of X" queries.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Fetcher   │────▶│   Parser    │────▶│    Store    │
//! │ (download)  │     │ (P/V lines) │     │  (sqlite)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                                       ▲
//!        │                                       │
//! ┌─────────────┐                         ┌─────────────┐
//! │    Space    │                         │  Resolver   │
//! │  (triples)  │                         │ (best ver)  │
//! └─────────────┘                         └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`space`]: Parameter space enumeration and the stable/testing exclusion
//! - [`fetcher`]: Archive download and decompression, on-disk layout
//! - [`parser`]: `APKINDEX` text parser
//! - [`store`]: SQLite-backed record store with staged rebuilds
//! - [`resolver`]: Best-candidate lookup across repositories
//! - [`version`]: Version ordering policy
//! - [`error`]: Error types for fetching, parsing and storage
//! - [`types`]: `Triple` and `IndexRecord`

pub mod error;
pub mod fetcher;
pub mod parser;
pub mod resolver;
pub mod space;
pub mod store;
pub mod types;
pub mod version;

pub use error::{FetchError, IngestError, ParseError, StoreError};
pub use fetcher::{IndexFetcher, IndexLayout};
pub use resolver::{Candidate, IndexQuery, resolve_version};
pub use space::ParameterSpace;
pub use store::{IndexStore, RebuildReport};
pub use types::{IndexRecord, Triple};
