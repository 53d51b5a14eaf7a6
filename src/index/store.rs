//! SQLite-backed index store
//!
//! Records live in a single `records` table. A rebuild never touches the live
//! database: every index is downloaded and inserted into a staging tree next
//! to it, and only the finished tree is moved into place while the connection
//! lock is held. Readers see either the previous table or the new one.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use rusqlite::Connection;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::FETCH_STAGGER_DELAY_MS;
use crate::index::error::{IngestError, StoreError};
use crate::index::fetcher::{IndexFetcher, IndexLayout};
use crate::index::parser::parse_index;
use crate::index::space::ParameterSpace;
use crate::index::types::{IndexRecord, Triple};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        package TEXT NOT NULL,
        branch TEXT NOT NULL,
        repository TEXT NOT NULL,
        architecture TEXT NOT NULL,
        version TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_records_lookup ON records(package, branch, repository)",
    r#"
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    )
    "#,
];

const RECORD_COLUMNS: &str = "package, branch, repository, architecture, version";
const REBUILT_AT_KEY: &str = "rebuilt_at";

/// A triple whose index could not be ingested during a rebuild
#[derive(Debug)]
pub struct TripleFailure {
    pub triple: Triple,
    pub error: IngestError,
}

/// Outcome of a rebuild
#[derive(Debug, Default)]
pub struct RebuildReport {
    /// Number of triples that were fetched
    pub attempted: usize,
    /// Number of records stored across all triples
    pub records: usize,
    /// Every triple that failed, in enumeration order
    pub failures: Vec<TripleFailure>,
}

impl RebuildReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure of the last triple that failed
    pub fn last_failure(&self) -> Option<&TripleFailure> {
        self.failures.last()
    }
}

pub struct IndexStore {
    conn: Mutex<Option<Connection>>,
    layout: IndexLayout,
}

impl IndexStore {
    /// Open the store described by `layout`, creating an empty database if needed
    ///
    /// A freshly created database is not built: queries fail with
    /// [`StoreError::NotInitialized`] until [`IndexStore::rebuild`] succeeds.
    pub fn open(layout: IndexLayout) -> Result<Self, StoreError> {
        info!("Opening index store at {:?}", layout.db_path());

        let conn = Self::connect(&layout)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            layout,
        })
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    fn connect(layout: &IndexLayout) -> Result<Connection, StoreError> {
        std::fs::create_dir_all(layout.root()).map_err(|source| StoreError::Io {
            path: layout.root().to_path_buf(),
            source,
        })?;

        let conn = Connection::open(layout.db_path())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        for sql in SCHEMA {
            conn.execute(sql, [])?;
        }

        debug!("Database connection established");
        Ok(conn)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Option<Connection>>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let guard = self.lock_conn()?;
        let conn = guard.as_ref().ok_or(StoreError::Unavailable)?;
        f(conn)
    }

    /// Drop the connection. Every later call fails with [`StoreError::Unavailable`].
    pub fn close(&self) -> Result<(), StoreError> {
        self.lock_conn()?.take();
        Ok(())
    }

    /// Millisecond timestamp of the last successful rebuild
    pub fn rebuilt_at(&self) -> Result<Option<i64>, StoreError> {
        self.with_conn(read_rebuilt_at)
    }

    pub fn needs_refresh(&self, refresh_interval_ms: i64) -> Result<bool, StoreError> {
        let stale = match self.rebuilt_at()? {
            Some(rebuilt_at) => current_timestamp_ms() - rebuilt_at >= refresh_interval_ms,
            None => true,
        };
        Ok(stale)
    }

    /// First record for `package` on `branch` in any of `repositories`
    ///
    /// When several repositories or architectures match, the earliest inserted
    /// row wins. Callers must not rely on which architecture that is.
    pub fn query(
        &self,
        package: &str,
        branch: &str,
        repositories: &[String],
    ) -> Result<Option<IndexRecord>, StoreError> {
        self.with_conn(|conn| {
            ensure_built(conn)?;

            if repositories.is_empty() {
                return Ok(None);
            }

            let placeholders = (0..repositories.len())
                .map(|i| format!("?{}", i + 3))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                r#"
                SELECT {RECORD_COLUMNS} FROM records
                WHERE package = ?1 AND branch = ?2 AND repository IN ({placeholders})
                ORDER BY id
                LIMIT 1
                "#
            );

            let params: Vec<&dyn rusqlite::ToSql> = [
                &package as &dyn rusqlite::ToSql,
                &branch as &dyn rusqlite::ToSql,
            ]
            .into_iter()
            .chain(repositories.iter().map(|r| r as &dyn rusqlite::ToSql))
            .collect();

            let result = conn.query_row(&sql, params.as_slice(), record_from_row);

            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Records whose package name equals `term` (`exact`) or contains it
    pub fn search(&self, term: &str, exact: bool) -> Result<Vec<IndexRecord>, StoreError> {
        self.with_conn(|conn| {
            ensure_built(conn)?;

            let (condition, pattern) = if exact {
                ("package = ?1", term.to_string())
            } else {
                (r"package LIKE ?1 ESCAPE '\'", format!("%{}%", escape_like(term)))
            };

            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM records WHERE {condition} ORDER BY id"
            ))?;
            let records = stmt
                .query_map([pattern], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(records)
        })
    }

    /// Every record in insertion order
    pub fn records(&self) -> Result<Vec<IndexRecord>, StoreError> {
        self.with_conn(|conn| {
            ensure_built(conn)?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM records ORDER BY id"
            ))?;
            let records = stmt
                .query_map([], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(records)
        })
    }

    /// Replace the whole store with freshly downloaded indices
    ///
    /// Every triple of `space` is fetched and parsed concurrently into a
    /// staging tree. A failing triple is recorded in the report and does not
    /// stop the others. When every triple fails, or `deadline` elapses first,
    /// the staging tree is discarded and the live store is left as it was.
    pub async fn rebuild(
        &self,
        fetcher: &IndexFetcher,
        space: &ParameterSpace,
        deadline: Option<Duration>,
    ) -> Result<RebuildReport, StoreError> {
        let staging = self.layout.staging();
        remove_tree(staging.root())?;

        let triples = space.triples();
        info!("Rebuilding index store from {} indices", triples.len());

        let fetches = triples.iter().enumerate().map(|(i, triple)| {
            let delay = Duration::from_millis(FETCH_STAGGER_DELAY_MS * i as u64);
            let staging = &staging;
            async move {
                sleep(delay).await;
                let result = ingest(fetcher, triple, staging).await;
                (triple, result)
            }
        });

        let fetched = match deadline {
            Some(limit) => match timeout(limit, join_all(fetches)).await {
                Ok(fetched) => fetched,
                Err(_) => {
                    warn!(
                        "Rebuild exceeded deadline of {:?}, discarding staged indices",
                        limit
                    );
                    remove_tree(staging.root())?;
                    return Err(StoreError::DeadlineExceeded(limit));
                }
            },
            None => join_all(fetches).await,
        };

        let fetched: Vec<_> = fetched
            .into_iter()
            .map(|(triple, result)| (triple.clone(), result))
            .collect();
        let attempted = triples.len();
        let target = staging.clone();
        let mut report =
            tokio::task::spawn_blocking(move || stage_records(&target, attempted, fetched))
                .await??;

        if report.succeeded() == 0 {
            if let Some(failure) = report.failures.pop() {
                remove_tree(staging.root())?;
                error!(
                    "All {} indices failed, keeping the previous index store",
                    report.attempted
                );
                return Err(StoreError::NothingIngested {
                    attempted: report.attempted,
                    source: failure.error,
                });
            }
        }

        self.swap_in(&staging)?;

        info!(
            "Rebuilt index store: {} records from {}/{} indices",
            report.records,
            report.succeeded(),
            report.attempted
        );
        Ok(report)
    }

    /// Replace the live tree with `staging` while no query can run
    ///
    /// The live tree is moved aside first and put back when the staging tree
    /// cannot take its place. The connection is reopened on whichever tree is
    /// live afterwards.
    fn swap_in(&self, staging: &IndexLayout) -> Result<(), StoreError> {
        let mut conn = self.lock_conn()?;
        conn.take();

        let previous = self.layout.previous();
        let swapped = replace_tree(self.layout.root(), staging.root(), previous.root());
        let reconnected = Self::connect(&self.layout);

        match (swapped, reconnected) {
            (Ok(()), Ok(live)) => {
                *conn = Some(live);
                if let Err(e) = remove_tree(previous.root()) {
                    warn!("Failed to remove replaced index tree: {}", e);
                }
                Ok(())
            }
            (Err(e), reconnected) => {
                *conn = reconnected.ok();
                Err(e)
            }
            (Ok(()), Err(e)) => Err(e),
        }
    }
}

/// Insert every successful triple into the staging database
///
/// The rebuild timestamp is only written when at least one triple succeeded.
fn stage_records(
    staging: &IndexLayout,
    attempted: usize,
    fetched: Vec<(Triple, Result<Vec<IndexRecord>, IngestError>)>,
) -> Result<RebuildReport, StoreError> {
    let mut report = RebuildReport {
        attempted,
        ..Default::default()
    };

    let mut conn = IndexStore::connect(staging)?;
    for (triple, result) in fetched {
        let stored = result.and_then(|records| {
            insert_records(&mut conn, &records)?;
            Ok(records.len())
        });

        match stored {
            Ok(count) => {
                debug!("Stored {} records for {}", count, triple);
                report.records += count;
            }
            Err(e) => {
                error!("Failed to ingest {}: {}", triple, e);
                report.failures.push(TripleFailure { triple, error: e });
            }
        }
    }

    if report.succeeded() > 0 {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            (REBUILT_AT_KEY, current_timestamp_ms()),
        )?;
    }

    Ok(report)
}

/// Move `staging` to `live`, keeping the old `live` at `previous` until it succeeded
fn replace_tree(live: &Path, staging: &Path, previous: &Path) -> Result<(), StoreError> {
    remove_tree(previous)?;
    if live.exists() {
        rename_tree(live, previous)?;
    }

    if let Err(e) = rename_tree(staging, live) {
        if previous.exists() {
            if let Err(restore) = rename_tree(previous, live) {
                error!("Failed to restore previous index tree: {}", restore);
            }
        }
        return Err(e);
    }
    Ok(())
}

fn rename_tree(from: &Path, to: &Path) -> Result<(), StoreError> {
    std::fs::rename(from, to).map_err(|source| StoreError::Io {
        path: from.to_path_buf(),
        source,
    })
}

async fn ingest(
    fetcher: &IndexFetcher,
    triple: &Triple,
    layout: &IndexLayout,
) -> Result<Vec<IndexRecord>, IngestError> {
    let path = fetcher.fetch(triple, layout).await?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| IngestError::Read {
            path: path.clone(),
            source,
        })?;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    let triple = triple.clone();
    let parsed = tokio::task::spawn_blocking(move || parse_index(&content, &triple)).await?;
    parsed.map_err(|source| IngestError::Parse { path, source })
}

fn insert_records(conn: &mut Connection, records: &[IndexRecord]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO records ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"
        ))?;
        for record in records {
            stmt.execute((
                &record.package,
                &record.branch,
                &record.repository,
                &record.architecture,
                &record.version,
            ))?;
        }
    }
    tx.commit()
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndexRecord> {
    Ok(IndexRecord {
        package: row.get(0)?,
        branch: row.get(1)?,
        repository: row.get(2)?,
        architecture: row.get(3)?,
        version: row.get(4)?,
    })
}

fn read_rebuilt_at(conn: &Connection) -> Result<Option<i64>, StoreError> {
    let result = conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        [REBUILT_AT_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(rebuilt_at) => Ok(Some(rebuilt_at)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn ensure_built(conn: &Connection) -> Result<(), StoreError> {
    match read_rebuilt_at(conn)? {
        Some(_) => Ok(()),
        None => Err(StoreError::NotInitialized),
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', r"\\")
        .replace('%', r"\%")
        .replace('_', r"\_")
}

fn remove_tree(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Get current timestamp in milliseconds since UNIX epoch
fn current_timestamp_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
