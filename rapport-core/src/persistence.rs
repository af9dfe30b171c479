//! Persistence backends for the [`MemoryDocument`].
//!
//! The store always writes the whole document; backends only need to move
//! bytes. Three are provided:
//!
//! - [`JsonFileBackend`]: one pretty-printed JSON file, replaced atomically
//!   (write to a sibling temp file, then rename);
//! - [`SqliteBackend`]: one row per document id in an SQLite database:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS documents (
//!     document_id TEXT PRIMARY KEY,
//!     data        BLOB NOT NULL,
//!     updated_at  TEXT NOT NULL,
//!     checksum    TEXT
//! );
//! ```
//!
//!   with WAL mode, an optional CRC-32 checksum and rotating backups via
//!   SQLite's online-backup API;
//! - [`MemoryBackend`]: in-process bytes, for tests and ephemeral sessions.
//!
//! A document that exists but cannot be decoded is reported as
//! [`RapportError::CorruptState`]; the store decides how to recover.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OpenFlags};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{RapportError, Result};
use crate::memory::MemoryDocument;

/// Something that can durably hold one [`MemoryDocument`].
pub trait DocumentBackend: Send {
    /// Load the document. `Ok(None)` means nothing has been saved yet.
    ///
    /// # Errors
    /// [`RapportError::CorruptState`] if stored bytes cannot be decoded; I/O
    /// or database errors if the medium cannot be read.
    fn load(&self) -> Result<Option<MemoryDocument>>;

    /// Replace the stored document with `doc`.
    ///
    /// # Errors
    /// Serialization, I/O or database errors.
    fn save(&self, doc: &MemoryDocument) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Open the backend named by `config.backend` for `document_id`.
///
/// `document_id` selects the row for the sqlite backend and is ignored by
/// the others.
///
/// # Errors
/// [`RapportError::Config`] for an unknown backend name; I/O or database
/// errors from opening the medium.
pub fn open_backend(
    config: &PersistenceConfig,
    document_id: &str,
) -> Result<Box<dyn DocumentBackend>> {
    match config.backend.as_str() {
        "json" => Ok(Box::new(JsonFileBackend::new(&config.path))),
        "sqlite" => Ok(Box::new(SqliteBackend::open(&config.path, document_id, config)?)),
        "memory" => Ok(Box::new(MemoryBackend::new())),
        other => Err(RapportError::Config(format!(
            "unknown persistence backend: {other}"
        ))),
    }
}

fn encode(doc: &MemoryDocument) -> Result<Vec<u8>> {
    serde_json::to_vec(doc).map_err(|e| RapportError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<MemoryDocument> {
    serde_json::from_slice(bytes).map_err(|e| RapportError::CorruptState(e.to_string()))
}

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

/// CRC-32 of `data` as a lowercase hex string.
fn crc32_hex(data: &[u8]) -> String {
    let crc = crc32_compute(data);
    format!("{crc:08x}")
}

/// Basic CRC-32 (ISO 3309 / ITU-T V.42) computation.
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// Stores the document as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Use the file at `path`. Nothing is touched until the first save.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DocumentBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<MemoryDocument>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode(&bytes).map(Some)
    }

    fn save(&self, doc: &MemoryDocument) -> Result<()> {
        let start = Instant::now();
        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| RapportError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved memory document"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Keeps the encoded document in process memory.
///
/// Clones share the same slot, so a test can hold one clone while the store
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot pre-filled with raw bytes (which may be garbage).
    #[must_use]
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(bytes.into()))),
        }
    }

    /// Raw bytes currently stored.
    #[must_use]
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.slot.lock().clone()
    }
}

impl DocumentBackend for MemoryBackend {
    fn load(&self) -> Result<Option<MemoryDocument>> {
        match self.slot.lock().as_deref() {
            Some(bytes) => decode(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, doc: &MemoryDocument) -> Result<()> {
        let bytes = encode(doc)?;
        *self.slot.lock() = Some(bytes);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    document_id TEXT PRIMARY KEY,
    data        BLOB NOT NULL,
    updated_at  TEXT NOT NULL,
    checksum    TEXT
);";

/// Handle to an SQLite database holding one document row per id.
///
/// Opening checks the database. A file that is not a database, or fails
/// `PRAGMA integrity_check`, is renamed to `<name>.corrupt` and replaced by
/// an empty database; the first [`load`](DocumentBackend::load) then reports
/// [`RapportError::CorruptState`] so the store can log the recovery. An
/// existing healthy database gets a rotating backup on every open, keeping
/// `backup_count` copies.
///
/// # Usage
///
/// ```no_run
/// # use rapport_core::persistence::{DocumentBackend, SqliteBackend};
/// # use rapport_core::config::PersistenceConfig;
/// # use rapport_core::memory::MemoryDocument;
/// let backend = SqliteBackend::open("rapport.db", "user-42", &PersistenceConfig::default())?;
/// backend.save(&MemoryDocument::default())?;
/// let loaded = backend.load()?;
/// # Ok::<(), rapport_core::error::RapportError>(())
/// ```
pub struct SqliteBackend {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
    document_id: String,
    /// Why the database was replaced on open, until the first load.
    quarantined: Mutex<Option<String>>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("db_path", &self.db_path)
            .field("document_id", &self.document_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open (or create) an SQLite database at `path` for `document_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RapportError::Database`] on SQLite failures other than
    /// corruption, and [`RapportError::Io`] if a corrupt file cannot be
    /// moved aside.
    pub fn open<P: AsRef<Path>>(
        path: P,
        document_id: &str,
        config: &PersistenceConfig,
    ) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let existed = db_path.exists();

        let (conn, quarantined) = match connect(&db_path, config) {
            Ok(conn) => (conn, None),
            Err(RapportError::CorruptState(reason)) => {
                let moved_to = quarantine(&db_path)?;
                warn!(
                    path = %db_path.display(),
                    moved_to = %moved_to.display(),
                    reason = %reason,
                    "Corrupt database moved aside, starting a new one"
                );
                (connect(&db_path, config)?, Some(reason))
            }
            Err(e) => return Err(e),
        };

        info!(
            path = %db_path.display(),
            document = document_id,
            wal = config.wal_mode,
            "SQLite document backend opened"
        );

        let healthy_existing = existed && quarantined.is_none();
        let backend = Self {
            conn,
            config: config.clone(),
            db_path,
            document_id: document_id.to_string(),
            quarantined: Mutex::new(quarantined),
        };

        if healthy_existing {
            if let Err(e) = backend.create_rotating_backup() {
                warn!(error = %e, "Rotating backup failed");
            }
        }
        Ok(backend)
    }

    /// Create a backup of the database at `dest_path` using SQLite's
    /// online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`RapportError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// Create a numbered backup next to the database file, keeping at most
    /// `config.backup_count` of them. Called on every open.
    ///
    /// # Errors
    ///
    /// Returns [`RapportError::Database`] or [`RapportError::Io`] on failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        let max = self.config.backup_count;
        if max == 0 {
            return Ok(());
        }

        for i in (1..max).rev() {
            let src = self.backup_path(i);
            let dst = self.backup_path(i + 1);
            if src.exists() {
                std::fs::rename(&src, &dst)?;
            }
        }

        let dest = self.backup_path(1);
        if dest.exists() {
            std::fs::remove_file(&dest)?;
        }
        self.backup(&dest)?;

        debug!(max_backups = max, "Rotating backup created");
        Ok(())
    }

    /// Path to a numbered backup file (e.g. `rapport.db.bak.1`).
    fn backup_path(&self, n: u32) -> PathBuf {
        sibling(&self.db_path, &format!("bak.{n}"))
    }
}

/// Open `db_path`, apply pragmas and the schema, and check integrity.
/// Corruption comes back as [`RapportError::CorruptState`].
fn connect(db_path: &Path, config: &PersistenceConfig) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(db_path, flags).map_err(classify)?;

    if config.wal_mode {
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(classify)?;
    }
    conn.execute_batch("PRAGMA synchronous = NORMAL;").map_err(classify)?;
    conn.execute_batch("PRAGMA busy_timeout = 5000;").map_err(classify)?;
    conn.execute_batch(SCHEMA).map_err(classify)?;

    let verdict: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(classify)?;
    if verdict != "ok" {
        return Err(RapportError::CorruptState(format!(
            "integrity check failed: {verdict}"
        )));
    }
    Ok(conn)
}

/// Map SQLite's corruption codes to [`RapportError::CorruptState`].
fn classify(e: rusqlite::Error) -> RapportError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt
            ) =>
        {
            RapportError::CorruptState(e.to_string())
        }
        _ => RapportError::Database(e),
    }
}

/// Rename a corrupt database to `<name>.corrupt` and drop its WAL and
/// shared-memory files. Returns the new path.
fn quarantine(db_path: &Path) -> Result<PathBuf> {
    let moved_to = sibling(db_path, "corrupt");
    std::fs::rename(db_path, &moved_to)?;
    for suffix in ["-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_os_string();
        name.push(suffix);
        let side = PathBuf::from(name);
        if side.exists() {
            std::fs::remove_file(&side)?;
        }
    }
    Ok(moved_to)
}

/// `path` with `.suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

impl DocumentBackend for SqliteBackend {
    fn load(&self) -> Result<Option<MemoryDocument>> {
        if let Some(reason) = self.quarantined.lock().take() {
            return Err(RapportError::CorruptState(reason));
        }

        let start = Instant::now();
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM documents WHERE document_id = ?1")?;

        let row = stmt.query_row(params![self.document_id], |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Option<String>>(1)?))
        });
        let (data, stored_checksum) = match row {
            Ok(found) => found,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if self.config.checksum_enabled {
            if let Some(expected) = stored_checksum.as_deref() {
                let actual = crc32_hex(&data);
                if expected != actual {
                    warn!(
                        document = %self.document_id,
                        expected = %expected,
                        actual = %actual,
                        "Checksum mismatch: possible save corruption"
                    );
                }
            }
        }

        let doc = decode(&data)?;
        debug!(
            document = %self.document_id,
            items = doc.total_count(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded memory document"
        );
        Ok(Some(doc))
    }

    fn save(&self, doc: &MemoryDocument) -> Result<()> {
        let start = Instant::now();
        let json = encode(doc)?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO documents (document_id, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(document_id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![self.document_id, json, now, checksum],
        )?;

        debug!(
            document = %self.document_id,
            items = doc.total_count(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved memory document"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}#{}", self.db_path.display(), self.document_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
