//! SQLite database layer for clipboard history
//!
//! Two content tables (`text_records`, `file_records`) keyed by a unique content
//! hash, plus a single-row `settings` table. Uses r2d2 connection pooling so that
//! readers do not wait on each other; writers are serialized by `write_lock`.

use crate::interface::{
    CaptureScope, FileCategory, FileRecord, FileSortField, PurgeSummary, RecordKind, SearchHit,
    SearchScope, Settings, SettingsUpdate, Statistics, TextRecord, TextSortField, UpsertResult,
    DEFAULT_FLOAT_ICON_OPACITY, DEFAULT_MAX_COPY_COUNT, DEFAULT_MAX_COPY_SIZE,
    MAX_FLOAT_ICON_OPACITY, MIN_FLOAT_ICON_OPACITY,
};
use crate::models::{
    format_timestamp, hash_file, hash_text, now_local, parse_timestamp, NewFileRecord,
};
use crate::search::like_pattern;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

const TEXT_COLUMNS: &str = "id, content, contentHash, charCount, timestamp, occurrenceCount";
const FILE_COLUMNS: &str =
    "id, originalPath, savedPath, filename, fileSize, fileTypeCategory, contentHash, timestamp, occurrenceCount";
const SETTINGS_COLUMNS: &str = "maxCopySize, maxCopyCount, unlimitedMode, retentionDays, autoStart, floatIconEnabled, floatIconOpacity, clipboardCaptureScope";

const CREATE_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS text_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content TEXT NOT NULL,
        contentHash TEXT NOT NULL,
        charCount INTEGER NOT NULL DEFAULT 0,
        timestamp TEXT NOT NULL,
        occurrenceCount INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS file_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        originalPath TEXT NOT NULL,
        savedPath TEXT NOT NULL,
        filename TEXT NOT NULL,
        fileSize INTEGER NOT NULL DEFAULT 0,
        fileTypeCategory TEXT NOT NULL DEFAULT 'others',
        contentHash TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        occurrenceCount INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        maxCopySize INTEGER NOT NULL DEFAULT 314572800,
        maxCopyCount INTEGER NOT NULL DEFAULT 100,
        unlimitedMode INTEGER NOT NULL DEFAULT 0,
        retentionDays INTEGER NOT NULL DEFAULT 0,
        autoStart INTEGER NOT NULL DEFAULT 0,
        floatIconEnabled INTEGER NOT NULL DEFAULT 0,
        floatIconOpacity INTEGER NOT NULL DEFAULT 15,
        clipboardCaptureScope TEXT NOT NULL DEFAULT 'all'
    );
"#;

const CREATE_INDEXES: &str = r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_text_records_hash ON text_records(contentHash);
    CREATE INDEX IF NOT EXISTS idx_text_records_timestamp ON text_records(timestamp);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_file_records_hash ON file_records(contentHash);
    CREATE INDEX IF NOT EXISTS idx_file_records_timestamp ON file_records(timestamp);
"#;

const UPSERT_TEXT: &str = r#"
    INSERT INTO text_records (content, contentHash, charCount, timestamp, occurrenceCount)
    VALUES (?1, ?2, ?3, ?4, 1)
    ON CONFLICT(contentHash) DO UPDATE SET
        timestamp = excluded.timestamp,
        occurrenceCount = occurrenceCount + 1
    RETURNING id, occurrenceCount
"#;

const UPSERT_FILE: &str = r#"
    INSERT INTO file_records (originalPath, savedPath, filename, fileSize, fileTypeCategory, contentHash, timestamp, occurrenceCount)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
    ON CONFLICT(contentHash) DO UPDATE SET
        originalPath = excluded.originalPath,
        timestamp = excluded.timestamp,
        occurrenceCount = occurrenceCount + 1
    RETURNING id, occurrenceCount
"#;

/// Rows removed by a purge, with the saved copies that now need deleting
#[derive(Debug, Default)]
pub struct PurgedRows {
    pub summary: PurgeSummary,
    pub saved_paths: Vec<PathBuf>,
}

/// Thread-safe database wrapper using connection pooling
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    write_lock: Mutex<()>,
}

impl Database {
    /// Open or create a database at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA foreign_keys=ON;
            ",
            )?;
            conn.busy_timeout(Duration::from_secs(5))?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        let db = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys=ON;")?;
            Ok(())
        });

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        db.setup_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let _write = self.write_lock.lock();
        let conn = self.get_conn()?;

        Self::migrate_legacy_schema(&conn)?;

        conn.execute_batch(CREATE_TABLES)?;
        Self::merge_duplicate_hashes(&conn)?;
        conn.execute_batch(CREATE_INDEXES)?;
        conn.execute("INSERT OR IGNORE INTO settings (id) VALUES (1)", [])?;

        Ok(())
    }

    fn has_index(conn: &Connection, name: &str) -> DatabaseResult<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Fold rows that share a content hash into the lowest id: occurrence counts
    /// are summed and the newest timestamp kept. Only needed while the unique
    /// hash index is missing (legacy imports, damaged databases).
    fn merge_duplicate_hashes(conn: &Connection) -> DatabaseResult<u64> {
        let mut merged = 0u64;

        for (table, index) in [
            ("text_records", "idx_text_records_hash"),
            ("file_records", "idx_file_records_hash"),
        ] {
            if Self::has_index(conn, index)? {
                continue;
            }

            let tx = conn.unchecked_transaction()?;
            tx.execute(
                &format!(
                    r#"UPDATE {t} SET
                           occurrenceCount = (SELECT SUM(d.occurrenceCount) FROM {t} d WHERE d.contentHash = {t}.contentHash),
                           timestamp = (SELECT MAX(d.timestamp) FROM {t} d WHERE d.contentHash = {t}.contentHash)
                       WHERE id IN (SELECT MIN(id) FROM {t} GROUP BY contentHash HAVING COUNT(*) > 1)"#,
                    t = table
                ),
                [],
            )?;
            let removed = tx.execute(
                &format!(
                    "DELETE FROM {t} WHERE id NOT IN (SELECT MIN(id) FROM {t} GROUP BY contentHash)",
                    t = table
                ),
                [],
            )?;
            tx.commit()?;

            if removed > 0 {
                info!(table, removed, "Merged duplicate clipboard records");
            }
            merged += removed as u64;
        }

        Ok(merged)
    }

    /// Migrate a database written by the original clipboard manager
    /// (`md5_hash`/`number` columns, snake_case settings) to the current schema.
    /// Text is re-hashed from its content; files from their saved copy when it is
    /// still readable. Rows collapsing onto one hash are merged.
    fn migrate_legacy_schema(conn: &Connection) -> DatabaseResult<()> {
        let legacy_text = conn.prepare("SELECT md5_hash FROM text_records LIMIT 0").is_ok();
        let legacy_files = conn.prepare("SELECT md5_hash FROM file_records LIMIT 0").is_ok();
        let legacy_settings = conn.prepare("SELECT max_copy_size FROM settings LIMIT 0").is_ok();

        if !(legacy_text || legacy_files || legacy_settings) {
            return Ok(());
        }

        let texts = if legacy_text { Self::read_legacy_texts(conn)? } else { Vec::new() };
        let files = if legacy_files { Self::read_legacy_files(conn)? } else { Vec::new() };
        let settings = if legacy_settings { Some(Self::read_legacy_settings(conn)?) } else { None };

        let tx = conn.unchecked_transaction()?;

        if legacy_text {
            tx.execute_batch("DROP TABLE text_records")?;
        }
        if legacy_files {
            tx.execute_batch("DROP TABLE file_records")?;
        }
        if legacy_settings {
            tx.execute_batch("DROP TABLE settings")?;
        }

        tx.execute_batch(CREATE_TABLES)?;
        tx.execute_batch(CREATE_INDEXES)?;

        for (id, content, timestamp, count) in &texts {
            tx.execute(
                r#"INSERT INTO text_records (id, content, contentHash, charCount, timestamp, occurrenceCount)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                   ON CONFLICT(contentHash) DO UPDATE SET
                       timestamp = MAX(timestamp, excluded.timestamp),
                       occurrenceCount = occurrenceCount + excluded.occurrenceCount"#,
                params![
                    id,
                    content,
                    hash_text(content),
                    content.chars().count() as i64,
                    timestamp,
                    count
                ],
            )?;
        }

        for file in &files {
            tx.execute(
                r#"INSERT INTO file_records (id, originalPath, savedPath, filename, fileSize, fileTypeCategory, contentHash, timestamp, occurrenceCount)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                   ON CONFLICT(contentHash) DO UPDATE SET
                       timestamp = MAX(timestamp, excluded.timestamp),
                       occurrenceCount = occurrenceCount + excluded.occurrenceCount"#,
                params![
                    file.id,
                    file.original_path,
                    file.saved_path,
                    file.filename,
                    file.file_size,
                    file.category,
                    file.content_hash,
                    file.timestamp,
                    file.count
                ],
            )?;
        }

        if let Some(settings) = &settings {
            tx.execute("INSERT OR IGNORE INTO settings (id) VALUES (1)", [])?;
            Self::write_settings(&tx, settings)?;
        }

        tx.commit()?;

        info!(
            texts = texts.len(),
            files = files.len(),
            settings = settings.is_some(),
            "Migrated legacy clipboard database"
        );
        Ok(())
    }

    /// Legacy timestamps are normalized to the current format; unparsable ones become now
    fn normalize_legacy_timestamp(value: Option<String>) -> String {
        let parsed = value.as_deref().and_then(parse_timestamp).unwrap_or_else(now_local);
        format_timestamp(parsed)
    }

    fn read_legacy_texts(conn: &Connection) -> DatabaseResult<Vec<(i64, String, String, i64)>> {
        let mut stmt = conn.prepare("SELECT * FROM text_records ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get("id")?;
                let content: Option<String> = row.get("content")?;
                let timestamp: Option<String> = row.get("timestamp").ok().flatten();
                let count: Option<i64> = row.get("number").ok().flatten();
                Ok((
                    id,
                    content.unwrap_or_default(),
                    Self::normalize_legacy_timestamp(timestamp),
                    count.unwrap_or(1).max(1),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn read_legacy_files(conn: &Connection) -> DatabaseResult<Vec<LegacyFile>> {
        let mut stmt = conn.prepare("SELECT * FROM file_records ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get("id")?;
                let original_path: Option<String> = row.get("original_path").ok().flatten();
                let saved_path: Option<String> = row.get("saved_path").ok().flatten();
                let filename: Option<String> = row.get("filename").ok().flatten();
                let file_size: Option<i64> = row.get("file_size").ok().flatten();
                let file_type: Option<String> = row.get("file_type").ok().flatten();
                let md5_hash: Option<String> = row.get("md5_hash").ok().flatten();
                let timestamp: Option<String> = row.get("timestamp").ok().flatten();
                let count: Option<i64> = row.get("number").ok().flatten();
                Ok((id, original_path, saved_path, filename, file_size, file_type, md5_hash, timestamp, count))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let files = rows
            .into_iter()
            .map(
                |(id, original_path, saved_path, filename, file_size, file_type, md5_hash, timestamp, count)| {
                    let saved_path = saved_path.unwrap_or_default();
                    let content_hash = match hash_file(Path::new(&saved_path)) {
                        Ok(hash) => hash,
                        Err(e) => {
                            debug!(path = %saved_path, error = %e, "Saved copy unreadable, keeping legacy hash");
                            md5_hash.unwrap_or_else(|| format!("legacy-{}", id))
                        }
                    };
                    let filename = filename.unwrap_or_else(|| {
                        Path::new(&saved_path)
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default()
                    });
                    LegacyFile {
                        id,
                        original_path: original_path.unwrap_or_default(),
                        saved_path,
                        filename,
                        file_size: file_size.unwrap_or(0).max(0),
                        category: FileCategory::from_database_str(file_type.as_deref().unwrap_or(""))
                            .as_str(),
                        content_hash,
                        timestamp: Self::normalize_legacy_timestamp(timestamp),
                        count: count.unwrap_or(1).max(1),
                    }
                },
            )
            .collect();
        Ok(files)
    }

    /// Columns added late in the legacy schema may be missing; those take defaults
    fn read_legacy_settings(conn: &Connection) -> DatabaseResult<Settings> {
        let defaults = Settings::default();
        let settings = conn
            .query_row("SELECT * FROM settings ORDER BY id LIMIT 1", [], |row| {
                let int = |name: &str| row.get::<_, Option<i64>>(name).ok().flatten();
                let scope: Option<String> = row.get("clipboard_type").ok().flatten();
                Ok(Settings {
                    max_copy_size: int("max_copy_size")
                        .and_then(|v| u64::try_from(v).ok())
                        .filter(|v| *v > 0)
                        .unwrap_or(defaults.max_copy_size),
                    max_copy_count: int("max_copy_count")
                        .and_then(|v| u32::try_from(v).ok())
                        .filter(|v| *v > 0)
                        .unwrap_or(defaults.max_copy_count),
                    unlimited_mode: int("unlimited_mode").map(|v| v != 0).unwrap_or(defaults.unlimited_mode),
                    retention_days: int("retention_days")
                        .map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX))
                        .unwrap_or(defaults.retention_days),
                    auto_start: int("auto_start").map(|v| v != 0).unwrap_or(defaults.auto_start),
                    float_icon_enabled: int("float_icon").map(|v| v != 0).unwrap_or(defaults.float_icon_enabled),
                    float_icon_opacity: int("opacity").map(clamp_opacity).unwrap_or(defaults.float_icon_opacity),
                    clipboard_capture_scope: scope
                        .as_deref()
                        .map(CaptureScope::from_database_str)
                        .unwrap_or(defaults.clipboard_capture_scope),
                })
            })
            .optional()?;
        Ok(settings.unwrap_or(defaults))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Upserts
    // ─────────────────────────────────────────────────────────────────────────────

    /// Insert `content`, or bump timestamp and occurrence count of the row with the same hash.
    /// A single statement, so the conflict branch never surfaces as an error.
    pub fn upsert_text(&self, content: &str, at: NaiveDateTime) -> DatabaseResult<UpsertResult> {
        let content_hash = hash_text(content);
        let char_count = content.chars().count() as i64;

        let _write = self.write_lock.lock();
        let conn = self.get_conn()?;
        let (id, occurrence_count): (i64, i64) = conn.query_row(
            UPSERT_TEXT,
            params![content, content_hash, char_count, format_timestamp(at)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(UpsertResult {
            id,
            occurrence_count: occurrence_count.max(0) as u64,
        })
    }

    /// Insert a file row, or update original path, timestamp and occurrence count of the row
    /// with the same hash. Saved path, name, size and category of the first insert are kept.
    pub fn upsert_file(&self, record: &NewFileRecord, at: NaiveDateTime) -> DatabaseResult<UpsertResult> {
        let _write = self.write_lock.lock();
        let conn = self.get_conn()?;
        let (id, occurrence_count): (i64, i64) = conn.query_row(
            UPSERT_FILE,
            params![
                record.original_path.to_string_lossy().into_owned(),
                record.saved_path.to_string_lossy().into_owned(),
                record.filename,
                i64::try_from(record.file_size).unwrap_or(i64::MAX),
                record.file_type_category.as_str(),
                record.content_hash,
                format_timestamp(at),
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(UpsertResult {
            id,
            occurrence_count: occurrence_count.max(0) as u64,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn find_file_by_hash(&self, content_hash: &str) -> DatabaseResult<Option<FileRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM file_records WHERE contentHash = ?1", FILE_COLUMNS),
                [content_hash],
                Self::row_to_file_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn get_text(&self, id: i64) -> DatabaseResult<Option<TextRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM text_records WHERE id = ?1", TEXT_COLUMNS),
                [id],
                Self::row_to_text_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_text(
        &self,
        sort: TextSortField,
        descending: bool,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> DatabaseResult<Vec<TextRecord>> {
        let conn = self.get_conn()?;
        let direction = if descending { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {} FROM text_records ORDER BY {} {dir}, id {dir} LIMIT ?1 OFFSET ?2",
            TEXT_COLUMNS,
            sort.column(),
            dir = direction
        );

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                params![limit.map(i64::from).unwrap_or(-1), offset.map(i64::from).unwrap_or(0)],
                Self::row_to_text_record,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn list_files(
        &self,
        sort: FileSortField,
        descending: bool,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> DatabaseResult<Vec<FileRecord>> {
        let conn = self.get_conn()?;
        let direction = if descending { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {} FROM file_records ORDER BY {} {dir}, id {dir} LIMIT ?1 OFFSET ?2",
            FILE_COLUMNS,
            sort.column(),
            dir = direction
        );

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                params![limit.map(i64::from).unwrap_or(-1), offset.map(i64::from).unwrap_or(0)],
                Self::row_to_file_record,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn search_sql(scope: SearchScope) -> &'static str {
        match scope {
            SearchScope::All => {
                r#"SELECT 'text' AS kind, id, content AS displayText, timestamp
                   FROM text_records WHERE content LIKE ?1 ESCAPE '\'
                   UNION ALL
                   SELECT 'file' AS kind, id, filename AS displayText, timestamp
                   FROM file_records WHERE filename LIKE ?1 ESCAPE '\'
                   ORDER BY timestamp DESC, id DESC"#
            }
            SearchScope::TextOnly => {
                r#"SELECT 'text' AS kind, id, content AS displayText, timestamp
                   FROM text_records WHERE content LIKE ?1 ESCAPE '\'
                   ORDER BY timestamp DESC, id DESC"#
            }
            SearchScope::FileOnly => {
                r#"SELECT 'file' AS kind, id, filename AS displayText, timestamp
                   FROM file_records WHERE filename LIKE ?1 ESCAPE '\'
                   ORDER BY timestamp DESC, id DESC"#
            }
        }
    }

    fn run_search(conn: &Connection, keyword: &str, scope: SearchScope) -> rusqlite::Result<Vec<SearchHit>> {
        let mut stmt = conn.prepare(Self::search_sql(scope))?;
        let hits = stmt
            .query_map([like_pattern(keyword)], |row| {
                let kind: String = row.get(0)?;
                let timestamp: String = row.get(3)?;
                Ok(SearchHit {
                    kind: RecordKind::from_database_str(&kind),
                    id: row.get(1)?,
                    display_text: row.get(2)?,
                    timestamp: parse_db_timestamp(&timestamp),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    /// ASCII case-insensitive substring search on text content and filenames
    pub fn search(&self, keyword: &str, scope: SearchScope) -> DatabaseResult<Vec<SearchHit>> {
        let conn = self.get_conn()?;
        Ok(Self::run_search(&conn, keyword, scope)?)
    }

    /// Search with SQLite C-level interrupt support.
    /// Returns an empty result when `token` is cancelled mid-query.
    pub fn search_interruptible(
        &self,
        keyword: &str,
        scope: SearchScope,
        token: &tokio_util::sync::CancellationToken,
        runtime: &tokio::runtime::Handle,
    ) -> DatabaseResult<Vec<SearchHit>> {
        use tokio_util::task::AbortOnDropHandle;

        let conn = self.get_conn()?;
        let interrupt_handle = conn.get_interrupt_handle();

        let token_clone = token.clone();
        let watcher = runtime.spawn(async move {
            token_clone.cancelled().await;
            interrupt_handle.interrupt();
        });
        let _abort_guard = AbortOnDropHandle::new(watcher);

        match Self::run_search(&conn, keyword, scope) {
            Ok(hits) => Ok(hits),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ffi::ErrorCode::OperationInterrupted =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn statistics(&self) -> DatabaseResult<Statistics> {
        let conn = self.get_conn()?;
        let text_count: i64 = conn.query_row("SELECT COUNT(*) FROM text_records", [], |row| row.get(0))?;
        let (file_count, total_file_bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(fileSize), 0) FROM file_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(Statistics {
            text_count: text_count.max(0) as u64,
            file_count: file_count.max(0) as u64,
            total_file_bytes: total_file_bytes.max(0) as u64,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Deletes
    // ─────────────────────────────────────────────────────────────────────────────

    /// Returns whether a row was deleted
    pub fn delete_text(&self, id: i64) -> DatabaseResult<bool> {
        let _write = self.write_lock.lock();
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM text_records WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    /// Returns the saved path of the deleted row, if there was one
    pub fn delete_file(&self, id: i64) -> DatabaseResult<Option<PathBuf>> {
        let _write = self.write_lock.lock();
        let conn = self.get_conn()?;
        let saved_path: Option<String> = conn
            .query_row(
                "DELETE FROM file_records WHERE id = ?1 RETURNING savedPath",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(saved_path.map(PathBuf::from))
    }

    /// Delete every text and file row. Returns the saved paths of the removed file rows.
    pub fn clear_all(&self) -> DatabaseResult<Vec<PathBuf>> {
        let _write = self.write_lock.lock();
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let saved_paths = {
            let mut stmt = tx.prepare("DELETE FROM file_records RETURNING savedPath")?;
            let paths = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            paths
        };
        tx.execute("DELETE FROM text_records", [])?;
        tx.commit()?;

        Ok(saved_paths.into_iter().map(PathBuf::from).collect())
    }

    /// Delete every row with `timestamp < cutoff` (strict)
    pub fn purge_older_than(&self, cutoff: NaiveDateTime) -> DatabaseResult<PurgedRows> {
        let cutoff_str = format_timestamp(cutoff);

        let _write = self.write_lock.lock();
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let texts_removed = tx.execute("DELETE FROM text_records WHERE timestamp < ?1", [&cutoff_str])?;
        let saved_paths = {
            let mut stmt = tx.prepare("DELETE FROM file_records WHERE timestamp < ?1 RETURNING savedPath")?;
            let paths = stmt
                .query_map([&cutoff_str], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            paths
        };
        tx.commit()?;

        Ok(PurgedRows {
            summary: PurgeSummary {
                texts_removed: texts_removed as u64,
                files_removed: saved_paths.len() as u64,
            },
            saved_paths: saved_paths.into_iter().map(PathBuf::from).collect(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────────────────────

    fn read_settings(conn: &Connection) -> DatabaseResult<Settings> {
        let settings = conn
            .query_row(
                &format!("SELECT {} FROM settings WHERE id = 1", SETTINGS_COLUMNS),
                [],
                Self::row_to_settings,
            )
            .optional()?;
        Ok(settings.unwrap_or_default())
    }

    fn write_settings(conn: &Connection, settings: &Settings) -> DatabaseResult<()> {
        conn.execute(
            r#"UPDATE settings SET
                   maxCopySize = ?1,
                   maxCopyCount = ?2,
                   unlimitedMode = ?3,
                   retentionDays = ?4,
                   autoStart = ?5,
                   floatIconEnabled = ?6,
                   floatIconOpacity = ?7,
                   clipboardCaptureScope = ?8
               WHERE id = 1"#,
            params![
                i64::try_from(settings.max_copy_size).unwrap_or(i64::MAX),
                settings.max_copy_count,
                settings.unlimited_mode,
                settings.retention_days,
                settings.auto_start,
                settings.float_icon_enabled,
                settings.float_icon_opacity,
                settings.clipboard_capture_scope.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_settings(&self) -> DatabaseResult<Settings> {
        let conn = self.get_conn()?;
        Self::read_settings(&conn)
    }

    /// Apply a partial update in one transaction and return the resulting settings
    pub fn update_settings(&self, update: &SettingsUpdate) -> DatabaseResult<Settings> {
        let _write = self.write_lock.lock();
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut settings = Self::read_settings(&tx)?;
        update.apply_to(&mut settings);
        tx.execute("INSERT OR IGNORE INTO settings (id) VALUES (1)", [])?;
        Self::write_settings(&tx, &settings)?;
        tx.commit()?;

        Ok(settings)
    }

    pub fn reset_settings(&self) -> DatabaseResult<Settings> {
        let _write = self.write_lock.lock();
        let conn = self.get_conn()?;
        let settings = Settings::default();
        conn.execute("INSERT OR IGNORE INTO settings (id) VALUES (1)", [])?;
        Self::write_settings(&conn, &settings)?;
        Ok(settings)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Row mappers
    // ─────────────────────────────────────────────────────────────────────────────

    fn row_to_text_record(row: &rusqlite::Row) -> rusqlite::Result<TextRecord> {
        let timestamp: String = row.get(4)?;
        Ok(TextRecord {
            id: row.get(0)?,
            content: row.get(1)?,
            content_hash: row.get(2)?,
            char_count: row.get::<_, i64>(3)?.max(0) as u64,
            timestamp: parse_db_timestamp(&timestamp),
            occurrence_count: row.get::<_, i64>(5)?.max(0) as u64,
        })
    }

    fn row_to_file_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
        let original_path: String = row.get(1)?;
        let saved_path: String = row.get(2)?;
        let category: String = row.get(5)?;
        let timestamp: String = row.get(7)?;
        Ok(FileRecord {
            id: row.get(0)?,
            original_path: PathBuf::from(original_path),
            saved_path: PathBuf::from(saved_path),
            filename: row.get(3)?,
            file_size: row.get::<_, i64>(4)?.max(0) as u64,
            file_type_category: FileCategory::from_database_str(&category),
            content_hash: row.get(6)?,
            timestamp: parse_db_timestamp(&timestamp),
            occurrence_count: row.get::<_, i64>(8)?.max(0) as u64,
        })
    }

    fn row_to_settings(row: &rusqlite::Row) -> rusqlite::Result<Settings> {
        let max_copy_size: i64 = row.get(0)?;
        let max_copy_count: i64 = row.get(1)?;
        let retention_days: i64 = row.get(3)?;
        let opacity: i64 = row.get(6)?;
        let scope: String = row.get(7)?;
        Ok(Settings {
            max_copy_size: u64::try_from(max_copy_size)
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_MAX_COPY_SIZE),
            max_copy_count: u32::try_from(max_copy_count)
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_MAX_COPY_COUNT),
            unlimited_mode: row.get(2)?,
            retention_days: u32::try_from(retention_days.max(0)).unwrap_or(u32::MAX),
            auto_start: row.get(4)?,
            float_icon_enabled: row.get(5)?,
            float_icon_opacity: clamp_opacity(opacity),
            clipboard_capture_scope: CaptureScope::from_database_str(&scope),
        })
    }
}

struct LegacyFile {
    id: i64,
    original_path: String,
    saved_path: String,
    filename: String,
    file_size: i64,
    category: &'static str,
    content_hash: String,
    timestamp: String,
    count: i64,
}

/// Parse a stored timestamp; unreadable values are treated as now
fn parse_db_timestamp(value: &str) -> NaiveDateTime {
    parse_timestamp(value).unwrap_or_else(|| {
        warn!(timestamp = value, "Unparsable timestamp in clipboard database");
        now_local()
    })
}

fn clamp_opacity(value: i64) -> u8 {
    if value <= 0 {
        return DEFAULT_FLOAT_ICON_OPACITY;
    }
    value.clamp(i64::from(MIN_FLOAT_ICON_OPACITY), i64::from(MAX_FLOAT_ICON_OPACITY)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn days_ago(days: i64) -> NaiveDateTime {
        now_local() - ChronoDuration::days(days)
    }

    fn sample_file(hash: &str, original: &str, saved: &str) -> NewFileRecord {
        NewFileRecord {
            original_path: PathBuf::from(original),
            saved_path: PathBuf::from(saved),
            filename: "report.pdf".to_string(),
            file_size: 600,
            file_type_category: FileCategory::Pdf,
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_schema_setup_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.setup_schema().unwrap();
        db.setup_schema().unwrap();

        let conn = db.get_conn().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1, "settings must stay a single row");
    }

    #[test]
    fn test_settings_row_rejects_second_id() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.get_conn().unwrap();
        assert!(conn.execute("INSERT INTO settings (id) VALUES (2)", []).is_err());
    }

    #[test]
    fn test_upsert_text_dedup() {
        let db = Database::open_in_memory().unwrap();
        let now = now_local();

        let first = db.upsert_text("hello", now).unwrap();
        assert!(first.is_new());
        db.upsert_text("unrelated", now).unwrap();
        let second = db.upsert_text("hello", now).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.occurrence_count, 2);
        assert!(!second.is_new());

        let spaced = db.upsert_text("hello ", now).unwrap();
        assert_ne!(spaced.id, first.id, "trailing space is different content");

        let records = db.list_text(TextSortField::Timestamp, true, None, None).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_upsert_text_updates_timestamp_and_keeps_char_count() {
        let db = Database::open_in_memory().unwrap();
        let old = days_ago(3);
        let id = db.upsert_text("héllo", old).unwrap().id;

        let later = now_local();
        db.upsert_text("héllo", later).unwrap();

        let records = db.list_text(TextSortField::Timestamp, true, None, None).unwrap();
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].timestamp, later);
        assert_eq!(records[0].char_count, 5);
        assert_eq!(records[0].content_hash, hash_text("héllo"));
    }

    #[test]
    fn test_upsert_file_keeps_first_saved_path() {
        let db = Database::open_in_memory().unwrap();
        let now = now_local();

        let first = db
            .upsert_file(&sample_file("abc", "/home/a/report.pdf", "/store/pdf/report_abc.pdf"), now)
            .unwrap();
        let mut repeat = sample_file("abc", "/home/b/copy.pdf", "/store/pdf/other.pdf");
        repeat.filename = "copy.pdf".into();
        let second = db.upsert_file(&repeat, now).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.occurrence_count, 2);

        let record = db.find_file_by_hash("abc").unwrap().unwrap();
        assert_eq!(record.original_path, PathBuf::from("/home/b/copy.pdf"));
        assert_eq!(record.saved_path, PathBuf::from("/store/pdf/report_abc.pdf"));
        assert_eq!(record.filename, "report.pdf");
        assert_eq!(record.file_type_category, FileCategory::Pdf);
        assert!(db.find_file_by_hash("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_text_sorting_and_paging() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_text("bbb", days_ago(2)).unwrap();
        db.upsert_text("a", days_ago(1)).unwrap();
        db.upsert_text("cc", days_ago(3)).unwrap();
        db.upsert_text("cc", days_ago(3)).unwrap();

        let by_content: Vec<String> = db
            .list_text(TextSortField::Content, false, None, None)
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(by_content, vec!["a", "bbb", "cc"]);

        let by_chars = db.list_text(TextSortField::CharCount, true, None, None).unwrap();
        assert_eq!(by_chars[0].content, "bbb");

        let by_count = db.list_text(TextSortField::OccurrenceCount, true, None, None).unwrap();
        assert_eq!(by_count[0].content, "cc");

        let newest_first = db.list_text(TextSortField::Timestamp, true, None, None).unwrap();
        assert_eq!(newest_first[0].content, "a");

        let page = db.list_text(TextSortField::Content, false, Some(1), Some(1)).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "bbb");

        let tail = db.list_text(TextSortField::Content, false, None, Some(2)).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].content, "cc");
    }

    #[test]
    fn test_list_files_sorting() {
        let db = Database::open_in_memory().unwrap();
        let now = now_local();
        let mut small = sample_file("h1", "/a/small.txt", "/s/small.txt");
        small.filename = "small.txt".into();
        small.file_size = 10;
        small.file_type_category = FileCategory::Documents;
        db.upsert_file(&small, now).unwrap();
        db.upsert_file(&sample_file("h2", "/a/report.pdf", "/s/report.pdf"), now).unwrap();

        let by_size = db.list_files(FileSortField::FileSize, true, None, None).unwrap();
        assert_eq!(by_size[0].filename, "report.pdf");

        let by_name = db.list_files(FileSortField::Filename, false, None, None).unwrap();
        assert_eq!(by_name[0].filename, "report.pdf");

        let by_category = db.list_files(FileSortField::FileTypeCategory, false, None, None).unwrap();
        assert_eq!(by_category[0].file_type_category, FileCategory::Documents);
    }

    #[test]
    fn test_search_is_case_insensitive_and_scoped() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_text("Quarterly REPORT draft", days_ago(2)).unwrap();
        db.upsert_text("nothing here", days_ago(1)).unwrap();
        db.upsert_file(&sample_file("h", "/a/report.pdf", "/s/report.pdf"), now_local())
            .unwrap();

        let all = db.search("report", SearchScope::All).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, RecordKind::File, "newest first");
        assert_eq!(all[0].display_text, "report.pdf");
        assert_eq!(all[1].kind, RecordKind::Text);

        let text_only = db.search("REPORT", SearchScope::TextOnly).unwrap();
        assert_eq!(text_only.len(), 1);
        assert_eq!(text_only[0].display_text, "Quarterly REPORT draft");

        let files_only = db.search("draft", SearchScope::FileOnly).unwrap();
        assert!(files_only.is_empty());
    }

    #[test]
    fn test_search_folds_ascii_case_only() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_text("Café ÉCLAIR", now_local()).unwrap();

        assert_eq!(db.search("CAFé", SearchScope::TextOnly).unwrap().len(), 1);
        assert_eq!(db.search("Éclair", SearchScope::TextOnly).unwrap().len(), 1);
        assert!(db.search("CAFÉ", SearchScope::TextOnly).unwrap().is_empty());
        assert!(db.search("éclair", SearchScope::TextOnly).unwrap().is_empty());
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let db = Database::open_in_memory().unwrap();
        let now = now_local();
        db.upsert_text("100% done", now).unwrap();
        db.upsert_text("1000 done", now).unwrap();
        db.upsert_text("snake_case", now).unwrap();
        db.upsert_text("snakeXcase", now).unwrap();

        assert_eq!(db.search("100%", SearchScope::TextOnly).unwrap().len(), 1);
        assert_eq!(db.search("e_c", SearchScope::TextOnly).unwrap().len(), 1);
        assert_eq!(db.search("", SearchScope::TextOnly).unwrap().len(), 4);
    }

    #[test]
    fn test_statistics() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.statistics().unwrap(), Statistics::default());

        let now = now_local();
        db.upsert_text("one", now).unwrap();
        db.upsert_text("two", now).unwrap();
        db.upsert_file(&sample_file("h1", "/a", "/s1"), now).unwrap();
        db.upsert_file(&sample_file("h2", "/b", "/s2"), now).unwrap();
        db.upsert_file(&sample_file("h2", "/c", "/s2"), now).unwrap();

        let stats = db.statistics().unwrap();
        assert_eq!(stats.text_count, 2);
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_file_bytes, 1200);
    }

    #[test]
    fn test_delete_returns_saved_path() {
        let db = Database::open_in_memory().unwrap();
        let now = now_local();
        let text = db.upsert_text("bye", now).unwrap();
        let file = db.upsert_file(&sample_file("h", "/a", "/saved/a"), now).unwrap();

        assert_eq!(db.get_text(text.id).unwrap().unwrap().content, "bye");
        assert!(db.delete_text(text.id).unwrap());
        assert!(!db.delete_text(text.id).unwrap());
        assert!(db.get_text(text.id).unwrap().is_none());
        assert_eq!(db.delete_file(file.id).unwrap(), Some(PathBuf::from("/saved/a")));
        assert_eq!(db.delete_file(file.id).unwrap(), None);
    }

    #[test]
    fn test_clear_all_keeps_settings() {
        let db = Database::open_in_memory().unwrap();
        let now = now_local();
        db.upsert_text("x", now).unwrap();
        db.upsert_file(&sample_file("h", "/a", "/saved/a"), now).unwrap();
        db.update_settings(&SettingsUpdate { retention_days: Some(9), ..Default::default() })
            .unwrap();

        let removed = db.clear_all().unwrap();
        assert_eq!(removed, vec![PathBuf::from("/saved/a")]);
        assert_eq!(db.statistics().unwrap(), Statistics::default());
        assert_eq!(db.get_settings().unwrap().retention_days, 9);
    }

    #[test]
    fn test_purge_older_than_is_strict() {
        let db = Database::open_in_memory().unwrap();
        let cutoff = days_ago(7);

        db.upsert_text("ancient", days_ago(10)).unwrap();
        db.upsert_text("boundary", cutoff).unwrap();
        db.upsert_text("recent", days_ago(3)).unwrap();
        db.upsert_file(&sample_file("old", "/a", "/saved/old"), days_ago(30)).unwrap();
        db.upsert_file(&sample_file("new", "/b", "/saved/new"), days_ago(1)).unwrap();

        let purged = db.purge_older_than(cutoff).unwrap();
        assert_eq!(purged.summary.texts_removed, 1);
        assert_eq!(purged.summary.files_removed, 1);
        assert_eq!(purged.saved_paths, vec![PathBuf::from("/saved/old")]);

        let remaining: Vec<String> = db
            .list_text(TextSortField::Content, false, None, None)
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(remaining, vec!["boundary", "recent"]);
    }

    #[test]
    fn test_settings_defaults_and_partial_update() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_settings().unwrap(), Settings::default());

        db.update_settings(&SettingsUpdate {
            retention_days: Some(7),
            max_copy_size: Some(1000),
            ..Default::default()
        })
        .unwrap();
        let updated = db
            .update_settings(&SettingsUpdate { max_copy_count: Some(50), ..Default::default() })
            .unwrap();

        assert_eq!(updated.max_copy_count, 50);
        assert_eq!(updated.max_copy_size, 1000);
        assert_eq!(updated.retention_days, 7);
        assert_eq!(db.get_settings().unwrap(), updated);
    }

    #[test]
    fn test_unlimited_mode_keeps_limits() {
        let db = Database::open_in_memory().unwrap();
        db.update_settings(&SettingsUpdate { max_copy_count: Some(2), ..Default::default() })
            .unwrap();
        db.update_settings(&SettingsUpdate { unlimited_mode: Some(true), ..Default::default() })
            .unwrap();
        let after = db
            .update_settings(&SettingsUpdate { unlimited_mode: Some(false), ..Default::default() })
            .unwrap();
        assert_eq!(after.max_copy_count, 2);
    }

    #[test]
    fn test_reset_settings() {
        let db = Database::open_in_memory().unwrap();
        db.update_settings(&SettingsUpdate {
            float_icon_opacity: Some(80),
            clipboard_capture_scope: Some(CaptureScope::TextOnly),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(db.reset_settings().unwrap(), Settings::default());
        assert_eq!(db.get_settings().unwrap(), Settings::default());
    }

    #[test]
    fn test_migrates_legacy_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipboard_history.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE text_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    content TEXT NOT NULL,
                    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                    char_count INTEGER,
                    md5_hash TEXT,
                    number INTEGER DEFAULT 1
                );
                CREATE TABLE file_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    original_path TEXT,
                    saved_path TEXT,
                    filename TEXT,
                    file_size INTEGER,
                    file_type TEXT,
                    md5_hash TEXT UNIQUE,
                    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                    number INTEGER DEFAULT 1
                );
                CREATE TABLE settings (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    max_copy_size INTEGER DEFAULT 314572800,
                    max_copy_count INTEGER DEFAULT 100,
                    unlimited_mode INTEGER DEFAULT 0,
                    retention_days INTEGER DEFAULT 0
                );
                INSERT INTO text_records (content, timestamp, char_count, md5_hash, number)
                    VALUES ('hello', '2024-01-01 10:00:00', 5, 'aaa', 2);
                INSERT INTO text_records (content, timestamp, char_count, md5_hash, number)
                    VALUES ('hello', '2024-02-01 10:00:00', 5, NULL, 3);
                INSERT INTO text_records (content, timestamp, char_count, md5_hash, number)
                    VALUES ('world', '2024-01-15 10:00:00', 5, 'bbb', 1);
                INSERT INTO file_records (original_path, saved_path, filename, file_size, file_type, md5_hash, timestamp, number)
                    VALUES ('/src/a.png', '/gone/a.png', 'a.png', 42, 'images', 'd41d8', '2024-01-02 09:00:00', 4);
                INSERT INTO settings (id, max_copy_size, max_copy_count, unlimited_mode, retention_days)
                    VALUES (1, 1048576, 20, 1, 14);
                "#,
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();

        let texts = db.list_text(TextSortField::Content, false, None, None).unwrap();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].content, "hello");
        assert_eq!(texts[0].occurrence_count, 5);
        assert_eq!(texts[0].content_hash, hash_text("hello"));
        assert_eq!(format_timestamp(texts[0].timestamp), "2024-02-01 10:00:00.000");

        let file = db.find_file_by_hash("d41d8").unwrap().unwrap();
        assert_eq!(file.occurrence_count, 4);
        assert_eq!(file.file_type_category, FileCategory::Images);
        assert_eq!(file.original_path, PathBuf::from("/src/a.png"));

        let settings = db.get_settings().unwrap();
        assert_eq!(settings.max_copy_size, 1_048_576);
        assert_eq!(settings.max_copy_count, 20);
        assert!(settings.unlimited_mode);
        assert_eq!(settings.retention_days, 14);
        assert_eq!(settings.float_icon_opacity, DEFAULT_FLOAT_ICON_OPACITY);
        assert_eq!(settings.clipboard_capture_scope, CaptureScope::All);

        // Upserts work against the migrated unique index
        let again = db.upsert_text("world", now_local()).unwrap();
        assert_eq!(again.occurrence_count, 2);

        drop(db);
        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.statistics().unwrap().text_count, 2);
    }

    #[test]
    fn test_merge_duplicate_hashes_without_index() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.get_conn().unwrap();
        conn.execute_batch(
            r#"
            DROP INDEX idx_text_records_hash;
            INSERT INTO text_records (content, contentHash, charCount, timestamp, occurrenceCount)
                VALUES ('dup', 'h', 3, '2024-01-01 00:00:00.000', 1);
            INSERT INTO text_records (content, contentHash, charCount, timestamp, occurrenceCount)
                VALUES ('dup', 'h', 3, '2024-06-01 00:00:00.000', 2);
            "#,
        )
        .unwrap();

        let merged = Database::merge_duplicate_hashes(&conn).unwrap();
        assert_eq!(merged, 1);

        let (count, timestamp): (i64, String) = conn
            .query_row(
                "SELECT occurrenceCount, timestamp FROM text_records WHERE contentHash = 'h'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(timestamp, "2024-06-01 00:00:00.000");
    }
}
