//! ClipboardStore - the content store API over [`Database`]
//!
//! Adds what the SQL layer does not do itself: settings validation, the
//! retention clock, best-effort removal of saved file copies, and async search.
//!
//! Async Cancellation Architecture:
//! Dropping a `search` future drops a DropGuard, which cancels a CancellationToken.
//! A watcher task turns that into a SQLite interrupt on the blocking search thread.

use crate::config::DataLocation;
use crate::database::Database;
use crate::interface::{
    ClipStashError, ClipboardStoreApi, FileRecord, FileSortField, PurgeSummary, SearchHit,
    SearchScope, Settings, SettingsUpdate, Statistics, TextRecord, TextSortField, UpsertResult,
};
use crate::models::{now_local, NewFileRecord};
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use once_cell::sync::Lazy;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Global fallback Tokio runtime for async calls made outside any runtime context.
/// Shared across all ClipboardStore instances and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// RAII guard that cancels a token when dropped
struct DropGuard {
    token: CancellationToken,
}

impl DropGuard {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Thread-safe clipboard store
///
/// Concurrency Model:
/// - Database uses an r2d2 connection pool; writes are serialized inside `Database`
/// - Search is async with cancellation support via CancellationToken
/// - Blocking search work runs on tokio::spawn_blocking threads
pub struct ClipboardStore {
    db: Arc<Database>,
}

impl ClipboardStore {
    /// Create a store with an in-memory database (for testing)
    #[cfg(test)]
    pub(crate) fn new_in_memory() -> Result<Self, ClipStashError> {
        let database = Database::open_in_memory()?;
        Ok(Self::from_database(Arc::new(database)))
    }

    /// Open or create the database at `db_path`
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, ClipStashError> {
        let db = Database::open(db_path.as_ref()).map_err(|e| {
            ClipStashError::StorageUnavailable(format!("{}: {}", db_path.as_ref().display(), e))
        })?;
        Ok(Self::from_database(Arc::new(db)))
    }

    /// Direct database access, for backdating rows in tests
    #[cfg(test)]
    pub(crate) fn db_for_tests(&self) -> &Database {
        &self.db
    }

    pub fn from_database(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Try each data root once, in order, and open the first that works
    pub fn open_first_available(roots: &[PathBuf]) -> Result<(Self, DataLocation), ClipStashError> {
        let mut failures = Vec::new();

        for root in roots {
            let location = DataLocation::new(root);
            if let Err(e) = fs::create_dir_all(&location.root) {
                warn!(root = %location.root.display(), error = %e, "Data directory not usable");
                failures.push(format!("{}: {}", location.root.display(), e));
                continue;
            }
            match Self::open(&location.database_path) {
                Ok(store) => {
                    info!(database = %location.database_path.display(), "Opened clipboard history");
                    return Ok((store, location));
                }
                Err(e) => {
                    warn!(root = %location.root.display(), error = %e, "Could not open clipboard database");
                    failures.push(e.to_string());
                }
            }
        }

        Err(ClipStashError::StorageUnavailable(if failures.is_empty() {
            "no data directory candidates".to_string()
        } else {
            format!("no writable location ({})", failures.join("; "))
        }))
    }

    /// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
    fn runtime_handle(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
    }

    pub fn get_text(&self, id: i64) -> Result<Option<TextRecord>, ClipStashError> {
        Ok(self.db.get_text(id)?)
    }

    /// Retention sweep against an explicit clock
    pub fn purge_expired_at(&self, now: NaiveDateTime) -> Result<PurgeSummary, ClipStashError> {
        let settings = self.db.get_settings()?;
        if settings.retention_days == 0 {
            return Ok(PurgeSummary::default());
        }

        // A retention longer than chrono can represent keeps everything
        let Some(cutoff) = ChronoDuration::try_days(i64::from(settings.retention_days))
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            return Ok(PurgeSummary::default());
        };
        let purged = self.db.purge_older_than(cutoff)?;
        for path in &purged.saved_paths {
            remove_saved_copy(path);
        }

        if purged.summary.total() > 0 {
            info!(
                texts = purged.summary.texts_removed,
                files = purged.summary.files_removed,
                retention_days = settings.retention_days,
                "Purged expired clipboard records"
            );
        }
        Ok(purged.summary)
    }
}

/// Delete a saved copy. Missing files are fine; other failures are logged only.
fn remove_saved_copy(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed saved copy"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Saved copy already gone")
        }
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove saved copy"),
    }
}

#[async_trait::async_trait]
impl ClipboardStoreApi for ClipboardStore {
    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn upsert_text(&self, content: &str) -> Result<UpsertResult, ClipStashError> {
        Ok(self.db.upsert_text(content, now_local())?)
    }

    fn upsert_file(&self, record: &NewFileRecord) -> Result<UpsertResult, ClipStashError> {
        Ok(self.db.upsert_file(record, now_local())?)
    }

    /// Validated before anything is written; a rejected update leaves settings untouched
    fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, ClipStashError> {
        update.validate()?;
        Ok(self.db.update_settings(&update)?)
    }

    fn reset_settings(&self) -> Result<Settings, ClipStashError> {
        Ok(self.db.reset_settings()?)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn find_file_by_hash(&self, content_hash: &str) -> Result<Option<FileRecord>, ClipStashError> {
        Ok(self.db.find_file_by_hash(content_hash)?)
    }

    fn list_text(
        &self,
        sort: TextSortField,
        descending: bool,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<TextRecord>, ClipStashError> {
        Ok(self.db.list_text(sort, descending, limit, offset)?)
    }

    fn list_files(
        &self,
        sort: FileSortField,
        descending: bool,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<FileRecord>, ClipStashError> {
        Ok(self.db.list_files(sort, descending, limit, offset)?)
    }

    async fn search(&self, keyword: String, scope: SearchScope) -> Result<Vec<SearchHit>, ClipStashError> {
        let token = CancellationToken::new();
        let _guard = DropGuard::new(token.clone());

        let runtime = self.runtime_handle();
        let runtime_for_closure = runtime.clone();
        let db = Arc::clone(&self.db);
        let token_clone = token.clone();

        let handle = runtime.spawn_blocking(move || {
            db.search_interruptible(&keyword, scope, &token_clone, &runtime_for_closure)
        });

        match handle.await {
            Ok(Ok(hits)) => Ok(hits),
            Ok(Err(e)) => Err(e.into()),
            Err(_join_error) => Err(ClipStashError::Cancelled),
        }
    }

    fn statistics(&self) -> Result<Statistics, ClipStashError> {
        Ok(self.db.statistics()?)
    }

    fn get_settings(&self) -> Result<Settings, ClipStashError> {
        Ok(self.db.get_settings()?)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn delete_text(&self, id: i64) -> Result<bool, ClipStashError> {
        Ok(self.db.delete_text(id)?)
    }

    fn delete_file(&self, id: i64) -> Result<bool, ClipStashError> {
        match self.db.delete_file(id)? {
            Some(saved_path) => {
                remove_saved_copy(&saved_path);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear_all(&self) -> Result<(), ClipStashError> {
        let saved_paths = self.db.clear_all()?;
        for path in &saved_paths {
            remove_saved_copy(path);
        }
        info!(files = saved_paths.len(), "Cleared clipboard history");
        Ok(())
    }

    fn purge_expired(&self) -> Result<PurgeSummary, ClipStashError> {
        self.purge_expired_at(now_local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::FileCategory;

    fn days_ago(days: i64) -> NaiveDateTime {
        now_local() - ChronoDuration::days(days)
    }

    fn saved_file(dir: &Path, name: &str, hash: &str) -> NewFileRecord {
        let saved_path = dir.join(name);
        fs::write(&saved_path, b"saved bytes").unwrap();
        NewFileRecord {
            original_path: PathBuf::from("/original").join(name),
            saved_path,
            filename: name.to_string(),
            file_size: 11,
            file_type_category: FileCategory::Documents,
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_store_creation() {
        let store = ClipboardStore::new_in_memory().unwrap();
        assert_eq!(store.statistics().unwrap(), Statistics::default());
        assert_eq!(store.get_settings().unwrap(), Settings::default());
    }

    #[test]
    fn test_duplicate_handling() {
        let store = ClipboardStore::new_in_memory().unwrap();

        let first = store.upsert_text("Same content").unwrap();
        let second = store.upsert_text("Same content").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.occurrence_count, 2);
        assert_eq!(store.statistics().unwrap().text_count, 1);
    }

    #[test]
    fn test_delete_file_removes_saved_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipboardStore::new_in_memory().unwrap();
        let record = saved_file(dir.path(), "notes.txt", "h1");
        let id = store.upsert_file(&record).unwrap().id;

        assert!(store.delete_file(id).unwrap());
        assert!(!record.saved_path.exists());
        assert!(!store.delete_file(id).unwrap());
    }

    #[test]
    fn test_delete_file_tolerates_missing_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipboardStore::new_in_memory().unwrap();
        let record = saved_file(dir.path(), "notes.txt", "h1");
        let id = store.upsert_file(&record).unwrap().id;
        fs::remove_file(&record.saved_path).unwrap();

        assert!(store.delete_file(id).unwrap());
        assert_eq!(store.statistics().unwrap().file_count, 0);
    }

    #[test]
    fn test_clear_all_removes_saved_copies_and_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipboardStore::new_in_memory().unwrap();
        let record = saved_file(dir.path(), "a.txt", "h1");
        store.upsert_file(&record).unwrap();
        store.upsert_text("text").unwrap();
        store
            .update_settings(SettingsUpdate { max_copy_count: Some(3), ..Default::default() })
            .unwrap();

        store.clear_all().unwrap();

        assert_eq!(store.statistics().unwrap(), Statistics::default());
        assert!(!record.saved_path.exists());
        assert_eq!(store.get_settings().unwrap().max_copy_count, 3);
    }

    #[test]
    fn test_purge_is_noop_without_retention() {
        let store = ClipboardStore::new_in_memory().unwrap();
        store.db.upsert_text("ancient", days_ago(400)).unwrap();

        assert_eq!(store.purge_expired().unwrap(), PurgeSummary::default());
        assert_eq!(store.statistics().unwrap().text_count, 1);
    }

    #[test]
    fn test_purge_removes_expired_rows_and_copies() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClipboardStore::new_in_memory().unwrap();
        store
            .update_settings(SettingsUpdate { retention_days: Some(7), ..Default::default() })
            .unwrap();

        store.db.upsert_text("ten days", days_ago(10)).unwrap();
        store.db.upsert_text("three days", days_ago(3)).unwrap();
        let old_file = saved_file(dir.path(), "old.txt", "old");
        let new_file = saved_file(dir.path(), "new.txt", "new");
        store.db.upsert_file(&old_file, days_ago(10)).unwrap();
        store.db.upsert_file(&new_file, days_ago(1)).unwrap();

        let summary = store.purge_expired().unwrap();
        assert_eq!(summary, PurgeSummary { texts_removed: 1, files_removed: 1 });

        let texts = store.list_text(TextSortField::Timestamp, true, None, None).unwrap();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].content, "three days");
        assert!(!old_file.saved_path.exists());
        assert!(new_file.saved_path.exists());

        // Idempotent
        assert_eq!(store.purge_expired().unwrap().total(), 0);
    }

    #[test]
    fn test_invalid_settings_are_rejected_and_previous_kept() {
        let store = ClipboardStore::new_in_memory().unwrap();
        store
            .update_settings(SettingsUpdate { max_copy_count: Some(10), ..Default::default() })
            .unwrap();

        let result = store.update_settings(SettingsUpdate {
            max_copy_count: Some(20),
            float_icon_opacity: Some(200),
            ..Default::default()
        });
        assert!(matches!(result, Err(ClipStashError::InvalidSettings(_))));
        assert_eq!(store.get_settings().unwrap().max_copy_count, 10);
    }

    #[test]
    fn test_concurrent_upserts_keep_one_row() {
        let store = Arc::new(ClipboardStore::new_in_memory().unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.upsert_text("shared").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let texts = store.list_text(TextSortField::Timestamp, true, None, None).unwrap();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].occurrence_count, 100);
    }

    #[test]
    fn test_search_works_without_external_tokio_runtime() {
        // No #[tokio::test]: the fallback runtime has to carry the blocking search
        let store = ClipboardStore::new_in_memory().unwrap();
        store.upsert_text("Hello World").unwrap();
        store.upsert_text("goodbye").unwrap();

        let hits = futures::executor::block_on(store.search("hello".to_string(), SearchScope::All)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_text, "Hello World");
    }

    #[tokio::test]
    async fn test_search_newest_first() {
        let store = ClipboardStore::new_in_memory().unwrap();
        store.db.upsert_text("report old", days_ago(2)).unwrap();
        store.db.upsert_text("report new", days_ago(1)).unwrap();

        let hits = store.search("REPORT".to_string(), SearchScope::TextOnly).await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.display_text.as_str()).collect();
        assert_eq!(texts, vec!["report new", "report old"]);
    }

    #[tokio::test]
    async fn test_async_search_cancellation_via_drop() {
        let store = ClipboardStore::new_in_memory().unwrap();
        for i in 0..100 {
            store.upsert_text(&format!("Item number {} with some text content", i)).unwrap();
        }

        let search_future = store.search("Item".to_string(), SearchScope::All);
        drop(search_future);

        let hits = store.search("Item".to_string(), SearchScope::All).await.unwrap();
        assert_eq!(hits.len(), 100);
    }

    #[test]
    fn test_open_first_available_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file in the way").unwrap();
        let good = dir.path().join("data");

        let (store, location) =
            ClipboardStore::open_first_available(&[blocker.join("nested"), good.clone()]).unwrap();

        assert_eq!(location.root, good);
        assert!(location.database_path.exists());
        store.upsert_text("works").unwrap();
    }

    #[test]
    fn test_open_first_available_reports_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file in the way").unwrap();

        let result = ClipboardStore::open_first_available(&[blocker.join("a"), blocker.join("b")]);
        assert!(matches!(result, Err(ClipStashError::StorageUnavailable(_))));
    }
}
