//! Clipstash public interface
//!
//! Shared record types, the error taxonomy and the `ClipboardStoreApi` trait
//! implemented by [`crate::ClipboardStore`].

use crate::models::NewFileRecord;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Coarse file category derived from the file extension.
/// Also the first path segment of a saved copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Documents,
    Images,
    Videos,
    Audio,
    Pdf,
    Office,
    Archives,
    Others,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Documents => "documents",
            FileCategory::Images => "images",
            FileCategory::Videos => "videos",
            FileCategory::Audio => "audio",
            FileCategory::Pdf => "pdf",
            FileCategory::Office => "office",
            FileCategory::Archives => "archives",
            FileCategory::Others => "others",
        }
    }

    /// Parse the database representation. Unknown values map to `Others`.
    pub fn from_database_str(value: &str) -> Self {
        match value {
            "documents" => FileCategory::Documents,
            "images" => FileCategory::Images,
            "videos" => FileCategory::Videos,
            "audio" => FileCategory::Audio,
            "pdf" => FileCategory::Pdf,
            "office" => FileCategory::Office,
            "archives" => FileCategory::Archives,
            _ => FileCategory::Others,
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which clipboard payloads the capture policy records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureScope {
    #[default]
    All,
    TextOnly,
}

impl CaptureScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureScope::All => "all",
            CaptureScope::TextOnly => "text_only",
        }
    }

    pub fn from_database_str(value: &str) -> Self {
        match value {
            "text_only" | "textOnly" => CaptureScope::TextOnly,
            _ => CaptureScope::All,
        }
    }
}

/// Search scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    All,
    TextOnly,
    FileOnly,
}

/// Kind of record a search hit points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Text,
    File,
}

impl RecordKind {
    pub(crate) fn from_database_str(value: &str) -> Self {
        match value {
            "file" => RecordKind::File,
            _ => RecordKind::Text,
        }
    }
}

/// Sortable text record columns. Unrecognized names fall back to `Timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSortField {
    Content,
    CharCount,
    OccurrenceCount,
    #[default]
    Timestamp,
}

impl TextSortField {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "content" => TextSortField::Content,
            "charcount" => TextSortField::CharCount,
            "occurrencecount" | "occurrences" | "number" => TextSortField::OccurrenceCount,
            _ => TextSortField::Timestamp,
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            TextSortField::Content => "content",
            TextSortField::CharCount => "charCount",
            TextSortField::OccurrenceCount => "occurrenceCount",
            TextSortField::Timestamp => "timestamp",
        }
    }
}

/// Sortable file record columns. Unrecognized names fall back to `Timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSortField {
    Filename,
    FileSize,
    FileTypeCategory,
    OccurrenceCount,
    #[default]
    Timestamp,
}

impl FileSortField {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "filename" => FileSortField::Filename,
            "filesize" | "size" => FileSortField::FileSize,
            "filetypecategory" | "filetype" | "category" => FileSortField::FileTypeCategory,
            "occurrencecount" | "occurrences" | "number" => FileSortField::OccurrenceCount,
            _ => FileSortField::Timestamp,
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            FileSortField::Filename => "filename",
            FileSortField::FileSize => "fileSize",
            FileSortField::FileTypeCategory => "fileTypeCategory",
            FileSortField::OccurrenceCount => "occurrenceCount",
            FileSortField::Timestamp => "timestamp",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// A captured text, unique per content hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRecord {
    pub id: i64,
    pub content: String,
    pub content_hash: String,
    pub char_count: u64,
    pub timestamp: NaiveDateTime,
    pub occurrence_count: u64,
}

/// A captured file, unique per hash of its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    pub original_path: PathBuf,
    pub saved_path: PathBuf,
    pub filename: String,
    pub file_size: u64,
    pub file_type_category: FileCategory,
    pub content_hash: String,
    pub timestamp: NaiveDateTime,
    pub occurrence_count: u64,
}

/// Row touched by an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResult {
    pub id: i64,
    pub occurrence_count: u64,
}

impl UpsertResult {
    /// True when the upsert inserted a new row rather than bumping an existing one
    pub fn is_new(&self) -> bool {
        self.occurrence_count == 1
    }
}

/// One search result. `display_text` is the text content or the filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub kind: RecordKind,
    pub id: i64,
    pub display_text: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub text_count: u64,
    pub file_count: u64,
    pub total_file_bytes: u64,
}

/// Rows removed by a retention sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeSummary {
    pub texts_removed: u64,
    pub files_removed: u64,
}

impl PurgeSummary {
    pub fn total(&self) -> u64 {
        self.texts_removed + self.files_removed
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

pub const DEFAULT_MAX_COPY_SIZE: u64 = 300 * 1024 * 1024;
pub const DEFAULT_MAX_COPY_COUNT: u32 = 100;
pub const DEFAULT_FLOAT_ICON_OPACITY: u8 = 15;
pub const MIN_FLOAT_ICON_OPACITY: u8 = 5;
pub const MAX_FLOAT_ICON_OPACITY: u8 = 100;

/// The singleton settings row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub max_copy_size: u64,
    pub max_copy_count: u32,
    pub unlimited_mode: bool,
    /// 0 keeps records forever
    pub retention_days: u32,
    pub auto_start: bool,
    pub float_icon_enabled: bool,
    pub float_icon_opacity: u8,
    pub clipboard_capture_scope: CaptureScope,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_copy_size: DEFAULT_MAX_COPY_SIZE,
            max_copy_count: DEFAULT_MAX_COPY_COUNT,
            unlimited_mode: false,
            retention_days: 0,
            auto_start: false,
            float_icon_enabled: false,
            float_icon_opacity: DEFAULT_FLOAT_ICON_OPACITY,
            clipboard_capture_scope: CaptureScope::All,
        }
    }
}

/// Partial settings update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub max_copy_size: Option<u64>,
    pub max_copy_count: Option<u32>,
    pub unlimited_mode: Option<bool>,
    pub retention_days: Option<u32>,
    pub auto_start: Option<bool>,
    pub float_icon_enabled: Option<bool>,
    pub float_icon_opacity: Option<u8>,
    pub clipboard_capture_scope: Option<CaptureScope>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == SettingsUpdate::default()
    }

    /// Reject values that must never reach the settings row
    pub fn validate(&self) -> Result<(), ClipStashError> {
        if self.max_copy_size == Some(0) {
            return Err(ClipStashError::InvalidSettings(
                "maximum copy size must be greater than zero".into(),
            ));
        }
        if self.max_copy_count == Some(0) {
            return Err(ClipStashError::InvalidSettings(
                "maximum copy count must be greater than zero".into(),
            ));
        }
        if let Some(opacity) = self.float_icon_opacity {
            if !(MIN_FLOAT_ICON_OPACITY..=MAX_FLOAT_ICON_OPACITY).contains(&opacity) {
                return Err(ClipStashError::InvalidSettings(format!(
                    "float icon opacity must be between {} and {}, got {}",
                    MIN_FLOAT_ICON_OPACITY, MAX_FLOAT_ICON_OPACITY, opacity
                )));
            }
        }
        Ok(())
    }

    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(v) = self.max_copy_size {
            settings.max_copy_size = v;
        }
        if let Some(v) = self.max_copy_count {
            settings.max_copy_count = v;
        }
        if let Some(v) = self.unlimited_mode {
            settings.unlimited_mode = v;
        }
        if let Some(v) = self.retention_days {
            settings.retention_days = v;
        }
        if let Some(v) = self.auto_start {
            settings.auto_start = v;
        }
        if let Some(v) = self.float_icon_enabled {
            settings.float_icon_enabled = v;
        }
        if let Some(v) = self.float_icon_opacity {
            settings.float_icon_opacity = v;
        }
        if let Some(v) = self.clipboard_capture_scope {
            settings.clipboard_capture_scope = v;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Error type for clipstash operations.
/// A rejected capture is an outcome, not an error: see [`crate::capture::CaptureOutcome`].
#[derive(Debug, Error)]
pub enum ClipStashError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Could not read copied files: {0}")]
    FileRead(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<crate::database::DatabaseError> for ClipStashError {
    fn from(e: crate::database::DatabaseError) -> Self {
        ClipStashError::StorageUnavailable(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Content store operations shared by the capture loop and user-facing callers.
#[async_trait::async_trait]
pub trait ClipboardStoreApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Insert the text, or bump timestamp and occurrence count of its existing row
    fn upsert_text(&self, content: &str) -> Result<UpsertResult, ClipStashError>;

    /// Insert the file, or bump original path, timestamp and occurrence count of its existing row
    fn upsert_file(&self, record: &NewFileRecord) -> Result<UpsertResult, ClipStashError>;

    fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, ClipStashError>;

    fn reset_settings(&self) -> Result<Settings, ClipStashError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn find_file_by_hash(&self, content_hash: &str) -> Result<Option<FileRecord>, ClipStashError>;

    fn list_text(
        &self,
        sort: TextSortField,
        descending: bool,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<TextRecord>, ClipStashError>;

    fn list_files(
        &self,
        sort: FileSortField,
        descending: bool,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<FileRecord>, ClipStashError>;

    /// ASCII case-insensitive substring search, newest first. Non-ASCII letters match only in their exact case.
    async fn search(&self, keyword: String, scope: SearchScope) -> Result<Vec<SearchHit>, ClipStashError>;

    fn statistics(&self) -> Result<Statistics, ClipStashError>;

    fn get_settings(&self) -> Result<Settings, ClipStashError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Returns false when no row had this id
    fn delete_text(&self, id: i64) -> Result<bool, ClipStashError>;

    /// Also removes the saved copy, best effort
    fn delete_file(&self, id: i64) -> Result<bool, ClipStashError>;

    /// Remove every text and file record. Settings are kept.
    fn clear_all(&self) -> Result<(), ClipStashError>;

    /// Apply the retention policy. No-op while `retention_days` is 0.
    fn purge_expired(&self) -> Result<PurgeSummary, ClipStashError>;
}
