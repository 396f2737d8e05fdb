//! Capture policy: decides whether an observed clipboard payload is stored, and how
//!
//! One `CapturePolicy` belongs to one monitoring session. It remembers the previous
//! payload so that a clipboard which has not changed between polls is not re-counted.

use crate::content_detection::detect_file_category;
use crate::interface::{CaptureScope, ClipStashError, ClipboardStoreApi, Settings, UpsertResult};
use crate::models::{format_file_size, hash_file, hash_text, now_local, saved_file_name, NewFileRecord};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What the clipboard held at one observation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    pub text: Option<String>,
    pub files: Vec<PathBuf>,
}

impl ClipboardSnapshot {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), files: Vec::new() }
    }

    pub fn files<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self { text: None, files: files.into_iter().map(Into::into).collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.files.is_empty()
    }
}

/// Why a file-list capture was refused. Shown to the user, never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureRejection {
    TooManyFiles { count: usize, limit: u32 },
    FileTooLarge { filename: String, size: u64, limit: u64 },
    TotalTooLarge { total: u64, limit: u64 },
}

impl fmt::Display for CaptureRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureRejection::TooManyFiles { count, limit } => write!(
                f,
                "{} files copied, but at most {} files are recorded at once",
                count, limit
            ),
            CaptureRejection::FileTooLarge { filename, size, limit } => write!(
                f,
                "{} is {}, larger than the {} limit",
                filename,
                format_file_size(*size),
                format_file_size(*limit)
            ),
            CaptureRejection::TotalTooLarge { total, limit } => write!(
                f,
                "copied files total {}, larger than the {} limit",
                format_file_size(*total),
                format_file_size(*limit)
            ),
        }
    }
}

/// Records touched by one persisted change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub text: Option<UpsertResult>,
    pub files: Vec<UpsertResult>,
    /// Files that vanished or could not be read; the rest of the batch went ahead
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Same payload as the previous observation
    Unchanged,
    /// Nothing storable (no files, and no text beyond whitespace)
    Empty,
    Rejected(CaptureRejection),
    Captured(CaptureReport),
}

/// Identity of an effective payload: text hash plus sorted file list
#[derive(Debug, Clone, PartialEq, Eq)]
struct PayloadSignature {
    text_hash: Option<String>,
    files: Vec<PathBuf>,
}

/// Effective payload after the capture scope has been applied
struct Payload {
    text: Option<String>,
    files: Vec<PathBuf>,
}

impl Payload {
    fn identify(snapshot: ClipboardSnapshot, settings: &Settings) -> Self {
        let text = snapshot.text.filter(|t| !t.trim().is_empty());
        let files = if settings.clipboard_capture_scope == CaptureScope::TextOnly && text.is_some() {
            Vec::new()
        } else {
            snapshot.files
        };
        Self { text, files }
    }

    fn signature(&self) -> PayloadSignature {
        let mut files = self.files.clone();
        files.sort();
        PayloadSignature {
            text_hash: self.text.as_deref().map(hash_text),
            files,
        }
    }

    fn is_empty(&self) -> bool {
        self.text.is_none() && self.files.is_empty()
    }
}

pub struct CapturePolicy {
    files_root: PathBuf,
    previous: Option<PayloadSignature>,
}

impl CapturePolicy {
    /// Saved copies go under `files_root/<category>/<YYYY-MM-DD>/`
    pub fn new(files_root: impl Into<PathBuf>) -> Self {
        Self { files_root: files_root.into(), previous: None }
    }

    pub fn files_root(&self) -> &Path {
        &self.files_root
    }

    /// Forget the previous payload so the next observation is processed
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Run one observed clipboard change through identify, limit check and persist.
    ///
    /// Errors are store failures, or `FileRead` when every file of a file-only
    /// batch failed. Rejections are an `Ok` outcome.
    pub fn capture<S>(&mut self, store: &S, snapshot: ClipboardSnapshot) -> Result<CaptureOutcome, ClipStashError>
    where
        S: ClipboardStoreApi + ?Sized,
    {
        let settings = store.get_settings()?;
        let payload = Payload::identify(snapshot, &settings);
        let signature = payload.signature();

        if self.previous.as_ref() == Some(&signature) {
            return Ok(CaptureOutcome::Unchanged);
        }

        if payload.is_empty() {
            self.previous = Some(signature);
            return Ok(CaptureOutcome::Empty);
        }

        if !payload.files.is_empty() {
            if let Some(rejection) = check_limits(&payload.files, &settings) {
                info!(reason = %rejection, "Clipboard capture rejected");
                self.previous = Some(signature);
                return Ok(CaptureOutcome::Rejected(rejection));
            }
        }

        let mut report = CaptureReport::default();
        for path in &payload.files {
            match self.persist_file(store, path)? {
                Some(result) => report.files.push(result),
                None => report.skipped.push(path.clone()),
            }
        }

        if let Some(text) = payload.text.as_deref() {
            report.text = Some(store.upsert_text(text)?);
        }

        self.previous = Some(signature);

        if report.text.is_none() && report.files.is_empty() {
            return Err(ClipStashError::FileRead(format!(
                "none of the {} copied files could be read",
                report.skipped.len()
            )));
        }

        debug!(
            text = report.text.is_some(),
            files = report.files.len(),
            skipped = report.skipped.len(),
            "Clipboard change captured"
        );
        Ok(CaptureOutcome::Captured(report))
    }

    /// Hash, copy if needed, and upsert one file. `None` means the file was skipped.
    fn persist_file<S>(&self, store: &S, source: &Path) -> Result<Option<UpsertResult>, ClipStashError>
    where
        S: ClipboardStoreApi + ?Sized,
    {
        let metadata = match fs::metadata(source) {
            Ok(m) if m.is_file() => m,
            Ok(_) => {
                debug!(path = %source.display(), "Skipping non-regular file");
                return Ok(None);
            }
            Err(e) => {
                warn!(path = %source.display(), error = %e, "Copied file is no longer readable");
                return Ok(None);
            }
        };

        let content_hash = match hash_file(source) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(path = %source.display(), error = %e, "Failed to hash copied file");
                return Ok(None);
            }
        };

        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        let category = detect_file_category(source);

        let saved_path = match store.find_file_by_hash(&content_hash)? {
            Some(existing) => existing.saved_path,
            None => self
                .files_root
                .join(category.as_str())
                .join(now_local().format("%Y-%m-%d").to_string())
                .join(saved_file_name(&filename, &content_hash)),
        };

        if !saved_path.exists() && !copy_into_place(source, &saved_path)? {
            return Ok(None);
        }

        let record = NewFileRecord {
            original_path: source.to_path_buf(),
            saved_path,
            filename,
            file_size: metadata.len(),
            file_type_category: category,
            content_hash,
        };
        store.upsert_file(&record).map(Some)
    }
}

/// Count, then each file, then the total. Files that cannot be stat'ed are left
/// for the persist step to skip.
fn check_limits(files: &[PathBuf], settings: &Settings) -> Option<CaptureRejection> {
    if settings.unlimited_mode {
        return None;
    }

    if files.len() > settings.max_copy_count as usize {
        return Some(CaptureRejection::TooManyFiles {
            count: files.len(),
            limit: settings.max_copy_count,
        });
    }

    let mut total: u64 = 0;
    for path in files {
        let size = match fs::metadata(path) {
            Ok(m) if m.is_file() => m.len(),
            _ => continue,
        };
        if size > settings.max_copy_size {
            return Some(CaptureRejection::FileTooLarge {
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                size,
                limit: settings.max_copy_size,
            });
        }
        total = total.saturating_add(size);
    }

    if total > settings.max_copy_size {
        return Some(CaptureRejection::TotalTooLarge {
            total,
            limit: settings.max_copy_size,
        });
    }
    None
}

/// Copy `source` to `target`. Ok(false) when the source vanished mid-copy.
fn copy_into_place(source: &Path, target: &Path) -> Result<bool, ClipStashError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ClipStashError::StorageUnavailable(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }

    match fs::copy(source, target) {
        Ok(_) => {
            debug!(from = %source.display(), to = %target.display(), "Saved file copy");
            Ok(true)
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(target) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(path = %target.display(), error = %cleanup, "Failed to remove partial copy");
                }
            }
            if !source.exists() {
                warn!(path = %source.display(), error = %e, "Copied file vanished before it was saved");
                Ok(false)
            } else {
                Err(ClipStashError::StorageUnavailable(format!(
                    "cannot copy {} to {}: {}",
                    source.display(),
                    target.display(),
                    e
                )))
            }
        }
    }
}
