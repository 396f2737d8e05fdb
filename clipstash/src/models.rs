//! Internal data models and helpers shared by the store and the capture policy

use crate::interface::{ClipStashError, FileCategory};
use chrono::{Local, NaiveDateTime};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Stored timestamp format. Fixed-width so that string order equals time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Length of the hash fragment appended to saved copies
pub const SAVED_NAME_HASH_CHARS: usize = 8;

/// File row as produced by the capture policy, before it has an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileRecord {
    pub original_path: PathBuf,
    pub saved_path: PathBuf,
    pub filename: String,
    pub file_size: u64,
    pub file_type_category: FileCategory,
    pub content_hash: String,
}

/// Current local wall-clock time, truncated to what the database stores
pub fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    parse_timestamp(&format_timestamp(now)).unwrap_or(now)
}

pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Rows written by older versions have no fractional seconds.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// SHA-256 hex digest over the exact UTF-8 bytes of `text`
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hex digest of everything `reader` yields
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Stream a file through SHA-256 without loading it into memory
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    hash_reader(&mut reader)
}

/// `<stem>_<first 8 hash chars><ext>`, the name of a saved copy
pub fn saved_file_name(filename: &str, content_hash: &str) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let fragment: String = content_hash.chars().take(SAVED_NAME_HASH_CHARS).collect();
    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, fragment, ext.to_string_lossy()),
        None => format!("{}_{}", stem, fragment),
    }
}

/// Human-readable byte count: `512 B`, `1.5 KB`, `300.0 MB`
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let size = bytes as f64;
    if size < KB {
        format!("{} B", bytes)
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else if size < GB {
        format!("{:.1} MB", size / MB)
    } else {
        format!("{:.1} GB", size / GB)
    }
}

/// Parse a size entered in megabytes (e.g. `"300"` or `"0.5"`) into bytes
pub fn parse_megabytes(input: &str) -> Result<u64, ClipStashError> {
    let trimmed = input.trim();
    let megabytes: f64 = trimmed.parse().map_err(|_| {
        ClipStashError::InvalidSettings(format!("'{}' is not a number of megabytes", trimmed))
    })?;
    if !megabytes.is_finite() || megabytes <= 0.0 {
        return Err(ClipStashError::InvalidSettings(format!(
            "size must be a positive number of megabytes, got '{}'",
            trimmed
        )));
    }
    let bytes = (megabytes * 1024.0 * 1024.0).round();
    if bytes < 1.0 || bytes >= u64::MAX as f64 {
        return Err(ClipStashError::InvalidSettings(format!(
            "size '{}' MB is out of range",
            trimmed
        )));
    }
    Ok(bytes as u64)
}
