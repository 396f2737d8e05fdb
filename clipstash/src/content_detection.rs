//! File category detection
//!
//! Maps file extensions onto the coarse categories used to partition saved copies.

use crate::interface::FileCategory;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

static EXTENSION_CATEGORIES: Lazy<HashMap<&'static str, FileCategory>> = Lazy::new(|| {
    let groups: [(FileCategory, &[&str]); 7] = [
        (FileCategory::Documents, &["txt", "log", "md", "rst"]),
        (FileCategory::Images, &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"]),
        (FileCategory::Videos, &["mp4", "avi", "mkv", "mov", "wmv", "flv"]),
        (FileCategory::Audio, &["mp3", "wav", "flac", "aac", "ogg"]),
        (FileCategory::Pdf, &["pdf"]),
        (FileCategory::Office, &["doc", "docx", "xls", "xlsx", "ppt", "pptx"]),
        (FileCategory::Archives, &["zip", "rar", "7z", "tar", "gz"]),
    ];

    groups
        .iter()
        .flat_map(|(category, extensions)| extensions.iter().map(move |ext| (*ext, *category)))
        .collect()
});

/// Category of a file by its (case-insensitive) extension
pub fn detect_file_category(path: &Path) -> FileCategory {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| EXTENSION_CATEGORIES.get(ext.as_str()).copied())
        .unwrap_or(FileCategory::Others)
}
