//! # Upload Storage
//!
//! Optional persistence of uploaded images, their preprocessed rasters and the
//! extracted text. Layout under the storage root:
//!
//! ```text
//! raw/        original upload bytes
//! processed/  binarized page as PNG
//! text/       normalized text
//! ```
//!
//! Every file of one upload shares a `YYYYmmddHHMMSSmmm_<name>` prefix so the
//! three artifacts can be matched up. Client file names are sanitized before
//! they touch the file system.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Local;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{error_logging, AppError, AppResult};
use crate::preprocessing::PixelBuffer;

/// Maximum allowed filename length (255 bytes on most filesystems)
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Characters that are not allowed in filenames
pub const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '/', '\\'];

const RAW_DIR: &str = "raw";
const PROCESSED_DIR: &str = "processed";
const TEXT_DIR: &str = "text";

/// Paths written for one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedPaths {
    pub raw: PathBuf,
    pub processed: PathBuf,
    pub text: PathBuf,
}

/// Sanitize a client-supplied filename for use on disk
///
/// Directory components are dropped, forbidden and control characters become
/// underscores, leading/trailing dots and whitespace are trimmed, and the
/// result is capped at [`MAX_FILENAME_LENGTH`] bytes, keeping the extension.
///
/// # Examples
///
/// ```rust
/// use scantext::storage::sanitize_filename;
///
/// assert_eq!(sanitize_filename("receipt.jpg"), "receipt.jpg");
/// assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_filename("scan<1>.png"), "scan_1_.png");
/// assert_eq!(sanitize_filename("..."), "unnamed_file");
/// ```
pub fn sanitize_filename(filename: &str) -> String {
    // Keep only the last path component, whichever separator the client used
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let replaced: String = base
        .chars()
        .map(|c| {
            if FORBIDDEN_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let mut sanitized = replaced.trim().trim_matches('.').trim().to_string();
    if sanitized.is_empty() {
        sanitized = "unnamed_file".to_string();
    }

    if sanitized.len() > MAX_FILENAME_LENGTH {
        // Try to preserve extension
        let (name, ext) = match sanitized.rfind('.') {
            Some(dot_pos) if sanitized.len() - dot_pos < 16 => sanitized.split_at(dot_pos),
            _ => (sanitized.as_str(), ""),
        };
        let max_name_len = MAX_FILENAME_LENGTH.saturating_sub(ext.len());
        let mut cut = max_name_len.min(name.len());
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &name[..cut], ext);
    }

    sanitized
}

/// Writes upload artifacts under a root directory
#[derive(Debug)]
pub struct UploadStore {
    root: PathBuf,
    // Serializes name reservation so concurrent items never share a prefix
    reserve_lock: Mutex<()>,
}

impl UploadStore {
    /// Opens (creating if needed) the storage layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        for dir in [RAW_DIR, PROCESSED_DIR, TEXT_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| {
                error_logging::log_storage_error(
                    &e,
                    "create_dir",
                    Some(&path.display().to_string()),
                    None,
                );
                AppError::Storage(format!(
                    "Failed to create storage directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }
        info!(root = %root.display(), "Upload storage ready");
        Ok(Self {
            root,
            reserve_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserves a unique timestamped name for an upload.
    ///
    /// The name is claimed in all three directories at once: `raw/<name>`,
    /// `processed/<stem>.png` and `text/<stem>.txt` are created empty, so two
    /// uploads that differ only by extension never share an output file.
    pub fn reserve_name(&self, filename: &str) -> AppResult<String> {
        let _guard = self.reserve_lock.lock();
        let stamp = Local::now().format("%Y%m%d%H%M%S%3f");
        let sanitized = sanitize_filename(filename);

        let mut candidate = format!("{}_{}", stamp, sanitized);
        let mut counter = 1;
        loop {
            let paths = self.paths_for(&candidate);
            if !paths.raw.exists() && !paths.processed.exists() && !paths.text.exists() {
                for path in [&paths.raw, &paths.processed, &paths.text] {
                    self.claim(path)?;
                }
                return Ok(candidate);
            }
            candidate = format!("{}_{}_{}", stamp, counter, sanitized);
            counter += 1;
        }
    }

    /// Paths the artifacts of a reserved name are written to.
    pub fn paths_for(&self, name: &str) -> SavedPaths {
        let stem = file_stem(name);
        SavedPaths {
            raw: self.root.join(RAW_DIR).join(name),
            processed: self.root.join(PROCESSED_DIR).join(format!("{}.png", stem)),
            text: self.root.join(TEXT_DIR).join(format!("{}.txt", stem)),
        }
    }

    fn claim(&self, path: &Path) -> AppResult<()> {
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map(|_| ())
            .map_err(|e| {
                error_logging::log_storage_error(
                    &e,
                    "reserve",
                    Some(&path.display().to_string()),
                    None,
                );
                AppError::Storage(format!("Failed to reserve {}: {}", path.display(), e))
            })
    }

    /// Writes the original upload bytes to `raw/<name>`.
    pub fn save_raw(&self, name: &str, bytes: &[u8]) -> AppResult<PathBuf> {
        self.write(self.paths_for(name).raw, bytes)
    }

    /// Writes the binarized page to `processed/<stem>.png`.
    pub fn save_processed(&self, name: &str, image: &PixelBuffer) -> AppResult<PathBuf> {
        let png = image
            .encode_png()
            .map_err(|e| AppError::Storage(format!("Failed to encode processed image: {}", e)))?;
        self.write(self.paths_for(name).processed, &png)
    }

    /// Writes the normalized text to `text/<stem>.txt`.
    pub fn save_text(&self, name: &str, text: &str) -> AppResult<PathBuf> {
        self.write(self.paths_for(name).text, text.as_bytes())
    }

    fn write(&self, path: PathBuf, bytes: &[u8]) -> AppResult<PathBuf> {
        fs::write(&path, bytes).map_err(|e| {
            error_logging::log_storage_error(
                &e,
                "write",
                Some(&path.display().to_string()),
                Some(bytes.len() as u64),
            );
            AppError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "Stored file");
        Ok(path)
    }

    /// Deletes stored files last modified more than `max_age` ago.
    ///
    /// Returns how many files were removed. Files that vanish or cannot be
    /// inspected mid-sweep are skipped.
    pub fn purge_expired(&self, max_age: Duration) -> AppResult<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for dir in [RAW_DIR, PROCESSED_DIR, TEXT_DIR] {
            let dir_path = self.root.join(dir);
            let entries = fs::read_dir(&dir_path).map_err(|e| {
                AppError::Storage(format!("Failed to list {}: {}", dir_path.display(), e))
            })?;

            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if !metadata.is_file() {
                    continue;
                }
                let age = metadata
                    .modified()
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok());
                if matches!(age, Some(age) if age > max_age) {
                    match fs::remove_file(&path) {
                        Ok(()) => removed += 1,
                        Err(e) => error_logging::log_storage_error(
                            &e,
                            "purge",
                            Some(&path.display().to_string()),
                            Some(metadata.len()),
                        ),
                    }
                }
            }
        }

        if removed > 0 {
            info!(removed, max_age_secs = max_age.as_secs(), "Purged expired uploads");
        }
        Ok(removed)
    }
}

fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name)
}
