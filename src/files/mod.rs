//! Upload storage with staged-file semantics.
//!
//! Uploaded files are written to their final directory before the matching
//! database write, under a generated collision-free name. Until a handler
//! decides the database write succeeded, the file is "staged": `keep()`
//! commits it (the row now references it), `discard()` is the compensating
//! delete for every failure path. Removal of files no row references any
//! longer is best-effort; the database is the source of truth.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;
use tracing::warn;

use crate::config;
use crate::error::ApiError;

/// Per-resource-type upload directories under the configured root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Avatar,
    Brand,
    Product,
    Promotion,
    TeamMember,
}

impl UploadKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            UploadKind::Avatar => "avatars",
            UploadKind::Brand => "brands",
            UploadKind::Product => "products",
            UploadKind::Promotion => "promotions",
            UploadKind::TeamMember => "team",
        }
    }
}

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("upload storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed multipart request: {0}")]
    Multipart(String),
}

impl From<FileStoreError> for ApiError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::Multipart(msg) => ApiError::bad_request(msg),
            FileStoreError::Io(e) => {
                tracing::error!("upload storage error: {}", e);
                ApiError::internal("Failed to store uploaded file")
            }
        }
    }
}

/// Generate a storage filename: millisecond timestamp plus a random
/// alphanumeric suffix, keeping the (sanitized) original extension.
/// Concurrent uploads cannot collide on these names.
pub fn unique_filename(original: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();

    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            e.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(8)
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|e| !e.is_empty());

    match ext {
        Some(ext) => format!("{}-{}.{}", Utc::now().timestamp_millis(), suffix, ext),
        None => format!("{}-{}", Utc::now().timestamp_millis(), suffix),
    }
}

/// An uploaded file written to disk but not yet referenced by any row.
#[derive(Debug)]
pub struct StagedUpload {
    pub filename: String,
    path: PathBuf,
}

impl StagedUpload {
    /// Commit: the database write referencing this file succeeded, so the
    /// file stays. Returns the stored filename for the row.
    pub fn keep(self) -> String {
        self.filename
    }

    /// Compensating delete for a failed or rejected request.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!("failed to discard staged upload {:?}: {}", self.path, e);
        }
    }
}

/// Filesystem root for uploads. Constructed from config in handlers and
/// from a temp directory in tests.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config() -> Self {
        Self::new(&config::config().uploads.root_dir)
    }

    pub fn dir(&self, kind: UploadKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Write `bytes` into the directory for `kind` under a generated name.
    pub async fn stage(
        &self,
        kind: UploadKind,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StagedUpload, FileStoreError> {
        let dir = self.dir(kind);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = unique_filename(original_name);
        let path = dir.join(&filename);
        tokio::fs::write(&path, bytes).await?;

        Ok(StagedUpload { filename, path })
    }

    /// Best-effort removal of a file a row no longer references. Failure is
    /// logged and swallowed; it never fails the surrounding request.
    pub async fn remove_quietly(&self, kind: UploadKind, filename: &str) {
        if filename.is_empty() {
            return;
        }
        let path = self.dir(kind).join(filename);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("failed to remove upload {:?}: {}", path, e);
        }
    }
}

/// A parsed `multipart/form-data` request: text fields plus uploads staged
/// into the store, keyed by part name. Handlers must either `keep()` every
/// staged upload or run `discard_uploads()` before returning an error.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    uploads: HashMap<String, Vec<StagedUpload>>,
}

impl FormData {
    pub async fn from_multipart(
        store: &UploadStore,
        kind: UploadKind,
        mut multipart: Multipart,
    ) -> Result<Self, FileStoreError> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| FileStoreError::Multipart(e.to_string()))?
        {
            let name = match field.name() {
                Some(n) => n.to_string(),
                None => continue,
            };

            // A part with a filename is an upload slot; anything else is a
            // text field. Browsers send an empty filename for a file input
            // left blank - that is "no upload", not an upload of nothing.
            let file_name = field.file_name().map(str::to_string).filter(|f| !f.is_empty());
            match file_name {
                Some(original) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| FileStoreError::Multipart(e.to_string()))?;
                    let staged = store.stage(kind, &original, &bytes).await?;
                    form.uploads.entry(name).or_default().push(staged);
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| FileStoreError::Multipart(e.to_string()))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Text-only form for validation tests.
    #[cfg(test)]
    pub(crate) fn from_field_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut form = FormData::default();
        for (k, v) in pairs {
            form.fields.insert((*k).to_string(), (*v).to_string());
        }
        form
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Take the single staged upload for a slot, if any.
    pub fn take_upload(&mut self, slot: &str) -> Option<StagedUpload> {
        self.uploads.remove(slot).and_then(|mut v| {
            let first = if v.is_empty() { None } else { Some(v.remove(0)) };
            // Extra files in a single-file slot are discarded lazily by
            // discard_uploads(); put the remainder back
            if !v.is_empty() {
                self.uploads.insert(slot.to_string(), v);
            }
            first
        })
    }

    /// Take every staged upload for a multi-file slot (e.g. a gallery).
    pub fn take_uploads(&mut self, slot: &str) -> Vec<StagedUpload> {
        self.uploads.remove(slot).unwrap_or_default()
    }

    /// Compensating delete for every upload this request staged and no row
    /// ended up referencing.
    pub async fn discard_uploads(self) {
        for (_, staged) in self.uploads {
            for upload in staged {
                upload.discard().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_upload_discard_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::new(tmp.path());

        let staged = store
            .stage(UploadKind::Product, "photo.png", b"not really a png")
            .await
            .unwrap();
        let path = store.dir(UploadKind::Product).join(&staged.filename);
        assert!(path.exists());

        staged.discard().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn kept_upload_survives() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::new(tmp.path());

        let staged = store
            .stage(UploadKind::Brand, "logo.jpg", b"bytes")
            .await
            .unwrap();
        let filename = staged.keep();
        assert!(store.dir(UploadKind::Brand).join(&filename).exists());
    }

    #[tokio::test]
    async fn remove_quietly_tolerates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::new(tmp.path());
        // Must not panic or error
        store.remove_quietly(UploadKind::Product, "no-such-file.png").await;
        store.remove_quietly(UploadKind::Product, "").await;
    }

    #[test]
    fn unique_filenames_keep_extension_and_differ() {
        let a = unique_filename("cover.PNG");
        let b = unique_filename("cover.PNG");
        assert!(a.ends_with(".png"));
        assert!(b.ends_with(".png"));
        assert_ne!(a, b);

        let bare = unique_filename("README");
        assert!(!bare.contains('.'));

        // Hostile extensions are stripped down to alphanumerics
        let odd = unique_filename("x.p/../ng");
        assert!(!odd.contains('/'));
        assert!(!odd.contains(".."));
    }
}
