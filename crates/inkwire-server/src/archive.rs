// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Filesystem-backed archive store for signed documents.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use inkwire_core::error::{Error, Result};
use inkwire_core::persistence::ArchiveStore;

/// Stores signed documents under `<data_dir>/archives/<uuid>.<ext>`.
///
/// The returned reference is the relative path under `data_dir`, stable
/// across restarts and usable directly by a static-file layer.
pub struct FsArchiveStore {
    root: PathBuf,
}

impl FsArchiveStore {
    /// Create a store rooted at `<data_dir>/archives`, creating it if needed.
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let root = data_dir.into().join("archives");
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|err| Error::Archive(format!("creating archive dir failed: {err}")))?;
        Ok(Self { root })
    }

    fn extension(content_type: &str) -> &'static str {
        match content_type.split(';').next().unwrap_or_default().trim() {
            "application/pdf" => "pdf",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
            "application/zip" => "zip",
            _ => "bin",
        }
    }
}

#[async_trait]
impl ArchiveStore for FsArchiveStore {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let file_name = format!("{}.{}", Uuid::new_v4(), Self::extension(content_type));
        let path = self.root.join(&file_name);

        // Write to a temp name first so a crash never leaves a partial
        // document under a final reference.
        let tmp = self.root.join(format!(".{file_name}.tmp"));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|err| Error::Archive(format!("writing archive file failed: {err}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|err| Error::Archive(format!("finalizing archive file failed: {err}")))?;

        info!(file_name, size = bytes.len(), "Signed document archived");
        Ok(format!("archives/{file_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_writes_file_and_returns_relative_ref() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArchiveStore::new(dir.path()).await.unwrap();

        let archive_ref = store
            .put(b"%PDF-1.7 signed", "application/pdf")
            .await
            .unwrap();
        assert!(archive_ref.starts_with("archives/"));
        assert!(archive_ref.ends_with(".pdf"));

        let on_disk = tokio::fs::read(dir.path().join(&archive_ref)).await.unwrap();
        assert_eq!(on_disk, b"%PDF-1.7 signed");
    }

    #[tokio::test]
    async fn test_unknown_content_type_gets_bin_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArchiveStore::new(dir.path()).await.unwrap();

        let archive_ref = store.put(b"bytes", "application/x-mystery").await.unwrap();
        assert!(archive_ref.ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_content_type_parameters_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArchiveStore::new(dir.path()).await.unwrap();

        let archive_ref = store
            .put(b"bytes", "application/pdf; charset=binary")
            .await
            .unwrap();
        assert!(archive_ref.ends_with(".pdf"));
    }
}
