//! Request-scoped staging of uploaded files.
//!
//! Each request gets its own `TempDir` under the configured staging root.
//! Dropping the `StagingArea` removes the directory and everything in it,
//! so staged uploads are gone on every exit path, including early returns
//! and panics.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ImageKind, UploadedImage};

pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    pub fn create(root: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            AppError::internal(format!(
                "Failed to create staging root {}: {}",
                root.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix("request-")
            .tempdir_in(root)
            .map_err(|e| AppError::internal(format!("Failed to create staging directory: {}", e)))?;

        debug!(path = %dir.path().display(), "Created staging directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes one upload under a fresh uuid-based name.
    pub async fn stage(
        &self,
        data: Bytes,
        original_name: &str,
        mime_type: &str,
        kind: ImageKind,
    ) -> AppResult<UploadedImage> {
        let path = self.unique_path(kind);
        tokio::fs::write(&path, &data).await?;

        debug!(
            file_name = %original_name,
            staged_as = %path.display(),
            size = data.len(),
            "Staged upload"
        );

        Ok(UploadedImage {
            path,
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
            kind,
            size: data.len(),
        })
    }

    fn unique_path(&self, kind: ImageKind) -> PathBuf {
        self.dir
            .path()
            .join(format!("{}.{}", Uuid::new_v4(), kind.extension()))
    }

    /// Removes the directory now. Failure is logged; the response is already decided.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove staging directory");
        } else {
            debug!(path = %path.display(), "Removed staging directory");
        }
    }
}
