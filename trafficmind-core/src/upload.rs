use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{AuditError, AuditResult};
use crate::media::{MediaHandle, VideoUpload};
use crate::service::MediaService;

/// Writes footage to the local temp path and hands it to the remote service.
#[derive(Clone)]
pub struct UploadManager {
    service: Arc<dyn MediaService>,
    temp_path: PathBuf,
}

impl UploadManager {
    pub fn new(service: Arc<dyn MediaService>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            service,
            temp_path: temp_path.into(),
        }
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Empty payloads are written as-is; rejecting them is up to the caller.
    pub async fn stage(&self, upload: &VideoUpload) -> AuditResult<StagedVideo> {
        let staged = StagedVideo::new(self.temp_path.clone());
        write_video(staged.path(), &upload.bytes).await?;
        debug!(target: "upload", path = %staged.path().display(), bytes = upload.len(), "video staged");
        Ok(staged)
    }

    pub async fn submit(
        &self,
        staged: &StagedVideo,
        upload: &VideoUpload,
    ) -> AuditResult<MediaHandle> {
        let handle = self
            .service
            .upload(
                staged.path(),
                upload.container.mime_type(),
                &upload.display_name,
            )
            .await?;
        info!(
            target: "upload",
            name = %handle.name,
            state = %handle.state,
            "video submitted"
        );
        Ok(handle)
    }
}

async fn write_video(path: &Path, bytes: &[u8]) -> AuditResult<()> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|source| AuditError::io(path, source))?;
    file.write_all(bytes)
        .await
        .map_err(|source| AuditError::io(path, source))?;
    file.flush()
        .await
        .map_err(|source| AuditError::io(path, source))
}

/// The temp file for one run. Removed by `cleanup`, or on drop as a fallback.
#[derive(Debug)]
pub struct StagedVideo {
    path: PathBuf,
    removed: bool,
}

impl StagedVideo {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotent: an already absent file is not an error.
    pub async fn cleanup(&mut self) -> AuditResult<()> {
        if self.removed {
            return Ok(());
        }
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(AuditError::io(&self.path, source)),
        }
        self.removed = true;
        debug!(target: "upload", path = %self.path.display(), "temp video removed");
        Ok(())
    }
}

impl Drop for StagedVideo {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(target: "upload", path = %self.path.display(), error = %err, "failed to remove temp video");
            }
        }
    }
}
