use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuditorConfig;
use crate::error::{AuditError, AuditResult};
use crate::media::{AuditReport, MediaHandle, MediaState, VideoUpload};
use crate::service::MediaService;
use crate::upload::{StagedVideo, UploadManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Processing,
    Ready,
    Failed,
    Done,
    Error,
}

impl RunState {
    /// Anything the remote reports that is neither PROCESSING nor FAILED is ready.
    pub fn from_media(state: MediaState) -> Self {
        match state {
            MediaState::Processing => RunState::Processing,
            MediaState::Failed => RunState::Failed,
            MediaState::Active | MediaState::Unspecified => RunState::Ready,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Failed | RunState::Done | RunState::Error)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Processing => "processing",
            RunState::Ready => "ready",
            RunState::Failed => "failed",
            RunState::Done => "done",
            RunState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Progress updates for the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Caching,
    Uploading,
    Processing { polls: u32 },
    Analyzing,
    Complete,
}

impl RunStatus {
    pub fn message(&self) -> &'static str {
        match self {
            RunStatus::Caching => "Caching video locally...",
            RunStatus::Uploading => "Uploading to the inference service...",
            RunStatus::Processing { .. } => {
                "Neural network is processing the video frames... (please wait)"
            }
            RunStatus::Analyzing => "Analyzing traffic patterns and violations...",
            RunStatus::Complete => "Audit complete!",
        }
    }
}

pub trait StatusSink: Send + Sync {
    fn status(&self, status: &RunStatus);
}

impl<F> StatusSink for F
where
    F: Fn(&RunStatus) + Send + Sync,
{
    fn status(&self, status: &RunStatus) {
        self(status)
    }
}

/// The wait between state queries.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct AuditWorkflow {
    uploads: UploadManager,
    service: Arc<dyn MediaService>,
    sleeper: Arc<dyn Sleeper>,
    poll_interval: Duration,
    prompt: String,
}

impl AuditWorkflow {
    pub fn new(
        service: Arc<dyn MediaService>,
        uploads: UploadManager,
        poll_interval: Duration,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            uploads,
            service,
            sleeper: Arc::new(TokioSleeper),
            poll_interval,
            prompt: prompt.into(),
        }
    }

    pub fn from_config(
        service: Arc<dyn MediaService>,
        config: &AuditorConfig,
        prompt: impl Into<String>,
    ) -> Self {
        let uploads = UploadManager::new(Arc::clone(&service), config.upload.temp_path.clone());
        Self::new(service, uploads, config.polling.interval(), prompt)
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// One upload, poll and generate cycle. The temp file is gone when this
    /// returns, whatever the outcome.
    pub async fn run(
        &self,
        upload: VideoUpload,
        sink: &dyn StatusSink,
    ) -> AuditResult<AuditReport> {
        let run_id = Uuid::new_v4();
        info!(
            target: "workflow",
            %run_id,
            bytes = upload.len(),
            container = %upload.container,
            "analysis run started"
        );

        sink.status(&RunStatus::Caching);
        let mut staged = self.uploads.stage(&upload).await.map_err(|err| {
            warn!(target: "workflow", %run_id, error = %err, "staging failed");
            err
        })?;

        let outcome = self.drive(run_id, &staged, &upload, sink).await;
        let cleanup = staged.cleanup().await;

        match (outcome, cleanup) {
            (Ok(report), Ok(())) => {
                info!(target: "workflow", %run_id, state = %RunState::Done, media = %report.media_name, "analysis run finished");
                Ok(report)
            }
            (Ok(_), Err(err)) => {
                warn!(target: "workflow", %run_id, error = %err, "temp video cleanup failed");
                Err(err)
            }
            (Err(err), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!(target: "workflow", %run_id, error = %cleanup_err, "temp video cleanup failed");
                }
                warn!(target: "workflow", %run_id, state = %RunState::Error, kind = ?err.kind(), error = %err, "analysis run aborted");
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        run_id: Uuid,
        staged: &StagedVideo,
        upload: &VideoUpload,
        sink: &dyn StatusSink,
    ) -> AuditResult<AuditReport> {
        sink.status(&RunStatus::Uploading);
        let handle = self.uploads.submit(staged, upload).await?;
        let handle = self.await_ready(run_id, handle, sink).await?;

        sink.status(&RunStatus::Analyzing);
        debug!(target: "workflow", %run_id, media = %handle.name, model = self.service.model(), "requesting audit");
        let text = self.service.generate(&handle, &self.prompt).await?;

        sink.status(&RunStatus::Complete);
        Ok(AuditReport::new(text, self.service.model(), handle.name))
    }

    /// Queries the handle until it leaves PROCESSING. The state is always
    /// queried at least once before generation, and the wait only happens
    /// after a query that still reports PROCESSING.
    async fn await_ready(
        &self,
        run_id: Uuid,
        handle: MediaHandle,
        sink: &dyn StatusSink,
    ) -> AuditResult<MediaHandle> {
        if RunState::from_media(handle.state) == RunState::Failed {
            return Err(AuditError::RemoteFailure { name: handle.name });
        }

        let name = handle.name;
        let mut polls = 0u32;
        loop {
            let current = self.service.get(&name).await?;
            polls = polls.saturating_add(1);
            let state = RunState::from_media(current.state);
            debug!(target: "workflow", %run_id, media = %name, polls, remote = %current.state, %state, "polled media state");
            match state {
                RunState::Processing => {
                    sink.status(&RunStatus::Processing { polls });
                    self.sleeper.sleep(self.poll_interval).await;
                }
                RunState::Failed => {
                    return Err(AuditError::RemoteFailure { name: current.name });
                }
                _ => return Ok(current),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_states_map_onto_run_states() {
        assert_eq!(RunState::from_media(MediaState::Processing), RunState::Processing);
        assert_eq!(RunState::from_media(MediaState::Active), RunState::Ready);
        assert_eq!(RunState::from_media(MediaState::Unspecified), RunState::Ready);
        assert_eq!(RunState::from_media(MediaState::Failed), RunState::Failed);
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Ready.is_terminal());
    }

    #[test]
    fn closures_act_as_status_sinks() {
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |status: &RunStatus| seen.lock().unwrap().push(*status);
        sink.status(&RunStatus::Caching);
        sink.status(&RunStatus::Processing { polls: 2 });
        assert_eq!(
            *seen.lock().unwrap(),
            vec![RunStatus::Caching, RunStatus::Processing { polls: 2 }]
        );
        assert!(RunStatus::Processing { polls: 2 }.message().contains("processing"));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_advances_paused_clock() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(3)).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
