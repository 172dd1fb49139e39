use std::path::{Path, PathBuf};

use clap::Args;
use trafficmind_core::{AuditorConfig, RunStatus, StatusSink, VideoContainer, VideoUpload};

use crate::{AppError, Result};

/// Uploads a dashcam video and prints the safety audit report.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Dashcam video to audit (mp4, mov or avi by default)
    #[arg(value_name = "VIDEO")]
    pub video: PathBuf,
    /// Overrides upload.temp_path
    #[arg(long, value_name = "PATH")]
    pub temp_path: Option<PathBuf>,
    /// Overrides polling.interval_seconds
    #[arg(long, value_name = "SECONDS")]
    pub poll_interval: Option<u64>,
    /// Overrides analysis.model
    #[arg(long)]
    pub model: Option<String>,
    /// Suppresses progress messages on stderr
    #[arg(long, short)]
    pub quiet: bool,
}

impl AnalyzeArgs {
    pub fn apply(&self, config: &mut AuditorConfig) {
        if let Some(path) = &self.temp_path {
            config.upload.temp_path = path.clone();
        }
        if let Some(seconds) = self.poll_interval {
            config.polling.interval_seconds = seconds;
        }
        if let Some(model) = &self.model {
            config.analysis.model = model.clone();
        }
    }
}

/// Reads the footage, enforcing the allow-list and rejecting empty files.
pub async fn load_upload(path: &Path, config: &AuditorConfig) -> Result<VideoUpload> {
    let container = VideoContainer::from_path(path)
        .filter(|container| config.accepts(*container))
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "{} is not an accepted video type (accepted: {})",
                path.display(),
                config.upload.accepted_extensions.join(", ")
            ))
        })?;
    let bytes = tokio::fs::read(path).await.map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{} is empty",
            path.display()
        )));
    }
    let display_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("upload.{container}"));
    Ok(VideoUpload::new(bytes, container, display_name))
}

/// Writes progress to stderr so stdout only carries the report.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleStatus {
    pub quiet: bool,
}

impl StatusSink for ConsoleStatus {
    fn status(&self, status: &RunStatus) {
        if self.quiet {
            return;
        }
        match status {
            RunStatus::Processing { polls } => eprintln!("{} (poll {polls})", status.message()),
            _ => eprintln!("{}", status.message()),
        }
    }
}
