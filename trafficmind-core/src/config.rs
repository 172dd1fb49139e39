use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{AuditError, AuditResult, ConfigError, Result};
use crate::media::VideoContainer;

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditorConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub upload: UploadSection,
    #[serde(default)]
    pub analysis: AnalysisSection,
}

impl AuditorConfig {
    /// Containers from `upload.accepted_extensions` that map to a known type.
    pub fn accepted_containers(&self) -> Vec<VideoContainer> {
        self.upload
            .accepted_extensions
            .iter()
            .filter_map(|ext| VideoContainer::from_extension(ext))
            .collect()
    }

    pub fn accepts(&self, container: VideoContainer) -> bool {
        self.accepted_containers().contains(&container)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub api_version: String,
    pub request_timeout_seconds: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_version: "v1beta".into(),
            request_timeout_seconds: 300,
        }
    }
}

impl ApiSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingSection {
    pub interval_seconds: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_seconds: 3,
        }
    }
}

impl PollingSection {
    /// Never zero, so state queries are always spaced out.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub temp_path: PathBuf,
    pub accepted_extensions: Vec<String>,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            temp_path: PathBuf::from("temp_video.mp4"),
            accepted_extensions: vec!["mp4".into(), "mov".into(), "avi".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    pub model: String,
    pub prompt_path: Option<PathBuf>,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            prompt_path: None,
        }
    }
}

/// The single API credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Blank keys are treated as absent.
    pub fn resolve(candidate: Option<&str>) -> AuditResult<Self> {
        match candidate.map(str::trim) {
            Some(value) if !value.is_empty() => Ok(Self(value.to_string())),
            _ => Err(AuditError::Startup(format!(
                "API key missing: pass --api-key or set {API_KEY_ENV}"
            ))),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

pub fn load_auditor_config<P: AsRef<Path>>(path: P) -> Result<AuditorConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
