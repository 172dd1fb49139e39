pub mod config;
pub mod error;
pub mod media;
pub mod prompt;
pub mod service;
pub mod upload;
pub mod workflow;

pub use config::{load_auditor_config, ApiKey, AuditorConfig, API_KEY_ENV};
pub use error::{AuditError, AuditErrorKind, AuditResult, ConfigError, Result};
pub use media::{AuditReport, MediaHandle, MediaState, VideoContainer, VideoUpload};
pub use prompt::{load_prompt, AUDIT_PROMPT};
pub use service::{GeminiClient, MediaService};
pub use upload::{StagedVideo, UploadManager};
pub use workflow::{AuditWorkflow, RunState, RunStatus, Sleeper, StatusSink, TokioSleeper};
