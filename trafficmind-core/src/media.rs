use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoContainer {
    Mp4,
    Mov,
    Avi,
}

impl VideoContainer {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp4" => Some(VideoContainer::Mp4),
            "mov" => Some(VideoContainer::Mov),
            "avi" => Some(VideoContainer::Avi),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(self) -> &'static str {
        match self {
            VideoContainer::Mp4 => "mp4",
            VideoContainer::Mov => "mov",
            VideoContainer::Avi => "avi",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            VideoContainer::Mp4 => "video/mp4",
            VideoContainer::Mov => "video/quicktime",
            VideoContainer::Avi => "video/x-msvideo",
        }
    }
}

impl fmt::Display for VideoContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Raw dashcam footage as handed over by the display surface.
#[derive(Clone)]
pub struct VideoUpload {
    pub bytes: Vec<u8>,
    pub container: VideoContainer,
    pub display_name: String,
}

impl VideoUpload {
    pub fn new(
        bytes: Vec<u8>,
        container: VideoContainer,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            container,
            display_name: display_name.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for VideoUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoUpload")
            .field("bytes", &self.bytes.len())
            .field("container", &self.container)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Processing state reported by the remote media service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaState {
    Processing,
    Active,
    Failed,
    #[default]
    #[serde(rename = "STATE_UNSPECIFIED", other)]
    Unspecified,
}

impl fmt::Display for MediaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MediaState::Processing => "PROCESSING",
            MediaState::Active => "ACTIVE",
            MediaState::Failed => "FAILED",
            MediaState::Unspecified => "STATE_UNSPECIFIED",
        };
        f.write_str(label)
    }
}

/// Reference to uploaded media owned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaHandle {
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: MediaState,
}

impl MediaHandle {
    pub fn is_processing(&self) -> bool {
        self.state == MediaState::Processing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub text: String,
    pub model: String,
    pub media_name: String,
    pub generated_at: DateTime<Utc>,
}

impl AuditReport {
    pub fn new(
        text: impl Into<String>,
        model: impl Into<String>,
        media_name: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            media_name: media_name.into(),
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_lookup_is_case_insensitive() {
        assert_eq!(VideoContainer::from_extension("MOV"), Some(VideoContainer::Mov));
        assert_eq!(VideoContainer::from_extension(".avi"), Some(VideoContainer::Avi));
        assert_eq!(VideoContainer::from_extension("mkv"), None);
        assert_eq!(
            VideoContainer::from_path(Path::new("clips/dashcam.MP4")),
            Some(VideoContainer::Mp4)
        );
        assert_eq!(VideoContainer::from_path(Path::new("clips/dashcam")), None);
    }

    #[test]
    fn handle_parses_remote_file_resource() {
        let handle: MediaHandle = serde_json::from_value(serde_json::json!({
            "name": "files/abc-123",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc-123",
            "mimeType": "video/mp4",
            "sizeBytes": "1024",
            "state": "PROCESSING"
        }))
        .unwrap();
        assert_eq!(handle.name, "files/abc-123");
        assert_eq!(handle.mime_type, "video/mp4");
        assert!(handle.is_processing());
    }

    #[test]
    fn unknown_or_missing_state_is_unspecified() {
        let handle: MediaHandle =
            serde_json::from_value(serde_json::json!({"name": "files/x", "state": "ARCHIVED"}))
                .unwrap();
        assert_eq!(handle.state, MediaState::Unspecified);
        let handle: MediaHandle =
            serde_json::from_value(serde_json::json!({"name": "files/y"})).unwrap();
        assert_eq!(handle.state, MediaState::Unspecified);
    }
}
