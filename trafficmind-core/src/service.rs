use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::{ApiKey, ApiSection};
use crate::error::{AuditError, AuditResult};
use crate::media::MediaHandle;

const USER_AGENT: &str = concat!("trafficmind/", env!("CARGO_PKG_VERSION"));
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Remote media upload, state and generation endpoints.
#[async_trait]
pub trait MediaService: Send + Sync {
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> AuditResult<MediaHandle>;

    async fn get(&self, name: &str) -> AuditResult<MediaHandle>;

    async fn generate(&self, handle: &MediaHandle, prompt: &str) -> AuditResult<String>;

    fn model(&self) -> &str;
}

pub struct GeminiClient {
    client: Client,
    base: Url,
    api_version: String,
    model: String,
    api_key: ApiKey,
}

impl GeminiClient {
    pub fn new(api: &ApiSection, model: impl Into<String>, api_key: ApiKey) -> AuditResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(api.request_timeout())
            .build()
            .map_err(|err| AuditError::Startup(format!("http client: {err}")))?;
        let mut base = api.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client,
            base: Url::parse(&base)?,
            api_version: api.api_version.trim_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> AuditResult<Url> {
        Ok(self.base.join(path)?)
    }

    fn upload_endpoint(&self) -> AuditResult<Url> {
        self.endpoint(&format!("upload/{}/files", self.api_version))
    }

    fn file_endpoint(&self, name: &str) -> AuditResult<Url> {
        self.endpoint(&format!("{}/{}", self.api_version, name.trim_start_matches('/')))
    }

    fn generate_endpoint(&self) -> AuditResult<Url> {
        self.endpoint(&format!(
            "{}/models/{}:generateContent",
            self.api_version, self.model
        ))
    }
}

#[async_trait]
impl MediaService for GeminiClient {
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> AuditResult<MediaHandle> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AuditError::io(path, source))?;

        let start = self
            .client
            .post(self.upload_endpoint()?)
            .header("x-goog-api-key", self.api_key.expose())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStartRequest {
                file: UploadMetadata { display_name },
            })
            .send()
            .await?;
        let start = ensure_success(start, "upload start").await?;
        let session = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AuditError::Transport("malformed response: upload session url missing".into())
            })?
            .to_string();
        debug!(target: "gemini", bytes = bytes.len(), mime_type, "upload session opened");

        let finish = self
            .client
            .post(session)
            .header("X-Goog-Upload-Offset", 0)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let finish = ensure_success(finish, "upload finalize").await?;
        let body = finish.text().await?;
        let envelope: FileEnvelope = serde_json::from_str(&body)?;
        Ok(envelope.file)
    }

    async fn get(&self, name: &str) -> AuditResult<MediaHandle> {
        let response = self
            .client
            .get(self.file_endpoint(name)?)
            .header("x-goog-api-key", self.api_key.expose())
            .send()
            .await?;
        let response = ensure_success(response, "file state").await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn generate(&self, handle: &MediaHandle, prompt: &str) -> AuditResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::FileData {
                        file_data: FileData {
                            mime_type: &handle.mime_type,
                            file_uri: &handle.uri,
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
        };
        let response = self
            .client
            .post(self.generate_endpoint()?)
            .header("x-goog-api-key", self.api_key.expose())
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, "generate content").await?;
        let body = response.text().await?;
        extract_text(serde_json::from_str(&body)?)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

async fn ensure_success(response: Response, context: &str) -> AuditResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AuditError::Transport(format!(
        "{context} returned {status}: {}",
        body.trim()
    )))
}

#[derive(Debug, Serialize)]
struct UploadStartRequest<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: MediaHandle,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    FileData { file_data: FileData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Joins the text parts of the first candidate. Anything without text is
/// reported as a malformed response rather than an empty report.
fn extract_text(response: GenerateContentResponse) -> AuditResult<String> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(AuditError::Transport(format!(
            "generation blocked: {reason}"
        )));
    }
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        AuditError::Transport("malformed response: no candidates returned".into())
    })?;
    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(AuditError::Transport(format!(
            "malformed response: candidate carried no text (finish reason {reason})"
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditErrorKind;

    fn client(base_url: &str) -> GeminiClient {
        let api = ApiSection {
            base_url: base_url.into(),
            ..ApiSection::default()
        };
        GeminiClient::new(
            &api,
            "gemini-2.5-flash",
            ApiKey::resolve(Some("test-key")).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn endpoints_follow_api_layout() {
        let client = client("https://generativelanguage.googleapis.com");
        assert_eq!(
            client.upload_endpoint().unwrap().as_str(),
            "https://generativelanguage.googleapis.com/upload/v1beta/files"
        );
        assert_eq!(
            client.file_endpoint("files/abc").unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/files/abc"
        );
        assert_eq!(
            client.generate_endpoint().unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn endpoints_respect_base_path_prefix() {
        let client = client("http://localhost:8080/proxy");
        assert_eq!(
            client.file_endpoint("files/abc").unwrap().as_str(),
            "http://localhost:8080/proxy/v1beta/files/abc"
        );
    }

    #[test]
    fn invalid_base_url_is_a_startup_error() {
        let api = ApiSection {
            base_url: "not a url".into(),
            ..ApiSection::default()
        };
        let err = GeminiClient::new(&api, "m", ApiKey::resolve(Some("k")).unwrap())
            .err()
            .unwrap();
        assert_eq!(err.kind(), AuditErrorKind::Startup);
    }

    #[test]
    fn generation_request_serializes_file_then_prompt() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::FileData {
                        file_data: FileData {
                            mime_type: "video/mp4",
                            file_uri: "https://example.test/files/abc",
                        },
                    },
                    Part::Text { text: "audit" },
                ],
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["file_data"]["file_uri"], "https://example.test/files/abc");
        assert_eq!(parts[1]["text"], "audit");
    }

    #[test]
    fn extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "## Incident Log\n"}, {"text": "Safety Score: 9"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(
            extract_text(response).unwrap(),
            "## Incident Log\nSafety Score: 9"
        );
    }

    #[test]
    fn extract_text_rejects_empty_and_blocked_responses() {
        let empty = extract_text(GenerateContentResponse::default()).unwrap_err();
        assert_eq!(empty.kind(), AuditErrorKind::Transport);

        let no_text: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        assert!(extract_text(no_text)
            .unwrap_err()
            .to_string()
            .contains("SAFETY"));

        let blocked: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "OTHER"}
        }))
        .unwrap();
        assert!(extract_text(blocked)
            .unwrap_err()
            .to_string()
            .contains("blocked"));
    }
}
