use crate::config::AnalysisSection;
use crate::error::{AuditError, AuditResult};

pub const AUDIT_PROMPT: &str = r#"You are an expert traffic safety auditor and insurance claim adjuster.
Review this dashcam footage second by second.

Produce a safety audit report that identifies every traffic violation, road
hazard and instance of aggressive driving.

Output format (Markdown):

## Incident Log
One entry per event found:

### [MM:SS] - [Short event name]
* **Description:** What happened, and who was at fault?
* **Severity:** Low / Medium / High / Critical
* **Regulation:** The general traffic rule involved (e.g. "Failure to yield", "Red light").

## Summary
* **Driver Safety Score:** [1-10] (10 is perfect)
* **Final Verdict:** One sentence describing the driver's behaviour.
"#;

/// Returns the configured override prompt, or the built-in one.
pub async fn load_prompt(analysis: &AnalysisSection) -> AuditResult<String> {
    match &analysis.prompt_path {
        Some(path) => {
            let prompt = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| AuditError::io(path, source))?;
            if prompt.trim().is_empty() {
                return Err(AuditError::Startup(format!(
                    "prompt file {} is empty",
                    path.display()
                )));
            }
            Ok(prompt)
        }
        None => Ok(AUDIT_PROMPT.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditErrorKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn default_prompt_requests_log_and_score() {
        let prompt = load_prompt(&AnalysisSection::default()).await.unwrap();
        assert!(prompt.contains("## Incident Log"));
        assert!(prompt.contains("Driver Safety Score"));
    }

    #[tokio::test]
    async fn override_prompt_is_read_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "List near-misses only.").unwrap();
        let analysis = AnalysisSection {
            prompt_path: Some(path),
            ..AnalysisSection::default()
        };
        assert_eq!(load_prompt(&analysis).await.unwrap(), "List near-misses only.");
    }

    #[tokio::test]
    async fn missing_or_blank_override_fails() {
        let dir = tempdir().unwrap();
        let missing = AnalysisSection {
            prompt_path: Some(dir.path().join("absent.md")),
            ..AnalysisSection::default()
        };
        assert_eq!(
            load_prompt(&missing).await.unwrap_err().kind(),
            AuditErrorKind::Io
        );

        let blank_path = dir.path().join("blank.md");
        std::fs::write(&blank_path, "  \n").unwrap();
        let blank = AnalysisSection {
            prompt_path: Some(blank_path),
            ..AnalysisSection::default()
        };
        assert_eq!(
            load_prompt(&blank).await.unwrap_err().kind(),
            AuditErrorKind::Startup
        );
    }
}
