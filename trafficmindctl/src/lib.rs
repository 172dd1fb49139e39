pub mod commands;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use trafficmind_core::{
    load_auditor_config, load_prompt, ApiKey, AuditError, AuditErrorKind, AuditReport,
    AuditWorkflow, AuditorConfig, GeminiClient, API_KEY_ENV,
};

use crate::commands::{load_upload, AnalyzeArgs, ConsoleStatus};

pub const DEFAULT_CONFIG_PATH: &str = "configs/trafficmind.toml";

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] trafficmind_core::ConfigError),
    #[error("{0}")]
    Audit(#[from] AuditError),
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{failed} health check(s) failed: {names}")]
    CheckFailed { failed: usize, names: String },
}

impl AppError {
    /// Startup problems are reported as such regardless of where they came from.
    pub fn is_startup(&self) -> bool {
        match self {
            AppError::Config(_) => true,
            AppError::Audit(err) => err.kind() == AuditErrorKind::Startup,
            _ => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "TrafficMind dashcam safety auditor", long_about = None)]
pub struct Cli {
    /// Path to trafficmind.toml (built-in defaults when omitted and absent)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// API key for the inference service
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audits a dashcam video
    Analyze(AnalyzeArgs),
    /// Verifies configuration and credential without contacting the service
    Check,
    /// Prints a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Analyze(args) => {
            let api_key = ApiKey::resolve(cli.api_key.as_deref())?;
            let mut context = AppContext::new(&cli)?;
            args.apply(&mut context.config);
            let report = context.analyze(args, api_key).await?;
            render(&report, cli.format)?;
        }
        Commands::Check => {
            let context = AppContext::new(&cli)?;
            let report = context.health_check(cli.api_key.as_deref());
            render(&report, cli.format)?;
            let failed = report
                .iter()
                .filter(|entry| matches!(entry.status, CheckStatus::Error))
                .map(|entry| entry.name.as_str())
                .collect::<Vec<_>>();
            if !failed.is_empty() {
                return Err(AppError::CheckFailed {
                    failed: failed.len(),
                    names: failed.join(", "),
                });
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(*shell, &mut command, name, &mut io::stdout());
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: AuditorConfig,
    config_source: ConfigSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let (config, config_source) = match &cli.config {
            Some(path) => (load_auditor_config(path)?, ConfigSource::File(path.clone())),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    (
                        load_auditor_config(&default_path)?,
                        ConfigSource::File(default_path),
                    )
                } else {
                    (AuditorConfig::default(), ConfigSource::Defaults)
                }
            }
        };
        Ok(Self {
            config,
            config_source,
        })
    }

    async fn analyze(&self, args: &AnalyzeArgs, api_key: ApiKey) -> Result<AuditReport> {
        let upload = load_upload(&args.video, &self.config).await?;
        let prompt = load_prompt(&self.config.analysis).await?;
        let client = GeminiClient::new(&self.config.api, &self.config.analysis.model, api_key)?;
        let workflow = AuditWorkflow::from_config(Arc::new(client), &self.config, prompt);
        info!(
            video = %args.video.display(),
            config = %self.config_source,
            interval = ?workflow.poll_interval(),
            "starting analysis"
        );
        let sink = ConsoleStatus { quiet: args.quiet };
        Ok(workflow.run(upload, &sink).await?)
    }

    fn health_check(&self, api_key: Option<&str>) -> Vec<HealthEntry> {
        let mut results = Vec::new();
        results.push(HealthEntry::ok("config", self.config_source.to_string()));
        results.push(match ApiKey::resolve(api_key) {
            Ok(_) => HealthEntry::ok("api_key", "present"),
            Err(_) => HealthEntry::error("api_key", format!("missing ({API_KEY_ENV})")),
        });
        results.push(self.check_temp_path(&self.config.upload.temp_path));
        results.push(self.check_allow_list());
        results.push(self.check_prompt());
        results.push(HealthEntry::ok("model", self.config.analysis.model.clone()));
        results.push(HealthEntry::ok(
            "poll_interval",
            format!("{}s", self.config.polling.interval().as_secs()),
        ));
        results
    }

    fn check_temp_path(&self, path: &Path) -> HealthEntry {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        match fs::metadata(&parent) {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {
                if path.exists() {
                    HealthEntry::warn(
                        "temp_path",
                        format!("{} exists and will be overwritten", path.display()),
                    )
                } else {
                    HealthEntry::ok("temp_path", format!("{}", path.display()))
                }
            }
            Ok(meta) if meta.is_dir() => HealthEntry::error(
                "temp_path",
                format!("{} is read-only", parent.display()),
            ),
            Ok(_) => HealthEntry::error(
                "temp_path",
                format!("{} is not a directory", parent.display()),
            ),
            Err(_) => HealthEntry::error(
                "temp_path",
                format!("{} not found", parent.display()),
            ),
        }
    }

    fn check_allow_list(&self) -> HealthEntry {
        let accepted = self.config.accepted_containers();
        if accepted.is_empty() {
            return HealthEntry::error("accepted_types", "no supported video type configured");
        }
        let labels = accepted
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if accepted.len() < self.config.upload.accepted_extensions.len() {
            HealthEntry::warn("accepted_types", format!("{labels} (unsupported entries ignored)"))
        } else {
            HealthEntry::ok("accepted_types", labels)
        }
    }

    fn check_prompt(&self) -> HealthEntry {
        match &self.config.analysis.prompt_path {
            None => HealthEntry::ok("prompt", "built-in audit prompt"),
            Some(path) if path.is_file() => HealthEntry::ok("prompt", format!("{}", path.display())),
            Some(path) => HealthEntry::error("prompt", format!("{} missing", path.display())),
        }
    }
}

impl DisplayFallback for AuditReport {
    fn display(&self) -> String {
        self.text.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        let mut lines = Vec::new();
        for entry in self {
            lines.push(format!(
                "[{status}] {name}: {detail}",
                status = entry.status,
                name = entry.name,
                detail = entry.detail
            ));
        }
        lines.join("\n")
    }
}
