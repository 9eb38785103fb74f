use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434";
const DEFAULT_CONFIG_PATH: &str = "config/ciao.toml";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"
Sei CIAO-AI, l'assistente di storia e lingua italiana. Rispondi con cortesia, in modo chiaro e accurato, e cita epoche, luoghi e fonti quando aiutano la comprensione.

{{custom_instruction}}

Se una domanda esce dal tuo ambito, dillo apertamente e suggerisci dove il visitatore può approfondire.
"#;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: String,
    pub endpoint: String,
    pub system_prompt: Option<String>,
    pub prompt_template: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    model: Option<String>,
    endpoint: Option<String>,
    system_prompt: Option<String>,
    prompt_template: Option<String>,
    request_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Loads configuration from `path`, or from the default location when
    /// none is given. A missing default file falls back to built-in defaults;
    /// a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }

    /// Fills the prompt template with the configured (or overridden) custom
    /// instruction and normalises the result.
    pub fn compose_system_prompt(&self, override_prompt: Option<&str>) -> String {
        let template = self
            .prompt_template
            .clone()
            .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string());
        let custom = override_prompt
            .or(self.system_prompt.as_deref())
            .unwrap_or_default();

        let prompt = template.replace("{{custom_instruction}}", custom.trim());

        // Collapse runs of blank lines left by an empty instruction.
        let mut cleaned = Vec::new();
        let mut previous_blank = false;
        for line in prompt.lines().map(str::trim_end) {
            let is_blank = line.trim().is_empty();
            if is_blank {
                if !previous_blank {
                    cleaned.push("");
                }
                previous_blank = true;
            } else {
                cleaned.push(line.trim());
                previous_blank = false;
            }
        }
        cleaned.join("\n").trim().to_string()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            system_prompt: None,
            prompt_template: Some(DEFAULT_PROMPT_TEMPLATE.to_string()),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(AppConfig {
        model: parsed.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        endpoint: parsed
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        system_prompt: parsed.system_prompt,
        prompt_template: Some(
            parsed
                .prompt_template
                .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
        ),
        request_timeout: Duration::from_secs(
            parsed
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        ),
    })
}
