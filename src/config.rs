use crate::streaming::StreamFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin serving `/models`, `/chat` and `/export`
    pub base_url: String,

    /// How chat response bodies are interpreted
    pub stream_format: StreamFormat,

    /// Model list configuration
    pub models: ModelsConfig,

    /// Export configuration
    pub export: ExportConfig,

    /// UI preferences
    pub ui: UiConfig,

    /// Log output
    pub logging: LoggingConfig,

    /// Streamchat home directory
    #[serde(skip)]
    pub home: PathBuf,
}

/// Where the model list comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSource {
    /// Fetched from `GET /models` at startup
    #[default]
    Remote,
    /// Only `default_model` is offered
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub source: ModelSource,
    /// Preferred model; required when `source = "fixed"`
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    /// Defaults to `~/.streamchat/exports`
    pub directory: Option<PathBuf>,
}

/// UI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_timestamps: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Defaults to `~/.streamchat/streamchat.log`
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            stream_format: StreamFormat::default(),
            models: ModelsConfig::default(),
            export: ExportConfig::default(),
            ui: UiConfig::default(),
            logging: LoggingConfig::default(),
            home: default_home(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            source: ModelSource::Remote,
            default_model: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_timestamps: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".streamchat")
}

impl Config {
    /// Load `~/.streamchat/config.toml`, falling back to defaults
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let streamchat_home = home.join(".streamchat");
        let config_path = streamchat_home.join("config.toml");

        let mut config = Self::load_from(&config_path)?;
        config.home = streamchat_home;
        Ok(config)
    }

    /// Load from an explicit path; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Config::default()
        };

        if let Some(parent) = path.parent() {
            config.home = parent.to_path_buf();
        }
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `<home>/config.toml`
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home)
            .context("Failed to create .streamchat directory")?;
        let config_path = self.home.join("config.toml");
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            anyhow::bail!("base_url must not be empty");
        }
        if self.models.source == ModelSource::Fixed
            && self.models.default_model.as_deref().is_none_or(str::is_empty)
        {
            anyhow::bail!("models.default_model is required when models.source = \"fixed\"");
        }
        Ok(())
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export
            .directory
            .clone()
            .unwrap_or_else(|| self.home.join("exports"))
    }

    pub fn log_file(&self) -> PathBuf {
        self.logging
            .file
            .clone()
            .unwrap_or_else(|| self.home.join("streamchat.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.stream_format, StreamFormat::Raw);
        assert_eq!(config.models.source, ModelSource::Remote);
        assert!(config.export.enabled);
        assert_eq!(config.export_dir(), dir.path().join("exports"));
    }

    #[test]
    fn partial_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "base_url = \"http://gpu-box:9000\"\nstream_format = \"ndjson\"\n\n[export]\nenabled = false\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.base_url, "http://gpu-box:9000");
        assert_eq!(config.stream_format, StreamFormat::Ndjson);
        assert!(!config.export.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn fixed_source_requires_default_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[models]\nsource = \"fixed\"\n").unwrap();

        assert!(Config::load_from(&path).is_err());

        fs::write(&path, "[models]\nsource = \"fixed\"\ndefault_model = \"qwen2.5:32b\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.models.default_model.as_deref(), Some("qwen2.5:32b"));
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.home = dir.path().to_path_buf();
        config.base_url = "http://example:1234".to_string();

        config.save().unwrap();
        let loaded = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(loaded, config);
    }
}
