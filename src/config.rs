use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use reqwest::Url;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_CLASSIFIER_URL: &str = "http://127.0.0.1:8001/predict";
pub const DEFAULT_GENERAL_PATH: &str = "/llm/general";
pub const DEFAULT_ENRICH_PATH: &str = "/llm/enrich";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Origin of the chat server hosting the LLM routes
    pub server_url: Option<String>,
    /// Absolute URL of the classification endpoint
    pub classifier_url: Option<String>,
    pub general_path: Option<String>,
    pub enrich_path: Option<String>,
    pub assistant_name: Option<String>,
    pub model_label: Option<String>,
    pub classifier_label: Option<String>,
}

/// Fully resolved endpoint URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub classifier: Url,
    pub general: Url,
    pub enrich: Url,
}

impl Endpoints {
    /// Port of the classification service, used in the "is it running?" hint
    pub fn classifier_port(&self) -> Option<u16> {
        self.classifier.port_or_known_default()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Values set in `other` win
    pub fn merge(self, other: Config) -> Self {
        Self {
            server_url: other.server_url.or(self.server_url),
            classifier_url: other.classifier_url.or(self.classifier_url),
            general_path: other.general_path.or(self.general_path),
            enrich_path: other.enrich_path.or(self.enrich_path),
            assistant_name: other.assistant_name.or(self.assistant_name),
            model_label: other.model_label.or(self.model_label),
            classifier_label: other.classifier_label.or(self.classifier_label),
        }
    }

    pub fn assistant_name(&self) -> &str {
        self.assistant_name.as_deref().unwrap_or("BirdBot")
    }

    pub fn model_label(&self) -> &str {
        self.model_label.as_deref().unwrap_or("Llama 3.2 (1B)")
    }

    pub fn classifier_label(&self) -> &str {
        self.classifier_label.as_deref().unwrap_or("ResNet-50")
    }

    pub fn endpoints(&self) -> Result<Endpoints> {
        let server = self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL);
        let server = Url::parse(server)
            .with_context(|| format!("invalid server url: {server}"))?;
        if server.cannot_be_a_base() {
            return Err(anyhow!("server url cannot be a base: {server}"));
        }

        let classifier = self.classifier_url.as_deref().unwrap_or(DEFAULT_CLASSIFIER_URL);
        let classifier = Url::parse(classifier)
            .with_context(|| format!("invalid classifier url: {classifier}"))?;

        let general = self.general_path.as_deref().unwrap_or(DEFAULT_GENERAL_PATH);
        let enrich = self.enrich_path.as_deref().unwrap_or(DEFAULT_ENRICH_PATH);

        Ok(Endpoints {
            classifier,
            general: server.join(general)?,
            enrich: server.join(enrich)?,
        })
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("birdbot").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_endpoints() {
        let endpoints = Config::new().endpoints().unwrap();
        assert_eq!(endpoints.classifier.as_str(), "http://127.0.0.1:8001/predict");
        assert_eq!(endpoints.general.as_str(), "http://127.0.0.1:8000/llm/general");
        assert_eq!(endpoints.enrich.as_str(), "http://127.0.0.1:8000/llm/enrich");
        assert_eq!(endpoints.classifier_port(), Some(8001));
    }

    #[test]
    fn test_relative_paths_replace_server_path() {
        let config = Config {
            server_url: Some("http://chat.local:9000/app/".to_string()),
            ..Config::new()
        };
        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.general.as_str(), "http://chat.local:9000/llm/general");
    }

    #[test]
    fn test_known_default_port() {
        let config = Config {
            classifier_url: Some("https://vision.example.com/predict".to_string()),
            ..Config::new()
        };
        assert_eq!(config.endpoints().unwrap().classifier_port(), Some(443));
    }

    #[test]
    fn test_invalid_url_is_an_error() {
        let config = Config {
            classifier_url: Some("not a url".to_string()),
            ..Config::new()
        };
        assert!(config.endpoints().is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.assistant_name(), "BirdBot");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            assistant_name: Some("Owl".to_string()),
            ..Config::new()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.assistant_name(), "Owl");
        assert_eq!(loaded.model_label(), "Llama 3.2 (1B)");
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = Config {
            server_url: Some("http://a:1".to_string()),
            model_label: Some("file model".to_string()),
            ..Config::new()
        };
        let cli = Config {
            server_url: Some("http://b:2".to_string()),
            ..Config::new()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.server_url.as_deref(), Some("http://b:2"));
        assert_eq!(merged.model_label.as_deref(), Some("file model"));
    }
}
