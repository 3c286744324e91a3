//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Jobgraph configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: String,
    pub fallback_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_model: "openai/gpt-4o-mini".to_string(),
            fallback_models: vec!["anthropic/claude-3-5-haiku-latest".to_string()],
            temperature: 0.3,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

/// Occupation taxonomy API settings. Credentials come from the environment only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://services.onetcenter.org/ws".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Database file; defaults to `<config dir>/jobgraph/graph.db`
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Age in days after which an occupation's taxonomy is refreshed
    pub staleness_days: u32,
    /// Ask the completion service for mappings when no taxonomy is in the graph
    pub llm_fallback: bool,
    /// Link description lines to activities and tasks
    pub line_mapping: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            staleness_days: 30,
            llm_fallback: true,
            line_mapping: true,
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("JOBGRAPH_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    format!("***{}", &key[key.len() - 4..])
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl TaxonomyConfig {
    /// Basic-auth credentials for the taxonomy API, if both are set
    pub fn resolved_credentials(&self) -> Option<(String, String)> {
        let username = env::var("ONET_USERNAME").ok()?;
        let password = env::var("ONET_PASSWORD").ok()?;
        Some((username, password))
    }
}

impl GraphConfig {
    pub fn resolved_path(&self) -> anyhow::Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::config_dir()?.join("graph.db")),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("JOBGRAPH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("jobgraph")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;
        if self.analysis.staleness_days == 0 {
            return Err(anyhow!("analysis.staleness_days must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // LLM settings
            "llm.base_url" => Ok(self.llm.base_url.clone().unwrap_or_default()),
            "llm.default_model" => Ok(self.llm.default_model.clone()),
            "llm.fallback_models" => Ok(self.llm.fallback_models.join(", ")),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            // Taxonomy API settings
            "taxonomy.base_url" => Ok(self.taxonomy.base_url.clone()),
            "taxonomy.timeout_secs" => Ok(self.taxonomy.timeout_secs.to_string()),
            "taxonomy.credentials" => Ok(match self.taxonomy.resolved_credentials() {
                Some((user, _)) => format!("{} / ***", user),
                None => "(not set - use ONET_USERNAME and ONET_PASSWORD env vars)".to_string(),
            }),

            // Graph settings
            "graph.database_path" => Ok(self.graph.resolved_path()?.display().to_string()),

            // Analysis settings
            "analysis.staleness_days" => Ok(self.analysis.staleness_days.to_string()),
            "analysis.llm_fallback" => Ok(self.analysis.llm_fallback.to_string()),
            "analysis.line_mapping" => Ok(self.analysis.line_mapping.to_string()),

            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(
                    "(not set - use JOBGRAPH_API_KEY or OPENROUTER_API_KEY env var)".to_string(),
                ),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `jobgraph config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.base_url" => {
                self.llm.base_url = Some(value.to_string()).filter(|v| !v.is_empty());
            }
            "llm.default_model" => {
                self.llm.default_model = value.to_string();
            }
            "llm.fallback_models" => {
                self.llm.fallback_models = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_tokens" => {
                self.llm.max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }
            "taxonomy.base_url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(anyhow!("Taxonomy base URL must start with http:// or https://"));
                }
                self.taxonomy.base_url = value.trim_end_matches('/').to_string();
            }
            "taxonomy.timeout_secs" => {
                self.taxonomy.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }
            "graph.database_path" => {
                self.graph.database_path = Some(PathBuf::from(value)).filter(|_| !value.is_empty());
            }
            "analysis.staleness_days" => {
                let days: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid staleness_days value: {}", value))?;
                if days == 0 {
                    return Err(anyhow!("Staleness threshold must be at least 1 day"));
                }
                self.analysis.staleness_days = days;
            }
            "analysis.llm_fallback" => {
                self.analysis.llm_fallback = parse_bool(value)?;
            }
            "analysis.line_mapping" => {
                self.analysis.line_mapping = parse_bool(value)?;
            }

            "llm.api_key" | "api_key" | "taxonomy.credentials" => {
                return Err(anyhow!(
                    "Secrets cannot be stored in configuration. Set JOBGRAPH_API_KEY, \
                     ONET_USERNAME and ONET_PASSWORD environment variables instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `jobgraph config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "llm.base_url",
            "llm.default_model",
            "llm.fallback_models",
            "llm.temperature",
            "llm.max_tokens",
            "llm.timeout_secs",
            "llm.api_key",
            "taxonomy.base_url",
            "taxonomy.timeout_secs",
            "taxonomy.credentials",
            "graph.database_path",
            "analysis.staleness_days",
            "analysis.llm_fallback",
            "analysis.line_mapping",
        ];

        keys.into_iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(anyhow!("Expected a boolean (true/false), got: {}", value)),
    }
}
