use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::generation::DEFAULT_MODEL;

pub const CONFIG_FILE: &str = "config.yaml";

/// Checked in order when the config leaves `provider.api_key` empty.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_search_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_search_limit() -> u32 {
    5
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("daytrip/{}", env!("CARGO_PKG_VERSION"))
}

fn default_accept_language() -> String {
    "en".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            limit: default_search_limit(),
            debounce_ms: default_debounce_ms(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Relative paths are resolved against the config root.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaytripConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl DaytripConfig {
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        if self.storage.data_dir.is_absolute() {
            self.storage.data_dir.clone()
        } else {
            root.join(&self.storage.data_dir)
        }
    }

    /// Only generation commands need a key; everything else works without.
    pub fn require_api_key(&self) -> Result<&str> {
        self.provider
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "no API key configured; set provider.api_key in {CONFIG_FILE} or export {}",
                    API_KEY_ENV_VARS.join(" or ")
                )
            })
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Reads `<root>/config.yaml`; a missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<DaytripConfig> {
    let path = root.join(CONFIG_FILE);
    let mut config: DaytripConfig = if path.exists() {
        read_yaml_file(&path)?
    } else {
        DaytripConfig::default()
    };
    resolve_config_env(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

pub fn validate_config(config: &DaytripConfig) -> Result<()> {
    if config.provider.model.trim().is_empty() {
        return Err(anyhow!("provider.model must not be empty"));
    }
    if config.search.base_url.trim().is_empty() {
        return Err(anyhow!("search.base_url must not be empty"));
    }
    if config.search.limit == 0 {
        return Err(anyhow!("search.limit must be at least 1"));
    }
    if let Some(base_url) = &config.provider.base_url {
        if base_url.trim().is_empty() {
            return Err(anyhow!("provider.base_url must not be empty when set"));
        }
    }
    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_config_env(config: &mut DaytripConfig, lookup: impl Fn(&str) -> Option<String>) {
    let provider = &mut config.provider;
    provider.api_key = provider
        .api_key
        .as_deref()
        .map(resolve_env_var)
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .filter_map(|name| lookup(name))
                .find(|key| !key.trim().is_empty())
        });
    provider.model = resolve_env_var(&provider.model);
    provider.base_url = provider.base_url.as_deref().map(resolve_env_var);

    let search = &mut config.search;
    search.base_url = resolve_env_var(&search.base_url);
    search.user_agent = resolve_env_var(&search.user_agent);
}
