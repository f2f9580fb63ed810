//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_CACHE__ENABLED`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const KNOWN_PROVIDERS: &[&str] = &["hash", "http"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data: DataSettings,
    pub cache: CacheSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    pub raw_dir: String,
    pub processed_dir: Option<String>,
    pub index_dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Defaults to `<index_dir>/cache`; relative paths resolve against the index dir.
    pub dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// `hash` (offline, deterministic) or `http` (OpenAI-compatible endpoint).
    pub provider: String,
    pub dim: usize,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub top_k: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data: DataSettings {
                raw_dir: "./data/raw".to_string(),
                processed_dir: Some("./data/processed".to_string()),
                index_dir: "./data/index".to_string(),
            },
            cache: CacheSettings { enabled: true, dir: None },
            embedding: EmbeddingSettings {
                provider: "hash".to_string(),
                dim: 384,
                base_url: "http://localhost:8080/v1".to_string(),
                model: "all-MiniLM-L6-v2".to_string(),
                api_key: None,
                timeout_secs: 30,
                batch_size: 64,
                max_retries: 3,
                retry_base_delay_ms: 500,
            },
            search: SearchSettings { top_k: 5 },
        }
    }
}

impl Settings {
    pub fn raw_dir(&self) -> PathBuf { expand_path(&self.data.raw_dir) }

    pub fn index_dir(&self) -> PathBuf { expand_path(&self.data.index_dir) }

    pub fn processed_dir(&self) -> Option<PathBuf> { self.data.processed_dir.as_deref().map(expand_path) }

    pub fn cache_dir(&self) -> PathBuf {
        match &self.cache.dir {
            Some(dir) => resolve_with_base(&self.index_dir(), dir),
            None => self.index_dir().join("cache"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".into()));
        }
        if self.search.top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k must be positive".into()));
        }
        if !KNOWN_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(Error::InvalidConfig(format!(
                "embedding.provider '{}' is not one of {:?}",
                self.embedding.provider, KNOWN_PROVIDERS
            )));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
