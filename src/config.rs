//! Configuration for finiq.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FINIQ_HOME, FINIQ_CACHE_DIR, REDIS_URL,
//!    FINIQ_CACHE_VERSION, FINIQ_CACHE_TTL_SECONDS)
//! 2. Config file (.finiq/config.yaml)
//! 3. Defaults (~/.finiq)
//!
//! Config file discovery:
//! - Searches current directory and parents for .finiq/config.yaml
//! - Relative paths in the config file resolve against the `.finiq/` directory
//!
//! Provider API keys are read by the generation adapter, not here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cache::RedisSettings;
use crate::core::{Pipeline, SafetyLimits, StepOverride};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_CACHE_VERSION: &str = "v1";
const DEFAULT_TTL_SECONDS: u64 = 3600;
const DEFAULT_KEY_PREFIX: &str = "finiq:strategy:";
const DEFAULT_REDIS_TIMEOUT_MS: u64 = 2000;
const DEFAULT_REDIS_COOLDOWN_SECONDS: u64 = 30;
const DEFAULT_REDIS_POOL_SIZE: usize = 8;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub version: Option<String>,
    pub paths: PathsConfig,
    pub cache: CacheConfig,
    pub safety: SafetyConfig,
    /// Per-step overrides keyed by step name
    pub steps: BTreeMap<String, StepOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Engine state directory
    pub home: Option<String>,
    /// Fallback cache directory
    pub cache_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub version: Option<String>,
    pub ttl_seconds: Option<u64>,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    pub redis_timeout_ms: Option<u64>,
    pub redis_cooldown_seconds: Option<u64>,
    pub redis_pool_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub step_timeout_seconds: Option<u64>,
    pub max_prompt_bytes: Option<u64>,
    pub max_output_bytes: Option<u64>,
}

/// Cache settings after all sources are applied
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Fallback (file) cache directory
    pub dir: PathBuf,
    /// Fingerprint version; bumping it invalidates every entry
    pub version: String,
    /// Entry lifetime
    pub ttl: Duration,
    /// Primary backend, when a Redis URL is configured
    pub redis: Option<RedisSettings>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to finiq home
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub cache: CacheSettings,
    pub safety: SafetyLimits,
    pub steps: BTreeMap<String, StepOverride>,
}

impl ResolvedConfig {
    /// The standard pipeline with configured limits and step overrides
    pub fn pipeline(&self) -> Result<Pipeline> {
        Pipeline::standard(self.safety.clone())
            .with_overrides(&self.steps)
            .context("Invalid pipeline settings in config")
    }
}

/// Find config file by searching a directory and its parents
fn find_config_file(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(".finiq").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}='{}': {}", name, raw, e)),
        None => Ok(None),
    }
}

/// Merge env, file and defaults
fn resolve(
    env: impl Fn(&str) -> Option<String>,
    config_file: Option<PathBuf>,
    file: ConfigFile,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    // Relative paths in the file are anchored at its .finiq/ directory
    let file_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);
    let from_file = |value: &Option<String>| -> Option<PathBuf> {
        let value = value.as_deref()?;
        Some(match &file_dir {
            Some(dir) => resolve_path(dir, value),
            None => PathBuf::from(value),
        })
    };

    let home = env("FINIQ_HOME")
        .map(PathBuf::from)
        .or_else(|| from_file(&file.paths.home))
        .unwrap_or(default_home);

    let dir = env("FINIQ_CACHE_DIR")
        .map(PathBuf::from)
        .or_else(|| from_file(&file.paths.cache_dir))
        .unwrap_or_else(|| home.join("cache"));

    let version = env("FINIQ_CACHE_VERSION")
        .filter(|v| !v.trim().is_empty())
        .or(file.cache.version.clone())
        .unwrap_or_else(|| DEFAULT_CACHE_VERSION.to_string());
    if version.trim().is_empty() || version.contains(':') {
        anyhow::bail!("Cache version '{}' must be non-empty and must not contain ':'", version);
    }

    let ttl_seconds = parse_env::<u64>(&env, "FINIQ_CACHE_TTL_SECONDS")?
        .or(file.cache.ttl_seconds)
        .unwrap_or(DEFAULT_TTL_SECONDS);

    let redis = env("REDIS_URL")
        .filter(|url| !url.trim().is_empty())
        .or(file.cache.redis_url.clone())
        .map(|url| RedisSettings {
            url,
            key_prefix: file
                .cache
                .key_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            timeout: Duration::from_millis(
                file.cache.redis_timeout_ms.unwrap_or(DEFAULT_REDIS_TIMEOUT_MS),
            ),
            cooldown: Duration::from_secs(
                file.cache
                    .redis_cooldown_seconds
                    .unwrap_or(DEFAULT_REDIS_COOLDOWN_SECONDS),
            ),
            pool_size: file.cache.redis_pool_size.unwrap_or(DEFAULT_REDIS_POOL_SIZE),
        });

    let defaults = SafetyLimits::default();
    let safety = SafetyLimits {
        step_timeout_seconds: file
            .safety
            .step_timeout_seconds
            .unwrap_or(defaults.step_timeout_seconds),
        max_prompt_bytes: file
            .safety
            .max_prompt_bytes
            .unwrap_or(defaults.max_prompt_bytes),
        max_output_bytes: file
            .safety
            .max_output_bytes
            .unwrap_or(defaults.max_output_bytes),
    };

    let resolved = ResolvedConfig {
        home,
        config_file,
        cache: CacheSettings {
            dir,
            version,
            ttl: Duration::from_secs(ttl_seconds),
            redis,
        },
        safety,
        steps: file.steps,
    };
    resolved.pipeline()?;

    Ok(resolved)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".finiq");

    let config_file = std::env::current_dir().ok().and_then(find_config_file);
    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(|name| std::env::var(name).ok(), config_file, file, default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
