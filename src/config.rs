//! Configuration for contentflow.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CONTENTFLOW_HOME, CONTENTFLOW_DB,
//!    CONTENTFLOW_PROVIDER_URL, CONTENTFLOW_PUBLISH_URL, CONTENTFLOW_PUBLISH_TOKEN)
//! 2. Config file (.contentflow/config.yaml)
//! 3. Defaults (~/.contentflow)
//!
//! Config file discovery:
//! - Searches current directory and parents for .contentflow/config.yaml
//! - `paths.home` is relative to the .contentflow/ directory, `paths.database`
//!   to the project root containing it

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::PipelineSettings;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".contentflow";
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_PROVIDER_URL: &str = "http://localhost:3000/api";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub pipeline: Option<PipelineSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .contentflow/)
    pub home: Option<String>,
    /// SQLite database file (relative to the project root)
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    pub base_url: Option<String>,
    pub publish_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved endpoints for the HTTP adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSettings {
    /// Generation service base URL
    pub base_url: String,
    /// Publishing endpoint
    pub publish_url: Option<String>,
    #[serde(skip_serializing)]
    pub publish_token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            publish_url: None,
            publish_token: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// SQLite database file
    pub database: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub providers: ProviderSettings,
    pub pipeline: PipelineSettings,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
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

    let config: ConfigFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    if let Some(pipeline) = &config.pipeline {
        pipeline
            .validate()
            .with_context(|| format!("Invalid pipeline section in {}", path.display()))?;
    }

    Ok(config)
}

/// Resolve a path that may be relative to the config file's parent
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

/// Merge a config file and environment lookups over the defaults
fn resolve_config<F>(config_file: Option<PathBuf>, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    // .contentflow/ and the project root above it
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let project_root = config_dir.parent().unwrap_or(Path::new("."));

    let home = if let Some(env_home) = env("CONTENTFLOW_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = file.paths.home {
        resolve_path(config_dir, home_path)
    } else {
        default_home
    };

    let database = if let Some(env_db) = env("CONTENTFLOW_DB") {
        PathBuf::from(env_db)
    } else if let Some(ref db_path) = file.paths.database {
        resolve_path(project_root, db_path)
    } else {
        home.join("contentflow.db")
    };

    let providers = ProviderSettings {
        base_url: env("CONTENTFLOW_PROVIDER_URL")
            .or(file.providers.base_url)
            .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
        publish_url: env("CONTENTFLOW_PUBLISH_URL").or(file.providers.publish_url),
        publish_token: env("CONTENTFLOW_PUBLISH_TOKEN"),
        timeout_seconds: file
            .providers
            .timeout_seconds
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
    };

    Ok(ResolvedConfig {
        home,
        database,
        config_file,
        providers,
        pipeline: file.pipeline.unwrap_or_default(),
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    resolve_config(find_config_file(), |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the contentflow state directory
pub fn contentflow_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the session database path
pub fn database_path() -> Result<PathBuf> {
    Ok(config()?.database.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(temp: &TempDir, yaml: &str) -> PathBuf {
        let dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", yaml).unwrap();
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve_config(None, no_env).unwrap();

        let expected_home = dirs::home_dir().unwrap().join(".contentflow");
        assert_eq!(config.home, expected_home);
        assert_eq!(config.database, expected_home.join("contentflow.db"));
        assert!(config.config_file.is_none());
        assert_eq!(config.providers, ProviderSettings::default());
        assert_eq!(config.pipeline, PipelineSettings::default());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
version: "1"
paths:
  home: ./state
  database: data/sessions.db
providers:
  base_url: http://localhost:3000/api
  timeout_seconds: 15
pipeline:
  max_steps: 6
  selection:
    top_n: 2
"#,
        );

        let config = resolve_config(Some(config_path.clone()), no_env).unwrap();

        assert_eq!(config.home, temp.path().join(".contentflow").join("state"));
        assert_eq!(config.database, temp.path().join("data/sessions.db"));
        assert_eq!(config.providers.base_url, "http://localhost:3000/api");
        assert_eq!(config.providers.timeout(), Duration::from_secs(15));
        assert_eq!(config.pipeline.max_steps, 6);
        assert_eq!(config.pipeline.selection.top_n, 2);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            "paths:\n  database: file.db\nproviders:\n  base_url: http://file",
        );

        let env: HashMap<&str, &str> = [
            ("CONTENTFLOW_DB", "/tmp/env.db"),
            ("CONTENTFLOW_PROVIDER_URL", "http://env"),
            ("CONTENTFLOW_PUBLISH_TOKEN", "secret"),
        ]
        .into_iter()
        .collect();

        let config = resolve_config(Some(config_path), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.database, PathBuf::from("/tmp/env.db"));
        assert_eq!(config.providers.base_url, "http://env");
        assert_eq!(config.providers.publish_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_invalid_pipeline_section_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "pipeline:\n  max_steps: 0");

        assert!(resolve_config(Some(config_path), no_env).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
