//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*, `__` separates nested keys)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via SHELLCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SHELLCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network request timeout in milliseconds.
    ///
    /// Set via SHELLCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Worker generation, scope and asset lists.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Immutable worker configuration, built once and shared by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Cache generation tag. Bumping it retires every partition of the
    /// previous generation on the next activation.
    ///
    /// Set via SHELLCACHE_WORKER__GENERATION.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Common prefix of every partition name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Origin and base path the worker controls. Relative locators resolve
    /// against it.
    #[serde(default = "default_scope")]
    pub scope: Url,

    /// Locators cached into the shell partition at install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Regex matched against full request URLs to pick out large resources.
    #[serde(default = "default_resource_pattern")]
    pub resource_pattern: String,

    /// Locator cached by the `precache-default-resource` message.
    #[serde(default = "default_resource_url")]
    pub default_resource_url: Option<String>,

    /// Ask the host to activate right after install instead of waiting for
    /// old clients to close.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,
}

/// The three partition names of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
    /// Fixed precached assets.
    pub shell: String,
    /// On-demand large resources.
    pub resource: String,
    /// Opportunistically cached responses.
    pub runtime: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    52_428_800 // 50MB
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_generation() -> String {
    "v1".into()
}

fn default_cache_prefix() -> String {
    "shellcache".into()
}

fn default_scope() -> Url {
    Url::parse("http://localhost/").expect("static scope URL is valid")
}

fn default_precache() -> Vec<String> {
    vec!["./".into(), "./index.html".into()]
}

fn default_resource_pattern() -> String {
    r"/large_dictionary\.js(?:\?.*)?$".into()
}

fn default_resource_url() -> Option<String> {
    Some("./large_dictionary.js".into())
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            worker: WorkerConfig::default(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            generation: default_generation(),
            cache_prefix: default_cache_prefix(),
            scope: default_scope(),
            precache: default_precache(),
            resource_pattern: default_resource_pattern(),
            default_resource_url: default_resource_url(),
            skip_waiting: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

impl WorkerConfig {
    /// Partition names of this generation.
    pub fn partition_names(&self) -> PartitionNames {
        let name = |role: &str| format!("{}-{}-{}", self.cache_prefix, role, self.generation);
        PartitionNames { shell: name("shell"), resource: name("resource"), runtime: name("runtime") }
    }

    /// Names the reaper keeps on activation.
    pub fn whitelist(&self) -> Vec<String> {
        let names = self.partition_names();
        vec![names.shell, names.resource, names.runtime]
    }

    /// Resolve a locator against the worker scope.
    pub fn resolve(&self, locator: &str) -> Result<Url, ConfigError> {
        crate::locator::resolve(&self.scope, locator).map_err(|e| ConfigError::Invalid {
            field: "worker".into(),
            reason: format!("cannot resolve {locator:?}: {e}"),
        })
    }

    /// The precache list resolved to absolute URLs, in configured order.
    pub fn precache_urls(&self) -> Result<Vec<Url>, ConfigError> {
        self.precache.iter().map(|locator| self.resolve(locator)).collect()
    }

    /// The site root, served as the offline navigation shell.
    pub fn root_url(&self) -> Url {
        self.scope.clone()
    }

    /// The `index.html` sibling of the root.
    pub fn index_url(&self) -> Url {
        self.scope.join("index.html").unwrap_or_else(|_| self.scope.clone())
    }

    /// Compiled large-resource pattern.
    pub fn resource_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.resource_pattern).map_err(|e| ConfigError::Invalid {
            field: "worker.resource_pattern".into(),
            reason: e.to_string(),
        })
    }

    /// The default resource resolved against the scope, if one is configured.
    pub fn default_resource(&self) -> Result<Option<Url>, ConfigError> {
        self.default_resource_url
            .as_deref()
            .map(|locator| self.resolve(locator))
            .transpose()
    }

    /// Whether `url` shares the scope's origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.scope.origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./shellcache.sqlite"));
        assert_eq!(config.user_agent, "shellcache/0.1");
        assert_eq!(config.max_bytes, 52_428_800);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.worker.generation, "v1");
        assert!(config.worker.skip_waiting);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_partition_names_embed_generation() {
        let worker = WorkerConfig { generation: "v1.2".into(), cache_prefix: "aod".into(), ..Default::default() };
        let names = worker.partition_names();
        assert_eq!(names.shell, "aod-shell-v1.2");
        assert_eq!(names.resource, "aod-resource-v1.2");
        assert_eq!(names.runtime, "aod-runtime-v1.2");
        assert_eq!(worker.whitelist().len(), 3);
    }

    #[test]
    fn test_generations_never_collide() {
        let v1 = WorkerConfig { generation: "v1".into(), ..Default::default() };
        let v2 = WorkerConfig { generation: "v2".into(), ..Default::default() };
        for name in v1.whitelist() {
            assert!(!v2.whitelist().contains(&name));
        }
    }

    #[test]
    fn test_precache_urls_resolve_against_scope() {
        let worker = WorkerConfig {
            scope: Url::parse("https://app.example.com/dict/").unwrap(),
            precache: vec!["./".into(), "./index.html".into(), "/manifest.json".into()],
            ..Default::default()
        };
        let urls: Vec<String> = worker.precache_urls().unwrap().into_iter().map(String::from).collect();
        assert_eq!(
            urls,
            vec![
                "https://app.example.com/dict/",
                "https://app.example.com/dict/index.html",
                "https://app.example.com/manifest.json",
            ]
        );
    }

    #[test]
    fn test_precache_urls_share_locator_rule() {
        let worker = WorkerConfig {
            precache: vec!["./index.html#top".into(), "./words.json?src=https://cdn.example.net/x".into()],
            ..Default::default()
        };
        let urls: Vec<String> = worker.precache_urls().unwrap().into_iter().map(String::from).collect();
        assert_eq!(
            urls,
            vec!["http://localhost/index.html", "http://localhost/words.json?src=https://cdn.example.net/x"]
        );

        let bad = WorkerConfig { precache: vec!["ftp://files.example.com/a".into()], ..Default::default() };
        assert!(bad.precache_urls().is_err());
    }

    #[test]
    fn test_root_and_index() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.root_url().as_str(), "http://localhost/");
        assert_eq!(worker.index_url().as_str(), "http://localhost/index.html");
    }

    #[test]
    fn test_default_resource_matches_pattern() {
        let worker = WorkerConfig::default();
        let url = worker.default_resource().unwrap().unwrap();
        assert!(worker.resource_regex().unwrap().is_match(url.as_str()));
    }

    #[test]
    fn test_same_origin() {
        let worker = WorkerConfig::default();
        assert!(worker.is_same_origin(&Url::parse("http://localhost/app.js").unwrap()));
        assert!(!worker.is_same_origin(&Url::parse("https://localhost/app.js").unwrap()));
        assert!(!worker.is_same_origin(&Url::parse("http://cdn.example.com/app.js").unwrap()));
    }

    #[test]
    fn test_load_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SHELLCACHE_TIMEOUT_MS", "5000");
            jail.set_env("SHELLCACHE_WORKER__GENERATION", "v2");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.timeout_ms, 5000);
            assert_eq!(config.worker.generation, "v2");
            assert_eq!(config.worker.cache_prefix, "shellcache");
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "shellcache.toml",
                r#"
                user_agent = "dict-app/2.0"

                [worker]
                generation = "v1.2"
                scope = "https://dict.example.com/"
                precache = ["./", "./index.html", "./manifest.json"]
                "#,
            )?;
            jail.set_env("SHELLCACHE_CONFIG_FILE", "shellcache.toml");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.user_agent, "dict-app/2.0");
            assert_eq!(config.worker.generation, "v1.2");
            assert_eq!(config.worker.precache.len(), 3);
            assert_eq!(config.worker.scope.as_str(), "https://dict.example.com/");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("shellcache.toml", "[worker]\ngeneration = \"v1\"\n")?;
            jail.set_env("SHELLCACHE_CONFIG_FILE", "shellcache.toml");
            jail.set_env("SHELLCACHE_WORKER__GENERATION", "v3");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.worker.generation, "v3");
            Ok(())
        });
    }
}
