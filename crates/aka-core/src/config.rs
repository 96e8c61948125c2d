use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AkaError, Result};
use crate::http::{CredentialStore, NetrcStore};

const CONFIG_FILE: &str = "config.toml";
const PLUGINS_DIR: &str = "plugins";

pub const DEFAULT_USER_AGENT: &str = "akkeris-cli";
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_TAIL_INTERVAL_MS: u64 = 250;

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# aka configuration file
# Location: ~/.akkeris/config.toml

[api]
# Apps API host, with or without scheme (https is assumed when omitted)
# Overridden by AKKERIS_API_HOST
# host = "apps.example.com"

# Auth API host, overridden by AKKERIS_AUTH_HOST
# auth_host = "auth.example.com"

[http]
# Maximum number of redirects followed for a single GET
max_redirects = 10
user_agent = "akkeris-cli"

[tail]
# Delay between log polls in milliseconds
interval_ms = 250

[plugins]
# Directory holding user-installed plugins
# Default: ~/.akkeris/plugins
# dir = "/opt/akkeris/plugins"
"#;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub tail: TailConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// API endpoints
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ApiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_host: Option<String>,
}

/// HTTP pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: default_user_agent(),
        }
    }
}

/// Log tailing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TailConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_TAIL_INTERVAL_MS,
        }
    }
}

/// Plugin directories
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PluginsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_interval_ms() -> u64 {
    DEFAULT_TAIL_INTERVAL_MS
}

impl Config {
    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content).map_err(|e| AkaError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Write the commented default template unless a config file exists
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "api.host" => self.api.host = non_empty(value),
            "api.auth_host" => self.api.auth_host = non_empty(value),
            "http.max_redirects" => self.http.max_redirects = parse_number(key, value)?,
            "http.user_agent" => self.http.user_agent = value.to_string(),
            "tail.interval_ms" => self.tail.interval_ms = parse_number(key, value)?,
            "plugins.dir" => self.plugins.dir = non_empty(value).map(PathBuf::from),
            _ => {
                return Err(AkaError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        let unset = || "(unset)".to_string();
        vec![
            (
                "api.host".to_string(),
                self.api.host.clone().unwrap_or_else(unset),
            ),
            (
                "api.auth_host".to_string(),
                self.api.auth_host.clone().unwrap_or_else(unset),
            ),
            (
                "http.max_redirects".to_string(),
                self.http.max_redirects.to_string(),
            ),
            ("http.user_agent".to_string(), self.http.user_agent.clone()),
            (
                "tail.interval_ms".to_string(),
                self.tail.interval_ms.to_string(),
            ),
            (
                "plugins.dir".to_string(),
                self.plugins
                    .dir
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(unset),
            ),
        ]
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| AkaError::user_input(format!("{key} expects a number, got '{value}'")))
}

/// Settings resolved once at startup from the config file and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub plugins_dir: PathBuf,
    pub api_host: Option<String>,
    pub auth_host: Option<String>,
    pub max_redirects: usize,
    pub user_agent: String,
    pub tail_interval: Duration,
    /// Credential found in the credential store for the API host
    pub stored_credential: Option<String>,
    /// `API_TOKEN`: bearer token overriding the stored credential
    pub api_token: Option<String>,
    /// `API_AUTH`: raw authorization header overriding everything else
    pub api_auth: Option<String>,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let base_dir = PathBuf::from(".akkeris");
        Self {
            plugins_dir: base_dir.join(PLUGINS_DIR),
            base_dir,
            api_host: None,
            auth_host: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            tail_interval: Duration::from_millis(DEFAULT_TAIL_INTERVAL_MS),
            stored_credential: None,
            api_token: None,
            api_auth: None,
            debug: false,
        }
    }
}

impl Settings {
    /// Resolve settings from config, process environment and `~/.netrc`
    pub fn from_env(config: &Config, base_dir: &Path) -> Self {
        let mut settings = Self::resolve(config, base_dir, |key| std::env::var(key).ok());
        if let Some(host) = &settings.api_host {
            settings.stored_credential = NetrcStore::from_home().credential(host);
        }
        settings
    }

    /// Resolve settings using an explicit environment lookup
    pub fn resolve<F>(config: &Config, base_dir: &Path, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        Self {
            base_dir: base_dir.to_path_buf(),
            plugins_dir: config
                .plugins
                .dir
                .clone()
                .unwrap_or_else(|| base_dir.join(PLUGINS_DIR)),
            api_host: env("AKKERIS_API_HOST").or_else(|| config.api.host.clone()),
            auth_host: env("AKKERIS_AUTH_HOST").or_else(|| config.api.auth_host.clone()),
            max_redirects: config.http.max_redirects,
            user_agent: config.http.user_agent.clone(),
            tail_interval: Duration::from_millis(config.tail.interval_ms),
            stored_credential: None,
            api_token: env("API_TOKEN"),
            api_auth: env("API_AUTH"),
            debug: env("DEBUG").is_some(),
        }
    }

    /// Create the base and plugin directories when missing
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        fs::create_dir_all(&self.plugins_dir)?;
        Ok(())
    }
}

/// Default base directory: `~/.akkeris`
pub fn default_base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".akkeris"))
        .ok_or(AkaError::HomeNotFound)
}
