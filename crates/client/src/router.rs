//! Access to the router's own configuration.
//!
//! The router keeps everything under `~/.claude-code-router`. The client
//! never writes there; it only reads the configuration to tell users early
//! when something is obviously missing.

use std::env;
use std::fmt::{self, Debug};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ccr_agent_protocol::ErrorKind;
use serde::Deserialize;

use crate::error::Error;

/// Name of the directory the router reads its configuration from.
pub const ROUTER_DIR_NAME: &str = ".claude-code-router";
/// Name of the configuration file inside [`ROUTER_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3456;
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// The router's configuration directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouterHome {
    dir: PathBuf,
}

impl RouterHome {
    /// Locates the directory in the current user's home.
    #[inline]
    pub fn locate() -> Option<Self> {
        dirs::home_dir().map(|home| Self::at(home.join(ROUTER_DIR_NAME)))
    }

    /// Uses an explicit directory.
    #[inline]
    pub fn at<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the configuration file.
    #[inline]
    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Returns `true` if the configuration file exists.
    #[inline]
    pub fn has_config(&self) -> bool {
        self.config_path().is_file()
    }

    /// Reads and parses the configuration file.
    pub fn load_config(&self) -> Result<RouterConfig, Error> {
        let path = self.config_path();
        let text = fs::read_to_string(&path).map_err(|err| {
            Error::new(
                format!("failed to read {}: {err}", path.display()),
                ErrorKind::Config,
            )
        })?;
        RouterConfig::from_json(&text).map_err(|err| {
            let reason = err.message();
            Error::new(
                format!("failed to parse {}: {reason}", path.display()),
                ErrorKind::Config,
            )
        })
    }
}

/// The parts of the router configuration the client cares about.
///
/// Keys that are not listed here are accepted and ignored.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RouterConfig {
    /// Address the router service listens on.
    #[serde(rename = "HOST", default = "default_host")]
    pub host: String,
    /// Port the router service listens on.
    #[serde(rename = "PORT", default = "default_port")]
    pub port: u16,
    /// Secret clients must present to the router, if set.
    #[serde(rename = "APIKEY", default)]
    pub api_key: Option<String>,
    /// Upstream model providers.
    #[serde(rename = "Providers", default)]
    pub providers: Vec<ProviderConfig>,
    /// Which model serves which kind of request.
    #[serde(rename = "Router", default)]
    pub routes: RouteTable,
}

impl Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field("providers", &self.providers)
            .field("routes", &self.routes)
            .finish()
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// An upstream model provider.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Name used in `provider,model` pairs.
    pub name: String,
    /// Endpoint of the provider.
    #[serde(default)]
    pub api_base_url: String,
    /// The key, or a `$VAR` / `${VAR}` reference to an environment variable.
    #[serde(default)]
    pub api_key: String,
    /// Models offered by the provider.
    #[serde(default)]
    pub models: Vec<String>,
}

impl Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"<deducted>")
            .field("models", &self.models)
            .finish()
    }
}

/// Routing rules, each a `provider,model` pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTable {
    /// The model for regular requests.
    #[serde(default)]
    pub default: Option<String>,
    /// The model for background tasks.
    #[serde(default)]
    pub background: Option<String>,
    /// The model for reasoning-heavy requests.
    #[serde(default)]
    pub think: Option<String>,
    /// The model for requests with a long context.
    #[serde(default)]
    pub long_context: Option<String>,
    /// The model for requests using web search.
    #[serde(default)]
    pub web_search: Option<String>,
}

impl RouterConfig {
    /// Parses the content of a configuration file.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Config))
    }

    /// Returns the base URL of the router service.
    #[inline]
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Returns the environment variables referenced by provider keys that
    /// are not set in the current environment.
    #[inline]
    pub fn unresolved_env_vars(&self) -> Vec<String> {
        self.unresolved_env_vars_with(|name| env::var_os(name).is_some())
    }

    /// Same as [`unresolved_env_vars`](Self::unresolved_env_vars), with a
    /// custom lookup.
    pub fn unresolved_env_vars_with(
        &self,
        is_set: impl Fn(&str) -> bool,
    ) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for provider in &self.providers {
            let Some(name) = env_reference(&provider.api_key) else {
                continue;
            };
            if !is_set(name) && !missing.iter().any(|m| m == name) {
                missing.push(name.to_owned());
            }
        }
        missing
    }
}

/// Extracts `VAR` from `$VAR` or `${VAR}`.
fn env_reference(value: &str) -> Option<&str> {
    let name = value.trim().strip_prefix('$')?;
    let name = match name.strip_prefix('{') {
        Some(braced) => braced.strip_suffix('}')?,
        None => name,
    };
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

/// Whether the router service answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouterStatus {
    /// The service answered with any HTTP response.
    Running,
    /// Nothing answered. `ccr code` starts the service on demand, so this
    /// is not an error.
    NotRunning,
}

/// Checks whether the router service is listening at `endpoint`.
pub async fn probe(endpoint: &str) -> RouterStatus {
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()
    {
        Ok(client) => client,
        Err(err) => {
            warn!("failed to create the HTTP client: {err}");
            return RouterStatus::NotRunning;
        }
    };
    match client.get(endpoint).send().await {
        Ok(resp) => {
            debug!("router answered with {}", resp.status());
            RouterStatus::Running
        }
        Err(err) => {
            debug!("router probe failed: {err}");
            RouterStatus::NotRunning
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "LOG": true,
        "APIKEY": "local-secret",
        "Providers": [
            {
                "name": "openrouter",
                "api_base_url": "https://openrouter.ai/api/v1/chat/completions",
                "api_key": "$OPENROUTER_API_KEY",
                "models": ["google/gemini-2.5-pro-preview"],
                "transformer": {"use": ["openrouter"]}
            },
            {
                "name": "deepseek",
                "api_base_url": "https://api.deepseek.com/chat/completions",
                "api_key": "${DEEPSEEK_API_KEY}",
                "models": ["deepseek-chat", "deepseek-reasoner"]
            },
            {
                "name": "ollama",
                "api_base_url": "http://localhost:11434/v1/chat/completions",
                "api_key": "ollama",
                "models": ["qwen2.5-coder:latest"]
            }
        ],
        "Router": {
            "default": "deepseek,deepseek-chat",
            "think": "deepseek,deepseek-reasoner",
            "longContext": "openrouter,google/gemini-2.5-pro-preview"
        }
    }"#;

    #[test]
    fn test_parse_config() {
        let config = RouterConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.endpoint(), "http://127.0.0.1:3456");
        assert_eq!(config.api_key.as_deref(), Some("local-secret"));
        assert_eq!(config.providers.len(), 3);
        assert_eq!(
            config.providers[1].models,
            ["deepseek-chat", "deepseek-reasoner"]
        );
        assert_eq!(
            config.routes.default.as_deref(),
            Some("deepseek,deepseek-chat")
        );
        assert_eq!(
            config.routes.long_context.as_deref(),
            Some("openrouter,google/gemini-2.5-pro-preview")
        );
        assert_eq!(config.routes.background, None);
    }

    #[test]
    fn test_custom_address() {
        let config =
            RouterConfig::from_json(r#"{"HOST": "0.0.0.0", "PORT": 8080}"#)
                .unwrap();
        assert_eq!(config.endpoint(), "http://0.0.0.0:8080");
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_unresolved_env_vars() {
        let config = RouterConfig::from_json(SAMPLE).unwrap();
        let missing =
            config.unresolved_env_vars_with(|name| name == "DEEPSEEK_API_KEY");
        assert_eq!(missing, ["OPENROUTER_API_KEY"]);
        assert!(config.unresolved_env_vars_with(|_| true).is_empty());
    }

    #[test]
    fn test_env_reference() {
        assert_eq!(env_reference("$KEY"), Some("KEY"));
        assert_eq!(env_reference("${MY_KEY_2}"), Some("MY_KEY_2"));
        assert_eq!(env_reference("sk-123"), None);
        assert_eq!(env_reference("${BROKEN"), None);
        assert_eq!(env_reference("$"), None);
    }

    #[test]
    fn test_debug_hides_provider_keys() {
        let config = RouterConfig::from_json(SAMPLE).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("OPENROUTER_API_KEY"));
        assert!(!debug.contains("local-secret"));
        assert!(debug.contains("deepseek-reasoner"));
    }

    #[test]
    fn test_missing_config() {
        let dir = env::temp_dir().join("ccr-agent-client-missing-home");
        let home = RouterHome::at(&dir);
        assert_eq!(home.config_path(), dir.join("config.json"));
        assert!(!home.has_config());
        assert!(home.load_config().is_err());
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        // Port 9 (discard) is almost never served over HTTP.
        assert_eq!(probe("http://127.0.0.1:9").await, RouterStatus::NotRunning);
    }
}
