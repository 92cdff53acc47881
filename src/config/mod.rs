//! TOML configuration with environment overrides.
//!
//! Lookup order: `--config <path>` if given, otherwise `config.toml` in the
//! platform config directory. A missing file means all defaults.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the database, signing key and client session live.
    pub workspace_dir: PathBuf,
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
    /// Signing secret. Generated and stored in the workspace when unset.
    pub token_secret: Option<String>,
    pub allow_registration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
}

impl Default for Config {
    fn default() -> Self {
        let workspace_dir = project_dirs().map_or_else(
            || PathBuf::from(".tasklist"),
            |dirs| dirs.data_dir().to_path_buf(),
        );
        Self {
            workspace_dir,
            gateway: GatewayConfig::default(),
            auth: AuthConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: crate::auth::token::DEFAULT_TOKEN_TTL_SECS,
            token_secret: None,
            allow_registration: true,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: format!("http://{DEFAULT_HOST}:{DEFAULT_PORT}"),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "tasklist", "tasklist")
}

/// Default location of `config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load from `path` (or the default location), then apply `TASKLIST_*` env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let mut config = match path {
            Some(ref p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("TASKLIST_HOST").filter(|v| !v.trim().is_empty()) {
            self.gateway.host = host.trim().to_string();
        }
        if let Some(port) = lookup("TASKLIST_PORT") {
            match port.trim().parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid TASKLIST_PORT"),
            }
        }
        if let Some(secret) = lookup("TASKLIST_TOKEN_SECRET").filter(|v| !v.trim().is_empty()) {
            self.auth.token_secret = Some(secret);
        }
        if let Some(server) = lookup("TASKLIST_SERVER").filter(|v| !v.trim().is_empty()) {
            self.client.server_url = server.trim().to_string();
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.workspace_dir.join("tasks.db")
    }

    pub fn token_key_path(&self) -> PathBuf {
        self.workspace_dir.join("token.key")
    }

    pub fn session_path(&self) -> PathBuf {
        self.workspace_dir.join("session.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.auth.token_ttl_secs, 86_400);
        assert!(config.auth.allow_registration);
        assert!(config.auth.token_secret.is_none());
        assert_eq!(config.client.server_url, "http://127.0.0.1:3000");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
workspace_dir = "/var/lib/tasklist"

[gateway]
port = 8080
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.workspace_dir, PathBuf::from("/var/lib/tasklist"));
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.auth.token_ttl_secs, 86_400);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/tasklist/tasks.db")
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[gateway]\nport = \"not a number\"\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }

    #[test]
    fn env_overrides_apply_and_bad_port_is_ignored() {
        let env: HashMap<&str, &str> = [
            ("TASKLIST_HOST", "0.0.0.0"),
            ("TASKLIST_PORT", "nope"),
            ("TASKLIST_TOKEN_SECRET", "s3cret"),
            ("TASKLIST_SERVER", "http://tasks.local:9000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.auth.token_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.client.server_url, "http://tasks.local:9000");
    }
}
