//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILHARVEST_CONFIG` (environment variable)
//! 2. `~/.config/mailharvest/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailharvest\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags and their environment variables override the file.
//! The library core never reads this module's environment lookups; it is
//! handed explicit values built from a [`Config`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::model::address::domain_of;
use crate::session::connect::{candidates_for_domain, ServerCandidate};
use crate::session::Credentials;
use crate::stats::{DEFAULT_TOP_DOMAINS, DEFAULT_TOP_SENDERS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mailbox account.
    pub account: AccountConfig,
    /// Ordered server candidates. Empty: derived from the account's domain.
    pub servers: Vec<ServerCandidate>,
    /// Where the JSON documents go.
    pub output: OutputConfig,
    /// Network and ranking limits.
    pub limits: LimitsConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Account identity.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Login name, usually the full email address.
    pub user: String,
    /// Password. Prefer `MAILHARVEST_PASSWORD` over storing it here.
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving `folder_list.json`, per-folder files,
    /// `all_emails.json` and `stats.json`.
    pub dir: PathBuf,
}

/// Network and ranking limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Socket connect/read/write timeout in seconds.
    pub timeout_secs: u64,
    /// Length of the sender ranking in `stats.json`.
    pub top_senders: usize,
    /// Length of the domain ranking in `stats.json`.
    pub top_domains: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("emails"),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            top_senders: DEFAULT_TOP_SENDERS,
            top_domains: DEFAULT_TOP_DOMAINS,
        }
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ── Derived values ──────────────────────────────────────────────

impl Config {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.account.user.clone(), self.account.password.clone())
    }

    /// Configured servers, or the probe list for the account's mail domain.
    pub fn candidates(&self) -> Result<Vec<ServerCandidate>> {
        if !self.servers.is_empty() {
            return Ok(self.servers.clone());
        }
        match domain_of(&self.account.user).filter(|d| !d.is_empty()) {
            Some(domain) => Ok(candidates_for_domain(domain)),
            None => Err(HarvestError::Config(format!(
                "no [[servers]] configured and no domain in user '{}'",
                self.account.user
            ))),
        }
    }

    /// Everything a run needs before touching the network. A missing
    /// password is reported ahead of any server-resolution problem.
    pub fn preflight(&self) -> Result<(Credentials, Vec<ServerCandidate>)> {
        let credentials = self.credentials();
        credentials.secret()?;
        let candidates = self.candidates()?;
        Ok((credentials, candidates))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.limits.timeout_secs.max(1))
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_from(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring config file, using defaults");
                }
            }
        }
    }
    Config::default()
}

/// Read and parse one config file.
pub fn load_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
    toml::from_str(&contents)
        .map_err(|e| HarvestError::Config(format!("{}: {e}", path.display())))
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILHARVEST_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailharvest").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailharvest")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.limits.timeout_secs, 30);
        assert_eq!(cfg.limits.top_senders, 50);
        assert_eq!(cfg.limits.top_domains, 30);
        assert!(cfg.servers.is_empty());
    }

    #[test]
    fn test_servers_from_toml() {
        let text = r#"
[account]
user = "desk@example.org"

[[servers]]
host = "imap.example.org"
port = 993
secure = true

[[servers]]
host = "imap.example.org"
port = 143
secure = false

[limits]
timeout_secs = 5
"#;
        let cfg: Config = toml::from_str(text).expect("parse");
        let c = cfg.candidates().expect("candidates");
        assert_eq!(c.len(), 2);
        assert_eq!(c[1], ServerCandidate::new("imap.example.org", 143, false));
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        // Other fields use defaults
        assert_eq!(cfg.limits.top_senders, 50);
    }

    #[test]
    fn test_candidates_derived_from_user_domain() {
        let mut cfg = Config::default();
        cfg.account.user = "desk@example.org".into();
        let c = cfg.candidates().expect("candidates");
        assert_eq!(c.len(), 6);
        assert_eq!(c[0].host, "mail.example.org");
        assert!(c[0].secure);
        assert_eq!(c[5].port, 143);
    }

    #[test]
    fn test_candidates_need_servers_or_domain() {
        let mut cfg = Config::default();
        cfg.account.user = "desk".into();
        assert!(matches!(cfg.candidates(), Err(HarvestError::Config(_))));
    }

    #[test]
    fn test_preflight_reports_missing_password_first() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.preflight(),
            Err(HarvestError::CredentialMissing { .. })
        ));

        let mut cfg = Config::default();
        cfg.account.user = "desk".into();
        cfg.account.password = Some(String::new());
        assert!(matches!(
            cfg.preflight(),
            Err(HarvestError::CredentialMissing { .. })
        ));

        cfg.account.password = Some("hunter2".into());
        assert!(matches!(cfg.preflight(), Err(HarvestError::Config(_))));

        cfg.account.user = "desk@example.org".into();
        let (creds, candidates) = cfg.preflight().expect("preflight");
        assert_eq!(creds.user, "desk@example.org");
        assert_eq!(candidates.len(), 6);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[output]\ndir = \"/tmp/mail\"\n").unwrap();
        let cfg = load_from(&path).unwrap();
        assert_eq!(cfg.output.dir, PathBuf::from("/tmp/mail"));

        std::fs::write(&path, "[limits\n").unwrap();
        assert!(matches!(load_from(&path), Err(HarvestError::Config(_))));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(load_from(&missing), Err(HarvestError::Io { .. })));
    }

    #[test]
    fn test_password_never_serialized() {
        let mut cfg = Config::default();
        cfg.account.user = "desk@example.org".into();
        cfg.account.password = Some("hunter2".into());
        let text = toml::to_string_pretty(&cfg).expect("serialize");
        assert!(!text.contains("hunter2"));
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
