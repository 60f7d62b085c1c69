//! Configuration
//!
//! Loaded once from TOML at startup and handed to the session explicitly.

use crate::error::{NotchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level notch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Sending identities, in order of preference
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Hook name -> command line
    #[serde(default)]
    pub hooks: HashMap<String, String>,

    /// Key -> command line, overriding the default keymap
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_editor_cmd")]
    pub editor_cmd: String,

    /// Run the editor in a new terminal (and asynchronously)
    #[serde(default)]
    pub spawn_editor: bool,

    #[serde(default = "default_terminal_cmd")]
    pub terminal_cmd: String,

    /// Seconds between commit attempts while the index is locked
    #[serde(default = "default_flush_retry_timeout")]
    pub flush_retry_timeout: u64,

    #[serde(default = "default_true")]
    pub ask_subject: bool,

    #[serde(default = "default_initial_search")]
    pub initial_search: String,

    /// Index file backing the store
    #[serde(default)]
    pub store: Option<PathBuf>,

    #[serde(default)]
    pub read_only: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            editor_cmd: default_editor_cmd(),
            spawn_editor: false,
            terminal_cmd: default_terminal_cmd(),
            flush_retry_timeout: default_flush_retry_timeout(),
            ask_subject: true,
            initial_search: default_initial_search(),
            store: None,
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub address: String,
    #[serde(default)]
    pub realname: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "default_sendmail_command")]
    pub sendmail_command: String,
}

fn default_editor_cmd() -> String {
    std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

fn default_terminal_cmd() -> String {
    "x-terminal-emulator -e".to_string()
}

fn default_flush_retry_timeout() -> u64 {
    2
}

fn default_true() -> bool {
    true
}

fn default_initial_search() -> String {
    "tag:inbox AND NOT tag:killed".to_string()
}

pub(crate) fn default_sendmail_command() -> String {
    "sendmail -t".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| NotchError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from `path` (or the default location); a missing file yields defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            log::info!("no configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// `<config_dir>/notch/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("notch").join("config.toml"))
    }

    pub fn flush_retry_delay(&self) -> Duration {
        Duration::from_secs(self.general.flush_retry_timeout)
    }

    pub fn hook(&self, name: &str) -> Option<&str> {
        self.hooks
            .get(name)
            .map(String::as_str)
            .filter(|cmd| !cmd.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.general.flush_retry_timeout, 2);
        assert!(config.general.ask_subject);
        assert!(!config.general.spawn_editor);
        assert_eq!(config.general.initial_search, "tag:inbox AND NOT tag:killed");
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[general]
editor_cmd = "nano"
spawn_editor = true
flush_retry_timeout = 5

[[accounts]]
address = "me@example.org"
realname = "Me"
aliases = ["me@work.example"]

[hooks]
pre_search = "true"

[bindings]
"ctrl r" = "refresh"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.general.editor_cmd, "nano");
        assert!(config.general.spawn_editor);
        assert_eq!(config.flush_retry_delay(), Duration::from_secs(5));
        assert_eq!(config.accounts[0].sendmail_command, "sendmail -t");
        assert_eq!(config.hook("pre_search"), Some("true"));
        assert_eq!(config.hook("post_search"), None);
        assert_eq!(config.bindings.get("ctrl r").unwrap(), "refresh");
    }

    #[test]
    fn test_account_keys_for_unsupported_features_are_ignored() {
        let config: Config = toml::from_str(
            r#"
[[accounts]]
address = "me@example.org"
sendmail_command = "msmtp -t"
sent_tags = ["archive"]
"#,
        )
        .unwrap();
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].sendmail_command, "msmtp -t");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.general.flush_retry_timeout, 2);
    }

    #[test]
    fn test_malformed_file_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[general\nbroken").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, NotchError::InvalidConfig { .. }));
    }
}
