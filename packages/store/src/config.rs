//! # Application configuration — `notes.toml`
//!
//! Defines the TOML configuration file read at startup. It tunes how editor
//! content is committed to the store and how linked accounts keep their access
//! tokens fresh.
//!
//! ## Structure
//!
//! ```toml
//! [editor]
//! commit_debounce_ms = 300     # trailing debounce for outbound commits
//! flush_on_teardown = false    # flush a pending commit when the view closes
//!
//! [auth]
//! refresh_margin_secs = 300    # refresh this long before expiry
//! retry_delay_secs = 30        # wait between failed refresh attempts
//! max_refresh_attempts = 3     # attempts before re-auth is required
//! ```
//!
//! ## Types
//!
//! | Struct | Purpose |
//! |--------|---------|
//! | [`AppConfig`] | Top-level config. Builder helpers, TOML (de)serialisation, and the canonical filename. |
//! | [`EditorConfig`] | Commit debounce window and teardown policy. |
//! | [`AuthConfig`] | Token refresh margin and retry policy. |
//!
//! Every field has a default, so a missing or empty config file is equivalent
//! to the default configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration stored in `notes.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Editor commit configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Trailing debounce window for outbound commits, in milliseconds.
    #[serde(default = "default_commit_debounce_ms")]
    pub commit_debounce_ms: u64,
    /// Flush a pending commit when the editor view is torn down.
    /// When false the pending commit is dropped (and logged).
    #[serde(default)]
    pub flush_on_teardown: bool,
}

fn default_commit_debounce_ms() -> u64 {
    300
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            commit_debounce_ms: default_commit_debounce_ms(),
            flush_on_teardown: false,
        }
    }
}

/// Account token refresh configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_refresh_attempts: u32,
}

fn default_refresh_margin() -> u64 {
    300
}

fn default_retry_delay() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: default_refresh_margin(),
            retry_delay_secs: default_retry_delay(),
            max_refresh_attempts: default_max_attempts(),
        }
    }
}

impl AppConfig {
    /// Builder method to set the commit debounce window.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.editor.commit_debounce_ms = ms;
        self
    }

    /// Builder method to set the teardown flush policy.
    pub fn with_flush_on_teardown(mut self, flush: bool) -> Self {
        self.editor.flush_on_teardown = flush;
        self
    }

    /// The well-known filename for the config file.
    pub fn filename() -> &'static str {
        "notes.toml"
    }

    /// Parse from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load the config at `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(s) => Ok(Self::from_toml(&s)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the config to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
