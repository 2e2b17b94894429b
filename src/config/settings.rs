//! Application settings struct, defaults and TOML persistence.
//!
//! Mirrors the original `ConfigService`'s environment-variable surface
//! (`WHISPER_WS_URI`, `RECORD_HOTKEY`, `AUDIO_DEVICE_ID`, `LOG_LEVEL`,
//! `CLIENT_VERSION`, `IDLE_TIMEOUT`) as a TOML-persisted struct instead,
//! following the teacher's `AppConfig::load`/`save` pattern.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Client version sent in the hello payload when no override is configured.
pub const DEFAULT_CLIENT_VERSION: &str = "2.20.0";

/// Default idle timeout, in seconds, before the transport disconnects.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use whisperdoc_client::config::ClientConfig;
///
/// // Load (returns Default when file is missing)
/// let config = ClientConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URI of the transcription server, e.g.
    /// `"ws://localhost:9989/ws"`. Canonicalised by
    /// [`crate::transport::Transport::new`] before use.
    pub ws_uri: String,
    /// Audio input device index, opaque to the core (0 = system default).
    pub audio_device_id: u32,
    /// Global hotkey binding, opaque to the core — forwarded to whatever
    /// hotkey bridge is wired up in `main`.
    pub record_hotkey: String,
    /// Idle timeout in seconds before the transport disconnects.
    pub idle_timeout_secs: u64,
    /// `env_logger` filter string, e.g. `"info"`.
    pub log_level: String,
    /// Semver sent in the hello payload.
    pub client_version: String,
    /// Ghost mode: requests server-side log minimisation and demotes the
    /// local transcription-result log line.
    pub incognito: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_uri: "ws://localhost:9989/ws".into(),
            audio_device_id: 0,
            record_hotkey: "ctrl+alt+w".into(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            log_level: "info".into(),
            client_version: DEFAULT_CLIENT_VERSION.into(),
            incognito: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(ClientConfig::default())` when the file does not exist
    /// yet (first-run scenario) so callers never need to special-case a
    /// missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns `true` when no `settings.toml` file exists yet — first-run
    /// detection used by the setup wizard.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = ClientConfig::default();
        original.save_to(&path).expect("save");

        let loaded = ClientConfig::load_from(&path).expect("load");
        assert_eq!(original, loaded);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = ClientConfig::load_from(&path).expect("should not error");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn default_values_match_spec() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.ws_uri, "ws://localhost:9989/ws");
        assert_eq!(cfg.idle_timeout_secs, 300);
        assert_eq!(cfg.client_version, "2.20.0");
        assert!(!cfg.incognito);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = ClientConfig::default();
        cfg.ws_uri = "wss://dictation.example.com/ws".into();
        cfg.idle_timeout_secs = 60;
        cfg.incognito = true;
        cfg.record_hotkey = "F9".into();

        cfg.save_to(&path).expect("save");
        let loaded = ClientConfig::load_from(&path).expect("load");
        assert_eq!(loaded, cfg);
    }
}
