//! Configuration module for the WhisperDoc client.
//!
//! Provides `ClientConfig` (top-level settings), `AppPaths` for the
//! cross-platform settings directory, and TOML persistence via
//! `ClientConfig::load` / `ClientConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{ClientConfig, DEFAULT_CLIENT_VERSION, DEFAULT_IDLE_TIMEOUT_SECS};
