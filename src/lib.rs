//! Push-to-talk dictation client: hotkey-triggered capture, a WebSocket
//! transport with a handshake gate, a pre-auth audio buffer, and
//! clipboard-paste delivery of sanitized transcripts.

pub mod audio;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod handshake;
pub mod hotkey;
pub mod inject;
pub mod instance_lock;
pub mod payload;
pub mod sanitizer;
pub mod transport;
