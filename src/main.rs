//! Application entry point — WhisperDoc push-to-talk dictation client.
//!
//! # Startup sequence
//!
//! 1. Parse CLI flags; handle `--version` before anything else touches I/O.
//! 2. Initialise logging.
//! 3. Load [`ClientConfig`] from disk (returns default on first run).
//! 4. Acquire the single-instance lock.
//! 5. Build the [`Transport`] (canonicalises the configured URI).
//! 6. Handle `--clear-key` / `--health` / `--setup` as one-shot actions.
//! 7. Open the audio capture stream and build the [`RecordingController`].
//! 8. Spawn the hotkey listener thread.
//! 9. Run the event loop until Ctrl+C, then shut down cleanly.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use whisperdoc_client::audio::AudioCapture;
use whisperdoc_client::cli::Args;
use whisperdoc_client::config::{ClientConfig, DEFAULT_CLIENT_VERSION};
use whisperdoc_client::controller::RecordingController;
use whisperdoc_client::credentials::{CredentialProvider, KeyringCredentialProvider};
use whisperdoc_client::handshake::HandshakeState;
use whisperdoc_client::hotkey::{parse_key, HotkeyListener};
use whisperdoc_client::inject::TextInjector;
use whisperdoc_client::instance_lock::{InstanceLock, NoopInstanceLock};
use whisperdoc_client::transport::Transport;

const KEYRING_SERVICE: &str = "WhisperDoc_Client";

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.version {
        println!("whisperdoc-client {DEFAULT_CLIENT_VERSION}");
        return Ok(());
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("whisperdoc-client starting up");

    let config = ClientConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        ClientConfig::default()
    });

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    rt.block_on(run(args, config))
}

async fn run(args: Args, mut config: ClientConfig) -> anyhow::Result<()> {
    let mut lock = NoopInstanceLock;
    if !lock.acquire() {
        log::error!("another instance of whisperdoc-client is already running");
        std::process::exit(1);
    }

    if args.incognito {
        config.incognito = true;
    }

    let credentials: Arc<dyn CredentialProvider> = Arc::new(KeyringCredentialProvider);
    let transport = Transport::new(&config, Arc::clone(&credentials))?;

    if args.clear_key {
        credentials.clear_key(transport.hostname());
        println!("API key cleared for {}", transport.hostname());
        return Ok(());
    }

    if args.health {
        return if transport.check_health().await {
            println!("server is healthy");
            Ok(())
        } else {
            eprintln!("server health check failed");
            std::process::exit(1);
        };
    }

    if args.setup {
        run_setup_wizard(transport.hostname());
        return Ok(());
    }

    if credentials.get_api_key(transport.hostname()).is_none() {
        log::error!(
            "no API key configured for {}; run with --setup first",
            transport.hostname()
        );
        std::process::exit(1);
    }

    let capture = match AudioCapture::new() {
        Ok(capture) => capture,
        Err(e) => {
            log::error!("audio capture unavailable: {e}");
            std::process::exit(1);
        }
    };

    let injector = TextInjector::new();
    let controller = RecordingController::new(capture, transport.clone(), injector, config.incognito);

    if let Err(e) = controller.open_stream().await {
        log::error!("failed to open audio stream: {e}");
        std::process::exit(1);
    }

    transport.handshake.add_listener(|state| {
        if state == HandshakeState::Failed {
            log::error!("authentication rejected by server");
        }
    });

    let hotkey_key = parse_key(&config.record_hotkey).unwrap_or(rdev::Key::F9);
    let (toggle_tx, mut toggle_rx) = mpsc::channel::<()>(16);
    let _hotkey_listener = HotkeyListener::start(hotkey_key, toggle_tx);

    log::info!("ready; press {} to start dictating", config.record_hotkey);

    loop {
        tokio::select! {
            signal = toggle_rx.recv() => {
                match signal {
                    Some(()) => controller.toggle_recording().await,
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutting down");
                break;
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}

/// The interactive setup wizard is an external collaborator (spec §1):
/// this crate only points the operator at it rather than reimplementing
/// its prompts.
fn run_setup_wizard(host: &str) {
    println!("Setup is not built into this binary.");
    println!("Store an API key for {host} directly in the system keyring, e.g.:");
    println!("  keyring set {KEYRING_SERVICE} {host}");
}
