//! RecordingController — wires hotkey → capture → buffer/drain →
//! transport → paste. Grounded in
//! `original_source/terminal_client/whisper_shell/controllers/recording_controller.py`
//! (the authoritative listener-based design per spec.md §9) and the
//! teacher's `main.rs` style of explicit channel construction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::audio::{bounded, AudioCapture, CaptureError, ChunkReceiver, ChunkSender};
use crate::buffer::AudioBuffer;
use crate::handshake::HandshakeState;
use crate::inject::TextInjector;
use crate::payload::ServerMessage;
use crate::sanitizer::sanitize;
use crate::transport::Transport;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Orchestrates the recording lifecycle: hotkey-triggered capture, the
/// pre-auth buffer, the transport, and the clipboard/paste result path.
#[derive(Clone)]
pub struct RecordingController {
    recording: Arc<AtomicBool>,
    queue_tx: ChunkSender,
    queue_rx: Arc<Mutex<ChunkReceiver>>,
    capture: Arc<Mutex<AudioCapture>>,
    transport: Transport,
    buffer: Arc<Mutex<AudioBuffer>>,
    pipe_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RecordingController {
    /// Build a controller and wire the transport's handshake and message
    /// listeners. Does not open the hardware stream — call
    /// [`Self::open_stream`] once during startup.
    pub fn new(capture: AudioCapture, transport: Transport, injector: TextInjector, incognito: bool) -> Self {
        let (queue_tx, queue_rx) = bounded();
        let buffer = Arc::new(Mutex::new(AudioBuffer::new()));

        let buffer_on_failure = Arc::clone(&buffer);
        transport.handshake.add_listener(move |state| match state {
            HandshakeState::Authenticated => {
                log::debug!("handshake authenticated; pipe task will flush buffer");
            }
            HandshakeState::Failed => {
                log::error!("handshake failed; clearing audio buffer");
                let buffer = Arc::clone(&buffer_on_failure);
                tokio::spawn(async move {
                    buffer.lock().await.clear();
                });
            }
            _ => {}
        });

        transport.add_message_listener(move |msg| {
            handle_server_message(msg, &injector, incognito);
        });

        Self {
            recording: Arc::new(AtomicBool::new(false)),
            queue_tx,
            queue_rx: Arc::new(Mutex::new(queue_rx)),
            capture: Arc::new(Mutex::new(capture)),
            transport,
            buffer,
            pipe_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Open the hardware capture stream. Idempotent. The stream stays open
    /// across record toggles so that toggle latency is sub-millisecond.
    pub async fn open_stream(&self) -> Result<(), CaptureError> {
        self.capture.lock().await.start_stream(self.queue_tx.clone())
    }

    /// True while a recording session is active.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Main entry point triggered by the hotkey bridge.
    pub async fn toggle_recording(&self) {
        if self.is_recording() {
            self.stop_session().await;
        } else {
            self.start_session().await;
        }
    }

    async fn start_session(&self) {
        if self.recording.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("recording...");

        // 1. Start hardware capture instantly (zero latency).
        self.capture.lock().await.start_capture();

        // 2. Reset the buffer for the new session.
        self.buffer.lock().await.clear();

        // 3. Ensure transport connects in the background; capture proceeds
        //    without waiting for it.
        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.ensure_connected().await {
                log::error!("connect failed: {e}");
            }
        });

        // 4. Start the pipe task.
        let this = self.clone();
        let handle = tokio::spawn(async move { this.pipe_loop().await });
        *self.pipe_task.lock().await = Some(handle);
    }

    async fn stop_session(&self) {
        if !self.recording.swap(false, Ordering::SeqCst) {
            return;
        }
        self.capture.lock().await.stop_capture();
        log::info!("stopped; processing...");

        if self.transport.handshake.state() == HandshakeState::Authenticated {
            if let Err(e) = self.transport.send_end_of_stream().await {
                log::warn!("failed to send end-of-stream: {e}");
            }
        }
        // The pipe task drains the queue and exits naturally.
    }

    async fn pipe_loop(&self) {
        loop {
            let recording = self.is_recording();
            let chunk = {
                let rx = self.queue_rx.lock().await;
                rx.recv_timeout(POLL_TIMEOUT).await
            };

            match chunk {
                Some(chunk) => {
                    if self.transport.handshake.can_send_audio() {
                        let mut buffer = self.buffer.lock().await;
                        if !buffer.is_empty() {
                            let transport = self.transport.clone();
                            buffer
                                .flush(|c| {
                                    let transport = transport.clone();
                                    async move { transport.send_audio(c).await }
                                })
                                .await;
                        }
                        drop(buffer);
                        self.transport.send_audio(chunk).await;
                    } else {
                        self.buffer.lock().await.add(chunk);
                    }
                }
                None => {
                    if !recording {
                        break;
                    }
                }
            }
        }
    }

    /// Disconnect the transport and close the hardware stream.
    pub async fn shutdown(&self) {
        self.transport.disconnect("App shutdown").await;
        self.capture.lock().await.stop_stream();
    }
}

/// `Some(safe_text)` when `msg` carries a non-empty transcript after
/// sanitization, else `None`.
fn extract_transcript(msg: &ServerMessage) -> Option<String> {
    let text = msg.text()?;
    let safe = sanitize(text);
    if safe.is_empty() {
        None
    } else {
        Some(safe)
    }
}

/// Message listener: pastes sanitized transcripts, logs errors/status.
fn handle_server_message(msg: &ServerMessage, injector: &TextInjector, incognito: bool) {
    if let Some(safe) = extract_transcript(msg) {
        if incognito {
            log::debug!("result: {safe}");
        } else {
            log::info!("result: {safe}");
        }
        let injector = injector.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::task::spawn_blocking(move || injector.inject(&safe)).await {
                log::warn!("paste task panicked: {e:?}");
            }
        });
        return;
    }

    match msg.event_name() {
        Some("error") => log::error!("server error: code={:?} message={:?}", msg.code(), msg.message()),
        Some("status") => log::info!("server status: {:?}", msg.message()),
        _ => {}
    }
}
