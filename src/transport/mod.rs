//! Transport layer — WebSocket connect, TLS policy, handshake send, receive
//! loop, idle timer, and the health pre-flight probe.
//!
//! No networking exists in the teacher app; this module is grounded in
//! `original_source/terminal_client/whisper_shell/services/transport_service.py`
//! for semantics and in `tokio-tungstenite` (`rustls-tls-native-roots`) for
//! the wire. One writer path: the stream is `.split()` once in
//! [`Transport::connect`] and the write half lives behind a
//! `tokio::sync::Mutex`; the read half is owned exclusively by the spawned
//! receive task.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;
use zeroize::Zeroize;

use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;
use crate::handshake::{HandshakeState, HandshakeStateMachine};
use crate::payload::{EndOfStream, HelloPayload, ServerMessage};

/// Default idle timeout before the transport disconnects.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid server URI: {0}")]
    InvalidUri(#[from] url::ParseError),
    #[error("no API key available for {0}")]
    NoApiKey(String),
    #[error("websocket connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to serialize outbound frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type MessageListener = Arc<dyn Fn(&ServerMessage) + Send + Sync>;

struct Inner {
    sink: Option<WsSink>,
    receive_task: Option<JoinHandle<()>>,
    idle_timer: Option<JoinHandle<()>>,
}

/// WebSocket transport session. Created once per process, reset on every
/// (re)connect. Owns the [`HandshakeStateMachine`] for its lifetime.
#[derive(Clone)]
pub struct Transport {
    final_uri: String,
    hostname: String,
    client_version: String,
    incognito: bool,
    idle_timeout: Duration,
    credentials: Arc<dyn CredentialProvider>,
    /// Authoritative gate on when audio may leave the client.
    pub handshake: HandshakeStateMachine,
    listeners: Arc<StdMutex<Vec<MessageListener>>>,
    inner: Arc<Mutex<Inner>>,
}

impl Transport {
    /// Build a transport from configuration. Canonicalises `config.ws_uri`
    /// but does not connect.
    pub fn new(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, TransportError> {
        let (final_uri, hostname) = canonicalize_uri(&config.ws_uri)?;
        Ok(Self {
            final_uri,
            hostname,
            client_version: config.client_version.clone(),
            incognito: config.incognito,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            credentials,
            handshake: HandshakeStateMachine::new(),
            listeners: Arc::new(StdMutex::new(Vec::new())),
            inner: Arc::new(Mutex::new(Inner {
                sink: None,
                receive_task: None,
                idle_timer: None,
            })),
        })
    }

    /// Canonical URI this session connects to.
    pub fn final_uri(&self) -> &str {
        &self.final_uri
    }

    /// Hostname used for TLS SNI and credential lookup.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Register a listener invoked (synchronously, in registration order)
    /// on every inbound message the receive loop delivers.
    pub fn add_message_listener<F>(&self, listener: F)
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Arc::new(listener));
    }

    /// Connect if not already connected. Idempotent.
    ///
    /// On success the hello payload has been sent and the handshake is
    /// `AUTHENTICATING`; the caller does not wait for `authenticated` here.
    pub async fn connect(&self) -> Result<(), TransportError> {
        {
            let inner = self.inner.lock().await;
            if inner.sink.is_some() {
                return Ok(());
            }
        }

        self.handshake.reset();
        log::info!("connecting to {}", self.hostname);

        match self.connect_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("connection failed: {e}");
                self.disconnect(&e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn connect_inner(&self) -> Result<(), TransportError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.final_uri).await?;
        let (sink, stream) = ws_stream.split();

        {
            let mut inner = self.inner.lock().await;
            inner.sink = Some(sink);
        }

        let this = self.clone();
        let receive_task = tokio::spawn(async move {
            this.receive_loop(stream).await;
        });
        {
            let mut inner = self.inner.lock().await;
            inner.receive_task = Some(receive_task);
        }

        let mut api_key = self
            .credentials
            .get_api_key(&self.hostname)
            .ok_or_else(|| TransportError::NoApiKey(self.hostname.clone()))?;

        let mut hello = HelloPayload::new(api_key.clone(), self.client_version.clone(), self.incognito);
        let send_result = self.send_json(&hello).await;

        // Memory hygiene: zero both local copies of the key as soon as the
        // frame is on the wire, rather than relying on `drop` to merely
        // release them.
        api_key.zeroize();
        hello.token.zeroize();
        send_result?;

        self.handshake.transition_to(HandshakeState::Authenticating);
        Ok(())
    }

    /// Background auto-wake pattern: connect only if not already
    /// authenticated.
    pub async fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.handshake.state() == HandshakeState::Authenticated {
            return Ok(());
        }
        self.connect().await
    }

    async fn receive_loop(&self, mut stream: WsStream) {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => self.handle_text_frame(&text),
                Ok(Message::Binary(_)) => {
                    // Binary frames from the server are unspecified; ignore.
                }
                Ok(Message::Close(frame)) => {
                    if frame
                        .as_ref()
                        .is_some_and(|f| f.code == CloseCode::Policy)
                    {
                        self.handshake.transition_to(HandshakeState::Banned);
                    }
                    log::warn!("websocket closed by server: {frame:?}");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("transport receive error: {e}");
                    break;
                }
            }
        }
        self.disconnect("Closed by server").await;
    }

    fn handle_text_frame(&self, text: &str) {
        let parsed = match ServerMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("message parsing error: {e}");
                return;
            }
        };

        match parsed.event_name() {
            Some("authenticated") => {
                self.handshake.transition_to(HandshakeState::Authenticated);
                log::info!("authenticated cid={:?}", parsed.cid());
            }
            Some("error") => {
                match parsed.code() {
                    Some(401) | Some(403) => {
                        self.handshake.transition_to(HandshakeState::Failed);
                    }
                    Some(1008) => {
                        self.handshake.transition_to(HandshakeState::Banned);
                    }
                    _ => {}
                }
                self.notify_listeners(&parsed);
            }
            _ => self.notify_listeners(&parsed),
        }
    }

    fn notify_listeners(&self, msg: &ServerMessage) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener(msg);
        }
    }

    /// Send a PCM chunk as a binary frame. Silently dropped (the caller is
    /// expected to buffer instead) unless the handshake is `AUTHENTICATED`
    /// and the socket is open.
    pub async fn send_audio(&self, chunk: Vec<u8>) {
        if !self.handshake.can_send_audio() {
            return;
        }
        let sent = {
            let mut inner = self.inner.lock().await;
            match inner.sink.as_mut() {
                Some(sink) => sink.send(Message::Binary(chunk)).await.is_ok(),
                None => false,
            }
        };
        if sent {
            self.rearm_idle_timer().await;
        }
    }

    async fn send_json<T: Serialize>(&self, value: &T) -> Result<(), TransportError> {
        let text = serde_json::to_string(value)?;
        let sent = {
            let mut inner = self.inner.lock().await;
            match inner.sink.as_mut() {
                Some(sink) => sink.send(Message::Text(text)).await.is_ok(),
                None => false,
            }
        };
        if sent {
            self.rearm_idle_timer().await;
        }
        Ok(())
    }

    /// Send the `end-of-stream` control frame, if connected.
    pub async fn send_end_of_stream(&self) -> Result<(), TransportError> {
        self.send_json(&EndOfStream::default()).await
    }

    async fn rearm_idle_timer(&self) {
        let this = self.clone();
        let duration = self.idle_timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            log::info!("idle for {duration:?}; disconnecting to free server resources");
            this.disconnect("Idle timeout").await;
        });
        let old = {
            let mut inner = self.inner.lock().await;
            inner.idle_timer.replace(handle)
        };
        if let Some(old) = old {
            old.abort();
        }
    }

    /// Reset handshake, cancel the idle timer and receive task, close the
    /// socket with code 1000, and null the socket handle. Idempotent.
    ///
    /// `disconnect` can itself run inside the receive task or the idle-timer
    /// task (both call it on their own exit path), so it never aborts the
    /// task it's currently running on — that task is already unwinding, and
    /// `abort()`-ing it would risk the runtime dropping this very future
    /// mid-cleanup, before the close frame goes out.
    pub async fn disconnect(&self, reason: &str) {
        self.handshake.reset();

        let current = tokio::task::try_id();

        let (idle_timer, receive_task, sink) = {
            let mut inner = self.inner.lock().await;
            (
                inner.idle_timer.take(),
                inner.receive_task.take(),
                inner.sink.take(),
            )
        };

        if let Some(handle) = idle_timer {
            if Some(handle.id()) != current {
                handle.abort();
            }
        }
        if let Some(handle) = receive_task {
            if Some(handle.id()) != current {
                handle.abort();
            }
        }
        if let Some(mut sink) = sink {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: reason.to_string().into(),
            };
            let _ = sink.send(Message::Close(Some(frame))).await;
            let _ = sink.close().await;
        }

        log::info!("disconnected: {reason}");
    }

    /// Derive the HTTP(S) health URL (`ws→http`, `wss→https`, path
    /// `/health`) and GET it with a 5 s timeout. `true` iff status 200.
    pub async fn check_health(&self) -> bool {
        let url = match health_url(&self.final_uri) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("cannot derive health check URL: {e}");
                return false;
            }
        };

        let client = match reqwest::Client::builder()
            .timeout(HEALTH_CHECK_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                log::warn!("failed to build health check client: {e}");
                return false;
            }
        };

        match client.get(&url).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                log::warn!("health check failed: {e}");
                false
            }
        }
    }
}

/// Lower-case the scheme, map `http→ws`/`https→wss`, force `wss` for any
/// non-loopback host still requesting `ws`, default an empty path to
/// `/ws`, and preserve the query string. Returns `(final_uri, hostname)`.
fn canonicalize_uri(uri: &str) -> Result<(String, String), TransportError> {
    let parsed = Url::parse(uri)?;

    let mut scheme = parsed.scheme().to_ascii_lowercase();
    scheme = match scheme.as_str() {
        "http" => "ws".to_string(),
        "https" => "wss".to_string(),
        other => other.to_string(),
    };

    let hostname = parsed.host_str().unwrap_or("localhost").to_string();
    let is_loopback = matches!(hostname.as_str(), "localhost" | "127.0.0.1" | "0.0.0.0");
    if !is_loopback && scheme == "ws" {
        log::warn!("remote connection to {hostname} requested over ws; enforcing wss");
        scheme = "wss".to_string();
    }

    let path = match parsed.path() {
        "" | "/" => "/ws",
        p => p,
    };

    let mut final_uri = format!("{scheme}://{hostname}");
    if let Some(port) = parsed.port() {
        final_uri.push_str(&format!(":{port}"));
    }
    final_uri.push_str(path);
    if let Some(query) = parsed.query() {
        final_uri.push('?');
        final_uri.push_str(query);
    }

    Ok((final_uri, hostname))
}

/// `ws://host/ws` → `http://host/health`; `wss://host/ws` → `https://host/health`.
fn health_url(final_uri: &str) -> Result<String, url::ParseError> {
    let parsed = Url::parse(final_uri)?;
    let scheme = if parsed.scheme() == "wss" { "https" } else { "http" };
    let hostname = parsed.host_str().unwrap_or("localhost");
    let mut url = format!("{scheme}://{hostname}");
    if let Some(port) = parsed.port() {
        url.push_str(&format!(":{port}"));
    }
    url.push_str("/health");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_defaults_path_and_maps_scheme() {
        let (uri, host) = canonicalize_uri("http://localhost:9989").unwrap();
        assert_eq!(uri, "ws://localhost:9989/ws");
        assert_eq!(host, "localhost");
    }

    #[test]
    fn canonicalize_upgrades_https_to_wss() {
        let (uri, _) = canonicalize_uri("https://dictation.example.com/ws").unwrap();
        assert_eq!(uri, "wss://dictation.example.com/ws");
    }

    #[test]
    fn canonicalize_forces_wss_for_remote_host_over_ws() {
        let (uri, _) = canonicalize_uri("ws://dictation.example.com/ws").unwrap();
        assert_eq!(uri, "wss://dictation.example.com/ws");
    }

    #[test]
    fn canonicalize_allows_ws_for_loopback_hosts() {
        for host in ["localhost", "127.0.0.1", "0.0.0.0"] {
            let (uri, _) = canonicalize_uri(&format!("ws://{host}:9989/ws")).unwrap();
            assert!(uri.starts_with("ws://"), "expected ws:// for {host}, got {uri}");
        }
    }

    #[test]
    fn canonicalize_preserves_query_string() {
        let (uri, _) = canonicalize_uri("ws://localhost:9989/ws?debug=1").unwrap();
        assert_eq!(uri, "ws://localhost:9989/ws?debug=1");
    }

    #[test]
    fn canonicalize_keeps_custom_path() {
        let (uri, _) = canonicalize_uri("ws://localhost:9989/custom").unwrap();
        assert_eq!(uri, "ws://localhost:9989/custom");
    }

    #[test]
    fn health_url_derives_from_ws_and_wss() {
        assert_eq!(
            health_url("ws://localhost:9989/ws").unwrap(),
            "http://localhost:9989/health"
        );
        assert_eq!(
            health_url("wss://dictation.example.com/ws").unwrap(),
            "https://dictation.example.com/health"
        );
    }

    #[tokio::test]
    async fn new_transport_does_not_connect() {
        let config = ClientConfig {
            ws_uri: "ws://localhost:9989/ws".into(),
            ..ClientConfig::default()
        };
        let credentials = Arc::new(crate::credentials::test_support::FakeCredentialProvider::with_key(
            "localhost",
            "secret",
        ));
        let transport = Transport::new(&config, credentials).unwrap();
        assert_eq!(transport.handshake.state(), HandshakeState::Locked);
    }
}
