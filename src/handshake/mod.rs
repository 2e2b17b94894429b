//! Handshake state machine — the authoritative gate on when audio may
//! leave the client. Owned by a [`crate::transport::Transport`] session;
//! its lifetime equals the session's.
//!
//! # States
//!
//! ```text
//! LOCKED         → AUTHENTICATING | FAILED | BANNED
//! AUTHENTICATING → AUTHENTICATED  | FAILED | BANNED
//! AUTHENTICATED  → LOCKED         | BANNED
//! FAILED         → LOCKED         | BANNED
//! BANNED         → LOCKED
//! ```
//!
//! Entering `AUTHENTICATING` arms a deferred timeout (default 15s); if the
//! state is still `AUTHENTICATING` when it fires, the machine transitions
//! to `FAILED`. Leaving `AUTHENTICATING` cancels the timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// One of the five handshake states. Initial state is always [`Self::Locked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Locked,
    Authenticating,
    Authenticated,
    Failed,
    Banned,
}

/// Default deadline for the `AUTHENTICATING` state before it auto-fails.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

type Listener = Arc<dyn Fn(HandshakeState) + Send + Sync>;

struct Inner {
    state: HandshakeState,
    listeners: Vec<Listener>,
    timeout_handle: Option<JoinHandle<()>>,
}

/// Cheaply cloneable handle to the handshake state. Clones share the same
/// underlying state and listener list — cloning is how the timeout task
/// gets a handle back to call `transition_to`.
#[derive(Clone)]
pub struct HandshakeStateMachine {
    inner: Arc<Mutex<Inner>>,
    timeout: Duration,
}

impl HandshakeStateMachine {
    /// Create a new state machine in the `LOCKED` state with the default
    /// 15s authentication timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HANDSHAKE_TIMEOUT)
    }

    /// Create a new state machine with a custom authentication timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: HandshakeState::Locked,
                listeners: Vec::new(),
                timeout_handle: None,
            })),
            timeout,
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.inner.lock().unwrap().state
    }

    /// True iff audio bytes may be transmitted right now.
    pub fn can_send_audio(&self) -> bool {
        self.state() == HandshakeState::Authenticated
    }

    /// Register a listener, invoked with the new state on every actual
    /// state change, in registration order.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(HandshakeState) + Send + Sync + 'static,
    {
        self.inner.lock().unwrap().listeners.push(Arc::new(listener));
    }

    /// Attempt a transition to `new_state`. If the edge is not in the
    /// allowed graph, logs a warning and no-ops. If the state doesn't
    /// actually change, this is a silent no-op (no listener notification).
    pub fn transition_to(&self, new_state: HandshakeState) {
        let listeners = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == new_state {
                return;
            }
            if !is_valid_edge(inner.state, new_state) {
                log::warn!(
                    "invalid handshake transition: {:?} -> {:?}",
                    inner.state,
                    new_state
                );
                return;
            }

            log::info!("handshake state: {:?} -> {:?}", inner.state, new_state);
            inner.state = new_state;

            if new_state == HandshakeState::Authenticating {
                self.arm_timeout(&mut inner);
            } else if let Some(handle) = inner.timeout_handle.take() {
                handle.abort();
            }

            inner.listeners.clone()
        };

        for listener in listeners {
            listener(new_state);
        }
    }

    /// Cancel any timer and force the state to `LOCKED`. This edge is
    /// always allowed, even from states the transition graph would
    /// otherwise reject (spec: "reset is always allowed from non-LOCKED
    /// terminal states").
    pub fn reset(&self) {
        let listeners = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(handle) = inner.timeout_handle.take() {
                handle.abort();
            }
            if inner.state == HandshakeState::Locked {
                return;
            }
            inner.state = HandshakeState::Locked;
            inner.listeners.clone()
        };

        for listener in listeners {
            listener(HandshakeState::Locked);
        }
    }

    fn arm_timeout(&self, inner: &mut Inner) {
        if let Some(handle) = inner.timeout_handle.take() {
            handle.abort();
        }
        let this = self.clone();
        let duration = self.timeout;
        inner.timeout_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if this.state() == HandshakeState::Authenticating {
                log::warn!(
                    "handshake timeout after {:?}; transitioning to FAILED",
                    duration
                );
                this.transition_to(HandshakeState::Failed);
            }
        }));
    }
}

impl Default for HandshakeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_edge(from: HandshakeState, to: HandshakeState) -> bool {
    use HandshakeState::*;
    if to == Banned {
        return true;
    }
    matches!(
        (from, to),
        (Locked, Authenticating)
            | (Locked, Failed)
            | (Authenticating, Authenticated)
            | (Authenticating, Failed)
            | (Authenticated, Locked)
            | (Failed, Locked)
            | (Banned, Locked)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn initial_state_is_locked() {
        let hs = HandshakeStateMachine::new();
        assert_eq!(hs.state(), HandshakeState::Locked);
        assert!(!hs.can_send_audio());
    }

    #[tokio::test]
    async fn valid_edge_transitions_and_notifies() {
        let hs = HandshakeStateMachine::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        hs.add_listener(move |s| seen_clone.lock().unwrap().push(s));

        hs.transition_to(HandshakeState::Authenticating);
        hs.transition_to(HandshakeState::Authenticated);

        assert_eq!(hs.state(), HandshakeState::Authenticated);
        assert!(hs.can_send_audio());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![HandshakeState::Authenticating, HandshakeState::Authenticated]
        );
    }

    #[tokio::test]
    async fn invalid_edge_is_a_noop() {
        let hs = HandshakeStateMachine::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        hs.add_listener(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // LOCKED -> AUTHENTICATED is not a valid edge.
        hs.transition_to(HandshakeState::Authenticated);

        assert_eq!(hs.state(), HandshakeState::Locked);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn banned_reachable_from_any_state() {
        for start in [
            HandshakeState::Locked,
            HandshakeState::Authenticating,
            HandshakeState::Authenticated,
            HandshakeState::Failed,
        ] {
            let hs = HandshakeStateMachine::new();
            // Drive into `start` via valid edges.
            match start {
                HandshakeState::Locked => {}
                HandshakeState::Authenticating => hs.transition_to(HandshakeState::Authenticating),
                HandshakeState::Authenticated => {
                    hs.transition_to(HandshakeState::Authenticating);
                    hs.transition_to(HandshakeState::Authenticated);
                }
                HandshakeState::Failed => hs.transition_to(HandshakeState::Failed),
                HandshakeState::Banned => unreachable!(),
            }
            hs.transition_to(HandshakeState::Banned);
            assert_eq!(hs.state(), HandshakeState::Banned);
        }
    }

    #[tokio::test]
    async fn reset_forces_locked_and_is_always_allowed() {
        let hs = HandshakeStateMachine::new();
        hs.transition_to(HandshakeState::Authenticating);
        hs.transition_to(HandshakeState::Banned);
        hs.reset();
        assert_eq!(hs.state(), HandshakeState::Locked);
    }

    #[tokio::test]
    async fn reset_on_already_locked_is_a_noop() {
        let hs = HandshakeStateMachine::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        hs.add_listener(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        hs.reset();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn authenticating_timeout_transitions_to_failed() {
        let hs = HandshakeStateMachine::with_timeout(StdDuration::from_millis(50));
        hs.transition_to(HandshakeState::Authenticating);

        tokio::time::advance(StdDuration::from_millis(100)).await;
        // Yield so the spawned timeout task gets to run.
        tokio::task::yield_now().await;
        tokio::time::advance(StdDuration::from_millis(1)).await;
        tokio::task::yield_now().await;

        assert_eq!(hs.state(), HandshakeState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_authenticating_cancels_timeout() {
        let hs = HandshakeStateMachine::with_timeout(StdDuration::from_millis(50));
        hs.transition_to(HandshakeState::Authenticating);
        hs.transition_to(HandshakeState::Authenticated);

        tokio::time::advance(StdDuration::from_millis(200)).await;
        tokio::task::yield_now().await;

        // Timer was cancelled on leaving AUTHENTICATING; state must remain
        // AUTHENTICATED, not flip to FAILED.
        assert_eq!(hs.state(), HandshakeState::Authenticated);
    }

    #[tokio::test]
    async fn listeners_notified_in_registration_order() {
        let hs = HandshakeStateMachine::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            hs.add_listener(move |_| order.lock().unwrap().push(i));
        }
        hs.transition_to(HandshakeState::Authenticating);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
