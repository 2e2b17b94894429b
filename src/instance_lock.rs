//! Single-instance lock — platform-specific mutex acquisition, out of
//! scope for the core (spec §1) and stubbed behind a trait so `main` can
//! be written against a stable interface.

/// Acquires (and releases on drop) a system-wide lock preventing more than
/// one instance of the client from running at once.
pub trait InstanceLock {
    /// Attempt to acquire the lock. `Ok(true)` means this process now holds
    /// it; `Ok(false)` means another instance already holds it.
    fn acquire(&mut self) -> bool;
}

/// Always succeeds. Platform mutex acquisition (the original's
/// Windows-only `CreateMutexW`/`ReleaseMutex` pair) is an external
/// collaborator per spec §1.
#[derive(Debug, Default)]
pub struct NoopInstanceLock;

impl InstanceLock for NoopInstanceLock {
    fn acquire(&mut self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_lock_always_acquires() {
        let mut lock = NoopInstanceLock;
        assert!(lock.acquire());
        assert!(lock.acquire());
    }
}
