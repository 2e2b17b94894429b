//! Credential provider — per-host API key storage.
//!
//! The core only ever calls [`CredentialProvider::get_api_key`] /
//! [`CredentialProvider::clear_key`]; it never prompts interactively (that
//! belongs to the external setup wizard, out of scope here). The default
//! implementation is backed by the OS keyring via the `keyring` crate.

const SERVICE_NAME: &str = "WhisperDoc_Client";

/// Supplies and clears per-host API keys. `host` is the transport's
/// canonical hostname (used for TLS SNI and as the keyring lookup key).
pub trait CredentialProvider: Send + Sync {
    /// Returns the stored API key for `host`, or `None` if absent.
    fn get_api_key(&self, host: &str) -> Option<String>;

    /// Removes any stored API key for `host`.
    fn clear_key(&self, host: &str);
}

/// Default [`CredentialProvider`] backed by the platform keyring.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringCredentialProvider;

impl CredentialProvider for KeyringCredentialProvider {
    fn get_api_key(&self, host: &str) -> Option<String> {
        let entry = keyring::Entry::new(SERVICE_NAME, host).ok()?;
        entry.get_password().ok()
    }

    fn clear_key(&self, host: &str) {
        if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, host) {
            let _ = entry.delete_credential();
        }
    }
}

/// In-memory stand-in used by transport/controller tests so they don't
/// touch the real OS keyring.
#[cfg(test)]
pub(crate) mod test_support {
    use super::CredentialProvider;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeCredentialProvider {
        keys: Mutex<HashMap<String, String>>,
    }

    impl FakeCredentialProvider {
        pub fn with_key(host: &str, key: &str) -> Self {
            let mut keys = HashMap::new();
            keys.insert(host.to_string(), key.to_string());
            Self {
                keys: Mutex::new(keys),
            }
        }
    }

    impl CredentialProvider for FakeCredentialProvider {
        fn get_api_key(&self, host: &str) -> Option<String> {
            self.keys.lock().unwrap().get(host).cloned()
        }

        fn clear_key(&self, host: &str) {
            self.keys.lock().unwrap().remove(host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeCredentialProvider;
    use super::*;

    #[test]
    fn fake_provider_returns_stored_key() {
        let provider = FakeCredentialProvider::with_key("localhost", "secret");
        assert_eq!(provider.get_api_key("localhost"), Some("secret".into()));
        assert_eq!(provider.get_api_key("other"), None);
    }

    #[test]
    fn fake_provider_clears_key() {
        let provider = FakeCredentialProvider::with_key("localhost", "secret");
        provider.clear_key("localhost");
        assert_eq!(provider.get_api_key("localhost"), None);
    }
}
