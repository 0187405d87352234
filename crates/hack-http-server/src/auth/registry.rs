//! Owned cache of challenge handlers, one per scheme and qop.

use super::{AuthError, ChallengeHandler, ChallengeKey};
#[cfg(feature = "http-auth")]
use super::{AuthScheme, BasicChallenge, DigestChallenge};
use crate::config::AuthConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Builds challenge handlers on first use and keeps them for the life of
/// the server, so nonces issued by a handler stay valid across requests.
pub struct ChallengeRegistry {
    credentials: AuthConfig,
    handlers: Mutex<HashMap<ChallengeKey, Arc<dyn ChallengeHandler>>>,
}

impl ChallengeRegistry {
    pub fn new(credentials: AuthConfig) -> Self {
        Self {
            credentials,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Whether this build can run challenge/response authentication at all
    pub fn is_available() -> bool {
        cfg!(feature = "http-auth")
    }

    /// Get the handler for `key`, constructing it on first use
    pub fn resolve(&self, key: ChallengeKey) -> Result<Arc<dyn ChallengeHandler>, AuthError> {
        let mut handlers = self.handlers.lock();
        if let Some(handler) = handlers.get(&key) {
            return Ok(Arc::clone(handler));
        }

        let handler = self.construct(key)?;
        info!(
            scheme = ?key.scheme,
            qop = ?key.qop,
            realm = %self.credentials.realm,
            "Created challenge handler"
        );
        handlers.insert(key, Arc::clone(&handler));
        Ok(handler)
    }

    /// Number of handlers built so far
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(feature = "http-auth")]
    fn construct(&self, key: ChallengeKey) -> Result<Arc<dyn ChallengeHandler>, AuthError> {
        let credentials = self.credentials.clone();
        Ok(match key.scheme {
            AuthScheme::Digest => Arc::new(DigestChallenge::new(credentials, key.qop)),
            AuthScheme::Basic => Arc::new(BasicChallenge::new(credentials)),
        })
    }

    #[cfg(not(feature = "http-auth"))]
    fn construct(&self, _key: ChallengeKey) -> Result<Arc<dyn ChallengeHandler>, AuthError> {
        Err(AuthError::Unavailable)
    }
}
