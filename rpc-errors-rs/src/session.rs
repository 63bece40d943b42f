//! # Sessions
//!
//! A [`SessionHolder`] owns the error reporting switches of one client
//! session together with its [`ErrorCache`]. The registry that hands out
//! holders is injected through [`SessionProvider`]; [`SessionManager`] is
//! the in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{ServerConfig, SessionConfig};
use crate::failure::Failure;
use crate::types::Result;

/// Identity of a session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new<U: Into<String>, S: Into<String>>(user_id: U, session_id: S) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// Failures kept for later retrieval, keyed by correlation id.
///
/// Entries are only removed by [`ErrorCache::take`]; expiry belongs to
/// whoever manages the session lifecycle.
#[derive(Debug, Default)]
pub struct ErrorCache {
    entries: RwLock<HashMap<String, Arc<Failure>>>,
}

impl ErrorCache {
    pub fn insert(&self, error_id: String, failure: Arc<Failure>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(error_id, failure);
    }

    pub fn get(&self, error_id: &str) -> Option<Arc<Failure>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(error_id)
            .cloned()
    }

    /// Removes and returns the failure stored under `error_id`
    pub fn take(&self, error_id: &str) -> Option<Arc<Failure>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(error_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// State of one client session as seen by the error translation layer
#[derive(Debug)]
pub struct SessionHolder {
    key: SessionKey,
    config: RwLock<SessionConfig>,
    error_cache: ErrorCache,
}

impl SessionHolder {
    pub fn new(key: SessionKey, config: SessionConfig) -> Self {
        Self {
            key,
            config: RwLock::new(config),
            error_cache: ErrorCache::default(),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Snapshot of the session's current switches
    pub fn config(&self) -> SessionConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Applies a string session option, see [`SessionConfig::set`]
    pub fn set_option(&self, key: &str, value: &str) -> Result<()> {
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set(key, value)
    }

    pub fn error_cache(&self) -> &ErrorCache {
        &self.error_cache
    }
}

/// Registry of live sessions
pub trait SessionProvider: Send + Sync {
    /// Returns the session for the identifiers, creating it if needed
    fn get_or_create(&self, user_id: &str, session_id: &str) -> Arc<SessionHolder>;

    /// Returns the session only if it already exists
    fn get(&self, user_id: &str, session_id: &str) -> Option<Arc<SessionHolder>>;
}

/// In-memory [`SessionProvider`]
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionKey, Arc<SessionHolder>>>,
    defaults: SessionConfig,
}

impl SessionManager {
    /// Creates a manager whose new sessions start with `defaults`
    pub fn new(defaults: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            defaults,
        }
    }

    /// Creates a manager whose new sessions start with the server's
    /// configured session defaults
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.session_defaults.clone())
    }

    /// Drops a session together with its cached failures
    pub fn close(&self, user_id: &str, session_id: &str) -> Option<Arc<SessionHolder>> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&SessionKey::new(user_id, session_id));
        if removed.is_some() {
            tracing::debug!(user_id, session_id, "Session closed");
        }
        removed
    }
}

impl SessionProvider for SessionManager {
    fn get_or_create(&self, user_id: &str, session_id: &str) -> Arc<SessionHolder> {
        if let Some(session) = self.get(user_id, session_id) {
            return session;
        }

        let key = SessionKey::new(user_id, session_id);
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(user_id, session_id, "Session created");
                Arc::new(SessionHolder::new(key, self.defaults.clone()))
            })
            .clone()
    }

    fn get(&self, user_id: &str, session_id: &str) -> Option<Arc<SessionHolder>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&SessionKey::new(user_id, session_id))
            .cloned()
    }
}
