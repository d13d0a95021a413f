//! Session capability used by the flow
//!
//! The flow never touches cookies or a web framework. It receives something
//! that can get, set, remove and destroy string values scoped to one browser
//! session. The service adapts its real session layer to this trait; tests
//! use [`MemorySession`].
//!
//! The pending pair is written as a single value so the state and verifier
//! from two racing `/login` calls can never be mixed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Session key holding the pending [`PendingAuthorization`].
pub const PENDING_KEY: &str = "pkce";

/// Key-value storage scoped to one browser session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send;

    /// Remove a key, returning its previous value.
    fn remove(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Drop every value and invalidate the session id. Destroying a session
    /// that holds nothing is not an error.
    fn destroy(&self) -> impl Future<Output = Result<()>> + Send;
}

/// State and verifier generated together by one `/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    #[serde(rename = "pkce_state")]
    pub state: String,
    #[serde(rename = "pkce_verifier")]
    pub verifier: String,
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("state", &self.state)
            .field("verifier", &"[REDACTED]")
            .finish()
    }
}

/// Store the pending pair, replacing whatever an earlier `/login` left.
pub async fn store_pending<S: SessionStore>(
    session: &S,
    pending: &PendingAuthorization,
) -> Result<()> {
    let value = serde_json::to_string(pending)
        .map_err(|e| Error::Session(format!("serializing pending authorization: {e}")))?;
    session.set(PENDING_KEY, value).await
}

/// Read the pending pair without consuming it.
///
/// A value that no longer parses is treated as absent; the callback then
/// fails state validation and the user starts over.
pub async fn load_pending<S: SessionStore>(session: &S) -> Result<Option<PendingAuthorization>> {
    let Some(raw) = session.get(PENDING_KEY).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(pending) => Ok(Some(pending)),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable pending authorization");
            Ok(None)
        }
    }
}

/// In-memory session for tests and single-process demos.
#[derive(Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl SessionStore for MemorySession {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.remove(key))
    }

    async fn destroy(&self) -> Result<()> {
        self.values.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(suffix: &str) -> PendingAuthorization {
        PendingAuthorization {
            state: format!("state-{suffix}"),
            verifier: format!("verifier-{suffix}"),
        }
    }

    #[tokio::test]
    async fn store_and_load_pending() {
        let session = MemorySession::new();
        store_pending(&session, &pending("1")).await.unwrap();

        let loaded = load_pending(&session).await.unwrap().unwrap();
        assert_eq!(loaded, pending("1"));
    }

    #[tokio::test]
    async fn second_store_overwrites_first() {
        let session = MemorySession::new();
        store_pending(&session, &pending("1")).await.unwrap();
        store_pending(&session, &pending("2")).await.unwrap();

        let loaded = load_pending(&session).await.unwrap().unwrap();
        assert_eq!(loaded, pending("2"));
        assert_eq!(session.len().await, 1);
    }

    #[tokio::test]
    async fn pending_is_stored_under_pkce_field_names() {
        let session = MemorySession::new();
        store_pending(&session, &pending("1")).await.unwrap();

        let raw = session.get(PENDING_KEY).await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["pkce_state"], "state-1");
        assert_eq!(json["pkce_verifier"], "verifier-1");
    }

    #[tokio::test]
    async fn unreadable_pending_is_treated_as_absent() {
        let session = MemorySession::new();
        session
            .set(PENDING_KEY, "not json".to_string())
            .await
            .unwrap();

        assert!(load_pending(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn destroy_clears_everything_and_is_idempotent() {
        let session = MemorySession::new();
        store_pending(&session, &pending("1")).await.unwrap();
        session.set("other", "x".into()).await.unwrap();

        session.destroy().await.unwrap();
        assert!(session.is_empty().await);

        session.destroy().await.unwrap();
        assert!(load_pending(&session).await.unwrap().is_none());
    }

    #[test]
    fn debug_redacts_verifier() {
        let debug = format!("{:?}", pending("1"));
        assert!(debug.contains("state-1"));
        assert!(!debug.contains("verifier-1"), "got: {debug}");
    }
}
