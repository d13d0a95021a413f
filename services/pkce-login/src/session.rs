//! Cookie-backed sessions
//!
//! Adapts `tower_sessions::Session` to the flow's [`SessionStore`] and
//! builds the signing key for the session cookie.

use pkce_auth::SessionStore;
use sha2::{Digest, Sha512};
use tower_sessions::Session;
use tower_sessions::cookie::Key;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "pkce_login.sid";

/// Signing key derived from the configured secret.
///
/// SHA-512 stretches a secret of any length to the 64 bytes the cookie
/// signer requires.
pub fn signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// One browser's session, as seen by the authorization flow.
#[derive(Debug, Clone)]
pub struct CookieSession(Session);

impl CookieSession {
    pub fn new(session: Session) -> Self {
        Self(session)
    }
}

fn session_error(e: tower_sessions::session::Error) -> pkce_auth::Error {
    pkce_auth::Error::Session(e.to_string())
}

impl SessionStore for CookieSession {
    async fn get(&self, key: &str) -> pkce_auth::Result<Option<String>> {
        self.0.get::<String>(key).await.map_err(session_error)
    }

    async fn set(&self, key: &str, value: String) -> pkce_auth::Result<()> {
        self.0.insert(key, value).await.map_err(session_error)
    }

    async fn remove(&self, key: &str) -> pkce_auth::Result<Option<String>> {
        self.0.remove::<String>(key).await.map_err(session_error)
    }

    async fn destroy(&self) -> pkce_auth::Result<()> {
        self.0.flush().await.map_err(session_error)
    }
}
