//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the state nonce and the code verifier/S256 challenge used to
//! start the authorization flow. The verifier stays in the session and is
//! sent during token exchange; the challenge goes out in the authorization
//! URL so the provider can check that whoever redeems the code is whoever
//! asked for it.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::provider::ProviderConfig;
use crate::random::{encode_url_safe, random_token};
use crate::session::{PendingAuthorization, SessionStore, store_pending};

/// Random bytes behind the state nonce (22 encoded chars).
pub const STATE_BYTES: usize = 16;

/// Random bytes behind the verifier (86 encoded chars, inside RFC 7636's 43-128).
pub const VERIFIER_BYTES: usize = 64;

/// The only challenge method this client uses.
pub const CHALLENGE_METHOD: &str = "S256";

/// A verifier and the challenge derived from it.
#[derive(Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh verifier from the OS RNG.
    pub fn generate() -> Result<Self> {
        Ok(Self::from_verifier(random_token(VERIFIER_BYTES)?))
    }

    /// Rebuild the pair from a known verifier.
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(ASCII(verifier)))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    encode_url_safe(&hash)
}

/// Query parameters of the authorization request, in the order they are sent.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationParams {
    pub response_type: &'static str,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: &'static str,
}

impl AuthorizationParams {
    pub fn new(provider: &ProviderConfig, state: String, challenge: String) -> Self {
        Self {
            response_type: "code",
            client_id: provider.client_id.clone(),
            redirect_uri: provider.redirect_uri.to_string(),
            scope: provider.scope.clone(),
            state,
            code_challenge: challenge,
            code_challenge_method: CHALLENGE_METHOD,
        }
    }

    fn pairs(&self) -> [(&'static str, &str); 7] {
        [
            ("response_type", self.response_type),
            ("client_id", &self.client_id),
            ("redirect_uri", &self.redirect_uri),
            ("scope", &self.scope),
            ("state", &self.state),
            ("code_challenge", &self.code_challenge),
            ("code_challenge_method", self.code_challenge_method),
        ]
    }

    /// Full authorization URL: `base` plus every parameter, form-urlencoded.
    ///
    /// Any query already present on `base` is kept.
    pub fn authorization_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut().extend_pairs(self.pairs());
        url
    }
}

/// Start an authorization request for this session.
///
/// Draws a new state and verifier, writes both into the session (replacing
/// any earlier pending pair, which invalidates its in-flight callback), and
/// returns the parameters for the redirect.
pub async fn begin_authorization<S: SessionStore>(
    session: &S,
    provider: &ProviderConfig,
) -> Result<AuthorizationParams> {
    let state = random_token(STATE_BYTES)?;
    let pair = PkcePair::generate()?;

    store_pending(
        session,
        &PendingAuthorization {
            state: state.clone(),
            verifier: pair.verifier,
        },
    )
    .await?;

    debug!(state = %state, "authorization request prepared");
    Ok(AuthorizationParams::new(provider, state, pair.challenge))
}
