//! Error types for the PKCE authorization flow

use std::fmt;

/// Provider round-trip a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TokenExchange,
    UserInfo,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::TokenExchange => "token_exchange",
            Stage::UserInfo => "userinfo",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::TokenExchange => write!(f, "token exchange"),
            Stage::UserInfo => write!(f, "userinfo request"),
        }
    }
}

/// Errors from the authorization flow.
///
/// Messages carry provider error codes and HTTP statuses only. Verifiers,
/// codes and tokens are never formatted into an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("system entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("missing callback parameter: {0}")]
    MissingParameter(&'static str),

    #[error("callback state does not match the pending authorization request")]
    StateMismatch,

    #[error("provider denied authorization: {error}{}", parenthesized(.description))]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("userinfo fetch failed: {0}")]
    UserInfoFetchFailed(String),

    #[error("{0} timed out")]
    Timeout(Stage),

    #[error("session store error: {0}")]
    Session(String),

    #[error("callback event arrived out of order while {0}")]
    OutOfOrder(&'static str),
}

impl Error {
    /// HTTP status the web layer should answer with.
    ///
    /// Validation failures are the caller's fault (400). Provider failures,
    /// timeouts included, are ours (500); `kind()` still tells them apart.
    pub fn status(&self) -> u16 {
        match self {
            Error::MissingParameter(_)
            | Error::StateMismatch
            | Error::AuthorizationDenied { .. } => 400,
            Error::EntropyUnavailable(_)
            | Error::TokenExchangeFailed(_)
            | Error::UserInfoFetchFailed(_)
            | Error::Timeout(_)
            | Error::Session(_)
            | Error::OutOfOrder(_) => 500,
        }
    }

    /// Stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::EntropyUnavailable(_) => "entropy_unavailable",
            Error::MissingParameter(_) => "missing_parameter",
            Error::StateMismatch => "state_mismatch",
            Error::AuthorizationDenied { .. } => "authorization_denied",
            Error::TokenExchangeFailed(_) => "token_exchange_failed",
            Error::UserInfoFetchFailed(_) => "userinfo_fetch_failed",
            Error::Timeout(Stage::TokenExchange) => "token_exchange_timeout",
            Error::Timeout(Stage::UserInfo) => "userinfo_timeout",
            Error::Session(_) => "session_error",
            Error::OutOfOrder(_) => "out_of_order",
        }
    }

    /// Short text that is safe to show to the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::MissingParameter(_) | Error::StateMismatch => "Invalid state or missing code",
            Error::AuthorizationDenied { .. } => "Authorization was denied by the identity provider",
            Error::TokenExchangeFailed(_) | Error::UserInfoFetchFailed(_) => {
                "Token/UserInfo call failed"
            }
            Error::Timeout(_) => "The identity provider did not answer in time",
            Error::EntropyUnavailable(_) | Error::Session(_) | Error::OutOfOrder(_) => {
                "Login could not be completed"
            }
        }
    }
}

fn parenthesized(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
