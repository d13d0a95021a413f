//! OAuth2 authorization code + PKCE client flow
//!
//! Protocol core of the login demo. No dependency on the web framework or
//! the session backend: the service hands in a [`SessionStore`] and a
//! [`ProviderConfig`], this crate does the rest.
//!
//! Flow:
//! 1. `/login` calls `pkce::begin_authorization()` and redirects to
//!    `AuthorizationParams::authorization_url()`
//! 2. The provider sends the browser back to `/callback?code=..&state=..`
//! 3. `callback::handle_callback()` validates state, calls
//!    `token::exchange_code()` then `userinfo::fetch_userinfo()`
//! 4. `/logout` calls `logout::logout()` and redirects to the provider

pub mod callback;
pub mod error;
pub mod logout;
pub mod pkce;
pub mod provider;
pub mod random;
pub mod session;
pub mod token;
pub mod userinfo;

pub use callback::{CallbackQuery, handle_callback};
pub use error::{Error, Result, Stage};
pub use logout::{build_logout_url, logout};
pub use pkce::{AuthorizationParams, PkcePair, begin_authorization, compute_challenge};
pub use provider::ProviderConfig;
pub use random::{encode_url_safe, random_token};
pub use session::{MemorySession, PendingAuthorization, SessionStore};
pub use token::{TokenResponse, exchange_code};
pub use userinfo::{CLAIM_PLACEHOLDER, LoginSummary, UserInfo, fetch_userinfo};
