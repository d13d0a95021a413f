//! Callback exchanger state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! [`handle_callback`] executes the I/O implied by each action and feeds the
//! outcome back in as the next event.
//!
//! ```text
//! AwaitingCallback -> ValidatingState -> ExchangingToken -> FetchingUserInfo -> Complete
//!        \__________________\_________________\___________________\__________-> Aborted
//! ```
//!
//! Every transition moves forward. Nothing is retried inside one callback;
//! after `Aborted` the user has to start again from `/login`.

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use common::Secret;

use crate::error::{Error, Result};
use crate::provider::ProviderConfig;
use crate::session::{PENDING_KEY, PendingAuthorization, SessionStore, load_pending};
use crate::token::{TokenResponse, exchange_code};
use crate::userinfo::{LoginSummary, UserInfo, fetch_userinfo};

/// Query string the provider redirects back with.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the user or provider refused (RFC 6749 4.1.2.1)
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Callback progress.
///
/// Variants carry what the next step needs and nothing more.
#[derive(Debug)]
pub enum CallbackState {
    AwaitingCallback,
    ValidatingState {
        code: String,
        returned_state: String,
    },
    ExchangingToken,
    FetchingUserInfo,
    Complete,
    Aborted,
}

impl CallbackState {
    pub fn name(&self) -> &'static str {
        match self {
            CallbackState::AwaitingCallback => "awaiting_callback",
            CallbackState::ValidatingState { .. } => "validating_state",
            CallbackState::ExchangingToken => "exchanging_token",
            CallbackState::FetchingUserInfo => "fetching_userinfo",
            CallbackState::Complete => "complete",
            CallbackState::Aborted => "aborted",
        }
    }
}

/// Events that drive transitions.
#[derive(Debug)]
pub enum CallbackEvent {
    /// Browser arrived at the callback URL
    Received(CallbackQuery),
    /// Session lookup finished
    PendingLoaded(Option<PendingAuthorization>),
    /// Token endpoint issued an access token
    TokenIssued(TokenResponse),
    /// Userinfo endpoint answered
    UserInfoFetched(UserInfo),
    /// The action in progress failed
    Failed(Error),
}

/// Actions the driver should execute after a transition.
#[derive(Debug)]
pub enum CallbackAction {
    /// Read the pending pair from the session
    LoadPending,
    /// Consume the pending pair and redeem the code
    ExchangeCode { code: String, verifier: String },
    /// Call userinfo with the access token
    FetchUserInfo { access_token: Secret<String> },
    /// Terminal: hand the outcome back to the caller
    Finish(Result<UserInfo>),
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: CallbackState, event: CallbackEvent) -> (CallbackState, CallbackAction) {
    match (state, event) {
        // --- AwaitingCallback ---
        (
            CallbackState::AwaitingCallback,
            CallbackEvent::Received(CallbackQuery {
                error: Some(error),
                error_description,
                ..
            }),
        ) => abort(Error::AuthorizationDenied {
            error,
            description: error_description,
        }),

        (CallbackState::AwaitingCallback, CallbackEvent::Received(query)) => {
            match (query.code, query.state) {
                (Some(code), Some(returned_state)) if !code.is_empty() && !returned_state.is_empty() => (
                    CallbackState::ValidatingState {
                        code,
                        returned_state,
                    },
                    CallbackAction::LoadPending,
                ),
                (code, _) if code.as_deref().is_none_or(str::is_empty) => {
                    abort(Error::MissingParameter("code"))
                }
                _ => abort(Error::MissingParameter("state")),
            }
        }

        // --- ValidatingState ---
        (
            CallbackState::ValidatingState {
                code,
                returned_state,
            },
            CallbackEvent::PendingLoaded(Some(pending)),
        ) if pending.state == returned_state => (
            CallbackState::ExchangingToken,
            CallbackAction::ExchangeCode {
                code,
                verifier: pending.verifier,
            },
        ),

        (CallbackState::ValidatingState { .. }, CallbackEvent::PendingLoaded(_)) => {
            abort(Error::StateMismatch)
        }

        // --- ExchangingToken ---
        (CallbackState::ExchangingToken, CallbackEvent::TokenIssued(token)) => (
            CallbackState::FetchingUserInfo,
            CallbackAction::FetchUserInfo {
                access_token: token.access_token,
            },
        ),

        // --- FetchingUserInfo ---
        (CallbackState::FetchingUserInfo, CallbackEvent::UserInfoFetched(userinfo)) => (
            CallbackState::Complete,
            CallbackAction::Finish(Ok(userinfo)),
        ),

        // --- Any in-flight state + failure = abort ---
        (_, CallbackEvent::Failed(error)) => abort(error),

        // --- Invalid transition: abort rather than stall ---
        (state, _event) => abort(Error::OutOfOrder(state.name())),
    }
}

fn abort(error: Error) -> (CallbackState, CallbackAction) {
    (CallbackState::Aborted, CallbackAction::Finish(Err(error)))
}

/// Run the whole callback: validate, exchange, fetch, summarize.
///
/// The pending pair is removed from the session as soon as its state has
/// matched, so the same callback URL cannot be replayed. A mismatching
/// callback leaves the pending pair alone; the genuine redirect can still
/// complete.
#[instrument(skip_all, fields(stage = tracing::field::Empty))]
pub async fn handle_callback<S: SessionStore>(
    http: &reqwest::Client,
    provider: &ProviderConfig,
    session: &S,
    query: CallbackQuery,
) -> Result<LoginSummary> {
    let mut state = CallbackState::AwaitingCallback;
    let mut event = CallbackEvent::Received(query);

    let outcome = loop {
        let (next, action) = handle_event(state, event);
        state = next;
        tracing::Span::current().record("stage", state.name());
        debug!(stage = state.name(), "callback transition");

        event = match action {
            CallbackAction::LoadPending => match load_pending(session).await {
                Ok(pending) => CallbackEvent::PendingLoaded(pending),
                Err(e) => CallbackEvent::Failed(e),
            },
            CallbackAction::ExchangeCode { code, verifier } => {
                if let Err(e) = session.remove(PENDING_KEY).await {
                    CallbackEvent::Failed(e)
                } else {
                    match exchange_code(http, provider, &code, &verifier).await {
                        Ok(token) => CallbackEvent::TokenIssued(token),
                        Err(e) => CallbackEvent::Failed(e),
                    }
                }
            }
            CallbackAction::FetchUserInfo { access_token } => {
                match fetch_userinfo(http, provider, access_token.expose()).await {
                    Ok(userinfo) => CallbackEvent::UserInfoFetched(userinfo),
                    Err(e) => CallbackEvent::Failed(e),
                }
            }
            CallbackAction::Finish(outcome) => break outcome,
        };
    };

    match outcome {
        Ok(userinfo) => {
            let summary = LoginSummary::new(userinfo, &provider.claim);
            info!(
                claim = %summary.claim_name,
                claim_present = summary.claim_present(),
                "login completed"
            );
            Ok(summary)
        }
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "callback aborted");
            Err(e)
        }
    }
}
