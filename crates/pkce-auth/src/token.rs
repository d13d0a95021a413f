//! Authorization code exchange
//!
//! POSTs the authorization code and the PKCE verifier to the provider's token
//! endpoint. The provider hashes the verifier, compares it with the challenge
//! it saw on the authorization request, and only then issues a token. No
//! client secret is involved.

use std::time::Instant;

use common::Secret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result, Stage};
use crate::provider::ProviderConfig;

/// Response from the token endpoint.
///
/// Only `access_token` is required; the rest is recorded when present.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Secret<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body defined by RFC 6749 section 5.2.
#[derive(Debug, Deserialize)]
pub(crate) struct ProviderError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Describe a non-2xx provider response without echoing the raw body.
pub(crate) fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ProviderError>(body) {
        Ok(ProviderError {
            error,
            error_description: Some(description),
        }) => format!("provider returned {status}: {error} ({description})"),
        Ok(ProviderError { error, .. }) => format!("provider returned {status}: {error}"),
        Err(_) => format!("provider returned {status}"),
    }
}

pub(crate) fn record_duration(stage: Stage, started: Instant) {
    metrics::histogram!("pkce_provider_request_duration_seconds", "stage" => stage.as_str())
        .record(started.elapsed().as_secs_f64());
}

/// Exchange an authorization code for an access token.
///
/// Transport errors, non-2xx statuses and unparseable bodies all become
/// [`Error::TokenExchangeFailed`]; a timeout becomes
/// [`Error::Timeout`]`(Stage::TokenExchange)`.
pub async fn exchange_code(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let started = Instant::now();
    let result = client
        .post(provider.token_url.clone())
        .timeout(provider.request_timeout)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", provider.redirect_uri.as_str()),
            ("client_id", provider.client_id.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await;
    record_duration(Stage::TokenExchange, started);

    let response = result.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(Stage::TokenExchange)
        } else {
            Error::TokenExchangeFailed(format!("request failed: {e}"))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = describe_failure(status, &body);
        warn!(%status, detail = %detail, "token endpoint rejected the exchange");
        return Err(Error::TokenExchangeFailed(detail));
    }

    let token = response.json::<TokenResponse>().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(Stage::TokenExchange)
        } else {
            Error::TokenExchangeFailed(format!("invalid token response: {e}"))
        }
    })?;

    debug!(
        token_type = token.token_type.as_deref().unwrap_or("unspecified"),
        expires_in = ?token.expires_in,
        "access token issued"
    );
    Ok(token)
}
