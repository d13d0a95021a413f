//! Userinfo retrieval and claim extraction

use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result, Stage};
use crate::provider::ProviderConfig;
use crate::token::{describe_failure, record_duration};

/// Shown in place of a claim the provider did not return.
pub const CLAIM_PLACEHOLDER: &str = "(not present)";

/// Claims returned by the userinfo endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfo(Map<String, Value>);

impl UserInfo {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Claim value as display text.
    ///
    /// Strings are returned as-is; numbers, booleans, arrays and objects as
    /// their JSON text. `null` and empty strings count as absent.
    pub fn claim(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl TryFrom<Value> for UserInfo {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(claims) => Ok(Self(claims)),
            other => Err(Error::UserInfoFetchFailed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// What the success page shows: the configured claim and every claim.
#[derive(Debug, Clone)]
pub struct LoginSummary {
    pub claim_name: String,
    /// Claim value, or [`CLAIM_PLACEHOLDER`].
    pub claim_value: String,
    pub userinfo: UserInfo,
    present: bool,
}

impl LoginSummary {
    pub fn new(userinfo: UserInfo, claim_name: &str) -> Self {
        let claim = userinfo.claim(claim_name);
        let present = claim.is_some();
        Self {
            claim_name: claim_name.to_string(),
            claim_value: claim.unwrap_or_else(|| CLAIM_PLACEHOLDER.to_string()),
            userinfo,
            present,
        }
    }

    /// Whether the provider returned the claim, independent of its value.
    pub fn claim_present(&self) -> bool {
        self.present
    }
}

/// Fetch userinfo with the access token as a bearer credential.
pub async fn fetch_userinfo(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    access_token: &str,
) -> Result<UserInfo> {
    let started = Instant::now();
    let result = client
        .get(provider.userinfo_url.clone())
        .timeout(provider.request_timeout)
        .bearer_auth(access_token)
        .send()
        .await;
    record_duration(Stage::UserInfo, started);

    let response = result.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(Stage::UserInfo)
        } else {
            Error::UserInfoFetchFailed(format!("request failed: {e}"))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = describe_failure(status, &body);
        warn!(%status, detail = %detail, "userinfo endpoint rejected the token");
        return Err(Error::UserInfoFetchFailed(detail));
    }

    let body = response.json::<Value>().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(Stage::UserInfo)
        } else {
            Error::UserInfoFetchFailed(format!("invalid userinfo response: {e}"))
        }
    })?;

    let userinfo = UserInfo::try_from(body)?;
    debug!(claims = userinfo.claims().len(), "userinfo received");
    Ok(userinfo)
}
