//! Identity provider registration
//!
//! Everything the flow needs to know about the provider and about this
//! client: the four endpoints, the public client id, and where the provider
//! should send the browser back to. Built once at startup by the service and
//! shared (read-only) by every request.

use std::time::Duration;

use url::Url;

/// Claim read from the userinfo payload when none is configured.
pub const DEFAULT_CLAIM: &str = "aws_workspaces_regcode";

/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "openid";

/// Timeout applied to each outbound provider call when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Provider endpoints plus this client's registration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub authorization_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    pub logout_url: Url,
    /// Public client id; PKCE replaces the client secret.
    pub client_id: String,
    /// Space-separated scope string, sent verbatim.
    pub scope: String,
    pub redirect_uri: Url,
    pub post_logout_redirect_uri: Url,
    /// Userinfo claim shown on the success page.
    pub claim: String,
    /// Applied separately to the token call and the userinfo call.
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// Registration with default scope, claim and timeout.
    pub fn new(
        authorization_url: Url,
        token_url: Url,
        userinfo_url: Url,
        logout_url: Url,
        client_id: impl Into<String>,
        redirect_uri: Url,
        post_logout_redirect_uri: Url,
    ) -> Self {
        Self {
            authorization_url,
            token_url,
            userinfo_url,
            logout_url,
            client_id: client_id.into(),
            scope: DEFAULT_SCOPE.to_string(),
            redirect_uri,
            post_logout_redirect_uri,
            claim: DEFAULT_CLAIM.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Point every endpoint at one base URL (`/authorize`, `/token`,
    /// `/userinfo`, `/logout`). Handy for local mock providers.
    pub fn for_base_url(base: &Url, client_id: impl Into<String>, redirect_uri: Url) -> Self {
        let endpoint = |path: &str| {
            let mut url = base.clone();
            url.set_path(path);
            url
        };
        let mut post_logout = redirect_uri.clone();
        post_logout.set_path("/");
        post_logout.set_query(None);

        Self::new(
            endpoint("/authorize"),
            endpoint("/token"),
            endpoint("/userinfo"),
            endpoint("/logout"),
            client_id,
            redirect_uri,
            post_logout,
        )
    }
}
