//! Logout coordination
//!
//! The local session is destroyed first and only then is the provider logout
//! URL handed back. A cookie replayed after logout therefore finds no pending
//! PKCE state to resurrect.

use tracing::info;
use url::Url;

use crate::error::Result;
use crate::provider::ProviderConfig;
use crate::session::SessionStore;

/// Provider logout URL carrying `client_id` and `post_logout_redirect_uri`.
///
/// Both parameters replace any value of the same name already on the
/// configured logout URL; other query parameters are kept.
pub fn build_logout_url(provider: &ProviderConfig) -> Url {
    set_query_params(
        &provider.logout_url,
        &[
            ("client_id", provider.client_id.as_str()),
            (
                "post_logout_redirect_uri",
                provider.post_logout_redirect_uri.as_str(),
            ),
        ],
    )
}

fn set_query_params(base: &Url, params: &[(&str, &str)]) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| !params.iter().any(|(name, _)| k == name))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_query(None);
    if !kept.is_empty() || !params.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(kept)
            .extend_pairs(params.iter().copied());
    }
    url
}

/// Destroy the session, then return where to send the browser.
///
/// Works the same whether or not the session still exists.
pub async fn logout<S: SessionStore>(session: &S, provider: &ProviderConfig) -> Result<Url> {
    session.destroy().await?;
    info!("session destroyed");
    Ok(build_logout_url(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkce::begin_authorization;
    use crate::session::{MemorySession, load_pending};
    use std::collections::HashMap;

    fn test_provider(logout_url: &str) -> ProviderConfig {
        let mut provider = ProviderConfig::for_base_url(
            &Url::parse("https://idp.example.com").unwrap(),
            "demo-client",
            Url::parse("https://localhost:8080/callback").unwrap(),
        );
        provider.logout_url = Url::parse(logout_url).unwrap();
        provider
    }

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn logout_url_carries_client_and_return_address() {
        let url = build_logout_url(&test_provider("https://idp.example.com/logout"));

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.path(), "/logout");
        let query = query_map(&url);
        assert_eq!(query["client_id"], "demo-client");
        assert_eq!(query["post_logout_redirect_uri"], "https://localhost:8080/");
        assert!(Url::parse(&query["post_logout_redirect_uri"]).is_ok());
    }

    #[test]
    fn logout_url_replaces_existing_values_and_keeps_others() {
        let url = build_logout_url(&test_provider(
            "https://idp.example.com/logout?client_id=stale&federated=1",
        ));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let client_ids: Vec<_> = pairs.iter().filter(|(k, _)| k == "client_id").collect();
        assert_eq!(client_ids.len(), 1);
        assert_eq!(client_ids[0].1, "demo-client");
        assert_eq!(query_map(&url)["federated"], "1");
    }

    #[tokio::test]
    async fn logout_destroys_pending_state() {
        let provider = test_provider("https://idp.example.com/logout");
        let session = MemorySession::new();
        begin_authorization(&session, &provider).await.unwrap();

        let url = logout(&session, &provider).await.unwrap();
        assert!(session.is_empty().await);
        assert!(load_pending(&session).await.unwrap().is_none());
        assert_eq!(query_map(&url)["client_id"], "demo-client");
    }

    #[tokio::test]
    async fn logout_without_session_still_redirects() {
        let provider = test_provider("https://idp.example.com/logout");
        let session = MemorySession::new();

        let first = logout(&session, &provider).await.unwrap();
        let second = logout(&session, &provider).await.unwrap();
        assert_eq!(first, second);
        assert!(second.as_str().starts_with("https://idp.example.com/logout?"));
    }
}
