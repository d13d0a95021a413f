//! HTML pages
//!
//! Everything interpolated here goes through maud's escaping, including
//! claim values and the raw userinfo JSON.

use maud::{DOCTYPE, Markup, html};
use pkce_auth::LoginSummary;

fn layout(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
            }
            body { (body) }
        }
    }
}

/// Landing page when no static directory is configured.
pub fn index() -> Markup {
    layout(
        "PKCE login demo",
        html! {
            h1 { "PKCE login demo" }
            p { a href="/login" { "Log in" } }
            p { a href="/logout" { "Log out" } }
        },
    )
}

pub fn login_success(summary: &LoginSummary) -> Markup {
    layout(
        "Login success",
        html! {
            h2 { "Login Success" }
            p {
                b { (summary.claim_name) ": " }
                (summary.claim_value)
            }
            pre { (summary.userinfo.to_pretty_json()) }
            p { a href="/logout" { "Log out" } }
        },
    )
}

/// Short failure page. Only the user-safe message is shown.
pub fn error(message: &str) -> Markup {
    layout(
        "Login failed",
        html! {
            h2 { "Login failed" }
            p { (message) }
            p { a href="/login" { "Try again" } }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkce_auth::UserInfo;
    use serde_json::json;

    fn summary(claims: serde_json::Value, claim: &str) -> LoginSummary {
        LoginSummary::new(UserInfo::try_from(claims).unwrap(), claim)
    }

    #[test]
    fn success_page_shows_claim_and_userinfo() {
        let page = login_success(&summary(
            json!({"sub": "user-1", "custom_claim": "REG-42"}),
            "custom_claim",
        ))
        .into_string();

        assert!(page.contains("Login Success"));
        assert!(page.contains("custom_claim: "));
        assert!(page.contains("REG-42"));
        assert!(page.contains("user-1"));
    }

    #[test]
    fn success_page_escapes_provider_values() {
        let page = login_success(&summary(
            json!({"custom_claim": "<script>alert(1)</script>"}),
            "custom_claim",
        ))
        .into_string();

        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn success_page_shows_placeholder_for_missing_claim() {
        let page = login_success(&summary(json!({"sub": "user-1"}), "custom_claim")).into_string();
        assert!(page.contains(pkce_auth::CLAIM_PLACEHOLDER));
    }

    #[test]
    fn error_page_contains_message() {
        let page = error("Invalid state or missing code").into_string();
        assert!(page.contains("Invalid state or missing code"));
        assert!(page.contains("href=\"/login\""));
    }

    #[test]
    fn index_links_to_login() {
        assert!(index().into_string().contains("href=\"/login\""));
    }
}
