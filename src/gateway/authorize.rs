//! Account-linking login page.
//!
//! The platform opens `/authorize?account_linking_token=..&redirect_uri=..`
//! in a webview. The page offers a single link back to `redirect_uri` with the
//! authorization code appended, which completes the link.

use super::AppState;
use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

#[derive(Debug, Default, serde::Deserialize)]
pub struct AuthorizeQuery {
    pub account_linking_token: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Template)]
#[template(path = "authorize.html", escape = "html")]
pub struct AuthorizePage<'a> {
    pub account_linking_token: &'a str,
    pub redirect_uri: &'a str,
    pub success_uri: &'a str,
}

/// `redirect_uri` with `&authorization_code=<code>` appended.
pub fn success_redirect(redirect_uri: &str, authorization_code: &str) -> String {
    format!("{redirect_uri}&authorization_code={authorization_code}")
}

/// GET /authorize
pub async fn handle_authorize(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeQuery>,
) -> Response {
    let Some(redirect_uri) = params
        .redirect_uri
        .as_deref()
        .map(str::trim)
        .filter(|uri| !uri.is_empty())
    else {
        tracing::warn!("Authorize request without redirect_uri");
        return (StatusCode::BAD_REQUEST, "Missing redirect_uri").into_response();
    };

    let success_uri = success_redirect(redirect_uri, &state.config.authorize.authorization_code);
    let page = AuthorizePage {
        account_linking_token: params.account_linking_token.as_deref().unwrap_or(""),
        redirect_uri,
        success_uri: &success_uri,
    };
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render authorize page: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_redirect_appends_code() {
        assert_eq!(
            success_redirect("https://example.com/cb?state=1", "1234567890"),
            "https://example.com/cb?state=1&authorization_code=1234567890"
        );
    }

    #[test]
    fn page_escapes_values() {
        let page = AuthorizePage {
            account_linking_token: "<script>alert(1)</script>",
            redirect_uri: "https://example.com/cb?a=1&b=2",
            success_uri: "https://example.com/cb?a=1&b=2&authorization_code=1",
        }
        .render()
        .unwrap();
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains(r#"href="https://example.com/cb?a=1&amp;b=2&amp;authorization_code=1""#));
    }
}
