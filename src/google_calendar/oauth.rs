//! Pieces of the `oauth2` token requests shared by the installed flow and refresh.

use crate::error::{auth_error, CalendarResult, Error};
use chrono::{DateTime, TimeDelta, Utc};
use oauth2::basic::{BasicErrorResponse, BasicTokenResponse};
use oauth2::{RequestTokenError, TokenResponse};
use std::time::Duration;

/// Lifetime assumed when the token endpoint omits or garbles `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Client for token endpoint calls; redirects are not followed
pub(crate) fn http_client() -> CalendarResult<reqwest::Client> {
    let client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    Ok(client)
}

/// Absolute expiry for a token issued now
pub(crate) fn expiry_after(expires_in: Option<Duration>) -> DateTime<Utc> {
    let now = Utc::now();
    expires_in
        .and_then(|lifetime| i64::try_from(lifetime.as_secs()).ok())
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or_else(|| now + TimeDelta::seconds(DEFAULT_EXPIRES_IN_SECS))
}

/// Scopes the server reported granting, if it listed them
pub(crate) fn granted_scopes(response: &BasicTokenResponse) -> Option<Vec<String>> {
    response
        .scopes()
        .map(|scopes| scopes.iter().map(|scope| scope.to_string()).collect())
}

/// Flatten a failed token request into an auth error, keeping the OAuth error code
pub(crate) fn token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> Error
where
    RE: std::error::Error + 'static,
{
    let detail = match err {
        RequestTokenError::ServerResponse(response) => match response.error_description() {
            Some(description) => format!("{}: {}", response.error(), description),
            None => response.error().to_string(),
        },
        RequestTokenError::Request(e) => format!("failed to reach token endpoint: {}", e),
        RequestTokenError::Parse(e, _) => format!("unreadable token response: {}", e),
        RequestTokenError::Other(message) => message,
    };
    auth_error(&format!("Token request failed: {}", detail))
}
