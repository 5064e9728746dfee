use super::oauth::{expiry_after, granted_scopes, http_client, token_error};
use super::secret::ApplicationSecret;
use super::token::StoredToken;
use crate::error::{auth_error, other_error, CalendarResult};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// How long to wait for the browser to come back
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "Authorization successful! You can close this window.";
const FAILURE_PAGE: &str = "Authorization failed. You can close this window.";

/// What a request hitting the loopback listener means for the flow
#[derive(Debug, PartialEq)]
pub enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    /// Unrelated request such as a favicon fetch
    Ignored,
}

/// Classify the request path of a redirect back to the loopback listener
pub fn parse_callback(request_path: &str, expected_state: &str) -> Callback {
    let Ok(url) = Url::parse("http://127.0.0.1").and_then(|base| base.join(request_path)) else {
        return Callback::Ignored;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if code.is_none() && error.is_none() {
        return Callback::Ignored;
    }
    if state.as_deref() != Some(expected_state) {
        return Callback::StateMismatch;
    }
    match (code, error) {
        (_, Some(error)) => Callback::Denied(error),
        (Some(code), None) => Callback::Code(code),
        (None, None) => Callback::Ignored,
    }
}

/// OAuth2 installed-application flow with a loopback redirect
pub struct InstalledFlow {
    secret: ApplicationSecret,
    scopes: Vec<String>,
    port: u16,
}

impl InstalledFlow {
    pub fn new(secret: ApplicationSecret, scopes: Vec<String>, port: u16) -> Self {
        Self {
            secret,
            scopes,
            port,
        }
    }

    /// Consent page URL the user has to visit
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> CalendarResult<Url> {
        let client = BasicClient::new(ClientId::new(self.secret.client_id.clone()))
            .set_auth_uri(AuthUrl::new(self.secret.auth_uri.clone())?)
            .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

        let (url, _) = client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Ok(url)
    }

    /// Run the whole flow: listen, send the user to the consent page, exchange the code
    pub async fn run(&self) -> CalendarResult<StoredToken> {
        let server = tiny_http::Server::http(("127.0.0.1", self.port))
            .map_err(|e| auth_error(&format!("Failed to start callback listener: {}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| auth_error("Callback listener has no TCP address"))?;

        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let state = uuid::Uuid::new_v4().to_string();
        let auth_url = self.authorization_url(&redirect_uri, &state)?;

        println!("Please visit this URL to authorize this application: {}", auth_url);
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            warn!("Could not open a browser: {}", e);
        }

        info!("Waiting for authorization callback on port {}", port);
        let code = tokio::task::spawn_blocking(move || wait_for_code(server, &state))
            .await
            .map_err(|e| other_error(&format!("Callback listener task failed: {}", e)))??;

        self.exchange_code(&code, &redirect_uri).await
    }

    /// Trade an authorization code for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> CalendarResult<StoredToken> {
        let client = BasicClient::new(ClientId::new(self.secret.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secret.client_secret.clone()))
            .set_token_uri(TokenUrl::new(self.secret.token_uri.clone())?)
            .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?)
            .set_auth_type(AuthType::RequestBody);

        let response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&http_client()?)
            .await
            .map_err(token_error)?;

        Ok(StoredToken {
            token: Some(response.access_token().secret().clone()),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            token_uri: self.secret.token_uri.clone(),
            client_id: Some(self.secret.client_id.clone()),
            client_secret: Some(self.secret.client_secret.clone()),
            scopes: granted_scopes(&response).unwrap_or_else(|| self.scopes.clone()),
            expiry: Some(expiry_after(response.expires_in())),
        })
    }
}

fn wait_for_code(server: tiny_http::Server, state: &str) -> CalendarResult<String> {
    let deadline = Instant::now() + CALLBACK_TIMEOUT;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(auth_error("Timed out waiting for the authorization callback"));
        }

        let Some(request) = server.recv_timeout(remaining)? else {
            continue;
        };

        match parse_callback(request.url(), state) {
            Callback::Code(code) => {
                request.respond(tiny_http::Response::from_string(SUCCESS_PAGE))?;
                return Ok(code);
            }
            Callback::Denied(reason) => {
                request.respond(tiny_http::Response::from_string(FAILURE_PAGE))?;
                return Err(auth_error(&format!("Authorization denied: {}", reason)));
            }
            Callback::StateMismatch => {
                request.respond(
                    tiny_http::Response::from_string(FAILURE_PAGE).with_status_code(400),
                )?;
                return Err(auth_error("Authorization callback state mismatch"));
            }
            Callback::Ignored => {
                debug!("Ignoring request to {}", request.url());
                request.respond(tiny_http::Response::empty(404))?;
            }
        }
    }
}
