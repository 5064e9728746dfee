use super::oauth::{expiry_after, granted_scopes, http_client, token_error};
use super::secret::DEFAULT_TOKEN_URI;
use crate::error::{auth_error, CalendarResult};
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{AuthType, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Tokens this close to expiry are treated as expired
const EXPIRY_SKEW_SECS: i64 = 60;

/// Authorized-user token document as persisted in the token file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    /// Access token
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl StoredToken {
    /// Access token present and not about to expire
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.token.as_deref().map_or(true, str::is_empty) {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) > now,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Whether every requested scope was granted to this token
    pub fn covers_scopes(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|s| self.scopes.contains(s))
    }
}

/// Owns the cached token and its file
#[derive(Clone)]
pub struct TokenManager {
    token_path: PathBuf,
    scopes: Vec<String>,
    token: Arc<RwLock<Option<StoredToken>>>,
}

impl TokenManager {
    pub fn new(token_path: impl Into<PathBuf>, scopes: Vec<String>) -> Self {
        Self {
            token_path: token_path.into(),
            scopes,
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Snapshot of the cached token
    pub async fn current(&self) -> Option<StoredToken> {
        self.token.read().await.clone()
    }

    /// Read the token file into the cache; returns whether a usable document was found
    pub async fn load(&self) -> CalendarResult<bool> {
        if !self.token_path.exists() {
            debug!("No token file at {}", self.token_path.display());
            return Ok(false);
        }

        let content = fs::read_to_string(&self.token_path)?;
        let token: StoredToken = match serde_json::from_str(&content) {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    "Ignoring unreadable token file {}: {}",
                    self.token_path.display(),
                    e
                );
                return Ok(false);
            }
        };

        if !token.covers_scopes(&self.scopes) {
            info!("Stored token does not grant the requested scopes, authorization required");
            return Ok(false);
        }

        *self.token.write().await = Some(token);
        Ok(true)
    }

    /// Load and refresh as needed; returns whether a valid token is cached afterwards
    pub async fn ensure_valid(&self) -> CalendarResult<bool> {
        if self.current().await.is_some_and(|t| t.is_valid()) {
            return Ok(true);
        }

        if !self.load().await? {
            return Ok(false);
        }

        let Some(token) = self.current().await else {
            return Ok(false);
        };
        if token.is_valid() {
            return Ok(true);
        }
        if !token.can_refresh() {
            return Ok(false);
        }

        match self.refresh(&token).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Access token for the next request, refreshing an expired one
    pub async fn access_token(&self) -> CalendarResult<String> {
        let token = self
            .current()
            .await
            .ok_or_else(|| auth_error("No token loaded. Run the authorization flow first."))?;

        let token = if token.is_valid() {
            token
        } else if token.can_refresh() {
            self.refresh(&token).await?
        } else {
            return Err(auth_error("Token expired and cannot be refreshed"));
        };

        token
            .token
            .ok_or_else(|| auth_error("Token has no access token"))
    }

    /// Exchange the refresh token for a new access token and persist the result
    pub async fn refresh(&self, token: &StoredToken) -> CalendarResult<StoredToken> {
        let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
            token.refresh_token.as_deref(),
            token.client_id.as_deref(),
            token.client_secret.as_deref(),
        ) else {
            return Err(auth_error("Token is missing refresh credentials"));
        };

        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_token_uri(TokenUrl::new(token.token_uri.clone())?)
            .set_auth_type(AuthType::RequestBody);

        info!("Refreshing Google Calendar access token");
        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client()?)
            .await
            .map_err(token_error)?;

        let mut refreshed = token.clone();
        refreshed.expiry = Some(expiry_after(response.expires_in()));
        if let Some(scopes) = granted_scopes(&response) {
            refreshed.scopes = scopes;
        }
        // Google only rotates the refresh token occasionally
        if let Some(new_refresh) = response.refresh_token() {
            refreshed.refresh_token = Some(new_refresh.secret().clone());
        }
        refreshed.token = Some(response.access_token().secret().clone());

        self.set_token(refreshed.clone()).await?;
        Ok(refreshed)
    }

    /// Cache a token and write it to the token file
    pub async fn set_token(&self, token: StoredToken) -> CalendarResult<()> {
        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&token)?;
        fs::write(&self.token_path, json)?;
        debug!("Token written to {}", self.token_path.display());

        *self.token.write().await = Some(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{READ_ONLY_SCOPE, WRITE_SCOPE};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(expiry: Option<DateTime<Utc>>, token_uri: &str) -> StoredToken {
        StoredToken {
            token: Some("access".to_string()),
            refresh_token: Some("refresh".to_string()),
            token_uri: token_uri.to_string(),
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            scopes: vec![READ_ONLY_SCOPE.to_string()],
            expiry,
        }
    }

    #[test]
    fn validity_respects_expiry_skew() {
        let now = Utc::now();
        assert!(token(None, DEFAULT_TOKEN_URI).is_valid_at(now));
        assert!(token(Some(now + Duration::hours(1)), DEFAULT_TOKEN_URI).is_valid_at(now));
        assert!(!token(Some(now + Duration::seconds(10)), DEFAULT_TOKEN_URI).is_valid_at(now));

        let mut empty = token(None, DEFAULT_TOKEN_URI);
        empty.token = None;
        assert!(!empty.is_valid_at(now));
    }

    #[test]
    fn reads_authorized_user_documents() {
        let doc = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "shh",
            "scopes": ["https://www.googleapis.com/auth/calendar"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2030-09-06T13:00:00.123456Z"
        }"#;
        let token: StoredToken = serde_json::from_str(doc).unwrap();

        assert_eq!(token.token.as_deref(), Some("ya29.a0"));
        assert!(token.can_refresh());
        assert!(token.covers_scopes(&[WRITE_SCOPE.to_string()]));
        assert!(!token.covers_scopes(&[READ_ONLY_SCOPE.to_string()]));
    }

    #[tokio::test]
    async fn load_skips_tokens_missing_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(
            &path,
            serde_json::to_string(&token(None, DEFAULT_TOKEN_URI)).unwrap(),
        )
        .unwrap();

        let manager = TokenManager::new(&path, vec![WRITE_SCOPE.to_string()]);
        assert!(!manager.load().await.unwrap());
        assert!(manager.current().await.is_none());

        let manager = TokenManager::new(&path, vec![READ_ONLY_SCOPE.to_string()]);
        assert!(manager.load().await.unwrap());
        assert_eq!(manager.access_token().await.unwrap(), "access");
    }

    #[tokio::test]
    async fn missing_file_means_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TokenManager::new(dir.path().join("token.json"), Vec::new());

        assert!(!manager.ensure_valid().await.unwrap());
        assert!(manager.access_token().await.is_err());
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_saved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh"))
            .and(body_string_contains("client_id=client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let expired = token(
            Some(Utc::now() - Duration::minutes(5)),
            &format!("{}/token", server.uri()),
        );

        let manager = TokenManager::new(&path, vec![READ_ONLY_SCOPE.to_string()]);
        manager.set_token(expired).await.unwrap();

        let fresh = TokenManager::new(&path, vec![READ_ONLY_SCOPE.to_string()]);
        assert!(fresh.ensure_valid().await.unwrap());
        assert_eq!(fresh.access_token().await.unwrap(), "fresh");

        let saved: StoredToken =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.token.as_deref(), Some("fresh"));
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh"));
        assert!(saved.is_valid());
    }

    #[tokio::test]
    async fn failed_refresh_reports_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let expired = token(
            Some(Utc::now() - Duration::minutes(5)),
            &format!("{}/token", server.uri()),
        );
        fs::write(&path, serde_json::to_string(&expired).unwrap()).unwrap();

        let manager = TokenManager::new(&path, vec![READ_ONLY_SCOPE.to_string()]);
        assert!(!manager.ensure_valid().await.unwrap());

        let err = manager.access_token().await.unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
    }
}
