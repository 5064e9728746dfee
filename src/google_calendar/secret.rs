use crate::error::{credentials_error, CalendarResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client identity from the Cloud Console client secret file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApplicationSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct SecretFile {
    installed: Option<ApplicationSecret>,
    web: Option<ApplicationSecret>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ApplicationSecret {
    /// Read a client secret file, accepting either an `installed` or a `web` client
    pub fn from_file(path: &Path) -> CalendarResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            credentials_error(&format!(
                "Failed to read client secret file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> CalendarResult<Self> {
        let file: SecretFile = serde_json::from_str(content)
            .map_err(|e| credentials_error(&format!("Malformed client secret file: {}", e)))?;

        file.installed.or(file.web).ok_or_else(|| {
            credentials_error("Client secret file has no 'installed' or 'web' client")
        })
    }
}
