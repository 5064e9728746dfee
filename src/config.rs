use crate::error::{config_error, env_error, CalendarResult};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Read-only access to events
pub const READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
/// Full read/write access to events
pub const WRITE_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Google Calendar REST endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Optional configuration file, relative to the working directory
pub const CONFIG_FILE: &str = "config/calendar.toml";

/// Main configuration structure for the calendar service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// OAuth client secret file downloaded from the Cloud Console
    pub credentials_path: PathBuf,
    /// Cached token file, written after every authorization or refresh
    pub token_path: PathBuf,
    /// Calendar to operate on
    pub calendar_id: String,
    /// Loopback port for the authorization redirect (0 picks a free port)
    pub oauth_port: u16,
    /// Request write access when no explicit scopes are configured
    pub allow_update: bool,
    /// Explicit OAuth scopes; empty means derive from `allow_update`
    pub scopes: Vec<String>,
    /// Base URL of the events API
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            calendar_id: "primary".to_string(),
            oauth_port: 8080,
            allow_update: false,
            scopes: Vec::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

/// Values accepted in `config/calendar.toml`; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    credentials_path: Option<PathBuf>,
    token_path: Option<PathBuf>,
    calendar_id: Option<String>,
    oauth_port: Option<u16>,
    allow_update: Option<bool>,
    scopes: Option<Vec<String>>,
    api_base_url: Option<String>,
}

impl Config {
    /// Load configuration from `.env`, the config file and the environment
    pub fn load() -> CalendarResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let file_content = fs::read_to_string(CONFIG_FILE).ok();
        Self::from_sources(file_content.as_deref(), |key| env::var(key).ok())
    }

    /// Build a config from defaults, optional TOML content and an environment lookup
    pub fn from_sources<F>(file_content: Option<&str>, lookup: F) -> CalendarResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(content) = file_content {
            let file: FileConfig = toml::from_str(content)
                .map_err(|e| config_error(&format!("Invalid {}: {}", CONFIG_FILE, e)))?;
            config.merge_file(file);
        }

        if let Some(path) = lookup("GOOGLE_CREDENTIALS_PATH") {
            config.credentials_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("GOOGLE_TOKEN_PATH") {
            config.token_path = PathBuf::from(path);
        }
        if let Some(calendar_id) = lookup("GOOGLE_CALENDAR_ID") {
            config.calendar_id = calendar_id;
        }
        if let Some(port) = lookup("GOOGLE_OAUTH_PORT") {
            config.oauth_port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| env_error("GOOGLE_OAUTH_PORT"))?;
        }
        if let Some(flag) = lookup("GOOGLE_CALENDAR_ALLOW_UPDATE") {
            config.allow_update = parse_bool(&flag)
                .ok_or_else(|| env_error("GOOGLE_CALENDAR_ALLOW_UPDATE"))?;
        }
        if let Some(scopes) = lookup("GOOGLE_CALENDAR_SCOPES") {
            config.scopes = scopes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if config.calendar_id.trim().is_empty() {
            return Err(config_error("calendar_id must not be empty"));
        }

        Ok(config)
    }

    fn merge_file(&mut self, file: FileConfig) {
        if let Some(v) = file.credentials_path {
            self.credentials_path = v;
        }
        if let Some(v) = file.token_path {
            self.token_path = v;
        }
        if let Some(v) = file.calendar_id {
            self.calendar_id = v;
        }
        if let Some(v) = file.oauth_port {
            self.oauth_port = v;
        }
        if let Some(v) = file.allow_update {
            self.allow_update = v;
        }
        if let Some(v) = file.scopes {
            self.scopes = v;
        }
        if let Some(v) = file.api_base_url {
            self.api_base_url = v;
        }
    }

    /// Scopes to request: explicit ones, or read-only plus write when updates are allowed
    pub fn resolved_scopes(&self) -> Vec<String> {
        if !self.scopes.is_empty() {
            return self.scopes.clone();
        }

        let mut scopes = vec![READ_ONLY_SCOPE.to_string()];
        if self.allow_update {
            scopes.push(WRITE_SCOPE.to_string());
        }
        scopes
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
