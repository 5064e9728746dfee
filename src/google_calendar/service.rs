use super::client::{EventsApi, EventsClient};
use super::flow::InstalledFlow;
use super::models::EventListQuery;
use super::secret::ApplicationSecret;
use super::time::{normalize_time_bound, now_bound};
use super::token::TokenManager;
use crate::config::Config;
use crate::error::{other_error, CalendarResult, Error};
use serde_json::{json, Value};
use tracing::{error, info};

/// Largest page the events endpoint is asked for
pub const MAX_PAGE_SIZE: usize = 100;

/// Event CRUD against one calendar; every result comes back as JSON text
pub struct GoogleCalendarService {
    config: Config,
    scopes: Vec<String>,
    tokens: TokenManager,
    api: Option<Box<dyn EventsApi>>,
    /// False when the events API was injected and authorizes itself
    owns_client: bool,
}

impl GoogleCalendarService {
    pub fn new(config: Config) -> Self {
        let scopes = config.resolved_scopes();
        let tokens = TokenManager::new(config.token_path.clone(), scopes.clone());
        Self {
            config,
            scopes,
            tokens,
            api: None,
            owns_client: true,
        }
    }

    /// Use an already-authorized events API instead of the HTTP client
    pub fn with_api(config: Config, api: Box<dyn EventsApi>) -> Self {
        let mut service = Self::new(config);
        service.api = Some(api);
        service.owns_client = false;
        service
    }

    /// Load or refresh the cached token, falling back to the browser flow
    pub async fn connect(&self) -> CalendarResult<()> {
        if self.tokens.ensure_valid().await? {
            return Ok(());
        }

        info!("No valid token available, starting authorization flow");
        let secret = ApplicationSecret::from_file(&self.config.credentials_path)?;
        let flow = InstalledFlow::new(secret, self.scopes.clone(), self.config.oauth_port);
        let token = flow.run().await?;
        self.tokens.set_token(token).await?;

        info!("Token saved to {}", self.tokens.token_path().display());
        Ok(())
    }

    /// Guard run before every operation; an unusable token sends the user back through the flow
    async fn ensure_authenticated(&mut self) -> CalendarResult<&dyn EventsApi> {
        if self.owns_client {
            self.connect().await?;
        }

        if self.api.is_none() {
            let client = EventsClient::new(self.tokens.clone(), &self.config.api_base_url);
            self.api = Some(Box::new(client));
        }

        self.api
            .as_deref()
            .ok_or_else(|| other_error("Events client unavailable"))
    }

    /// Upcoming events as a JSON array, or `{"message": "no events found"}`
    ///
    /// `limit == 0` collects every page. Time bounds accept ISO-8601; naive
    /// values are read as UTC and unparseable ones are forwarded untouched.
    pub async fn find_many_events(
        &mut self,
        limit: usize,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> String {
        match self.list_events(limit, start_date, end_date).await {
            Ok(events) if events.is_empty() => json!({"message": "no events found"}).to_string(),
            Ok(events) => Value::Array(events).to_string(),
            Err(e) => error_payload("listing events", &e),
        }
    }

    async fn list_events(
        &mut self,
        limit: usize,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> CalendarResult<Vec<Value>> {
        let time_min = match start_date.filter(|s| !s.trim().is_empty()) {
            Some(start) => normalize_time_bound(start),
            None => {
                let now = now_bound();
                info!("no start date provided, using current datetime: {}", now);
                now
            }
        };
        let time_max = end_date
            .filter(|s| !s.trim().is_empty())
            .map(normalize_time_bound);

        let page_size = if limit == 0 {
            MAX_PAGE_SIZE
        } else {
            limit.min(MAX_PAGE_SIZE)
        };
        let mut query = EventListQuery {
            calendar_id: self.config.calendar_id.clone(),
            max_results: page_size as u32,
            single_events: true,
            order_by: Some("startTime".to_string()),
            time_min: Some(time_min),
            time_max,
            page_token: None,
        };

        let api = self.ensure_authenticated().await?;
        let mut events = Vec::new();
        loop {
            let page = api.list(&query).await?;
            events.extend(page.items);

            if limit > 0 && events.len() >= limit {
                events.truncate(limit);
                break;
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => query.page_token = Some(token),
                _ => break,
            }
        }

        Ok(events)
    }

    /// One event resource by id
    pub async fn find_one_event(&mut self, event_id: &str) -> String {
        let calendar_id = self.config.calendar_id.clone();
        let result = match self.ensure_authenticated().await {
            Ok(api) => api.get(&calendar_id, event_id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(event) => event.to_string(),
            Err(e) => error_payload("fetching event", &e),
        }
    }

    /// Insert `event_data` as given and return the created resource
    pub async fn create_event(&mut self, event_data: &Value) -> String {
        let calendar_id = self.config.calendar_id.clone();
        let result = match self.ensure_authenticated().await {
            Ok(api) => api.insert(&calendar_id, event_data).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(event) => {
                let id = event.get("id").and_then(Value::as_str).unwrap_or_default();
                info!("event #{} created successfully", id);
                event.to_string()
            }
            Err(e) => error_payload("creating event", &e),
        }
    }

    /// Replace the event with `updated_data`
    pub async fn update_event(&mut self, event_id: &str, updated_data: &Value) -> String {
        let calendar_id = self.config.calendar_id.clone();
        let result = match self.ensure_authenticated().await {
            Ok(api) => api.update(&calendar_id, event_id, updated_data).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(event) => {
                info!("event #{} updated successfully", event_id);
                event.to_string()
            }
            Err(e) => error_payload("updating event", &e),
        }
    }

    pub async fn remove_event(&mut self, event_id: &str) -> String {
        let calendar_id = self.config.calendar_id.clone();
        let result = match self.ensure_authenticated().await {
            Ok(api) => api.delete(&calendar_id, event_id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("event #{} removed successfully", event_id);
                json!({
                    "success": true,
                    "message": format!("event {} removed successfully", event_id),
                })
                .to_string()
            }
            Err(e) => error_payload("deleting event", &e),
        }
    }
}

fn error_payload(action: &str, err: &Error) -> String {
    error!("an error occurred while {}: {}", action, err);
    json!({ "error": format!("an error occurred: {}", err) }).to_string()
}
