//! Events endpoints of the Google Calendar REST API.

use super::models::{EventListQuery, EventPage};
use super::token::TokenManager;
use crate::error::{CalendarResult, Error};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// The five `events.*` methods the service forwards to
#[async_trait]
pub trait EventsApi: Send + Sync {
    async fn list(&self, query: &EventListQuery) -> CalendarResult<EventPage>;

    async fn get(&self, calendar_id: &str, event_id: &str) -> CalendarResult<Value>;

    async fn insert(&self, calendar_id: &str, body: &Value) -> CalendarResult<Value>;

    async fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &Value,
    ) -> CalendarResult<Value>;

    async fn delete(&self, calendar_id: &str, event_id: &str) -> CalendarResult<()>;
}

/// HTTP implementation authorized by a [`TokenManager`]
pub struct EventsClient {
    client: Client,
    tokens: TokenManager,
    base_url: String,
}

impl EventsClient {
    pub fn new(tokens: TokenManager, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            tokens,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/calendars/{calendar_id}/events[/{event_id}]` with encoded segments
    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> CalendarResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Other(format!("Invalid API base URL: {}", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(["calendars", calendar_id, "events"]);
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> CalendarResult<Response> {
        let access_token = self.tokens.access_token().await?;
        debug!("{} {}", method, url.path());

        let mut request = self.client.request(method, url).bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> CalendarResult<T> {
        let response = self.send(method, url, body).await?;
        let value = response.json::<T>().await?;
        Ok(value)
    }
}

#[async_trait]
impl EventsApi for EventsClient {
    #[instrument(skip(self), level = "debug")]
    async fn list(&self, query: &EventListQuery) -> CalendarResult<EventPage> {
        let mut url = self.events_url(&query.calendar_id, None)?;
        url.query_pairs_mut().extend_pairs(query.query_pairs());
        self.send_json(Method::GET, url, None).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, calendar_id: &str, event_id: &str) -> CalendarResult<Value> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        self.send_json(Method::GET, url, None).await
    }

    #[instrument(skip(self, body), level = "debug")]
    async fn insert(&self, calendar_id: &str, body: &Value) -> CalendarResult<Value> {
        let url = self.events_url(calendar_id, None)?;
        self.send_json(Method::POST, url, Some(body)).await
    }

    #[instrument(skip(self, body), level = "debug")]
    async fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &Value,
    ) -> CalendarResult<Value> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        self.send_json(Method::PUT, url, Some(body)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, calendar_id: &str, event_id: &str) -> CalendarResult<()> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google_calendar::token::StoredToken;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer, dir: &tempfile::TempDir) -> EventsClient {
        let tokens = TokenManager::new(dir.path().join("token.json"), Vec::new());
        tokens
            .set_token(StoredToken {
                token: Some("test_token".to_string()),
                refresh_token: None,
                token_uri: format!("{}/token", server.uri()),
                client_id: None,
                client_secret: None,
                scopes: Vec::new(),
                expiry: None,
            })
            .await
            .unwrap();
        EventsClient::new(tokens, &server.uri())
    }

    #[tokio::test]
    async fn list_sends_query_parameters() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(header("Authorization", "Bearer test_token"))
            .and(query_param("maxResults", "10"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .and(query_param("timeMin", "2025-09-06T00:00:00+00:00"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "calendar#events",
                "items": [{"id": "event1", "summary": "Meeting"}],
                "nextPageToken": "p3"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, &dir).await;
        let page = client
            .list(&EventListQuery {
                calendar_id: "primary".to_string(),
                max_results: 10,
                single_events: true,
                order_by: Some("startTime".to_string()),
                time_min: Some("2025-09-06T00:00:00+00:00".to_string()),
                time_max: None,
                page_token: Some("p2".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["summary"], "Meeting");
        assert_eq!(page.next_page_token.as_deref(), Some("p3"));
    }

    #[tokio::test]
    async fn ids_stay_single_path_segments() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/calendars/team@group.calendar.google.com/events/a%2Fb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a/b"})))
            .mount(&server)
            .await;

        let client = client_for(&server, &dir).await;
        let event = client
            .get("team@group.calendar.google.com", "a/b")
            .await
            .unwrap();
        assert_eq!(event["id"], "a/b");
    }

    #[tokio::test]
    async fn insert_and_update_send_body() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let body = json!({"summary": "Birthday", "start": {"date": "2025-09-06"}});
        let resource = json!({"id": "new1", "summary": "Birthday"});

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(body_json(&body))
            .respond_with(ResponseTemplate::new(200).set_body_json(resource))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/calendars/primary/events/new1"))
            .and(body_json(&body))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new1"})))
            .mount(&server)
            .await;

        let client = client_for(&server, &dir).await;
        let created = client.insert("primary", &body).await.unwrap();
        assert_eq!(created["id"], "new1");

        let updated = client.update("primary", "new1", &body).await.unwrap();
        assert_eq!(updated["id"], "new1");
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/event123"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, &dir).await;
        assert!(client.delete("primary", "event123").await.is_ok());
    }

    #[tokio::test]
    async fn error_status_becomes_api_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let client = client_for(&server, &dir).await;
        let err = client.get("primary", "missing").await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 404, ref message } if message == "Not Found"));
    }
}
