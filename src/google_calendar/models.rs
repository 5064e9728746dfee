use serde::Deserialize;
use serde_json::Value;

/// Query for one page of `events.list`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventListQuery {
    pub calendar_id: String,
    pub max_results: u32,
    pub single_events: bool,
    pub order_by: Option<String>,
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub page_token: Option<String>,
}

impl EventListQuery {
    /// Query string parameters in the provider's naming
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("maxResults", self.max_results.to_string()),
            ("singleEvents", self.single_events.to_string()),
        ];
        if let Some(order_by) = &self.order_by {
            pairs.push(("orderBy", order_by.clone()));
        }
        if let Some(time_min) = &self.time_min {
            pairs.push(("timeMin", time_min.clone()));
        }
        if let Some(time_max) = &self.time_max {
            pairs.push(("timeMax", time_max.clone()));
        }
        if let Some(page_token) = &self.page_token {
            pairs.push(("pageToken", page_token.clone()));
        }
        pairs
    }
}

/// One page of `events.list`; event resources stay opaque
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    #[serde(default)]
    pub items: Vec<Value>,
    pub next_page_token: Option<String>,
}
