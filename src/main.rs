use chrono::{Duration, Utc};
use gcal_events::google_calendar::GoogleCalendarService;
use gcal_events::startup;
use serde_json::{json, Value};
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting gcal-events demo");

    // Load configuration
    let config = startup::load_config()?;
    let mut calendar_service = GoogleCalendarService::new(config);

    let start = Utc::now() + Duration::days(1);
    let end = start + Duration::hours(1);
    let event_data = json!({
        "summary": "gcal-events demo",
        "description": "Created and removed by the gcal-events demo",
        "start": { "dateTime": start.to_rfc3339(), "timeZone": "UTC" },
        "end": { "dateTime": end.to_rfc3339(), "timeZone": "UTC" },
    });

    let created_event = calendar_service.create_event(&event_data).await;
    println!("event created: {}", created_event);

    let event_id = serde_json::from_str::<Value>(&created_event)
        .ok()
        .and_then(|event| event.get("id").and_then(Value::as_str).map(String::from));

    let events = calendar_service.find_many_events(5, None, None).await;
    println!("future events: {}", events);

    if let Some(event_id) = &event_id {
        let event = calendar_service.find_one_event(event_id).await;
        println!("event found by ID: {}", event);

        let deleted = calendar_service.remove_event(event_id).await;
        println!("event removed: {}", deleted);
    }

    let events_after_delete = calendar_service.find_many_events(5, None, None).await;
    println!("events post removed one: {}", events_after_delete);

    Ok(())
}
