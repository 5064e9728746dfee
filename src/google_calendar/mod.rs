mod client;
pub mod flow;
pub mod models;
mod oauth;
pub mod secret;
mod service;
pub mod time;
pub mod token;

pub use client::{EventsApi, EventsClient};
pub use flow::InstalledFlow;
pub use models::{EventListQuery, EventPage};
pub use secret::ApplicationSecret;
pub use service::{GoogleCalendarService, MAX_PAGE_SIZE};
pub use token::{StoredToken, TokenManager};
