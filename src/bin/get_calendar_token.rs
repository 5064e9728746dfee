use gcal_events::error::other_error;
use gcal_events::google_calendar::{ApplicationSecret, InstalledFlow, TokenManager};
use gcal_events::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    startup::init_logging()?;

    // Load configuration
    let config = startup::load_config()?;
    let scopes = config.resolved_scopes();

    let secret = ApplicationSecret::from_file(&config.credentials_path)?;
    let token_manager = TokenManager::new(config.token_path.clone(), scopes.clone());

    info!("Requesting scopes: {}", scopes.join(" "));
    println!("Opening browser for Google Calendar authorization...");

    let flow = InstalledFlow::new(secret, scopes, config.oauth_port);
    let token = flow.run().await?;

    if token.refresh_token.is_none() {
        return Err(other_error(
            "No refresh token returned; revoke the app's access and authorize again",
        )
        .into());
    }

    // Save token using TokenManager
    token_manager.set_token(token).await?;

    println!(
        "Token successfully saved to {}!",
        token_manager.token_path().display()
    );

    Ok(())
}
