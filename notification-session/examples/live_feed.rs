//! Live Feed - prints notifications for one user as they arrive
//!
//! Connects to the backend's push endpoint, starts a session and prints the
//! newest feed entry whenever the feed changes. Ctrl+C ends the session.
//!
//! Environment:
//! - `BASE_URL` backend address (default `http://localhost:8000`)
//! - `USER_ID` and `TOKEN` the logged-in user's credentials
//!
//! Run with: USER_ID=1 TOKEN=... cargo run -p socialnet-notification-session --example live_feed

use std::sync::Arc;

use notification_session::{
    BrokerConfig, FeedEntry, NotificationBroker, SessionConfig, SessionController,
};
use push_client::{PushClientConfig, PushEndpoint};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("notification_broker=debug".parse()?)
                .add_directive("notification_session=info".parse()?),
        )
        .init();

    let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8000".into());
    let user_id: u64 = std::env::var("USER_ID")?.parse()?;
    let token = std::env::var("TOKEN")?;

    println!("=== Live Notification Feed ===\n");

    let client_config = PushClientConfig::new().with_endpoint(PushEndpoint::parse(&base_url)?);
    let broker = Arc::new(NotificationBroker::websocket(
        client_config,
        BrokerConfig::default(),
    )?);
    let session = SessionController::new(broker.clone(), SessionConfig::default())?;

    session.start_session(user_id, &token)?;
    println!("Session started for user {} at {}", user_id, base_url);

    let mut feed = session.watch_feed();
    let mut states = broker.watch_state();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("[connection] {}", *states.borrow_and_update());
            }
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                feed.borrow_and_update();
                if let Some(entry) = session.notifications().first() {
                    print_entry(entry);
                }
            }
        }
    }

    session.end_session();
    println!("\n{}", broker.stats());
    Ok(())
}

fn print_entry(entry: &FeedEntry) {
    match entry {
        FeedEntry::Notification(notification) => {
            let sender = notification
                .sender
                .as_ref()
                .map(|sender| sender.display_name())
                .unwrap_or_else(|| "someone".to_string());
            println!(
                "[{}] {} - {} (from {})",
                notification.kind, notification.title, notification.message, sender
            );
        }
        FeedEntry::Raw(event) => {
            println!("[raw #{}] {}", event.sequence(), event.payload());
        }
    }
}
