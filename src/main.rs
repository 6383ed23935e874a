use std::sync::Arc;

use taskboard::api::router;
use taskboard::config::AppConfig;
use taskboard::db;
use taskboard::notify::{NoopNotifier, Notifier, WebhookNotifier};
use taskboard::services::ReminderScheduler;
use taskboard::state::AppState;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new_from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "taskboard=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::connect(&config.database_url, config.db_max_connections).await?;

    let notifier: Arc<dyn Notifier> = match &config.push_webhook_url {
        Some(url) => {
            info!("push reminders go to {}", url);
            Arc::new(WebhookNotifier::new(url.clone())?)
        }
        None => Arc::new(NoopNotifier),
    };

    if config.reminder_interval_secs > 0 {
        let scheduler =
            ReminderScheduler::new(pool.clone(), notifier.clone(), config.reminder_interval_secs);
        tokio::spawn(scheduler.start());
    }

    let state = AppState {
        db: pool.clone(),
        notifier,
    };

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
