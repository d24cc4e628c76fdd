//! Alert sink binary entry point.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tv_alert_sink::{start_server, AlertSinkState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tv_alert_sink=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("ALERT_SINK_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

    let state = AlertSinkState::new();

    tracing::info!("starting traffic violation alert sink");
    start_server(&addr, state).await?;

    Ok(())
}
