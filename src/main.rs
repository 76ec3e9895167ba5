use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sales_lead_dashboard::config::Config;
use sales_lead_dashboard::handlers::{self, AppState};
use sales_lead_dashboard::session::DashboardSession;

/// Main entry point for the dashboard service.
///
/// Initializes logging and configuration, performs the initial lead load and
/// starts the Axum server. A failed initial load does not stop the server: the
/// dashboard reports it and offers a retry.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sales_lead_dashboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let session = Arc::new(DashboardSession::from_config(&config)?);
    tracing::info!("✓ Lead API client initialized: {}", config.api_url);

    match session.reload().await {
        Ok(count) => tracing::info!("Initial load complete: {} lead(s)", count),
        Err(e) => tracing::error!(
            "Initial load failed, dashboard will offer a retry: {}. Make sure the backend is running at {}",
            e,
            config.api_url
        ),
    }

    let app_state = Arc::new(AppState {
        config: config.clone(),
        session,
    });

    let app = handlers::app(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Dashboard listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
