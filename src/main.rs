//! Intake bot - guided data collection over a messaging webhook
//!
//! Walks each sender through a fixed sequence of questions, validates every
//! answer and hands the completed form to a report sink.

mod api;
mod config;
mod messenger;
mod reports;
mod runtime;
mod session;
mod state_machine;

use api::{create_router, AppState};
use config::BotConfig;
use messenger::{GraphApiSender, LoggingSender};
use reports::{LogReportSink, WebhookReportSink};
use runtime::{ConversationEngine, MessageSender, ProductionEngine, ReportSink};
use session::{SessionStore, SessionSweeper};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intake_bot=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;
    let flow = config.flow.flow();

    let store = Arc::new(SessionStore::new(flow.entry()));

    let graph = GraphApiSender::new(
        &config.graph_api_url,
        config.page_access_token.clone(),
        config.send_timeout,
    )?;
    let sender: Arc<dyn MessageSender> = Arc::new(LoggingSender::new(Arc::new(graph)));

    let reports: Arc<dyn ReportSink> = match &config.report_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Forwarding completed forms");
            Arc::new(WebhookReportSink::new(url.as_str(), config.send_timeout)?)
        }
        None => {
            tracing::info!("REPORT_WEBHOOK_URL not set; completed forms are only logged");
            Arc::new(LogReportSink)
        }
    };

    let engine: ProductionEngine = ConversationEngine::new(
        flow,
        Arc::clone(&store),
        sender,
        reports,
        config.send_timeout,
    );

    let sweeper = SessionSweeper::new(
        Arc::clone(&store),
        config.sweep_interval,
        config.session_timeout,
    );
    sweeper.start();

    let state = AppState::new(Arc::new(engine), config.verify_token.as_str());
    let app = create_router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(flow = %config.flow, "Intake bot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop().await;
    tracing::info!("Intake bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
