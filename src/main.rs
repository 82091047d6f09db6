//! Handbook Governance API
//!
//! Serves the policy handbook and its change-proposal review workflow:
//! - Sections and numbered policies, read-only to everyone
//! - Proposals to create, edit or archive a policy
//! - Review by someone other than the submitter, then atomic apply

use handbook_governance::config::Settings;
use handbook_governance::routes::create_router;
use handbook_governance::state::AppState;
use handbook_governance::workflow::{IdentityProvider, InMemoryDirectory, TracingNotifier};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting handbook governance service...");

    let settings = Settings::load()?;
    info!(
        "Configuration loaded (apply attempts: {}, notifications: {})",
        settings.workflow.apply_max_attempts, settings.workflow.notifications_enabled
    );

    let directory = match &settings.workflow.actors_file {
        Some(path) => InMemoryDirectory::from_file(path)?,
        None => {
            warn!("ACTORS_FILE not set; no actor can submit or review until one is configured");
            InMemoryDirectory::new()
        }
    };
    let identity: Arc<dyn IdentityProvider> = Arc::new(directory);

    let state = Arc::new(AppState::new(&settings, identity, Arc::new(TracingNotifier)));
    let app = create_router(state, &settings);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    info!("Server listening on http://{}", addr);
    info!("   GET  /api/sections                      - List sections");
    info!("   GET  /api/sections/{{id}}/policies        - Policies in a section");
    info!("   POST /api/proposals                     - Submit a new/edit/archive proposal");
    info!("   GET  /api/proposals/{{id}}/diff           - Current vs proposed");
    info!("   POST /api/proposals/{{id}}/approve        - Approve and apply");
    info!("   POST /api/proposals/{{id}}/reject         - Reject");
    info!("   POST /api/proposals/{{id}}/request-revision - Send back to submitter");
    info!("   POST /api/policies/by-number/{{number}}/requests - Ask about a policy");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,handbook_governance=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
