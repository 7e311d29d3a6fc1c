//! Relationship Director (weave-rd) - Main entry point
//!
//! Runs the reconciliation engine for one subject user and exposes the
//! relationship list over HTTP: ranking-driven suggestions, the roster-backed
//! active set, user status transitions, and an SSE event stream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weave_common::events::EventBus;
use weave_common::CandidateKind;
use weave_rd::reconciler::{spawn_reconciler, Reconciler};
use weave_rd::services::{HttpRosterClient, HttpScoringProvider};
use weave_rd::state::AppState;
use weave_rd::store::{RelationshipStore, StatusController};
use weave_rd::{api, reconciler::scheduler::DEFAULT_INTERVAL};

/// Command-line arguments for weave-rd
#[derive(Parser, Debug)]
#[command(name = "weave-rd")]
#[command(about = "Relationship Director service for Weave")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5850", env = "WEAVE_RD_PORT")]
    port: u16,

    /// Subject user this instance serves
    #[arg(short, long, env = "WEAVE_SUBJECT_ID")]
    subject_id: String,

    /// Data folder for the SQLite database
    #[arg(short, long, env = "WEAVE_DATA_FOLDER")]
    data_folder: Option<String>,

    /// Base URL of the person scoring provider
    #[arg(long, env = "WEAVE_PERSON_PROVIDER_URL")]
    person_provider_url: String,

    /// Base URL of the group scoring provider
    #[arg(long, env = "WEAVE_GROUP_PROVIDER_URL")]
    group_provider_url: String,

    /// Base URL of the roster backend
    #[arg(long, env = "WEAVE_ROSTER_URL")]
    roster_url: String,

    /// Reconciliation interval in seconds
    #[arg(long, default_value = "10", env = "WEAVE_RECONCILE_INTERVAL_SECS")]
    reconcile_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weave_rd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting Weave Relationship Director on port {}", args.port);
    info!("Subject user: {}", args.subject_id);

    // Resolve data folder and open the database
    let data_folder = weave_common::config::resolve_data_folder(
        args.data_folder.as_deref(),
        "WEAVE_DATA_FOLDER",
    )
    .context("Failed to resolve data folder")?;
    let db_path = data_folder.join("weave.db");
    let db = weave_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let event_bus = EventBus::new(1000);
    let store = Arc::new(RelationshipStore::new());
    let controller = Arc::new(StatusController::new(store.clone(), event_bus.clone()));

    // External collaborators
    let person_provider = Arc::new(
        HttpScoringProvider::new(
            args.person_provider_url.clone(),
            "person-scorer",
            CandidateKind::Person,
        )
        .context("Failed to initialize person provider client")?,
    );
    let group_provider = Arc::new(
        HttpScoringProvider::new(
            args.group_provider_url.clone(),
            "group-scorer",
            CandidateKind::Group,
        )
        .context("Failed to initialize group provider client")?,
    );
    let roster =
        Arc::new(HttpRosterClient::new(args.roster_url.clone()).context("Failed to initialize roster client")?);

    // Merge engine
    let reconciler = Arc::new(
        Reconciler::new(
            args.subject_id.clone(),
            store.clone(),
            person_provider,
            group_provider,
            roster,
            event_bus.clone(),
        )
        .with_persistence(db.clone()),
    );

    reconciler
        .bootstrap()
        .await
        .context("Failed to bootstrap store from persistence")?;
    info!("Relationship store bootstrapped");

    let interval = if args.reconcile_interval_secs == 0 {
        DEFAULT_INTERVAL
    } else {
        Duration::from_secs(args.reconcile_interval_secs)
    };
    let handle = spawn_reconciler(reconciler.clone(), interval);

    // Build the application router
    let app_state = AppState {
        subject_id: args.subject_id.clone(),
        store,
        controller,
        reconciler,
        trigger: handle.trigger_handle(),
        event_bus,
        db,
        port: args.port,
    };
    let app = api::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the reconciler; no partial write lands after this
    handle.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
