//! Axum-based HTTP server.
//!
//! Serves the two verification routes and, for every other path, the
//! single-page frontend from the configured static directory.

use crate::common::{Config, Result};
use crate::core::comparator::BiometricComparator;
use crate::core::verify::Verifier;
use crate::service::handlers::{check_id, verify_face, AppState};
use crate::service::protocol::{ROUTE_CHECK_ID, ROUTE_VERIFY_FACE};
use crate::storage::{CaptureArea, VoterStore};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::post,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Open the store and capture area named in `config` and wire them to
/// `comparator`.
pub fn build_state(config: &Config, comparator: Arc<dyn BiometricComparator>) -> Result<AppState> {
    let store = VoterStore::open(
        config.storage.database_path.clone(),
        config.storage.photo_root.clone(),
    )?;

    let captures = CaptureArea::new(config.storage.capture_dir.clone())?;
    captures.purge_stale()?;

    let verifier = Verifier::new(
        store.clone(),
        captures,
        comparator,
        config.verification.tolerance,
    );

    Ok(AppState {
        store,
        verifier: Arc::new(verifier),
    })
}

pub fn router(state: AppState, static_dir: &Path, max_upload_bytes: usize) -> Router {
    // Unknown paths get index.html so client-side routing works.
    let frontend = ServeDir::new(static_dir)
        .fallback(ServeFile::new(static_dir.join("index.html")));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route(ROUTE_CHECK_ID, post(check_id))
        .route(ROUTE_VERIFY_FACE, post(verify_face))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .fallback_service(frontend)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct VoteServer {
    config: Config,
    state: AppState,
}

impl VoteServer {
    pub fn new(config: Config, comparator: Arc<dyn BiometricComparator>) -> Result<Self> {
        let state = build_state(&config, comparator)?;
        Ok(Self { config, state })
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let app = router(
            self.state,
            &self.config.server.static_dir,
            self.config.verification.max_upload_bytes,
        );

        let listener = tokio::net::TcpListener::bind(&self.config.server.bind).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
