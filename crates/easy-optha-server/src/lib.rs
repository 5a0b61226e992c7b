//! Patient history service for the eye-scan portal.
//!
//! # Routes
//!
//! - `POST /add-scan`: append `{patient_id, scan_type, diagnosis}` to a
//!   patient's history. `400 {"error": "All fields are required"}` when any
//!   field is missing or blank.
//! - `GET /patient-history/:patient_id`: `{"history": [...]}` in append
//!   order. A patient with no scans gets an empty list, not an error.
//!
//! # Configuration
//!
//! See [`config`]. Everything has a default; the usual overrides are
//! ```sh
//! EASY_OPTHA_SERVER__PORT=8080
//! EASY_OPTHA_DATABASE__PATH=/var/lib/easy-optha/history.db
//! EASY_OPTHA_LOG__FORMAT=structured
//! ```
//!
//! # Binaries
//!
//! - `easy-optha-server` runs this service.
//! - `easy-optha-scan` drives the fundus/OCT workflow from the command line
//!   against the configured inference services.
use std::time::Duration;

use axum::{
    http::{
        header::{CONTENT_TYPE, COOKIE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub mod cli;
pub mod config;
pub mod error;
pub mod log;
pub mod routes;
pub mod scan;
pub mod state;

use error::ServerError;
use routes::{add_scan_handler, patient_history_handler};
use state::State;

pub fn router(state: State) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, COOKIE])
        .max_age(Duration::from_secs(60 * 60));

    match HeaderValue::from_str(&state.config.server.allowed_origin) {
        Ok(origin) => cors = cors.allow_origin(origin).allow_credentials(true),
        Err(_) => warn!(
            origin = %state.config.server.allowed_origin,
            "Ignoring invalid allowed origin"
        ),
    }

    Router::new()
        .route("/add-scan", post(add_scan_handler))
        .route("/patient-history/:patient_id", get(patient_history_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: State) -> Result<(), ServerError> {
    info!("Starting server...");

    let address = state.config.server.address()?;
    let app = router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
