use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use simsvc_services::{ReportService, SimulationService, UserService};
use simsvc_storage::{BlobStorage, DownloadTokenSigner};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    auth::{login, me, register},
    files::download_file,
    health::health_check,
    reports::{create_report, get_report, list_reports},
    simulations::{
        cancel_simulation, create_simulation, get_simulation, get_simulation_result,
        list_simulations,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub simulations: Arc<SimulationService>,
    pub reports: Arc<ReportService>,
    pub users: Arc<UserService>,
    pub storage: Arc<dyn BlobStorage>,
    /// Verifies the tokens embedded in presigned download URLs; must share
    /// its secret with the signer used by the storage backend.
    pub download_tokens: DownloadTokenSigner,
}

pub fn create_routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/simulations", post(create_simulation).get(list_simulations))
        .route("/api/v1/simulations/{id}", get(get_simulation))
        .route("/api/v1/simulations/{id}/result", get(get_simulation_result))
        .route("/api/v1/simulations/{id}/cancel", post(cancel_simulation))
        .route("/api/v1/reports", post(create_report).get(list_reports))
        .route("/api/v1/reports/{id}", get(get_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), crate::auth::require_auth));

    Router::new()
        .route("/health", get(health_check))
        .route("/files/{*key}", get(download_file))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
