//! Web layer
//!
//! Thin HTTP interface over the scheduling coordinator. Handlers contain no
//! business logic; they map requests and responses and delegate every
//! lifecycle decision to the coordinator.

use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::{
    config::Config, database::Database, errors::SchedulerError,
    scheduling::SchedulingCoordinator,
};

pub mod api;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: SchedulingCoordinator,
    pub database: Database,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(
        config: &Config,
        coordinator: SchedulingCoordinator,
        database: Database,
    ) -> Result<Self> {
        let app = Self::create_router(AppState {
            coordinator,
            database,
        });

        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;

        Ok(Self { app, addr })
    }

    fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(api::health_check))
            .route("/jobs/schedule", post(api::schedule_job))
            .route("/jobs/list", get(api::list_jobs))
            .route("/jobs/delete/:name/:group", delete(api::delete_job))
            .route("/jobs/pause/:name/:group", post(api::pause_job))
            .route("/jobs/resume/:name/:group", post(api::resume_job))
            .route("/jobs/restart/:name/:group", post(api::restart_job))
            .route("/jobs/update/:name", put(api::update_job))
            .route("/jobs/executions/:name/:group", get(api::list_executions))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let status = match &self {
            SchedulerError::Validation { .. } => StatusCode::BAD_REQUEST,
            SchedulerError::NotFound { .. } => StatusCode::NOT_FOUND,
            SchedulerError::Conflict { .. } => StatusCode::CONFLICT,
            SchedulerError::Store(_) | SchedulerError::Engine { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
