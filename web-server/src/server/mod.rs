use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::controller::ControllerStatus;
use crate::frontend::{Frontend, FrontendConfig};
use crate::handlers::generate::generate;
use crate::handlers::help::{css, frontend_info, help, index};
use crate::handlers::jobs::{job_cancel, job_list, job_list_all, job_status, job_video};
use crate::{BASE_URL, MAX_UPLOAD_BYTES};

#[derive(Clone)]
pub(crate) struct AppState {
    pub controller: Arc<tokio::sync::Mutex<ControllerStatus>>,
    pub base_url: String,
    pub frontend: Frontend,
    pub timeout: Duration,
}

pub(crate) async fn app(config: FrontendConfig, base_url: String) -> Router {
    let state = AppState {
        frontend: config.frontend,
        timeout: config.timeout,
        controller: ControllerStatus::new(config).await,
        base_url,
    };
    Router::new()
        .route("/generate", post(generate))
        .route("/job/list", get(job_list))
        .route("/job/list/all", get(job_list_all))
        .route("/job/:id", get(job_status).delete(job_cancel))
        .route("/job/:id/cancel", get(job_cancel).delete(job_cancel))
        .route("/job/:id/video", get(job_video))
        .route("/frontend", get(frontend_info))
        .route("/help", get(help))
        .route("/", get(help))
        .route("/index.htm", get(help))
        .route("/index.html", get(help))
        .route("/static/index.html", get(index))
        .route("/static/style.css", get(css))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn launch_server(config: FrontendConfig, port: u16, base_url: Option<String>) -> std::io::Result<()> {
    let base_url = base_url.unwrap_or_else(|| format!("{BASE_URL}:{port}"));
    inbetween::util::init_tracing("inbetween_ws=debug,tower_http=info,inbetween=info");

    tokio::fs::create_dir_all(&config.work_root).await?;
    tracing::info!(
        "{} front end, jobs under {}, timeout {}s",
        config.frontend,
        config.work_root.display(),
        config.timeout.as_secs()
    );
    let app = app(config, base_url).await;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
