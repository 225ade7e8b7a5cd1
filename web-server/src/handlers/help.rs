use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse, Redirect};
use axum::Json;
use inbetween::Mode;
use serde::Serialize;

use crate::frontend::Frontend;
use crate::server::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");
const STYLE_CSS: &str = include_str!("../../static/style.css");

pub async fn help() -> impl IntoResponse {
    Redirect::to("/static/index.html")
}

pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

pub async fn css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, mime::TEXT_CSS_UTF_8.to_string())], STYLE_CSS)
}

#[derive(Debug, Serialize)]
pub struct FrontendInfo {
    frontend: &'static str,
    modes: Vec<&'static str>,
    timeout_sec: u64,
}

// Lets the page adapt its form to the front end being served
pub async fn frontend_info(State(state): State<AppState>) -> Json<FrontendInfo> {
    let modes = Mode::ALL
        .iter()
        .filter(|m| state.frontend == Frontend::Diffusion || **m != Mode::Dynamicrafter)
        .map(|m| m.as_str())
        .collect();
    Json(FrontendInfo {
        frontend: state.frontend.as_str(),
        modes,
        timeout_sec: state.timeout.as_secs(),
    })
}
