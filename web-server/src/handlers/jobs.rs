use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_macros::debug_handler;
use ulid::Ulid;

use crate::controller::Status;
use crate::err::{RequestError, ResponseErrorItem};
use crate::response::{JobInfo, ResponseJobInfo, ResponseJobList};
use crate::server::AppState;

fn parse_id(id: &str) -> Result<Ulid, RequestError> {
    Ulid::from_string(id).map_err(|_| {
        RequestError::JobNotFound(ResponseErrorItem::title_source(format!("no job with id `{id}`"), "id"))
    })
}

pub async fn job_list_all(State(state): State<AppState>) -> Json<ResponseJobList> {
    job_list_inner(true, state).await
}

pub async fn job_list(State(state): State<AppState>) -> Json<ResponseJobList> {
    job_list_inner(false, state).await
}

async fn job_list_inner(all: bool, state: AppState) -> Json<ResponseJobList> {
    let ctrl = state.controller.lock().await;
    let out: Vec<JobInfo> = ctrl
        .get_job_list(all)
        .iter()
        .map(|j| JobInfo::from_job(&state.base_url, j, false))
        .collect();
    Json(ResponseJobList::ok(out))
}

#[debug_handler]
pub async fn job_status(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ResponseJobInfo>, RequestError> {
    let id = parse_id(&id)?;
    let job = state.controller.lock().await.get_job_status(id)?;
    Ok(Json(ResponseJobInfo::ok(JobInfo::from_job(&state.base_url, &job, true))))
}

pub async fn job_cancel(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ResponseJobInfo>, RequestError> {
    let id = parse_id(&id)?;
    let mut ctrl = state.controller.lock().await;
    ctrl.cancel_job(id)?;
    let job = ctrl.get_job_status(id)?;
    Ok(Json(ResponseJobInfo::ok(JobInfo::from_job(&state.base_url, &job, false))))
}

pub async fn job_video(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, RequestError> {
    let id = parse_id(&id)?;
    let job = state.controller.lock().await.get_job_status(id)?;
    if job.status != Status::COMPLETED {
        return Err(RequestError::MissingSourceResource(ResponseErrorItem::title(format!(
            "job {id} is {}; no video available",
            String::from(job.status)
        ))));
    }
    let bytes = tokio::fs::read(&job.output)
        .await
        .map_err(|e| RequestError::sys(format!("could not read video: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "video/mp4")], Body::from(bytes)).into_response())
}
