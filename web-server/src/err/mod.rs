use std::borrow::Cow;

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use inbetween::InterpError;
use serde::Serialize;
use thiserror::Error;

use crate::response::Response1;

#[derive(Debug, Default, Serialize)]
pub struct ResponseErrorItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Cow<'static, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Cow<'static, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Cow<'static, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Cow<'static, str>>,
}

impl ResponseErrorItem {
    pub fn title_cow(title: Cow<'static, str>) -> Self {
        ResponseErrorItem {
            title: Some(title),
            ..Default::default()
        }
    }
    pub fn title(title: String) -> Self {
        Self::title_cow(Cow::Owned(title))
    }
    pub fn title_source(title: String, field: &str) -> Self {
        ResponseErrorItem {
            title: Some(Cow::Owned(title)),
            source: Some(Cow::Owned(format!("/{field}"))),
            ..Default::default()
        }
    }
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Validation {0:?} error")]
    Validation(Vec<ResponseErrorItem>),
    #[error("Missing Source Resource {0:?}")]
    MissingSourceResource(ResponseErrorItem),
    #[error("Job Not Found")]
    JobNotFound(ResponseErrorItem),
    #[error("Server busy")]
    Busy(ResponseErrorItem),
    #[error("Unexpected system error")]
    SystemError(Cow<'static, str>),
}

impl RequestError {
    pub fn sys(msg: String) -> Self {
        Self::SystemError(Cow::Owned(msg))
    }
}

impl From<InterpError> for RequestError {
    fn from(e: InterpError) -> Self {
        match e {
            InterpError::JobNotFound => RequestError::JobNotFound(ResponseErrorItem::title(e.to_string())),
            InterpError::QueueFull => RequestError::Busy(ResponseErrorItem::title(e.to_string())),
            InterpError::InvalidMode(_)
            | InterpError::UnsupportedMode(_)
            | InterpError::InvalidFrameCount(_)
            | InterpError::ImageErr(_) => RequestError::Validation(vec![ResponseErrorItem::title(e.to_string())]),
            other => RequestError::sys(other.to_string()),
        }
    }
}

impl From<MultipartError> for RequestError {
    fn from(e: MultipartError) -> Self {
        RequestError::Validation(vec![ResponseErrorItem::title(format!("bad multipart body: {e}"))])
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        use RequestError::*;
        let tuple = match self {
            Validation(v) => (StatusCode::UNPROCESSABLE_ENTITY, Json(Response1::errs(v))),
            MissingSourceResource(v) => (StatusCode::UNPROCESSABLE_ENTITY, Json(Response1::err(v))),
            JobNotFound(v) => (StatusCode::NOT_FOUND, Json(Response1::err(v))),
            Busy(v) => (StatusCode::SERVICE_UNAVAILABLE, Json(Response1::err(v))),
            SystemError(v) => {
                let e = ResponseErrorItem::title_cow(v);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(Response1::err(e)))
            }
        };
        tuple.into_response()
    }
}
