use std::borrow::Cow;

use serde::Serialize;

use crate::controller::{Job, Status};
use crate::err::ResponseErrorItem;

// Characters of job output returned on a status poll
pub const LOG_TAIL_CHARS: usize = 2000;

#[derive(Debug, Default, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl JobInfo {
    pub fn from_job(base_url: &str, job: &Job, with_log: bool) -> Self {
        let job_str = job.id.to_string();
        let elapsed = job.elapsed();
        JobInfo {
            id: job_str.clone(),
            status: String::from(job.status),
            detail: job.detail.clone(),
            poll_url: Some(format!("{base_url}/job/{job_str}")),
            cancel_url: (!job.status.is_finished()).then(|| format!("{base_url}/job/{job_str}/cancel")),
            video_url: (job.status == Status::COMPLETED).then(|| format!("{base_url}/job/{job_str}/video")),
            elapsed_sec: (!elapsed.is_zero()).then(|| elapsed.as_secs_f64()),
            log: with_log.then(|| job.log_tail(LOG_TAIL_CHARS)),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ResponseJobInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ResponseErrorItem>>,
    pub status: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JobInfo>,
}

#[derive(Debug, Default, Serialize)]
pub struct ResponseJobList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ResponseErrorItem>>,
    pub status: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<JobInfo>>,
}

impl ResponseJobInfo {
    pub fn ok(job_info: JobInfo) -> Self {
        Self {
            status: Cow::Borrowed("Ok"),
            errors: None,
            data: Some(job_info),
        }
    }
}

impl ResponseJobList {
    pub fn ok(jobs: Vec<JobInfo>) -> Self {
        Self {
            status: Cow::Borrowed("Ok"),
            errors: None,
            data: Some(jobs),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct Response1 {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ResponseErrorItem>>,
    pub status: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
}

impl Response1 {
    pub fn err(reason: ResponseErrorItem) -> Self {
        Self::errs(vec![reason])
    }
    pub fn errs(reason: Vec<ResponseErrorItem>) -> Self {
        Self {
            status: Cow::Borrowed("Error"),
            errors: Some(reason),
            data: None,
        }
    }
}
