use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use inbetween::util::tail_chars;
use inbetween::InterpError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ulid::Ulid;

use crate::controller::dispatcher::TokioDispatcher;
use crate::frontend::FrontendConfig;

mod dispatcher;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    #[default]
    QUEUED,
    RUNNING,
    COMPLETED,
    FAILED,
    #[allow(non_camel_case_types)]
    TIMED_OUT,
    CANCELLED,
}

impl Status {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Status::QUEUED | Status::RUNNING)
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        match value {
            Status::QUEUED => String::from("QUEUED"),
            Status::RUNNING => String::from("RUNNING"),
            Status::COMPLETED => String::from("COMPLETED"),
            Status::FAILED => String::from("FAILED"),
            Status::TIMED_OUT => String::from("TIMED_OUT"),
            Status::CANCELLED => String::from("CANCELLED"),
        }
    }
}

// Shared, append-only job log; the dispatcher writes while handlers read
pub type Transcript = Arc<Mutex<String>>;

pub(crate) fn append_log(transcript: &Transcript, line: &str) {
    let mut t = transcript.lock().unwrap_or_else(|e| e.into_inner());
    t.push_str(line);
    t.push('\n');
}

#[derive(Debug, Clone)]
pub struct Job {
    // ULID is a time-ordered varient of UUID with alternate string mapping for humans
    pub id: Ulid,
    pub work_dir: PathBuf,
    pub output: PathBuf,
    // per-job CLI arguments, after the configured leading ones
    pub args: Vec<String>,
    // stops a running child or skips a queued job
    pub cancel: CancellationToken,
    pub transcript: Transcript,
    pub status: Status,
    pub detail: Option<String>,
    pub started: Option<Instant>,
    pub took: Duration,
}

impl Job {
    pub fn new(id: Ulid, work_dir: impl AsRef<Path>, output: impl AsRef<Path>, args: Vec<String>) -> Self {
        Self {
            id,
            work_dir: work_dir.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            args,
            cancel: CancellationToken::new(),
            transcript: Arc::new(Mutex::new(String::new())),
            status: Status::QUEUED,
            detail: None,
            started: None,
            took: Duration::ZERO,
        }
    }

    pub fn log_tail(&self, max_chars: usize) -> String {
        let t = self.transcript.lock().unwrap_or_else(|e| e.into_inner());
        tail_chars(&t, max_chars)
    }

    pub fn elapsed(&self) -> Duration {
        match (self.status.is_finished(), self.started) {
            (false, Some(st)) => st.elapsed(),
            _ => self.took,
        }
    }
}

#[derive(Debug)]
pub(crate) struct JobOutcome {
    pub id: Ulid,
    pub took: Duration,
    pub status: Status,
    pub detail: Option<String>,
}

pub struct ControllerStatus {
    max_queued_jobs: u32,
    max_completed_jobs: u32,
    work_root: PathBuf,
    queued_jobs: VecDeque<Job>,
    running_job: Option<Job>,
    completed_jobs: HashMap<Ulid, Job>,
    dispatcher: TokioDispatcher,
}

impl ControllerStatus {
    pub async fn new(config: FrontendConfig) -> Arc<tokio::sync::Mutex<Self>> {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<JobOutcome>(32);
        let r = ControllerStatus {
            max_queued_jobs: config.max_queued_jobs,
            max_completed_jobs: 100,
            work_root: config.work_root.clone(),
            queued_jobs: VecDeque::new(),
            running_job: None,
            completed_jobs: HashMap::new(),
            dispatcher: TokioDispatcher::start(Arc::new(config), tx).await,
        };

        let ret = Arc::new(tokio::sync::Mutex::new(r));
        let ctx = ret.clone();
        tokio::task::spawn(async move {
            while let Some(outcome) = rx.recv().await {
                let mut ctx_ = ctx.lock().await;
                if let Err(e) = ctx_.complete_job_async(outcome).await {
                    warn!("could not dispatch next job: {e}");
                }
            }
        });
        ret
    }

    pub fn job_dir(&self, id: Ulid) -> PathBuf {
        self.work_root.join(id.to_string())
    }

    async fn try_dispatch_async(&mut self) -> Result<(), InterpError> {
        if self.running_job.is_none() {
            if let Some(mut next_job) = self.queued_jobs.pop_front() {
                info!("dispatching job {}", next_job.id);
                next_job.status = Status::RUNNING;
                next_job.started = Some(Instant::now());
                let job_ = next_job.clone();
                self.running_job = Some(next_job);
                return self.dispatcher.dispatch(job_).await;
            }
        }
        Ok(())
    }

    pub async fn create_job_async(&mut self, mut job: Job) -> Result<Ulid, InterpError> {
        if self.queued_jobs.len() >= self.max_queued_jobs as usize {
            warn!("Queue depth exceeded");
            return Err(InterpError::QueueFull);
        }
        job.status = Status::QUEUED;
        let return_id = job.id;
        self.queued_jobs.push_back(job);
        self.try_dispatch_async().await?;
        Ok(return_id)
    }

    async fn complete_job_async(&mut self, outcome: JobOutcome) -> Result<(), InterpError> {
        let JobOutcome {
            id,
            took,
            status,
            detail,
        } = outcome;
        info!(
            "job {id} finished as {} took: {}ms",
            String::from(status),
            took.as_millis()
        );
        match self.running_job.take() {
            Some(mut job) if job.id == id => {
                job.status = status;
                job.took = took;
                job.detail = detail;
                self.finish(job);
            }
            other => {
                warn!("completion for job {id} does not match the running job");
                self.running_job = other;
            }
        }
        self.try_dispatch_async().await
    }

    fn finish(&mut self, job: Job) {
        if self.completed_jobs.len() >= self.max_completed_jobs as usize {
            // ULIDs sort by creation time
            if let Some(oldest) = self.completed_jobs.keys().min().copied() {
                self.completed_jobs.remove(&oldest);
            }
        }
        self.completed_jobs.insert(job.id, job);
    }

    pub fn get_job_list(&self, include_finished: bool) -> Vec<Job> {
        let mut ret: Vec<Job> = self.queued_jobs.iter().cloned().collect();
        if let Some(ref job) = self.running_job {
            ret.insert(0, job.clone());
        }
        if include_finished {
            let mut done: Vec<&Job> = self.completed_jobs.values().collect();
            done.sort_by_key(|j| j.id);
            ret.extend(done.into_iter().cloned());
        }
        ret
    }

    pub fn get_job_status(&self, job_id: Ulid) -> Result<Job, InterpError> {
        if let Some(ref job) = self.running_job {
            if job.id == job_id {
                return Ok(job.clone());
            }
        }
        if let Some(job) = self.completed_jobs.get(&job_id) {
            return Ok(job.clone());
        }
        self.queued_jobs
            .iter()
            .find(|item| item.id == job_id)
            .cloned()
            .ok_or(InterpError::JobNotFound)
    }

    pub fn cancel_job(&mut self, job_id: Ulid) -> Result<Status, InterpError> {
        if let Some(ref job) = self.running_job {
            if job.id == job_id {
                info!("cancelling active job {job_id}");
                job.cancel.cancel();
                return Ok(Status::RUNNING);
            }
        }
        if let Some(idx) = self.queued_jobs.iter().position(|item| item.id == job_id) {
            info!("cancelling queued job {job_id}");
            if let Some(mut job) = self.queued_jobs.remove(idx) {
                job.cancel.cancel();
                job.status = Status::CANCELLED;
                job.detail = Some(String::from("cancelled before start"));
                self.finish(job);
            }
            return Ok(Status::CANCELLED);
        }
        self.completed_jobs
            .get(&job_id)
            .map(|j| j.status)
            .ok_or(InterpError::JobNotFound)
    }
}
