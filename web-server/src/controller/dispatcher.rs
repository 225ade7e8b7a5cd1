use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use inbetween::util::tail_chars;
use inbetween::InterpError;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::controller::{append_log, Job, JobOutcome, Status, Transcript};
use crate::frontend::FrontendConfig;

// How long output readers may linger once the child is gone
const PUMP_GRACE: Duration = Duration::from_secs(1);

pub(crate) struct TokioDispatcher {
    to_service: Sender<Job>,
}

impl TokioDispatcher {
    pub(crate) async fn dispatch(&self, job: Job) -> Result<(), InterpError> {
        self.to_service
            .send(job)
            .await
            .map_err(|_| InterpError::DispatcherGone)
    }

    pub(crate) async fn start(config: Arc<FrontendConfig>, on_job_finished: Sender<JobOutcome>) -> Self {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Job>(24);
        tokio::task::spawn(async move {
            debug!("job receiver dispatched");
            while let Some(job) = rx.recv().await {
                let st = Instant::now();
                let job_id = job.id;
                let res = if job.cancel.is_cancelled() {
                    info!("next job {job_id} was already cancelled; skipping");
                    Err(InterpError::Cancelled)
                } else {
                    info!("starting job {job_id}");
                    run_job(&config, &job).await
                };
                let (status, detail) = match res {
                    Ok(()) => (Status::COMPLETED, None),
                    Err(e @ InterpError::Timeout(_)) => (Status::TIMED_OUT, Some(e.to_string())),
                    Err(e @ InterpError::Cancelled) => (Status::CANCELLED, Some(e.to_string())),
                    Err(e) => {
                        warn!("job {job_id} err: {e}");
                        (Status::FAILED, Some(e.to_string()))
                    }
                };
                append_log(&job.transcript, &format!("[{}]", String::from(status)));
                save_log(&job).await;
                let outcome = JobOutcome {
                    id: job_id,
                    took: st.elapsed(),
                    status,
                    detail,
                };
                if on_job_finished.send(outcome).await.is_err() {
                    warn!("controller gone; job receiver shutting down");
                    return;
                }
            }
        });
        Self { to_service: tx }
    }
}

async fn save_log(job: &Job) {
    let text = job.log_tail(usize::MAX);
    if let Err(e) = tokio::fs::write(job.work_dir.join("job.log"), text).await {
        warn!("could not save log for job {}: {e}", job.id);
    }
}

fn pump<R>(reader: R, transcript: Transcript) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            append_log(&transcript, &line);
        }
    })
}

pub(crate) async fn run_job(config: &FrontendConfig, job: &Job) -> Result<(), InterpError> {
    let program = config.program.display().to_string();
    append_log(&job.transcript, &format!("$ {program} {}", job.args.join(" ")));
    let mut child = Command::new(&config.program)
        .args(&config.leading_args)
        .args(&job.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    let mut pumps: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() {
        pumps.push(pump(out, job.transcript.clone()));
    }
    if let Some(err) = child.stderr.take() {
        pumps.push(pump(err, job.transcript.clone()));
    }

    let st = Instant::now();
    let deadline = tokio::time::sleep(config.timeout);
    tokio::pin!(deadline);
    let mut tick = tokio::time::interval_at(st + config.progress_every, config.progress_every);

    let res = loop {
        tokio::select! {
            exit = child.wait() => {
                let exit = exit?;
                break if !exit.success() {
                    Err(InterpError::ModelInvocation {
                        program,
                        code: exit.code(),
                        stderr: tail_chars(&job.log_tail(2000), 500),
                    })
                } else if !job.output.is_file() {
                    Err(InterpError::ModelInvocation {
                        program,
                        code: exit.code(),
                        stderr: String::from("no video produced"),
                    })
                } else {
                    Ok(())
                };
            }
            _ = job.cancel.cancelled() => {
                let _ = child.kill().await;
                break Err(InterpError::Cancelled);
            }
            _ = &mut deadline => {
                let _ = child.kill().await;
                break Err(InterpError::Timeout(config.timeout));
            }
            _ = tick.tick() => {
                let mins = st.elapsed().as_secs() / 60;
                append_log(&job.transcript, &format!("processing... ({mins} min elapsed)"));
            }
        }
    };

    for mut p in pumps {
        if tokio::time::timeout(PUMP_GRACE, &mut p).await.is_err() {
            p.abort();
        }
    }
    if res.is_err() && job.output.exists() {
        // never serve a partial video
        let _ = tokio::fs::remove_file(&job.output).await;
    }
    res
}
