use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use structopt::StructOpt;

use inbetween_ws::frontend::{Frontend, FrontendConfig};

#[derive(Debug, StructOpt, Clone)]
#[structopt(name = "inbetween-ws", about = "In-between video web front end")]
struct Opt {
    // diffusion | rife
    #[structopt(long, default_value = "diffusion")]
    frontend: Frontend,

    // TCP port to listen on; default 7860 (diffusion) or 7861 (rife)
    #[structopt(short, long)]
    port: Option<u16>,

    // CLI to run per job; default inbetween or rife-interpolate
    #[structopt(long = "cli-bin", parse(from_os_str))]
    cli_bin: Option<PathBuf>,

    // Per-job work directories go here
    #[structopt(long = "work-root", parse(from_os_str), default_value = "web_jobs")]
    work_root: PathBuf,

    // Seconds before a job is killed; default 1800 (diffusion) or 300 (rife)
    #[structopt(long = "timeout-secs")]
    timeout_secs: Option<u64>,

    // Seconds between progress lines in the job log
    #[structopt(long = "progress-secs", default_value = "60")]
    progress_secs: u64,

    #[structopt(long = "max-queued-jobs", default_value = "100")]
    max_queued_jobs: u32,

    // The URL exposed in help messages
    #[structopt(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let opt = Opt::from_args();
    let mut config = FrontendConfig::new(opt.frontend, &opt.work_root);
    if let Some(bin) = opt.cli_bin {
        config.program = bin;
    }
    if let Some(secs) = opt.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    config.progress_every = Duration::from_secs(opt.progress_secs.max(1));
    config.max_queued_jobs = opt.max_queued_jobs;

    let port = opt.port.unwrap_or_else(|| opt.frontend.default_port());
    match inbetween_ws::server::launch_server(config, port, opt.base_url).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
