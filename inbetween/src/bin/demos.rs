use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use structopt::StructOpt;
use tracing::{info, warn};

use inbetween::model::ModelConfig;
use inbetween::pipeline::{run_request, DiffusionPipeline};
use inbetween::presets::Preset;
use inbetween::util::{init_tracing, log_timing};
use inbetween::video::{VideoCodec, VideoWriter};
use inbetween::InterpResult;

#[derive(Debug, StructOpt, Clone)]
#[structopt(name = "inbetween-demos", about = "Run a canned in-between scenario")]
struct Opt {
    // Preset name; see --list
    preset: Option<Preset>,

    // Print the presets and exit
    #[structopt(long)]
    list: bool,

    #[structopt(long, parse(from_os_str), default_value = "input_images/start.jpg")]
    image1: PathBuf,

    #[structopt(long, parse(from_os_str), default_value = "input_images/end.jpg")]
    image2: PathBuf,

    #[structopt(long = "out-dir", parse(from_os_str), default_value = "output_videos")]
    out_dir: PathBuf,

    #[structopt(long = "model-path", parse(from_os_str))]
    model_path: Option<PathBuf>,

    #[structopt(long = "config-path", parse(from_os_str))]
    config_path: Option<PathBuf>,

    #[structopt(long = "sampler-cmd")]
    sampler_cmd: Option<String>,

    // Keep going when one request of a multi-request preset fails
    // Encoder program
    #[structopt(long, parse(from_os_str), default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[structopt(long = "keep-going")]
    keep_going: bool,

    #[structopt(short, long)]
    debug: bool,

    #[structopt(long)]
    timing: bool,
}

fn main() -> ExitCode {
    let opt = Opt::from_args();
    init_tracing(if opt.debug { "debug" } else { "info" });

    if opt.list || opt.preset.is_none() {
        for p in Preset::ALL {
            println!("{:<16}{}", p.as_str(), p.description());
        }
        return ExitCode::SUCCESS;
    }
    match opt.preset.map(|p| run(&opt, p)) {
        Some(Err(e)) => {
            eprintln!("error: {e}");
            if let Some(hint) = e.hint() {
                eprintln!("  hint: {hint}");
            }
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}

fn run(opt: &Opt, preset: Preset) -> InterpResult<()> {
    let config = ModelConfig::new(opt.model_path.clone(), opt.config_path.clone())
        .with_sampler_cmd(opt.sampler_cmd.as_deref());
    let requests = preset.requests(&opt.image1, &opt.image2, &opt.out_dir);
    let total = requests.len();

    for (i, req) in requests.iter().enumerate() {
        info!("[{}/{total}] {preset}: {} ({})", i + 1, req.output.display(), req.mode);
        let st = Instant::now();
        let res = DiffusionPipeline::new(req, config.clone(), &req.output.with_extension("work")).and_then(
            |mut pipeline| {
                let writer = VideoWriter::new(req.params.fps, VideoCodec::default()).with_ffmpeg(&opt.ffmpeg);
                run_request(&mut pipeline, req, &writer)
            },
        );
        match res {
            Ok(n) => info!("wrote {n} frames to {}", req.output.display()),
            Err(e) if opt.keep_going => warn!("{} failed: {e}", req.output.display()),
            Err(e) => return Err(e),
        }
        log_timing(opt.timing, st, preset.as_str());
    }
    Ok(())
}
