use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use structopt::clap::AppSettings;
use structopt::StructOpt;
use tracing::{debug, info};

use inbetween::model::{ModelConfig, SamplingParams};
use inbetween::motion::CameraMotion;
use inbetween::pipeline::{load_regions, run_request, DiffusionPipeline, GenerationRequest};
use inbetween::util::{init_tracing, log_timing};
use inbetween::video::{VideoCodec, VideoWriter};
use inbetween::{InterpResult, Mode};

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "inbetween",
    about = "Generate the in-between video of two images with a diffusion model",
    setting = AppSettings::AllowNegativeNumbers
)]
struct Opt {
    // First (start) image
    #[structopt(long, parse(from_os_str))]
    image1: PathBuf,

    // Second (end) image
    #[structopt(long, parse(from_os_str))]
    image2: PathBuf,

    // Target video file
    #[structopt(short = "o", long, parse(from_os_str), default_value = "output.mp4")]
    output: PathBuf,

    #[structopt(long, default_value = "")]
    prompt: String,

    #[structopt(long, default_value = "16")]
    frames: usize,

    #[structopt(long, default_value = "50")]
    steps: u32,

    #[structopt(long = "cfg-scale", default_value = "7.5")]
    cfg_scale: f32,

    #[structopt(long, default_value = "1.0")]
    eta: f32,

    // Conditioning frame stride and output frame rate
    #[structopt(long, default_value = "5")]
    fps: u32,

    #[structopt(long, default_value = "123")]
    seed: u64,

    // basic | hybrid | steerable | dynamicrafter
    #[structopt(long, default_value = "basic")]
    mode: Mode,

    // Camera motion; any non-zero value turns motion conditioning on
    #[structopt(long = "camera-pan-x", default_value = "0.0")]
    camera_pan_x: f64,
    #[structopt(long = "camera-pan-y", default_value = "0.0")]
    camera_pan_y: f64,
    #[structopt(long = "camera-zoom", default_value = "0.0")]
    camera_zoom: f64,
    #[structopt(long = "camera-rotate", default_value = "0.0")]
    camera_rotate: f64,

    // JSON list of {"bbox": [x1, y1, x2, y2], "motion": [dx, dy]}
    #[structopt(long, parse(from_os_str))]
    regions: Option<PathBuf>,

    #[structopt(long = "model-path", parse(from_os_str))]
    model_path: Option<PathBuf>,

    #[structopt(long = "config-path", parse(from_os_str))]
    config_path: Option<PathBuf>,

    // Model asset cache; default <checkpoint dir>/../hf_cache
    #[structopt(long = "cache-dir", parse(from_os_str))]
    cache_dir: Option<PathBuf>,

    // Sampler program and leading arguments
    #[structopt(long = "sampler-cmd")]
    sampler_cmd: Option<String>,

    #[structopt(long)]
    device: Option<String>,

    // Scratch space for the sampler handoff; default <output>.work
    #[structopt(long = "work-dir", parse(from_os_str))]
    work_dir: Option<PathBuf>,

    // Encoder program
    #[structopt(long, parse(from_os_str), default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    // Also write every frame as PNG here
    #[structopt(long = "frames-dir", parse(from_os_str))]
    frames_dir: Option<PathBuf>,

    // Display diagnostic info
    #[structopt(short, long)]
    debug: bool,

    // Display Timing info
    #[structopt(long)]
    timing: bool,
}

fn main() -> ExitCode {
    let opt = Opt::from_args();
    init_tracing(if opt.debug { "debug" } else { "info" });
    debug!("Opts: {:?}", opt);

    match run(&opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(hint) = e.hint() {
                eprintln!("  hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(opt: &Opt) -> InterpResult<()> {
    let st = Instant::now();
    let config = ModelConfig::new(opt.model_path.clone(), opt.config_path.clone())
        .with_cache_dir(opt.cache_dir.clone())
        .with_sampler_cmd(opt.sampler_cmd.as_deref())
        .with_device(opt.device.clone());

    let mut req = GenerationRequest::new(&opt.image1, &opt.image2, &opt.output);
    req.mode = opt.mode;
    req.params = SamplingParams {
        prompt: opt.prompt.clone(),
        num_frames: opt.frames,
        steps: opt.steps,
        cfg_scale: opt.cfg_scale,
        eta: opt.eta,
        fps: opt.fps,
        seed: opt.seed,
    };
    req.camera = CameraMotion::from_flags(
        opt.camera_pan_x,
        opt.camera_pan_y,
        opt.camera_zoom,
        opt.camera_rotate,
    );
    if let Some(ref path) = opt.regions {
        req.regions = load_regions(path)?;
    }
    req.frames_dir = opt.frames_dir.clone();

    let work_dir = opt
        .work_dir
        .clone()
        .unwrap_or_else(|| opt.output.with_extension("work"));
    let mut pipeline = DiffusionPipeline::new(&req, config, &work_dir)?;
    log_timing(opt.timing, st, "Validate and condition");

    let st = Instant::now();
    let writer = VideoWriter::new(opt.fps, VideoCodec::default()).with_ffmpeg(&opt.ffmpeg);
    let n = run_request(&mut pipeline, &req, &writer)?;
    log_timing(opt.timing, st, "Generation");
    info!("done: {n} frames -> {}", opt.output.display());
    Ok(())
}
