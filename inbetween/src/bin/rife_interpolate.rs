use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use structopt::clap::AppSettings;
use structopt::StructOpt;
use tracing::{debug, info};

use inbetween::interp::{MidpointModel, RifeCommand};
use inbetween::motion::WarpMotion;
use inbetween::pipeline::{run_request, FlowPipeline, GenerationRequest};
use inbetween::util::{init_tracing, log_timing};
use inbetween::video::{VideoCodec, VideoWriter};
use inbetween::{InterpResult, Mode};

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "rife-interpolate",
    about = "Interpolate between two images with a flow model and an affine camera move",
    setting = AppSettings::AllowNegativeNumbers
)]
struct Opt {
    #[structopt(long, parse(from_os_str))]
    image1: PathBuf,

    #[structopt(long, parse(from_os_str))]
    image2: PathBuf,

    #[structopt(short = "o", long, parse(from_os_str), default_value = "output.mp4")]
    output: PathBuf,

    #[structopt(long, default_value = "16")]
    frames: usize,

    #[structopt(long, default_value = "16")]
    fps: u32,

    // basic | hybrid | steerable
    #[structopt(long, default_value = "basic")]
    mode: Mode,

    // Pan as a fraction of width / height
    #[structopt(long = "pan-x", default_value = "0.0")]
    pan_x: f64,
    #[structopt(long = "pan-y", default_value = "0.0")]
    pan_y: f64,

    // Scale factor, 1.0 keeps the size
    #[structopt(long, default_value = "1.0")]
    zoom: f64,

    // Degrees, counter-clockwise
    #[structopt(long, default_value = "0.0")]
    rotate: f64,

    #[structopt(long = "rife-bin", default_value = "rife-ncnn-vulkan")]
    rife_bin: String,

    #[structopt(long = "rife-model")]
    rife_model: Option<String>,

    // Encode with mp4v instead of H.264
    #[structopt(long)]
    mp4v: bool,

    // Encoder program
    #[structopt(long, parse(from_os_str), default_value = "ffmpeg")]
    ffmpeg: PathBuf,

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
    let mut req = GenerationRequest::new(&opt.image1, &opt.image2, &opt.output);
    req.mode = opt.mode;
    req.params.num_frames = opt.frames;
    req.params.fps = opt.fps;
    req.warp = WarpMotion::new(opt.pan_x, opt.pan_y, opt.zoom, opt.rotate);
    req.frames_dir = opt.frames_dir.clone();

    let scratch = opt.output.with_extension("pairs");
    let model = RifeCommand::locate(&opt.rife_bin, opt.rife_model.clone(), &scratch)
        .map(|m| {
            info!("using {}", m.program().display());
            Box::new(m) as Box<dyn MidpointModel>
        });
    let mut pipeline = FlowPipeline::new(&req, model)?;
    log_timing(opt.timing, st, "Setup");

    let st = Instant::now();
    let codec = if opt.mp4v {
        VideoCodec::Mp4v
    } else {
        VideoCodec::default()
    };
    let writer = VideoWriter::new(opt.fps, codec).with_ffmpeg(&opt.ffmpeg);
    let result = run_request(&mut pipeline, &req, &writer);
    let _ = std::fs::remove_dir(&scratch);
    let n = result?;
    log_timing(opt.timing, st, "Interpolation");
    info!("done: {n} frames -> {}", opt.output.display());
    Ok(())
}
