use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{info, warn};

use crate::blend::cross_dissolve;
use crate::data::{Dim, Region};
use crate::interp::{binary_split, MidpointModel};
use crate::mode::Mode;
use crate::model::{Conditioning, ExternalSampler, ModelConfig, Sampler, SamplingParams, SamplingRequest};
use crate::motion::{CameraMotion, WarpMotion};
use crate::preprocess::{load_rgb, resize_center_crop};
use crate::video::{dump_frames, VideoWriter};
use crate::warp::warp_frame;
use crate::{InterpError, InterpResult};

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub image1: PathBuf,
    pub image2: PathBuf,
    pub output: PathBuf,
    pub params: SamplingParams,
    pub mode: Mode,
    // vector-field convention, diffusion conditioning only
    pub camera: Option<CameraMotion>,
    // affine convention, flow pipeline only
    pub warp: WarpMotion,
    pub regions: Vec<Region>,
    pub frames_dir: Option<PathBuf>,
}

impl GenerationRequest {
    pub fn new(image1: impl AsRef<Path>, image2: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            image1: image1.as_ref().to_path_buf(),
            image2: image2.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            params: SamplingParams::default(),
            mode: Mode::default(),
            camera: None,
            warp: WarpMotion::IDENTITY,
            regions: Vec::new(),
            frames_dir: None,
        }
    }
}

pub trait Pipeline {
    fn name(&self) -> &str;
    fn generate(&mut self, start: &RgbImage, end: &RgbImage) -> InterpResult<Vec<RgbImage>>;
}

// Read a JSON array of `{"bbox": [x1, y1, x2, y2], "motion": [dx, dy]}`
pub fn load_regions(path: &Path) -> InterpResult<Vec<Region>> {
    let regions: Vec<Region> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    info!("loaded {} motion regions from {}", regions.len(), path.display());
    Ok(regions)
}

pub fn run_request(
    pipeline: &mut dyn Pipeline,
    req: &GenerationRequest,
    writer: &VideoWriter,
) -> InterpResult<usize> {
    let start = load_rgb(&req.image1)?;
    let end = load_rgb(&req.image2)?;
    info!(
        "{} pipeline, mode {}: {} -> {}",
        pipeline.name(),
        req.mode,
        req.image1.display(),
        req.image2.display()
    );
    let frames = pipeline.generate(&start, &end)?;
    if let Some(ref dir) = req.frames_dir {
        dump_frames(&frames, dir)?;
    }
    writer.write_with_fallback(&frames, &req.output)?;
    Ok(frames.len())
}

pub struct DiffusionPipeline {
    params: SamplingParams,
    conditioning: Conditioning,
    sampler: Box<dyn Sampler>,
}

impl DiffusionPipeline {
    pub fn new(req: &GenerationRequest, config: ModelConfig, work_dir: &Path) -> InterpResult<Self> {
        config.validate()?;
        Self::with_sampler(req, Box::new(ExternalSampler::new(config, work_dir)))
    }

    pub fn with_sampler(req: &GenerationRequest, sampler: Box<dyn Sampler>) -> InterpResult<Self> {
        let conditioning = Conditioning::build(&req.params, req.mode, req.camera.as_ref(), &req.regions)?;
        Ok(Self {
            params: req.params.clone(),
            conditioning,
            sampler,
        })
    }

    pub fn conditioning(&self) -> &Conditioning {
        &self.conditioning
    }
}

impl Pipeline for DiffusionPipeline {
    fn name(&self) -> &str {
        "diffusion"
    }

    fn generate(&mut self, start: &RgbImage, end: &RgbImage) -> InterpResult<Vec<RgbImage>> {
        let dim = self.conditioning.dim();
        let first = resize_center_crop(start, dim);
        let last = resize_center_crop(end, dim);
        let frames = self.sampler.sample(&SamplingRequest {
            params: &self.params,
            conditioning: &self.conditioning,
            first: &first,
            last: &last,
        })?;
        if frames.len() != self.params.num_frames {
            return Err(InterpError::SampleShapeMismatch {
                expected: self.params.num_frames,
                actual: frames.len(),
            });
        }
        Ok(frames)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum FlowStrategy {
    Plain,
    // warp the end frame, then interpolate
    WarpEnd(WarpMotion),
    // interpolate, then warp each frame by its share of the motion
    WarpRamp(WarpMotion),
}

impl FlowStrategy {
    fn for_mode(mode: Mode, warp: WarpMotion) -> InterpResult<Self> {
        match mode {
            Mode::Basic => Ok(FlowStrategy::Plain),
            Mode::Hybrid => Ok(FlowStrategy::WarpEnd(warp)),
            Mode::Steerable => Ok(FlowStrategy::WarpRamp(warp)),
            Mode::Dynamicrafter => Err(InterpError::UnsupportedMode(mode)),
        }
    }
}

pub struct FlowPipeline {
    num_frames: usize,
    strategy: FlowStrategy,
    // None falls back to a cross-dissolve
    model: Option<Box<dyn MidpointModel>>,
}

impl FlowPipeline {
    pub fn new(req: &GenerationRequest, model: Option<Box<dyn MidpointModel>>) -> InterpResult<Self> {
        let strategy = FlowStrategy::for_mode(req.mode, req.warp)?;
        if model.is_none() {
            warn!("no interpolation model available, falling back to a linear cross-dissolve");
        }
        Ok(Self {
            num_frames: req.params.num_frames,
            strategy,
            model,
        })
    }

    fn interpolate(&mut self, start: &RgbImage, end: &RgbImage) -> InterpResult<Vec<RgbImage>> {
        match self.model {
            Some(ref mut model) => Ok(binary_split(model.as_mut(), start, end, self.num_frames)?
                .into_iter()
                .map(|t| t.frame)
                .collect()),
            None => cross_dissolve(start, end, self.num_frames),
        }
    }
}

impl Pipeline for FlowPipeline {
    fn name(&self) -> &str {
        match self.model {
            Some(ref m) => m.name(),
            None => "cross-dissolve",
        }
    }

    fn generate(&mut self, start: &RgbImage, end: &RgbImage) -> InterpResult<Vec<RgbImage>> {
        let dim = Dim::of(start);
        let resized;
        let end = if Dim::of(end) != dim {
            info!("resizing end frame {} to {dim}", Dim::of(end));
            resized = imageops::resize(end, dim.width, dim.height, FilterType::Triangle);
            &resized
        } else {
            end
        };

        match self.strategy {
            FlowStrategy::Plain => self.interpolate(start, end),
            FlowStrategy::WarpEnd(warp) => {
                let warped = warp_frame(end, &warp);
                self.interpolate(start, &warped)
            }
            FlowStrategy::WarpRamp(warp) => {
                let frames = self.interpolate(start, end)?;
                let last = frames.len().saturating_sub(1).max(1) as f64;
                Ok(frames
                    .iter()
                    .enumerate()
                    .map(|(i, f)| warp_frame(f, &warp.at_progress(i as f64 / last)))
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interp::BlendMidpoint;
    use image::Rgb;
    use std::sync::{Arc, Mutex};

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 20) as u8, (y * 30) as u8, 100]))
    }

    fn flow_request(mode: Mode, frames: usize, warp: WarpMotion) -> GenerationRequest {
        let mut req = GenerationRequest::new("a.png", "b.png", "out.mp4");
        req.mode = mode;
        req.warp = warp;
        req.params.num_frames = frames;
        req
    }

    #[test]
    fn basic_flow_keeps_endpoints() {
        let start = RgbImage::from_pixel(8, 6, Rgb([0, 0, 0]));
        let end = RgbImage::from_pixel(8, 6, Rgb([200, 200, 200]));
        let req = flow_request(Mode::Basic, 5, WarpMotion::IDENTITY);
        let mut p = FlowPipeline::new(&req, Some(Box::new(BlendMidpoint::default()))).unwrap();
        assert_eq!(p.name(), "blend");
        let frames = p.generate(&start, &end).unwrap();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0], start);
        assert_eq!(frames[4], end);
        assert_eq!(frames[2].get_pixel(0, 0), &Rgb([100, 100, 100]));
    }

    #[test]
    fn hybrid_warps_the_end_frame() {
        let start = gradient(10, 8);
        let end = gradient(10, 8);
        let warp = WarpMotion::new(0.2, 0.0, 1.0, 0.0);
        let req = flow_request(Mode::Hybrid, 3, warp);
        let mut p = FlowPipeline::new(&req, Some(Box::new(BlendMidpoint::default()))).unwrap();
        let frames = p.generate(&start, &end).unwrap();
        assert_eq!(frames[0], start);
        assert_eq!(frames[2], warp_frame(&end, &warp));
    }

    #[test]
    fn steerable_ramps_the_warp() {
        let start = gradient(10, 8);
        let end = gradient(10, 8);
        let warp = WarpMotion::new(0.0, 0.0, 1.5, 30.0);
        let req = flow_request(Mode::Steerable, 3, warp);
        let mut p = FlowPipeline::new(&req, None).unwrap();
        let frames = p.generate(&start, &end).unwrap();
        assert_eq!(frames.len(), 3);
        // progress 0 is the identity
        assert_eq!(frames[0], start);
        assert_eq!(frames[2], warp_frame(&end, &warp));
        assert_eq!(frames[1], warp_frame(&start, &warp.at_progress(0.5)));
    }

    #[test]
    fn fallback_dissolves_and_resizes_end() {
        let start = RgbImage::from_pixel(8, 4, Rgb([0, 0, 0]));
        let end = RgbImage::from_pixel(16, 8, Rgb([100, 100, 100]));
        let req = flow_request(Mode::Basic, 3, WarpMotion::IDENTITY);
        let mut p = FlowPipeline::new(&req, None).unwrap();
        assert_eq!(p.name(), "cross-dissolve");
        let frames = p.generate(&start, &end).unwrap();
        assert!(frames.iter().all(|f| f.dimensions() == (8, 4)));
        assert_eq!(frames[1].get_pixel(3, 2), &Rgb([50, 50, 50]));
    }

    #[cfg(unix)]
    #[test]
    fn unusable_rife_binary_degrades_to_dissolve() {
        use crate::interp::RifeCommand;
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("rife-ncnn-vulkan");
        std::fs::write(&bin, "").unwrap();
        let model = RifeCommand::locate(bin.to_str().unwrap(), None, &dir.path().join("pairs"))
            .map(|m| Box::new(m) as Box<dyn MidpointModel>);

        let req = flow_request(Mode::Basic, 3, WarpMotion::IDENTITY);
        let mut p = FlowPipeline::new(&req, model).unwrap();
        assert_eq!(p.name(), "cross-dissolve");
        let start = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let end = RgbImage::from_pixel(4, 4, Rgb([80, 80, 80]));
        let frames = p.generate(&start, &end).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].get_pixel(0, 0), &Rgb([40, 40, 40]));
    }

    #[test]
    fn flow_rejects_diffusion_mode() {
        let req = flow_request(Mode::Dynamicrafter, 3, WarpMotion::IDENTITY);
        assert!(matches!(
            FlowPipeline::new(&req, None),
            Err(InterpError::UnsupportedMode(Mode::Dynamicrafter))
        ));
    }

    // Returns flat frames and records the prompt it was conditioned on
    struct FakeSampler {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl Sampler for FakeSampler {
        fn sample(&mut self, request: &SamplingRequest<'_>) -> InterpResult<Vec<RgbImage>> {
            self.prompts.lock().unwrap().push(request.conditioning.prompt.clone());
            assert_eq!(request.first.dimensions(), (512, 320));
            assert_eq!(request.last.dimensions(), (512, 320));
            let dim = request.conditioning.dim();
            Ok(vec![RgbImage::new(dim.width, dim.height); request.params.num_frames])
        }
    }

    #[test]
    fn diffusion_preprocesses_and_conditions() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let mut req = GenerationRequest::new("a.png", "b.png", "out.mp4");
        req.mode = Mode::Steerable;
        req.params.num_frames = 4;
        req.params.prompt = String::from("a dog");
        req.camera = CameraMotion::from_flags(0.0, 0.0, 0.0, 45.0);
        let mut p = DiffusionPipeline::with_sampler(
            &req,
            Box::new(FakeSampler {
                prompts: prompts.clone(),
            }),
        )
        .unwrap();
        assert_eq!(p.conditioning().noise_shape[2], 4);
        let frames = p.generate(&gradient(640, 480), &gradient(300, 300)).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(prompts.lock().unwrap()[0], "a dog, camera motion: rotate 45 degrees");
    }

    #[test]
    fn diffusion_config_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let req = GenerationRequest::new("a.png", "b.png", "out.mp4");
        let config = ModelConfig::new(Some(dir.path().join("missing.ckpt")), None);
        assert!(matches!(
            DiffusionPipeline::new(&req, config, dir.path()),
            Err(InterpError::CheckpointNotFound(_))
        ));
    }

    #[test]
    fn regions_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.json");
        std::fs::write(&path, r#"[{"bbox":[0,0,4,4],"motion":[2.0,0.0]}]"#).unwrap();
        let regions = load_regions(&path).unwrap();
        assert_eq!(regions, vec![Region::new([0, 0, 4, 4], [2.0, 0.0])]);

        std::fs::write(&path, r#"[{"bbox":[-8,0,-1,4],"motion":[0.0,1.0]}]"#).unwrap();
        assert_eq!(load_regions(&path).unwrap()[0].bbox, [-8, 0, -1, 4]);
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(load_regions(&path), Err(InterpError::JsonErr(_))));
    }

    #[cfg(unix)]
    #[test]
    fn run_request_dumps_and_encodes() {
        use crate::video::VideoCodec;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffmpeg");
        std::fs::write(&fake, "#!/bin/sh\ncat > /dev/null\nfor a; do last=\"$a\"; done\ntouch \"$last\"\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        gradient(8, 8).save(&a).unwrap();
        gradient(8, 8).save(&b).unwrap();
        let mut req = flow_request(Mode::Basic, 4, WarpMotion::IDENTITY);
        req.image1 = a;
        req.image2 = b;
        req.output = dir.path().join("out/result.mp4");
        req.frames_dir = Some(dir.path().join("frames"));

        let mut p = FlowPipeline::new(&req, Some(Box::new(BlendMidpoint::default()))).unwrap();
        let writer = VideoWriter::new(16, VideoCodec::default()).with_ffmpeg(&fake);
        assert_eq!(run_request(&mut p, &req, &writer).unwrap(), 4);
        assert!(req.output.exists());
        assert!(dir.path().join("frames/frame_0003.png").exists());
    }
}
