use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::{Dim, Region};
use crate::mode::Mode;
use crate::motion::{build_region_mask, generate_motion_field, CameraMotion, FlowField};
use crate::preprocess::{read_f32_le, samples_to_frames, to_normalized_chw, write_f32_le};
use crate::prompt::enhance_prompt;
use crate::util::tail_chars;
use crate::{InterpError, InterpResult};

pub const DEFAULT_MODEL_PATH: &str = "checkpoints/dynamicrafter_512_interp_v1/model.ckpt";
pub const DEFAULT_CONFIG_PATH: &str = "configs/inference_512_v1.0.yaml";
pub const DEFAULT_SAMPLER_CMD: &str = "python3 scripts/sample_interp.py";

// (H, W) = (320, 512)
pub const WORKING_RESOLUTION: Dim = Dim::new(512, 320);
pub const LATENT_CHANNELS: usize = 4;
pub const LATENT_DOWNSCALE: u32 = 8;

const CACHE_VARS: [&str; 3] = ["HF_HOME", "TRANSFORMERS_CACHE", "HF_DATASETS_CACHE"];
const SCRATCH_FILES: [&str; 5] = ["first.f32", "last.f32", "region_mask.f32", "request.json", "samples.f32"];
const RUN_FROM_ROOT_HINT: &str = "run from the model repository root or pass --sampler-cmd";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub config_path: PathBuf,
    // shared model-asset cache handed to the sampler process
    pub cache_dir: PathBuf,
    pub sampler_cmd: Vec<String>,
    pub device: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl ModelConfig {
    pub fn new(model_path: Option<PathBuf>, config_path: Option<PathBuf>) -> Self {
        let model_path = model_path.unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));
        let config_path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let cache_dir = Self::default_cache_dir(&model_path);
        Self {
            model_path,
            config_path,
            cache_dir,
            sampler_cmd: split_command(DEFAULT_SAMPLER_CMD),
            device: String::from("cuda"),
        }
    }

    // <checkpoint dir>/../hf_cache
    pub fn default_cache_dir(model_path: &Path) -> PathBuf {
        model_path
            .parent()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .join("hf_cache")
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = cache_dir {
            self.cache_dir = dir;
        }
        self
    }

    pub fn with_sampler_cmd(mut self, cmd: Option<&str>) -> Self {
        if let Some(cmd) = cmd {
            self.sampler_cmd = split_command(cmd);
        }
        self
    }

    pub fn with_device(mut self, device: Option<String>) -> Self {
        if let Some(device) = device {
            self.device = device;
        }
        self
    }

    // child process only
    pub fn cache_env(&self) -> Vec<(&'static str, PathBuf)> {
        CACHE_VARS
            .iter()
            .map(|k| (*k, self.cache_dir.clone()))
            .collect()
    }

    pub fn validate(&self) -> InterpResult<()> {
        if !self.model_path.is_file() {
            return Err(InterpError::CheckpointNotFound(self.model_path.clone()));
        }
        if !self.config_path.is_file() {
            return Err(InterpError::ConfigNotFound(self.config_path.clone()));
        }
        let Some(program) = self.sampler_cmd.first() else {
            return Err(InterpError::SamplerUnavailable {
                program: String::new(),
                hint: String::from("empty sampler command"),
            });
        };
        if which::which(program).is_err() {
            return Err(InterpError::SamplerUnavailable {
                program: program.clone(),
                hint: String::from(RUN_FROM_ROOT_HINT),
            });
        }
        // interpreter scripts are resolved relative to the working directory
        if let Some(script) = self.sampler_cmd[1..]
            .iter()
            .find(|a| !a.starts_with('-') && a.ends_with(".py"))
        {
            if !Path::new(script).is_file() {
                return Err(InterpError::SamplerUnavailable {
                    program: script.clone(),
                    hint: String::from(RUN_FROM_ROOT_HINT),
                });
            }
        }
        Ok(())
    }
}

fn split_command(cmd: &str) -> Vec<String> {
    cmd.split_whitespace().map(String::from).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    pub prompt: String,
    pub num_frames: usize,
    pub steps: u32,
    pub cfg_scale: f32,
    pub eta: f32,
    pub fps: u32,
    pub seed: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            num_frames: 16,
            steps: 50,
            cfg_scale: 7.5,
            eta: 1.0,
            fps: 5,
            seed: 123,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conditioning {
    pub mode: Mode,
    pub prompt: String,
    // [H, W]
    pub resolution: [u32; 2],
    // [batch, channels, frames, H/8, W/8]
    pub noise_shape: [usize; 5],
    pub fs: u32,
    pub first_frame_index: usize,
    pub last_frame_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraMotion>,
    // mean displacement of each frame's motion field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion_hints: Option<Vec<[f32; 2]>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<Region>,
}

impl Conditioning {
    pub fn build(
        params: &SamplingParams,
        mode: Mode,
        camera: Option<&CameraMotion>,
        regions: &[Region],
    ) -> InterpResult<Self> {
        let n = params.num_frames;
        if n < 2 {
            return Err(InterpError::InvalidFrameCount(n));
        }
        let res = WORKING_RESOLUTION;
        let camera = camera.filter(|_| mode.uses_motion()).copied();
        let motion_hints = camera.map(|cam| {
            let fields = generate_motion_field(res, n, &cam);
            info!("motion control on: {cam:?}");
            fields.iter().map(FlowField::mean).collect::<Vec<_>>()
        });
        let regions = if mode.uses_motion() {
            regions.to_vec()
        } else {
            Vec::new()
        };
        Ok(Self {
            mode,
            prompt: enhance_prompt(&params.prompt, camera.as_ref()),
            resolution: [res.height, res.width],
            noise_shape: [
                1,
                LATENT_CHANNELS,
                n,
                (res.height / LATENT_DOWNSCALE) as usize,
                (res.width / LATENT_DOWNSCALE) as usize,
            ],
            fs: params.fps,
            first_frame_index: 0,
            last_frame_index: n - 1,
            camera,
            motion_hints,
            regions,
        })
    }

    pub fn dim(&self) -> Dim {
        Dim::new(self.resolution[1], self.resolution[0])
    }
}

// endpoints are already at the working resolution
pub struct SamplingRequest<'a> {
    pub params: &'a SamplingParams,
    pub conditioning: &'a Conditioning,
    pub first: &'a RgbImage,
    pub last: &'a RgbImage,
}

pub trait Sampler {
    fn sample(&mut self, request: &SamplingRequest<'_>) -> InterpResult<Vec<RgbImage>>;
}

// request.json handed to the external sampler
#[derive(Debug, Serialize)]
struct SamplerRequestFile<'a> {
    model_path: &'a Path,
    config_path: &'a Path,
    device: &'a str,
    params: &'a SamplingParams,
    conditioning: &'a Conditioning,
    // [C, H, W], little-endian f32 in [-1, 1]
    input_shape: [usize; 3],
    first: PathBuf,
    last: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    region_mask: Option<PathBuf>,
    // [C, T, H, W] expected back at this path
    output: PathBuf,
}

pub struct ExternalSampler {
    config: ModelConfig,
    work_dir: PathBuf,
}

impl ExternalSampler {
    pub fn new(config: ModelConfig, work_dir: impl AsRef<Path>) -> Self {
        Self {
            config,
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }

    fn write_tensor(path: &Path, values: &[f32]) -> InterpResult<()> {
        let mut w = BufWriter::new(File::create(path)?);
        write_f32_le(&mut w, values)?;
        w.flush()?;
        Ok(())
    }

    fn write_request(&self, request: &SamplingRequest<'_>) -> InterpResult<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(&self.work_dir)?;
        let dim = request.conditioning.dim();
        Dim::of(request.first).ensure_same(&dim)?;
        Dim::of(request.last).ensure_same(&dim)?;

        let first = self.work_dir.join("first.f32");
        let last = self.work_dir.join("last.f32");
        Self::write_tensor(&first, &to_normalized_chw(request.first))?;
        Self::write_tensor(&last, &to_normalized_chw(request.last))?;

        let region_mask = if request.conditioning.regions.is_empty() {
            None
        } else {
            let path = self.work_dir.join("region_mask.f32");
            let mask = build_region_mask(dim, &request.conditioning.regions);
            Self::write_tensor(&path, mask.as_slice())?;
            Some(path)
        };

        let output = self.work_dir.join("samples.f32");
        let _ = std::fs::remove_file(&output);
        let file = SamplerRequestFile {
            model_path: &self.config.model_path,
            config_path: &self.config.config_path,
            device: &self.config.device,
            params: request.params,
            conditioning: request.conditioning,
            input_shape: [3, dim.height as usize, dim.width as usize],
            first,
            last,
            region_mask,
            output: output.clone(),
        };
        let json_path = self.work_dir.join("request.json");
        let mut w = BufWriter::new(File::create(&json_path)?);
        serde_json::to_writer_pretty(&mut w, &file)?;
        w.flush()?;
        Ok((json_path, output))
    }

    fn clean_up(&self) {
        for name in SCRATCH_FILES {
            let _ = std::fs::remove_file(self.work_dir.join(name));
        }
        // succeeds only when nothing else lives there
        let _ = std::fs::remove_dir(&self.work_dir);
    }

    fn run(&self, request: &SamplingRequest<'_>) -> InterpResult<Vec<RgbImage>> {
        let (json_path, output) = self.write_request(request)?;
        std::fs::create_dir_all(&self.config.cache_dir)?;

        let Some((program, args)) = self.config.sampler_cmd.split_first() else {
            return Err(InterpError::SamplerUnavailable {
                program: String::new(),
                hint: String::from("empty sampler command"),
            });
        };
        info!(
            "sampling {} frames, {} steps, cfg {} with `{program}`",
            request.params.num_frames, request.params.steps, request.params.cfg_scale
        );
        let result = Command::new(program)
            .args(args)
            .arg("--request")
            .arg(&json_path)
            .arg("--output")
            .arg(&output)
            .envs(self.config.cache_env())
            .output()
            .map_err(|e| {
                warn!("could not start sampler: {e}");
                InterpError::SamplerUnavailable {
                    program: program.clone(),
                    hint: String::from(RUN_FROM_ROOT_HINT),
                }
            })?;
        for line in String::from_utf8_lossy(&result.stdout).lines() {
            debug!("sampler: {line}");
        }
        if !result.status.success() || !output.exists() {
            return Err(InterpError::ModelInvocation {
                program: program.clone(),
                code: result.status.code(),
                stderr: tail_chars(&String::from_utf8_lossy(&result.stderr), 2000),
            });
        }

        let samples = read_f32_le(&mut BufReader::new(File::open(&output)?))?;
        let [h, w] = request.conditioning.resolution;
        samples_to_frames(&samples, 3, request.params.num_frames, h as usize, w as usize)
    }
}

impl Sampler for ExternalSampler {
    fn sample(&mut self, request: &SamplingRequest<'_>) -> InterpResult<Vec<RgbImage>> {
        let result = self.run(request);
        self.clean_up();
        result
    }
}
