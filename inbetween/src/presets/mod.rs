use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::mode::Mode;
use crate::model::SamplingParams;
use crate::motion::CameraMotion;
use crate::pipeline::GenerationRequest;
use crate::InterpError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Preset {
    BasicDefault,
    Prompted,
    HighQuality,
    GuidanceSweep,
    CameraPan,
    Zoom,
    Rotation,
    Combined,
    Comparison,
    Cinematic,
    Batch,
}

impl Preset {
    pub const ALL: [Preset; 11] = [
        Preset::BasicDefault,
        Preset::Prompted,
        Preset::HighQuality,
        Preset::GuidanceSweep,
        Preset::CameraPan,
        Preset::Zoom,
        Preset::Rotation,
        Preset::Combined,
        Preset::Comparison,
        Preset::Cinematic,
        Preset::Batch,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Preset::BasicDefault => "basic",
            Preset::Prompted => "prompted",
            Preset::HighQuality => "high-quality",
            Preset::GuidanceSweep => "guidance-sweep",
            Preset::CameraPan => "pan",
            Preset::Zoom => "zoom",
            Preset::Rotation => "rotate",
            Preset::Combined => "combined",
            Preset::Comparison => "comparison",
            Preset::Cinematic => "cinematic",
            Preset::Batch => "batch",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            Preset::BasicDefault => "plain interpolation with default settings",
            Preset::Prompted => "plain interpolation guided by a text prompt",
            Preset::HighQuality => "32 frames, 100 sampling steps",
            Preset::GuidanceSweep => "the same pair at cfg 5.0, 7.5 and 10.0",
            Preset::CameraPan => "pan right",
            Preset::Zoom => "dramatic zoom in",
            Preset::Rotation => "45 degree rotation",
            Preset::Combined => "pan up-right while zooming in",
            Preset::Comparison => "dynamicrafter vs steerable vs hybrid",
            Preset::Cinematic => "slow dolly zoom out",
            Preset::Batch => "four motion patterns over one pair",
        }
    }

    pub fn requests(&self, image1: &Path, image2: &Path, out_dir: &Path) -> Vec<GenerationRequest> {
        let req = |file: &str, mode: Mode, camera: Option<CameraMotion>, params: SamplingParams| {
            let mut r = GenerationRequest::new(image1, image2, out_dir.join(file));
            r.mode = mode;
            r.camera = camera;
            r.params = params;
            r
        };
        let params = |prompt: &str, num_frames: usize, seed: u64| SamplingParams {
            prompt: prompt.to_string(),
            num_frames,
            seed,
            ..Default::default()
        };
        let cam = CameraMotion::from_flags;

        match self {
            Preset::BasicDefault => vec![req("basic_example.mp4", Mode::Basic, None, params("", 16, 123))],
            Preset::Prompted => vec![req(
                "with_prompt.mp4",
                Mode::Basic,
                None,
                params("smooth camera movement", 16, 456),
            )],
            Preset::HighQuality => vec![req(
                "high_quality.mp4",
                Mode::Basic,
                None,
                SamplingParams {
                    steps: 100,
                    fps: 10,
                    ..params("cinematic transition", 32, 789)
                },
            )],
            Preset::GuidanceSweep => [(5.0, 111, "low"), (7.5, 222, "medium"), (10.0, 333, "high")]
                .into_iter()
                .map(|(cfg_scale, seed, name)| {
                    req(
                        &format!("{name}_guidance.mp4"),
                        Mode::Basic,
                        None,
                        SamplingParams {
                            cfg_scale,
                            ..params("", 16, seed)
                        },
                    )
                })
                .collect(),
            Preset::CameraPan => vec![req(
                "example_pan.mp4",
                Mode::Hybrid,
                cam(0.5, 0.0, 0.0, 0.0),
                params("smooth camera panning", 16, 123),
            )],
            Preset::Zoom => vec![req(
                "example_zoom.mp4",
                Mode::Hybrid,
                cam(0.0, 0.0, 0.8, 0.0),
                SamplingParams {
                    steps: 60,
                    cfg_scale: 8.0,
                    fps: 8,
                    ..params("dramatic zoom in", 20, 456)
                },
            )],
            Preset::Rotation => vec![req(
                "example_rotate.mp4",
                Mode::Hybrid,
                cam(0.0, 0.0, 0.0, 45.0),
                params("rotating view, smooth transition", 16, 789),
            )],
            Preset::Combined => vec![req(
                "example_combined.mp4",
                Mode::Hybrid,
                cam(0.3, -0.2, 0.6, 0.0),
                SamplingParams {
                    steps: 70,
                    fps: 8,
                    ..params("cinematic camera movement, pan and zoom", 24, 111)
                },
            )],
            Preset::Comparison => [Mode::Dynamicrafter, Mode::Steerable, Mode::Hybrid]
                .into_iter()
                .map(|mode| {
                    let camera = match mode {
                        Mode::Dynamicrafter => None,
                        _ => cam(0.4, 0.0, 0.3, 15.0),
                    };
                    req(
                        &format!("comparison_{mode}.mp4"),
                        mode,
                        camera,
                        params("smooth camera motion", 16, 222),
                    )
                })
                .collect(),
            Preset::Cinematic => vec![req(
                "example_cinematic.mp4",
                Mode::Hybrid,
                cam(0.0, 0.0, -0.5, 0.0),
                SamplingParams {
                    steps: 100,
                    cfg_scale: 8.5,
                    fps: 10,
                    ..params("cinematic dolly zoom effect, dramatic atmosphere", 32, 333)
                },
            )],
            Preset::Batch => [
                ("pan_left", (-0.6, 0.0, 0.0, 0.0), "camera panning left"),
                ("zoom_in", (0.0, 0.0, 0.8, 0.0), "zoom in smoothly"),
                ("rotate_ccw", (0.0, 0.0, 0.0, -30.0), "counter-clockwise rotation"),
                ("complex", (0.3, -0.2, 0.5, 20.0), "complex camera movement"),
            ]
            .into_iter()
            .zip(401..)
            .map(|((name, (px, py, z, r), prompt), seed)| {
                req(
                    &format!("batch_{name}.mp4"),
                    Mode::Hybrid,
                    cam(px, py, z, r),
                    params(prompt, 16, seed),
                )
            })
            .collect(),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| InterpError::InvalidPreset(s.to_string()))
    }
}
