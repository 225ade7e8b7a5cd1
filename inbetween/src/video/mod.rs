use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::data::Dim;
use crate::util::tail_chars;
use crate::{InterpError, InterpResult};

pub const DEFAULT_FFMPEG: &str = "ffmpeg";
pub const DEFAULT_CRF: u8 = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VideoCodec {
    H264Crf(u8),
    Mp4v,
}

impl Default for VideoCodec {
    fn default() -> Self {
        VideoCodec::H264Crf(DEFAULT_CRF)
    }
}

impl VideoCodec {
    pub const fn name(&self) -> &'static str {
        match self {
            VideoCodec::H264Crf(_) => "h264",
            VideoCodec::Mp4v => "mp4v",
        }
    }

    pub fn args(&self) -> Vec<String> {
        match self {
            VideoCodec::H264Crf(crf) => vec![
                "-c:v".to_string(),
                "libx264".to_string(),
                "-crf".to_string(),
                crf.to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
            ],
            VideoCodec::Mp4v => ["-c:v", "mpeg4", "-vtag", "mp4v", "-q:v", "2"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoWriter {
    pub fps: u32,
    pub codec: VideoCodec,
    pub ffmpeg: PathBuf,
}

impl VideoWriter {
    pub fn new(fps: u32, codec: VideoCodec) -> Self {
        Self {
            fps: fps.max(1),
            codec,
            ffmpeg: PathBuf::from(DEFAULT_FFMPEG),
        }
    }

    pub fn with_ffmpeg(mut self, ffmpeg: impl AsRef<Path>) -> Self {
        self.ffmpeg = ffmpeg.as_ref().to_path_buf();
        self
    }

    pub fn build_args(&self, dim: Dim, path: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push(dim.to_string());
        args.push("-r".to_string());
        args.push(self.fps.to_string());
        args.push("-i".to_string());
        args.push("-".to_string());
        if !dim.is_even() {
            args.push("-vf".to_string());
            args.push("pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string());
        }
        args.extend(self.codec.args());
        args.push("-y".to_string());
        args.push(path.to_string_lossy().to_string());
        args
    }

    pub fn write(&self, frames: &[RgbImage], path: &Path) -> InterpResult<()> {
        let Some(first) = frames.first() else {
            return Err(InterpError::EmptyFrames);
        };
        let dim = Dim::of(first);
        for f in frames.iter().skip(1) {
            dim.ensure_same(&Dim::of(f))?;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let args = self.build_args(dim, path);
        debug!("{} {}", self.ffmpeg.display(), args.join(" "));
        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // A closed pipe means ffmpeg gave up; its exit status tells why
        let mut write_err = None;
        if let Some(mut stdin) = child.stdin.take() {
            for f in frames {
                if let Err(e) = stdin.write_all(f.as_raw()) {
                    write_err = Some(e);
                    break;
                }
            }
        }
        let out = child.wait_with_output()?;
        if !out.status.success() {
            return Err(InterpError::EncoderFailed {
                codec: self.codec.name(),
                code: out.status.code(),
                stderr: tail_chars(&String::from_utf8_lossy(&out.stderr), 2000),
            });
        }
        if let Some(e) = write_err {
            return Err(e.into());
        }
        info!(
            "wrote {} frames ({dim}, {} fps, {}) to {}",
            frames.len(),
            self.fps,
            self.codec.name(),
            path.display()
        );
        Ok(())
    }

    // one retry with mp4v when H.264 fails
    pub fn write_with_fallback(&self, frames: &[RgbImage], path: &Path) -> InterpResult<()> {
        match self.write(frames, path) {
            Err(InterpError::EncoderFailed { codec, stderr, .. }) if self.codec != VideoCodec::Mp4v => {
                warn!("{codec} encode failed, retrying with mp4v: {stderr}");
                let fallback = Self {
                    codec: VideoCodec::Mp4v,
                    ..self.clone()
                };
                fallback.write(frames, path)
            }
            res => res,
        }
    }
}

pub fn dump_frames(frames: &[RgbImage], dir: &Path) -> InterpResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(frames.len());
    for (i, f) in frames.iter().enumerate() {
        let p = dir.join(format!("frame_{i:04}.png"));
        f.save(&p)?;
        paths.push(p);
    }
    debug!("dumped {} frames to {}", paths.len(), dir.display());
    Ok(paths)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn h264_args() {
        let w = VideoWriter::new(16, VideoCodec::default());
        let args = w.build_args(Dim::new(512, 320), Path::new("out/x.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24 -s 512x320 -r 16 -i -"));
        assert!(joined.ends_with("-c:v libx264 -crf 10 -pix_fmt yuv420p -y out/x.mp4"));
        assert!(!joined.contains("pad="));
    }

    #[test]
    fn mp4v_args_pad_odd_sizes() {
        let w = VideoWriter::new(8, VideoCodec::Mp4v);
        let joined = w.build_args(Dim::new(5, 3), Path::new("o.mp4")).join(" ");
        assert!(joined.contains("-vf pad=ceil(iw/2)*2:ceil(ih/2)*2"));
        assert!(joined.contains("-c:v mpeg4 -vtag mp4v -q:v 2"));
    }

    #[test]
    fn empty_and_mixed_frames_are_rejected() {
        let w = VideoWriter::new(8, VideoCodec::default()).with_ffmpeg("/nonexistent/ffmpeg");
        assert!(matches!(w.write(&[], Path::new("o.mp4")), Err(InterpError::EmptyFrames)));
        let frames = vec![RgbImage::new(4, 4), RgbImage::new(4, 2)];
        assert!(matches!(
            w.write(&frames, Path::new("o.mp4")),
            Err(InterpError::DimensionMismatch { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn failing_encoder_falls_back_once() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffmpeg");
        let calls = dir.path().join("calls");
        // h264 fails, mp4v succeeds
        std::fs::write(
            &fake,
            format!(
                "#!/bin/sh\ncat > /dev/null\necho \"$@\" >> \"{}\"\ncase \"$*\" in *libx264*) echo nope >&2; exit 1;; esac\nexit 0\n",
                calls.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let frames = vec![RgbImage::new(4, 4); 3];
        let out = dir.path().join("nested/out.mp4");
        let w = VideoWriter::new(8, VideoCodec::default()).with_ffmpeg(&fake);
        assert!(matches!(w.write(&frames, &out), Err(InterpError::EncoderFailed { codec: "h264", .. })));
        w.write_with_fallback(&frames, &out).unwrap();
        let log = std::fs::read_to_string(&calls).unwrap();
        assert_eq!(log.lines().count(), 3);
        assert!(log.lines().last().unwrap().contains("mp4v"));
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn frames_are_dumped_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![RgbImage::new(2, 2); 3];
        let paths = dump_frames(&frames, &dir.path().join("f")).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[2].ends_with("frame_0002.png"));
        assert!(paths[0].exists());
    }
}
