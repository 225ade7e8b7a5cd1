use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;
use tracing::{debug, info};

use crate::blend::blend;
use crate::data::{Dim, TimedFrame};
use crate::util::tail_chars;
use crate::{InterpError, InterpResult};

pub trait MidpointModel {
    fn name(&self) -> &str;
    fn midpoint(&mut self, a: &RgbImage, b: &RgbImage) -> InterpResult<RgbImage>;
}

// In-process 50/50 average; stands in for a learned model
#[derive(Debug, Default)]
pub struct BlendMidpoint {
    pub calls: usize,
}

impl MidpointModel for BlendMidpoint {
    fn name(&self) -> &str {
        "blend"
    }
    fn midpoint(&mut self, a: &RgbImage, b: &RgbImage) -> InterpResult<RgbImage> {
        self.calls += 1;
        blend(a, b, 0.5)
    }
}

// <bin> -0 a.png -1 b.png -o out.png [-m model]
#[derive(Debug, Clone)]
pub struct RifeCommand {
    program: PathBuf,
    model: Option<String>,
    scratch_dir: PathBuf,
    seq: usize,
}

impl RifeCommand {
    // None when the binary can't be run
    pub fn locate(program: &str, model: Option<String>, scratch_dir: &Path) -> Option<Self> {
        let program = which::which(program).ok()?;
        Some(Self {
            program,
            model,
            scratch_dir: scratch_dir.to_path_buf(),
            seq: 0,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn build_command(&self, a: &Path, b: &Path, out: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-0").arg(a).arg("-1").arg(b).arg("-o").arg(out);
        if let Some(ref m) = self.model {
            cmd.arg("-m").arg(m);
        }
        cmd
    }

    fn run_pair(
        &self,
        a: &RgbImage,
        b: &RgbImage,
        a_path: &Path,
        b_path: &Path,
        out_path: &Path,
    ) -> InterpResult<RgbImage> {
        a.save(a_path)?;
        b.save(b_path)?;
        let output = self.build_command(a_path, b_path, out_path).output()?;
        if !output.status.success() || !out_path.exists() {
            return Err(InterpError::ModelInvocation {
                program: self.program.display().to_string(),
                code: output.status.code(),
                stderr: tail_chars(&String::from_utf8_lossy(&output.stderr), 2000),
            });
        }
        Ok(image::open(out_path)?.to_rgb8())
    }
}

impl MidpointModel for RifeCommand {
    fn name(&self) -> &str {
        "rife"
    }

    fn midpoint(&mut self, a: &RgbImage, b: &RgbImage) -> InterpResult<RgbImage> {
        Dim::of(a).ensure_same(&Dim::of(b))?;
        std::fs::create_dir_all(&self.scratch_dir)?;
        self.seq += 1;
        let a_path = self.scratch_dir.join(format!("pair{:04}_a.png", self.seq));
        let b_path = self.scratch_dir.join(format!("pair{:04}_b.png", self.seq));
        let out_path = self.scratch_dir.join(format!("pair{:04}_mid.png", self.seq));

        let result = self.run_pair(a, b, &a_path, &b_path, &out_path);
        for p in [&a_path, &b_path, &out_path] {
            let _ = std::fs::remove_file(p);
        }
        result
    }
}

// ceil(log2(n)) for n >= 1
pub fn ceil_log2(n: usize) -> u32 {
    let mut k = 0;
    while (1usize << k) < n {
        k += 1;
    }
    k
}

// ceil(log2(n - 1)) rounds of midpoint insertion; truncated, not resampled,
// unless n = 2^k + 1
pub fn binary_split<M>(
    model: &mut M,
    start: &RgbImage,
    end: &RgbImage,
    num_frames: usize,
) -> InterpResult<Vec<TimedFrame>>
where
    M: MidpointModel + ?Sized,
{
    Dim::of(start).ensure_same(&Dim::of(end))?;
    match num_frames {
        0 => return Err(InterpError::InvalidFrameCount(0)),
        1 => return Ok(vec![TimedFrame::new(0.0, start.clone())]),
        _ => {}
    }

    let rounds = ceil_log2(num_frames - 1);
    info!(
        "binary split with {} over {rounds} rounds for {num_frames} frames",
        model.name()
    );
    let mut frames = vec![
        TimedFrame::new(0.0, start.clone()),
        TimedFrame::new(1.0, end.clone()),
    ];
    for round in 0..rounds {
        let mut next = Vec::with_capacity(frames.len() * 2 - 1);
        for pair in frames.windows(2) {
            let (left, right) = (&pair[0], &pair[1]);
            let mid = model.midpoint(&left.frame, &right.frame)?;
            next.push(left.clone());
            next.push(TimedFrame::new((left.timestamp + right.timestamp) / 2.0, mid));
        }
        if let Some(last) = frames.pop() {
            next.push(last);
        }
        debug!("round {round}: {} frames", next.len());
        frames = next;
    }
    frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    frames.truncate(num_frames);
    Ok(frames)
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgb;

    fn solid(v: u8) -> RgbImage {
        RgbImage::from_pixel(4, 3, Rgb([v, v, v]))
    }

    #[test]
    fn ceil_log2_values() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(8), 3);
        assert_eq!(ceil_log2(15), 4);
    }

    #[test]
    fn power_of_two_plus_one_is_exact() {
        for k in 0..5u32 {
            let n = (1usize << k) + 1;
            let mut model = BlendMidpoint::default();
            let frames = binary_split(&mut model, &solid(0), &solid(255), n).unwrap();
            assert_eq!(frames.len(), n);
            assert_eq!(frames[0].timestamp, 0.0);
            assert_eq!(frames[n - 1].timestamp, 1.0);
            assert!(frames.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
            assert_eq!(model.calls, n - 2);
        }
    }

    #[test]
    fn other_counts_are_truncated() {
        let mut model = BlendMidpoint::default();
        let frames = binary_split(&mut model, &solid(0), &solid(255), 16).unwrap();
        assert_eq!(frames.len(), 16);
        // 17 frames were produced, the final one (t = 1.0) is dropped
        assert_eq!(frames[15].timestamp, 15.0 / 16.0);
        assert_eq!(model.calls, 15);
    }

    #[test]
    fn midpoints_land_between_neighbours() {
        let mut model = BlendMidpoint::default();
        let frames = binary_split(&mut model, &solid(0), &solid(200), 5).unwrap();
        let values: Vec<u8> = frames.iter().map(|f| f.frame.get_pixel(0, 0)[0]).collect();
        assert_eq!(values, vec![0, 50, 100, 150, 200]);
    }

    #[test]
    fn degenerate_counts() {
        let mut model = BlendMidpoint::default();
        assert!(binary_split(&mut model, &solid(1), &solid(2), 0).is_err());
        let one = binary_split(&mut model, &solid(1), &solid(2), 1).unwrap();
        assert_eq!(one.len(), 1);
        let two = binary_split(&mut model, &solid(1), &solid(2), 2).unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(model.calls, 0);
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_rife_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("rife-ncnn-vulkan");
        std::fs::write(&bin, "").unwrap();
        assert!(RifeCommand::locate(bin.to_str().unwrap(), None, dir.path()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn failed_pair_leaves_no_scratch() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("broken-rife");
        std::fs::write(&script, "#!/bin/sh\necho boom >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scratch = dir.path().join("pairs");
        let mut rife = RifeCommand::locate(script.to_str().unwrap(), None, &scratch).unwrap();
        let err = rife.midpoint(&solid(30), &solid(90)).unwrap_err();
        assert!(matches!(err, InterpError::ModelInvocation { code: Some(3), ref stderr, .. } if stderr.contains("boom")));
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[test]
    fn missing_rife_binary_is_not_located() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RifeCommand::locate("definitely-not-a-rife-binary", None, dir.path()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn rife_command_round_trips_through_a_fake_binary() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        // copies the first input to the output path
        let script = dir.path().join("fake-rife");
        std::fs::write(&script, "#!/bin/sh\ncp \"$2\" \"$6\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut rife =
            RifeCommand::locate(script.to_str().unwrap(), None, &dir.path().join("scratch")).unwrap();
        let mid = rife.midpoint(&solid(30), &solid(90)).unwrap();
        assert_eq!(mid, solid(30));
    }
}
