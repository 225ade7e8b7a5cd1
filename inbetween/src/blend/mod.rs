use image::{Rgb, RgbImage};
use tracing::debug;

use crate::data::Dim;
use crate::{InterpError, InterpResult};

// Per-channel (1 - alpha)·a + alpha·b, rounded and saturated to u8
pub fn blend(a: &RgbImage, b: &RgbImage, alpha: f64) -> InterpResult<RgbImage> {
    Dim::of(a).ensure_same(&Dim::of(b))?;
    let alpha = alpha.clamp(0.0, 1.0);
    let mut out = RgbImage::new(a.width(), a.height());
    for ((o, pa), pb) in out.pixels_mut().zip(a.pixels()).zip(b.pixels()) {
        let mut px = [0u8; 3];
        for c in 0..3 {
            let v = pa[c] as f64 * (1.0 - alpha) + pb[c] as f64 * alpha;
            px[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        *o = Rgb(px);
    }
    Ok(out)
}

// Fallback when no midpoint model is available
pub fn cross_dissolve(
    start: &RgbImage,
    end: &RgbImage,
    num_frames: usize,
) -> InterpResult<Vec<RgbImage>> {
    Dim::of(start).ensure_same(&Dim::of(end))?;
    match num_frames {
        0 => return Err(InterpError::InvalidFrameCount(0)),
        1 => return Ok(vec![start.clone()]),
        _ => {}
    }
    debug!("cross-dissolving {num_frames} frames");
    let last = num_frames - 1;
    let mut frames = Vec::with_capacity(num_frames);
    frames.push(start.clone());
    for i in 1..last {
        frames.push(blend(start, end, i as f64 / last as f64)?);
    }
    frames.push(end.clone());
    Ok(frames)
}
