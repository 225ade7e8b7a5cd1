use std::io::{Read, Write};
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::debug;

use crate::data::Dim;
use crate::{InterpError, InterpResult};

// Decode any supported format into 8-bit RGB
pub fn load_rgb<P: AsRef<Path>>(path: P) -> InterpResult<RgbImage> {
    let img = image::open(path.as_ref())?;
    Ok(img.to_rgb8())
}

// Shorter side to the target's shorter side, then center crop
pub fn resize_center_crop(img: &RgbImage, target: Dim) -> RgbImage {
    let src = Dim::of(img);
    if src == target || src.is_empty() || target.is_empty() {
        return if src == target {
            img.clone()
        } else {
            RgbImage::new(target.width, target.height)
        };
    }
    let (w, h) = (src.width as f64, src.height as f64);
    let short_target = target.width.min(target.height) as f64;
    let mut scale = short_target / w.min(h);
    if (w * scale).round() < target.width as f64 || (h * scale).round() < target.height as f64 {
        scale = (target.width as f64 / w).max(target.height as f64 / h);
    }
    let nw = ((w * scale).round() as u32).max(target.width);
    let nh = ((h * scale).round() as u32).max(target.height);
    debug!("resize {src} -> {nw}x{nh}, crop to {target}");

    let resized = imageops::resize(img, nw, nh, FilterType::Triangle);
    let x = ((nw - target.width) as f64 / 2.0).round() as u32;
    let y = ((nh - target.height) as f64 / 2.0).round() as u32;
    imageops::crop_imm(&resized, x, y, target.width, target.height).to_image()
}

// CHW in [-1, 1]
pub fn to_normalized_chw(img: &RgbImage) -> Vec<f32> {
    let plane = Dim::of(img).area();
    let mut out = vec![0f32; plane * 3];
    for (i, px) in img.pixels().enumerate() {
        for c in 0..3 {
            out[c * plane + i] = px[c] as f32 / 255.0 * 2.0 - 1.0;
        }
    }
    out
}

pub fn samples_to_frames(
    samples: &[f32],
    channels: usize,
    frames: usize,
    height: usize,
    width: usize,
) -> InterpResult<Vec<RgbImage>> {
    let expected = 3 * frames * height * width;
    if channels != 3 || samples.len() != expected {
        return Err(InterpError::SampleShapeMismatch {
            expected,
            actual: samples.len(),
        });
    }
    let plane = height * width;
    let to_u8 = |v: f32| ((v.clamp(-1.0, 1.0) + 1.0) / 2.0 * 255.0) as u8;
    let out = (0..frames)
        .map(|t| {
            RgbImage::from_fn(width as u32, height as u32, |x, y| {
                let i = y as usize * width + x as usize;
                let at = |c: usize| samples[(c * frames + t) * plane + i];
                Rgb([to_u8(at(0)), to_u8(at(1)), to_u8(at(2))])
            })
        })
        .collect();
    Ok(out)
}

pub fn write_f32_le<W: Write>(writer: &mut W, values: &[f32]) -> InterpResult<()> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    writer.write_all(&buf)?;
    Ok(())
}

pub fn read_f32_le<R: Read>(reader: &mut R) -> InterpResult<Vec<f32>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    if buf.len() % 4 != 0 {
        return Err(InterpError::SampleShapeMismatch {
            expected: buf.len() / 4 * 4,
            actual: buf.len(),
        });
    }
    Ok(buf
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn landscape_is_cropped_to_working_resolution() {
        let img = RgbImage::from_pixel(1024, 768, Rgb([10, 20, 30]));
        let out = resize_center_crop(&img, Dim::new(512, 320));
        assert_eq!(out.dimensions(), (512, 320));
        assert_eq!(out.get_pixel(100, 100), &Rgb([10, 20, 30]));
    }

    #[test]
    fn square_and_portrait_inputs_cover_the_target() {
        for (w, h) in [(300, 300), (200, 900), (640, 320)] {
            let img = RgbImage::new(w, h);
            assert_eq!(resize_center_crop(&img, Dim::new(512, 320)).dimensions(), (512, 320));
        }
    }

    #[test]
    fn center_crop_keeps_the_middle() {
        // left half black, right half white, crop the middle 2 columns of 4 -> one of each
        let img = RgbImage::from_fn(640, 320, |x, _| if x < 320 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let out = resize_center_crop(&img, Dim::new(320, 320));
        assert_eq!(out.get_pixel(10, 10), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(310, 10), &Rgb([255, 255, 255]));
    }

    #[test]
    fn normalization_range() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([0, 255, 0]) } else { Rgb([255, 0, 255]) });
        let t = to_normalized_chw(&img);
        assert_eq!(t, vec![-1.0, 1.0, 1.0, -1.0, -1.0, 1.0]);
    }

    #[test]
    fn samples_map_back_to_pixels() {
        // C=3, T=2, H=1, W=2
        let samples = vec![
            -1.0, 1.0, 0.0, 2.0, // R: t0 (x0, x1), t1 (x0, x1)
            -1.0, -1.0, -1.0, -1.0, // G
            1.0, 1.0, 1.0, -5.0, // B
        ];
        let frames = samples_to_frames(&samples, 3, 2, 1, 2).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(frames[0].get_pixel(1, 0), &Rgb([255, 0, 255]));
        assert_eq!(frames[1].get_pixel(0, 0), &Rgb([127, 0, 255]));
        assert_eq!(frames[1].get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn sample_shape_is_checked() {
        let err = samples_to_frames(&[0.0; 5], 3, 1, 1, 2).unwrap_err();
        assert!(matches!(err, InterpError::SampleShapeMismatch { expected: 6, actual: 5 }));
    }

    #[test]
    fn f32_le_round_trip() {
        let mut buf = Vec::new();
        write_f32_le(&mut buf, &[1.5, -0.25]).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(read_f32_le(&mut buf.as_slice()).unwrap(), vec![1.5, -0.25]);
        assert!(read_f32_le(&mut [0u8; 3].as_slice()).is_err());
    }
}
