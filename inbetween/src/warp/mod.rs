use image::{Rgb, RgbImage};

use crate::data::Dim;
use crate::motion::WarpMotion;

// Forward 2x3 transform mapping source coordinates to destination coordinates
//   [ a b c ]
//   [ d e f ]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AffineMatrix {
    pub m: [[f64; 3]; 2],
}

impl AffineMatrix {
    pub const IDENTITY: AffineMatrix = AffineMatrix {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    };

    // counter-clockwise degrees, pivoted at `center`
    pub fn rotation_scale(center: (f64, f64), angle_deg: f64, scale: f64) -> Self {
        let (cx, cy) = center;
        let theta = angle_deg.to_radians();
        let alpha = scale * theta.cos();
        let beta = scale * theta.sin();
        Self {
            m: [
                [alpha, beta, (1.0 - alpha) * cx - beta * cy],
                [-beta, alpha, beta * cx + (1.0 - alpha) * cy],
            ],
        }
    }

    // rotation and zoom about the center, then a direct-fraction pan
    pub fn for_motion(dim: Dim, motion: &WarpMotion) -> Self {
        let (w, h) = (dim.width as f64, dim.height as f64);
        let mut mat = Self::rotation_scale((w / 2.0, h / 2.0), motion.rotate, motion.zoom);
        mat.m[0][2] += motion.pan_x * w;
        mat.m[1][2] += motion.pan_y * h;
        mat
    }

    pub fn invert(&self) -> Option<Self> {
        let [[a, b, c], [d, e, f]] = self.m;
        let det = a * e - b * d;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some(Self {
            m: [
                [e * inv, -b * inv, (b * f - c * e) * inv],
                [-d * inv, a * inv, (c * d - a * f) * inv],
            ],
        })
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [[a, b, c], [d, e, f]] = self.m;
        (a * x + b * y + c, d * x + e * y + f)
    }
}

// Mirror an out-of-range index back into [0, len), repeating the edge sample:
//   fedcba|abcdef|fedcba
#[inline]
pub fn reflect_index(p: i64, len: i64) -> i64 {
    if len <= 1 {
        return 0;
    }
    let period = 2 * len;
    let m = p.rem_euclid(period);
    if m >= len {
        period - 1 - m
    } else {
        m
    }
}

fn sample_bilinear(img: &RgbImage, sx: f64, sy: f64) -> Rgb<u8> {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let px = |x: i64, y: i64| {
        let x = reflect_index(x, w) as u32;
        let y = reflect_index(y, h) as u32;
        img.get_pixel(x, y).0
    };
    let p00 = px(x0, y0);
    let p10 = px(x0 + 1, y0);
    let p01 = px(x0, y0 + 1);
    let p11 = px(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        let v = top * (1.0 - fy) + bottom * fy;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

pub fn warp_affine(img: &RgbImage, mat: &AffineMatrix) -> RgbImage {
    let dim = Dim::of(img);
    if dim.is_empty() {
        return RgbImage::new(dim.width, dim.height);
    }
    // a similarity with zoom clamped to [0.5, 2] is always invertible
    let inv = mat.invert().unwrap_or(AffineMatrix::IDENTITY);
    RgbImage::from_fn(dim.width, dim.height, |x, y| {
        let (sx, sy) = inv.apply(x as f64, y as f64);
        sample_bilinear(img, sx, sy)
    })
}

pub fn warp_frame(img: &RgbImage, motion: &WarpMotion) -> RgbImage {
    if motion.is_identity() {
        return img.clone();
    }
    let mat = AffineMatrix::for_motion(Dim::of(img), motion);
    warp_affine(img, &mat)
}
