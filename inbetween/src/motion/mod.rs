use serde::{Deserialize, Serialize};

use crate::data::{Dim, Region};

// Fraction of the frame size a full pan moves a single field
pub const FIELD_PAN_SCALE: f64 = 0.1;
// Radial gain per unit of zoom in a single field
pub const FIELD_ZOOM_SCALE: f64 = 0.1;
// Below these magnitudes the zoom / rotation terms are skipped entirely
pub const ZOOM_EPSILON: f64 = 0.01;
pub const ROTATE_EPSILON_DEG: f64 = 0.1;

pub const PAN_RANGE: (f64, f64) = (-1.0, 1.0);
pub const FIELD_ZOOM_RANGE: (f64, f64) = (-1.0, 1.0);
pub const WARP_ZOOM_RANGE: (f64, f64) = (0.5, 2.0);
pub const ROTATE_RANGE: (f64, f64) = (-180.0, 180.0);

fn clamp(v: f64, (lo, hi): (f64, f64)) -> f64 {
    // NaN collapses to the neutral lower bound rather than poisoning the field
    if v.is_nan() {
        return lo.max(0.0).min(hi);
    }
    v.clamp(lo, hi)
}

// vector-field convention
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraMotion {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
    pub rotate: f64,
}

impl CameraMotion {
    pub fn new(pan_x: f64, pan_y: f64, zoom: f64, rotate: f64) -> Self {
        Self {
            pan_x: clamp(pan_x, PAN_RANGE),
            pan_y: clamp(pan_y, PAN_RANGE),
            zoom: clamp(zoom, FIELD_ZOOM_RANGE),
            rotate: clamp(rotate, ROTATE_RANGE),
        }
    }

    pub fn is_still(&self) -> bool {
        self.pan_x == 0.0 && self.pan_y == 0.0 && self.zoom == 0.0 && self.rotate == 0.0
    }

    // Only build a motion when at least one parameter was given
    pub fn from_flags(pan_x: f64, pan_y: f64, zoom: f64, rotate: f64) -> Option<Self> {
        let m = Self::new(pan_x, pan_y, zoom, rotate);
        if m.is_still() {
            None
        } else {
            Some(m)
        }
    }
}

// affine-warp convention
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpMotion {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
    pub rotate: f64,
}

impl Default for WarpMotion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl WarpMotion {
    pub const IDENTITY: WarpMotion = WarpMotion {
        pan_x: 0.0,
        pan_y: 0.0,
        zoom: 1.0,
        rotate: 0.0,
    };

    pub fn new(pan_x: f64, pan_y: f64, zoom: f64, rotate: f64) -> Self {
        Self {
            pan_x: clamp(pan_x, PAN_RANGE),
            pan_y: clamp(pan_y, PAN_RANGE),
            zoom: if zoom.is_nan() {
                1.0
            } else {
                clamp(zoom, WARP_ZOOM_RANGE)
            },
            rotate: clamp(rotate, ROTATE_RANGE),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    // zoom ramps from 1.0
    pub fn at_progress(&self, progress: f64) -> Self {
        let p = progress.clamp(0.0, 1.0);
        Self {
            pan_x: self.pan_x * p,
            pan_y: self.pan_y * p,
            zoom: 1.0 + (self.zoom - 1.0) * p,
            rotate: self.rotate * p,
        }
    }
}

// H x W x 2, row-major, interleaved (x, y)
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    dim: Dim,
    data: Vec<f32>,
}

impl FlowField {
    pub fn zeros(dim: Dim) -> Self {
        Self {
            dim,
            data: vec![0.0; dim.area() * 2],
        }
    }

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize * self.dim.width as usize + x as usize) * 2
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 2] {
        let i = self.idx(x, y);
        [self.data[i], self.data[i + 1]]
    }

    pub fn set(&mut self, x: u32, y: u32, v: [f32; 2]) {
        let i = self.idx(x, y);
        self.data[i] = v[0];
        self.data[i + 1] = v[1];
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|v| *v == 0.0)
    }

    pub fn mean(&self) -> [f32; 2] {
        let n = self.dim.area();
        if n == 0 {
            return [0.0, 0.0];
        }
        let (sx, sy) = self
            .data
            .chunks_exact(2)
            .fold((0f64, 0f64), |(sx, sy), v| (sx + v[0] as f64, sy + v[1] as f64));
        [(sx / n as f64) as f32, (sy / n as f64) as f32]
    }
}

// Pan, zoom and rotation are summed, not composed. Rotation is the small-angle
// tangential term (-dy·sin a, dx·sin a).
pub fn generate_motion_field(dim: Dim, num_frames: usize, motion: &CameraMotion) -> Vec<FlowField> {
    let (w, h) = (dim.width as f64, dim.height as f64);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let denom = num_frames.saturating_sub(1).max(1) as f64;

    (0..num_frames)
        .map(|t| {
            let progress = t as f64 / denom;
            let pan = (
                motion.pan_x * progress * w * FIELD_PAN_SCALE,
                motion.pan_y * progress * h * FIELD_PAN_SCALE,
            );
            let zoom_factor = if motion.zoom.abs() > ZOOM_EPSILON {
                Some(motion.zoom * progress * FIELD_ZOOM_SCALE)
            } else {
                None
            };
            let sin_a = if motion.rotate.abs() > ROTATE_EPSILON_DEG {
                Some((motion.rotate * progress).to_radians().sin())
            } else {
                None
            };

            let mut field = FlowField::zeros(dim);
            for y in 0..dim.height {
                let dy = y as f64 - cy;
                for x in 0..dim.width {
                    let dx = x as f64 - cx;
                    let (mut fx, mut fy) = pan;
                    if let Some(z) = zoom_factor {
                        fx += dx * z;
                        fy += dy * z;
                    }
                    if let Some(s) = sin_a {
                        fx += -dy * s;
                        fy += dx * s;
                    }
                    field.set(x, y, [fx as f32, fy as f32]);
                }
            }
            field
        })
        .collect()
}

// Slice bounds as an array index would take them: negative values count back
// from `len`, everything is cut to [0, len]
fn slice_range(start: i64, end: i64, len: u32) -> std::ops::Range<u32> {
    let len = len as i64;
    let bound = |i: i64| if i < 0 { (i + len).max(0) } else { i.min(len) };
    (bound(start) as u32)..(bound(end) as u32)
}

// Later regions overwrite earlier ones; boxes are not validated
pub fn build_region_mask(dim: Dim, regions: &[Region]) -> FlowField {
    let mut mask = FlowField::zeros(dim);
    for region in regions {
        let [x1, y1, x2, y2] = region.bbox;
        let xs = slice_range(x1, x2, dim.width);
        for y in slice_range(y1, y2, dim.height) {
            for x in xs.clone() {
                mask.set(x, y, region.motion);
            }
        }
    }
    mask
}

#[cfg(test)]
mod test {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn still_camera_gives_zero_fields() {
        let fields = generate_motion_field(Dim::new(7, 5), 6, &CameraMotion::default());
        assert_eq!(fields.len(), 6);
        assert!(fields.iter().all(FlowField::is_zero));
    }

    #[test]
    fn first_frame_is_identity_for_every_component() {
        let motion = CameraMotion::new(0.7, -0.3, 0.5, 90.0);
        let fields = generate_motion_field(Dim::new(9, 6), 4, &motion);
        assert!(fields[0].is_zero());
        assert!(!fields[3].is_zero());
    }

    #[test]
    fn shape_matches_request() {
        let fields = generate_motion_field(Dim::new(8, 3), 5, &CameraMotion::new(1.0, 0.0, 0.0, 0.0));
        assert_eq!(fields.len(), 5);
        for f in &fields {
            assert_eq!(f.dim(), Dim::new(8, 3));
            assert_eq!(f.as_slice().len(), 8 * 3 * 2);
        }
        assert!(generate_motion_field(Dim::new(8, 3), 0, &CameraMotion::default()).is_empty());
    }

    #[test]
    fn pan_scenario_4x4_three_frames() {
        let fields = generate_motion_field(Dim::new(4, 4), 3, &CameraMotion::new(1.0, 0.0, 0.0, 0.0));
        assert!(fields[0].is_zero());
        for y in 0..4 {
            for x in 0..4 {
                let [fx, fy] = fields[2].get(x, y);
                assert!(close(fx, 0.4), "x at ({x},{y}) = {fx}");
                assert_eq!(fy, 0.0);
                let [mx, _] = fields[1].get(x, y);
                assert!(close(mx, 0.2));
            }
        }
    }

    #[test]
    fn single_frame_uses_zero_progress() {
        let fields = generate_motion_field(Dim::new(4, 4), 1, &CameraMotion::new(1.0, 1.0, 1.0, 90.0));
        assert_eq!(fields.len(), 1);
        assert!(fields[0].is_zero());
    }

    #[test]
    fn zoom_is_radial_about_center() {
        let fields = generate_motion_field(Dim::new(4, 4), 2, &CameraMotion::new(0.0, 0.0, 1.0, 0.0));
        // center is (2, 2); pixel (0, 0) is offset (-2, -2)
        let [fx, fy] = fields[1].get(0, 0);
        assert!(close(fx, -0.2) && close(fy, -0.2));
        assert_eq!(fields[1].get(2, 2), [0.0, 0.0]);
        let [fx, fy] = fields[1].get(3, 2);
        assert!(close(fx, 0.1) && close(fy, 0.0));
    }

    #[test]
    fn tiny_zoom_and_rotation_are_ignored() {
        let fields = generate_motion_field(Dim::new(4, 4), 2, &CameraMotion::new(0.0, 0.0, 0.005, 0.05));
        assert!(fields[1].is_zero());
    }

    #[test]
    fn rotation_uses_sine_only() {
        let fields = generate_motion_field(Dim::new(4, 4), 2, &CameraMotion::new(0.0, 0.0, 0.0, 90.0));
        // offset (1, 0) from center, sin(90°) = 1 -> (0, 1)
        let [fx, fy] = fields[1].get(3, 2);
        assert!(close(fx, 0.0) && close(fy, 1.0));
        // offset (0, -2) -> (2, 0)
        let [fx, fy] = fields[1].get(2, 0);
        assert!(close(fx, 2.0) && close(fy, 0.0));
    }

    #[test]
    fn camera_motion_is_clamped() {
        let m = CameraMotion::new(3.0, -2.0, 5.0, 400.0);
        assert_eq!(m, CameraMotion { pan_x: 1.0, pan_y: -1.0, zoom: 1.0, rotate: 180.0 });
        assert!(CameraMotion::from_flags(0.0, 0.0, 0.0, 0.0).is_none());
        assert!(CameraMotion::from_flags(0.0, 0.0, 0.0, 15.0).is_some());
    }

    #[test]
    fn warp_motion_clamps_and_ramps() {
        let m = WarpMotion::new(0.5, -4.0, 3.0, 90.0);
        assert_eq!(m.pan_y, -1.0);
        assert_eq!(m.zoom, 2.0);
        let half = m.at_progress(0.5);
        assert_eq!(half.pan_x, 0.25);
        assert_eq!(half.zoom, 1.5);
        assert_eq!(half.rotate, 45.0);
        assert!(m.at_progress(0.0).is_identity());
        assert_eq!(WarpMotion::new(0.0, 0.0, 0.1, 0.0).zoom, 0.5);
    }

    #[test]
    fn later_regions_overwrite_earlier() {
        let regions = [
            Region::new([0, 0, 3, 3], [1.0, 1.0]),
            Region::new([2, 2, 4, 4], [-2.0, 5.0]),
        ];
        let mask = build_region_mask(Dim::new(5, 5), &regions);
        assert_eq!(mask.get(0, 0), [1.0, 1.0]);
        assert_eq!(mask.get(2, 2), [-2.0, 5.0]);
        assert_eq!(mask.get(3, 3), [-2.0, 5.0]);
        assert_eq!(mask.get(4, 4), [0.0, 0.0]);
        assert_eq!(mask.get(2, 0), [1.0, 1.0]);
    }

    #[test]
    fn out_of_range_regions_are_cut_not_rejected() {
        let regions = [Region::new([3, 3, 100, 100], [1.0, 0.0]), Region::new([2, 0, 1, 4], [9.0, 9.0])];
        let mask = build_region_mask(Dim::new(4, 4), &regions);
        assert_eq!(mask.get(3, 3), [1.0, 0.0]);
        assert_eq!(mask.get(1, 0), [0.0, 0.0]);
    }

    #[test]
    fn negative_bounds_count_from_the_far_edge() {
        // x in [-2, 6) -> [2, 4), y in [-10, -3) -> [0, 1)
        let mask = build_region_mask(Dim::new(4, 4), &[Region::new([-2, -10, 6, -3], [3.0, 4.0])]);
        assert_eq!(mask.get(2, 0), [3.0, 4.0]);
        assert_eq!(mask.get(3, 0), [3.0, 4.0]);
        assert_eq!(mask.get(1, 0), [0.0, 0.0]);
        assert_eq!(mask.get(3, 1), [0.0, 0.0]);
    }

    #[test]
    fn mean_of_pan_field() {
        let fields = generate_motion_field(Dim::new(10, 10), 2, &CameraMotion::new(1.0, -1.0, 0.0, 0.0));
        let [mx, my] = fields[1].mean();
        assert!(close(mx, 1.0) && close(my, -1.0));
    }
}
