use crate::motion::CameraMotion;

// Magnitudes below which a parameter is not worth describing
const PAN_WORDY: f64 = 0.1;
const ZOOM_WORDY: f64 = 0.1;
const ROTATE_WORDY: f64 = 1.0;

// e.g. "horizontal pan, zoom in"
pub fn describe_motion(motion: &CameraMotion) -> Option<String> {
    let mut parts: Vec<String> = Vec::with_capacity(4);
    if motion.pan_x.abs() > PAN_WORDY {
        parts.push(
            if motion.pan_x > 0.0 {
                "horizontal pan"
            } else {
                "horizontal pan left"
            }
            .to_string(),
        );
    }
    if motion.pan_y.abs() > PAN_WORDY {
        parts.push(
            if motion.pan_y > 0.0 {
                "vertical pan"
            } else {
                "vertical pan up"
            }
            .to_string(),
        );
    }
    if motion.zoom.abs() > ZOOM_WORDY {
        parts.push(if motion.zoom > 0.0 { "zoom in" } else { "zoom out" }.to_string());
    }
    if motion.rotate.abs() > ROTATE_WORDY {
        parts.push(format!("rotate {} degrees", motion.rotate.trunc() as i64));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

pub fn enhance_prompt(prompt: &str, motion: Option<&CameraMotion>) -> String {
    let Some(desc) = motion.and_then(describe_motion) else {
        return prompt.to_string();
    };
    if prompt.is_empty() {
        format!("camera motion: {desc}")
    } else {
        format!("{prompt}, camera motion: {desc}")
    }
}
