use std::path::Path;
use std::str::FromStr;

use image::RgbImage;
use inbetween::Mode;

use crate::err::{RequestError, ResponseErrorItem};
use crate::frontend::Frontend;

pub const MIN_FRAMES: usize = 2;
pub const MAX_FRAMES: usize = 128;
pub const MAX_FPS: u32 = 60;

#[derive(Debug, Default, Clone)]
pub struct GenerateForm {
    pub image1: Option<Vec<u8>>,
    pub image2: Option<Vec<u8>>,
    pub mode: Option<String>,
    pub prompt: Option<String>,
    pub frames: Option<String>,
    pub fps: Option<String>,
    pub seed: Option<String>,
    pub steps: Option<String>,
    pub cfg_scale: Option<String>,
    pub eta: Option<String>,
    pub pan_x: Option<String>,
    pub pan_y: Option<String>,
    pub zoom: Option<String>,
    pub rotate: Option<String>,
}

impl GenerateForm {
    // Returns false for unknown field names
    pub fn set_text(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "mode" => &mut self.mode,
            "prompt" => &mut self.prompt,
            "frames" | "num_frames" => &mut self.frames,
            "fps" => &mut self.fps,
            "seed" => &mut self.seed,
            "steps" => &mut self.steps,
            "cfg_scale" => &mut self.cfg_scale,
            "eta" => &mut self.eta,
            "pan_x" | "camera_pan_x" => &mut self.pan_x,
            "pan_y" | "camera_pan_y" => &mut self.pan_y,
            "zoom" | "camera_zoom" => &mut self.zoom,
            "rotate" | "camera_rotate" => &mut self.rotate,
            _ => return false,
        };
        let value = value.trim();
        *slot = (!value.is_empty()).then(|| value.to_string());
        true
    }
}

#[derive(Debug, Clone)]
pub struct GenerateApi {
    pub frontend: Frontend,
    pub image1: RgbImage,
    pub image2: RgbImage,
    pub mode: Mode,
    pub prompt: String,
    pub frames: usize,
    pub fps: u32,
    pub seed: u64,
    pub steps: u32,
    pub cfg_scale: f32,
    pub eta: f32,
    // camera convention for diffusion, warp convention for rife
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
    pub rotate: f64,
}

fn parse_field<T: FromStr>(
    field_name: &'static str,
    op_str: &Option<String>,
    default: T,
    errors: &mut Vec<ResponseErrorItem>,
) -> T {
    match op_str {
        None => default,
        Some(v) => v.parse().unwrap_or_else(|_| {
            errors.push(ResponseErrorItem::title_source(
                format!("field {field_name} has an invalid value `{v}`"),
                field_name,
            ));
            default
        }),
    }
}

fn decode_image(
    field_name: &'static str,
    bytes: &Option<Vec<u8>>,
    errors: &mut Vec<ResponseErrorItem>,
) -> Option<RgbImage> {
    let Some(bytes) = bytes else {
        errors.push(ResponseErrorItem::title_source(format!("missing field {field_name}"), field_name));
        return None;
    };
    match image::load_from_memory(bytes) {
        Ok(img) => Some(img.to_rgb8()),
        Err(e) => {
            errors.push(ResponseErrorItem::title_source(
                format!("field {field_name} is not a readable image: {e}"),
                field_name,
            ));
            None
        }
    }
}

impl GenerateApi {
    pub fn from_form(form: &GenerateForm, frontend: Frontend) -> Result<Self, RequestError> {
        let mut err_reasons = Vec::with_capacity(4);

        let image1 = decode_image("image1", &form.image1, &mut err_reasons);
        let image2 = decode_image("image2", &form.image2, &mut err_reasons);

        let mode = parse_field("mode", &form.mode, Mode::Basic, &mut err_reasons);
        if frontend == Frontend::Rife && mode == Mode::Dynamicrafter {
            err_reasons.push(ResponseErrorItem::title_source(
                String::from("mode dynamicrafter needs the diffusion front end"),
                "mode",
            ));
        }
        let frames = parse_field("frames", &form.frames, 16usize, &mut err_reasons);
        if !(MIN_FRAMES..=MAX_FRAMES).contains(&frames) {
            err_reasons.push(ResponseErrorItem::title_source(
                format!("frames must be within {MIN_FRAMES}..={MAX_FRAMES}"),
                "frames",
            ));
        }
        let default_fps = match frontend {
            Frontend::Diffusion => 5,
            Frontend::Rife => 16,
        };
        let fps = parse_field("fps", &form.fps, default_fps, &mut err_reasons);
        if !(1..=MAX_FPS).contains(&fps) {
            err_reasons.push(ResponseErrorItem::title_source(format!("fps must be within 1..={MAX_FPS}"), "fps"));
        }
        let default_zoom = match frontend {
            Frontend::Diffusion => 0.0,
            Frontend::Rife => 1.0,
        };

        let api = GenerateApi {
            frontend,
            image1: image1.unwrap_or_default(),
            image2: image2.unwrap_or_default(),
            mode,
            prompt: form.prompt.clone().unwrap_or_default(),
            frames,
            fps,
            seed: parse_field("seed", &form.seed, 123, &mut err_reasons),
            steps: parse_field("steps", &form.steps, 50, &mut err_reasons),
            cfg_scale: parse_field("cfg_scale", &form.cfg_scale, 7.5, &mut err_reasons),
            eta: parse_field("eta", &form.eta, 1.0, &mut err_reasons),
            pan_x: parse_field("pan_x", &form.pan_x, 0.0, &mut err_reasons),
            pan_y: parse_field("pan_y", &form.pan_y, 0.0, &mut err_reasons),
            zoom: parse_field("zoom", &form.zoom, default_zoom, &mut err_reasons),
            rotate: parse_field("rotate", &form.rotate, 0.0, &mut err_reasons),
        };
        if err_reasons.is_empty() {
            Ok(api)
        } else {
            Err(RequestError::Validation(err_reasons))
        }
    }

    // follows any configured leading args
    pub fn to_args(&self, image1: &Path, image2: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            String::from("--image1"),
            image1.display().to_string(),
            String::from("--image2"),
            image2.display().to_string(),
            String::from("--output"),
            output.display().to_string(),
            format!("--frames={}", self.frames),
            format!("--fps={}", self.fps),
            format!("--mode={}", self.mode),
        ];
        match self.frontend {
            Frontend::Diffusion => {
                args.push(format!("--prompt={}", self.prompt));
                args.push(format!("--seed={}", self.seed));
                args.push(format!("--steps={}", self.steps));
                args.push(format!("--cfg-scale={}", self.cfg_scale));
                args.push(format!("--eta={}", self.eta));
                args.push(format!("--camera-pan-x={}", self.pan_x));
                args.push(format!("--camera-pan-y={}", self.pan_y));
                args.push(format!("--camera-zoom={}", self.zoom));
                args.push(format!("--camera-rotate={}", self.rotate));
            }
            Frontend::Rife => {
                args.push(format!("--pan-x={}", self.pan_x));
                args.push(format!("--pan-y={}", self.pan_y));
                args.push(format!("--zoom={}", self.zoom));
                args.push(format!("--rotate={}", self.rotate));
            }
        }
        args
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn png() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        RgbImage::new(4, 4)
            .write_to(&mut buf, image::ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn form() -> GenerateForm {
        GenerateForm {
            image1: Some(png()),
            image2: Some(png()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_images_and_bad_numbers_are_collected() {
        let mut f = GenerateForm::default();
        assert!(f.set_text("frames", String::from("lots")));
        assert!(!f.set_text("nonsense", String::from("1")));
        let Err(RequestError::Validation(errs)) = GenerateApi::from_form(&f, Frontend::Diffusion) else {
            panic!("expected a validation error");
        };
        assert_eq!(errs.len(), 3);
        assert_eq!(errs[2].source.as_deref(), Some("/frames"));
    }

    #[test]
    fn rife_rejects_diffusion_mode() {
        let mut f = form();
        f.set_text("mode", String::from("dynamicrafter"));
        assert!(GenerateApi::from_form(&f, Frontend::Rife).is_err());
        assert_eq!(GenerateApi::from_form(&f, Frontend::Diffusion).unwrap().mode, Mode::Dynamicrafter);
    }

    #[test]
    fn frame_range_is_checked() {
        let mut f = form();
        f.set_text("frames", String::from("1"));
        assert!(GenerateApi::from_form(&f, Frontend::Rife).is_err());
        f.set_text("frames", String::from(" 24 "));
        assert_eq!(GenerateApi::from_form(&f, Frontend::Rife).unwrap().frames, 24);
    }

    #[test]
    fn args_per_frontend() {
        let mut f = form();
        f.set_text("camera_pan_x", String::from("-0.5"));
        f.set_text("prompt", String::from("slow pan"));
        let api = GenerateApi::from_form(&f, Frontend::Diffusion).unwrap();
        let args = api.to_args(Path::new("a.png"), Path::new("b.png"), Path::new("o.mp4"));
        assert!(args.contains(&String::from("--camera-pan-x=-0.5")));
        assert!(args.contains(&String::from("--prompt=slow pan")));
        assert!(args.contains(&String::from("--fps=5")));

        let api = GenerateApi::from_form(&form(), Frontend::Rife).unwrap();
        let args = api.to_args(Path::new("a.png"), Path::new("b.png"), Path::new("o.mp4"));
        assert_eq!(&args[..2], &[String::from("--image1"), String::from("a.png")]);
        assert!(args.contains(&String::from("--zoom=1")));
        assert!(args.contains(&String::from("--mode=basic")));
        assert!(!args.iter().any(|a| a.starts_with("--prompt")));
    }
}
