use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// one front end per process
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Frontend {
    Diffusion,
    Rife,
}

impl Frontend {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Frontend::Diffusion => "diffusion",
            Frontend::Rife => "rife",
        }
    }

    pub const fn default_port(&self) -> u16 {
        match self {
            Frontend::Diffusion => 7860,
            Frontend::Rife => 7861,
        }
    }

    pub const fn default_timeout(&self) -> Duration {
        match self {
            Frontend::Diffusion => Duration::from_secs(30 * 60),
            Frontend::Rife => Duration::from_secs(5 * 60),
        }
    }

    pub const fn default_program(&self) -> &'static str {
        match self {
            Frontend::Diffusion => "inbetween",
            Frontend::Rife => "rife-interpolate",
        }
    }
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frontend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diffusion" | "dynamicrafter" => Ok(Frontend::Diffusion),
            "rife" => Ok(Frontend::Rife),
            other => Err(format!("unknown frontend `{other}`; expected diffusion|rife")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrontendConfig {
    pub frontend: Frontend,
    // CLI program plus any arguments placed before the per-job ones
    pub program: PathBuf,
    pub leading_args: Vec<String>,
    // every job gets <work_root>/<job id>/
    pub work_root: PathBuf,
    pub timeout: Duration,
    pub progress_every: Duration,
    pub max_queued_jobs: u32,
}

impl FrontendConfig {
    pub fn new(frontend: Frontend, work_root: impl Into<PathBuf>) -> Self {
        Self {
            frontend,
            program: PathBuf::from(frontend.default_program()),
            leading_args: Vec::new(),
            work_root: work_root.into(),
            timeout: frontend.default_timeout(),
            progress_every: Duration::from_secs(60),
            max_queued_jobs: 100,
        }
    }
}
