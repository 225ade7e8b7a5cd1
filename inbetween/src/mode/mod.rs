use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::InterpError;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    // plain interpolation, camera motion ignored
    #[default]
    Basic,
    // motion applied to the end frame before interpolating
    Hybrid,
    // motion ramped over every interpolated frame
    Steerable,
    // diffusion sampling without motion conditioning
    Dynamicrafter,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Basic, Mode::Hybrid, Mode::Steerable, Mode::Dynamicrafter];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Mode::Basic => "basic",
            Mode::Hybrid => "hybrid",
            Mode::Steerable => "steerable",
            Mode::Dynamicrafter => "dynamicrafter",
        }
    }

    // Whether camera motion feeds into generation for this mode
    pub const fn uses_motion(&self) -> bool {
        matches!(self, Mode::Hybrid | Mode::Steerable)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| InterpError::InvalidMode(s.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_modes() {
        for m in Mode::ALL {
            assert_eq!(m.as_str().parse::<Mode>().unwrap(), m);
        }
        assert_eq!(" Hybrid ".parse::<Mode>().unwrap(), Mode::Hybrid);
        assert!(matches!("warp".parse::<Mode>(), Err(InterpError::InvalidMode(s)) if s == "warp"));
    }

    #[test]
    fn motion_modes() {
        assert!(Mode::Hybrid.uses_motion());
        assert!(Mode::Steerable.uses_motion());
        assert!(!Mode::Basic.uses_motion());
        assert!(!Mode::Dynamicrafter.uses_motion());
    }

    #[test]
    fn serde_names() {
        assert_eq!(serde_json::to_string(&Mode::Dynamicrafter).unwrap(), "\"dynamicrafter\"");
    }
}
