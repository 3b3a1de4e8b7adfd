//! Game launch options stored in the `[Game]` section.

use std::fmt;
use std::str::FromStr;

/// Default refresh rate passed to the client.
pub const DEFAULT_REFRESH_RATE: u32 = 60;

/// Lowest refresh rate the client accepts.
pub const MIN_REFRESH_RATE: u32 = 30;

/// Highest refresh rate the client accepts.
pub const MAX_REFRESH_RATE: u32 = 144;

/// Inclusive bounds for the refresh rate option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for RefreshBounds {
    fn default() -> Self {
        Self {
            min: MIN_REFRESH_RATE,
            max: MAX_REFRESH_RATE,
        }
    }
}

impl RefreshBounds {
    /// Clamp a requested rate into the bounds. Out-of-range values are
    /// pulled to the nearest bound, never rejected.
    pub fn clamp(&self, rate: u32) -> u32 {
        rate.clamp(self.min, self.max.max(self.min))
    }
}

/// Renderer selected for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsMode {
    DirectX,
    OpenGl,
    Vulkan,
    Software,
}

impl Default for GraphicsMode {
    fn default() -> Self {
        if cfg!(windows) {
            Self::DirectX
        } else {
            Self::OpenGl
        }
    }
}

impl GraphicsMode {
    /// Value written to the settings file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectX => "dx",
            Self::OpenGl => "ogl",
            Self::Vulkan => "vulkan",
            Self::Software => "sw",
        }
    }

    /// Command line flag understood by the client.
    pub fn launch_arg(&self) -> &'static str {
        match self {
            Self::DirectX => "-dx11",
            Self::OpenGl => "-gl",
            Self::Vulkan => "-vulkan",
            Self::Software => "-sw",
        }
    }
}

impl fmt::Display for GraphicsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphicsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dx" | "dx11" | "directx" => Ok(Self::DirectX),
            "ogl" | "gl" | "opengl" => Ok(Self::OpenGl),
            "vulkan" | "vk" => Ok(Self::Vulkan),
            "sw" | "software" => Ok(Self::Software),
            other => Err(format!(
                "unknown graphics mode '{}' (expected dx, ogl, vulkan or sw)",
                other
            )),
        }
    }
}

/// Game languages and the numeric id the client expects.
const LANGUAGES: &[(&str, u8)] = &[
    ("English", 0),
    ("French", 3),
    ("German", 4),
    ("Italian", 5),
    ("Spanish", 6),
    ("Dutch", 7),
    ("Danish", 8),
    ("Swedish", 9),
    ("Norwegian", 10),
    ("Finnish", 11),
    ("Hebrew", 12),
    ("Russian", 13),
    ("Portuguese", 14),
    ("Japanese", 15),
    ("Polish", 16),
    ("SimplifiedChinese", 17),
    ("TraditionalChinese", 18),
    ("Thai", 19),
    ("Korean", 20),
    ("Slovak", 21),
];

/// A game language from the client's language table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameLanguage {
    name: &'static str,
    id: u8,
}

impl Default for GameLanguage {
    fn default() -> Self {
        Self {
            name: LANGUAGES[0].0,
            id: LANGUAGES[0].1,
        }
    }
}

impl GameLanguage {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// All supported language names.
    pub fn names() -> impl Iterator<Item = &'static str> {
        LANGUAGES.iter().map(|(name, _)| *name)
    }
}

impl fmt::Display for GameLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for GameLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        LANGUAGES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&wanted))
            .map(|&(name, id)| Self { name, id })
            .ok_or_else(|| format!("unknown game language '{}'", s.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_above_max() {
        assert_eq!(RefreshBounds::default().clamp(9999), 144);
    }

    #[test]
    fn test_clamp_below_min() {
        assert_eq!(RefreshBounds::default().clamp(0), 30);
    }

    #[test]
    fn test_clamp_in_range_unchanged() {
        assert_eq!(RefreshBounds::default().clamp(75), 75);
    }

    #[test]
    fn test_graphics_mode_parse() {
        assert_eq!("OGL".parse::<GraphicsMode>(), Ok(GraphicsMode::OpenGl));
        assert_eq!("software".parse::<GraphicsMode>(), Ok(GraphicsMode::Software));
        assert!("glide".parse::<GraphicsMode>().is_err());
    }

    #[test]
    fn test_language_lookup() {
        let lang: GameLanguage = "simplified chinese".parse().unwrap();
        assert_eq!(lang.name(), "SimplifiedChinese");
        assert_eq!(lang.id(), 17);
        assert_eq!(GameLanguage::default().id(), 0);
        assert!("Klingon".parse::<GameLanguage>().is_err());
    }

    proptest! {
        #[test]
        fn prop_clamped_rate_within_bounds(rate in any::<u32>()) {
            let bounds = RefreshBounds::default();
            let clamped = bounds.clamp(rate);
            prop_assert!(clamped >= bounds.min && clamped <= bounds.max);
        }
    }
}
