use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Shading languages the translation workflow understands.
///
/// Only [`ShaderLanguage::Glsl`] text can be previewed; the other tags are
/// carried along for display and as translation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
    Glsl,
    Hlsl,
    Wgsl,
    Msl,
}

impl ShaderLanguage {
    pub const ALL: [ShaderLanguage; 4] = [Self::Glsl, Self::Hlsl, Self::Wgsl, Self::Msl];

    /// Human readable name used in prompts and console output.
    pub fn display_name(self) -> &'static str {
        match self {
            ShaderLanguage::Glsl => "GLSL",
            ShaderLanguage::Hlsl => "HLSL",
            ShaderLanguage::Wgsl => "WGSL",
            ShaderLanguage::Msl => "Metal Shading Language (MSL)",
        }
    }

    /// Conventional file extension for sources in this language.
    pub fn extension(self) -> &'static str {
        match self {
            ShaderLanguage::Glsl => "glsl",
            ShaderLanguage::Hlsl => "hlsl",
            ShaderLanguage::Wgsl => "wgsl",
            ShaderLanguage::Msl => "metal",
        }
    }

    /// Guesses the language from a file extension (`frag`, `wgsl`, ...).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "glsl" | "frag" | "fs" | "vert" | "vs" => Some(Self::Glsl),
            "hlsl" | "fx" | "hlsli" => Some(Self::Hlsl),
            "wgsl" => Some(Self::Wgsl),
            "metal" | "msl" => Some(Self::Msl),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderLanguage::Glsl => f.write_str("glsl"),
            ShaderLanguage::Hlsl => f.write_str("hlsl"),
            ShaderLanguage::Wgsl => f.write_str("wgsl"),
            ShaderLanguage::Msl => f.write_str("msl"),
        }
    }
}

impl FromStr for ShaderLanguage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("shader language must not be empty".to_string());
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "glsl" => Ok(Self::Glsl),
            "hlsl" => Ok(Self::Hlsl),
            "wgsl" => Ok(Self::Wgsl),
            "msl" | "metal" => Ok(Self::Msl),
            other => Err(format!(
                "unknown shader language '{other}'; expected glsl, hlsl, wgsl, or msl"
            )),
        }
    }
}

/// Immutable, language-tagged shader text.
///
/// Cloning is cheap: the text lives behind an `Arc<str>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSourceText {
    language: ShaderLanguage,
    text: Arc<str>,
}

impl ShaderSourceText {
    pub fn new(language: ShaderLanguage, text: impl Into<Arc<str>>) -> Self {
        Self {
            language,
            text: text.into(),
        }
    }

    pub fn glsl(text: impl Into<Arc<str>>) -> Self {
        Self::new(ShaderLanguage::Glsl, text)
    }

    pub fn language(&self) -> ShaderLanguage {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// The two programmable stages linked into a preview program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Lifecycle of one mounted preview surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreviewState {
    /// No context acquired, or nothing compiled yet.
    #[default]
    Idle,
    /// Old program released; the new pair is being compiled and linked.
    Compiling,
    /// Program linked and the render loop is scheduled.
    Live,
    /// Compile or link failed; carries the driver diagnostic.
    Failed(String),
}

impl PreviewState {
    pub fn is_live(&self) -> bool {
        matches!(self, PreviewState::Live)
    }

    pub fn failure_log(&self) -> Option<&str> {
        match self {
            PreviewState::Failed(log) => Some(log.as_str()),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PreviewState::Idle => "idle",
            PreviewState::Compiling => "compiling",
            PreviewState::Live => "live",
            PreviewState::Failed(_) => "failed",
        }
    }
}

/// Drawable dimensions in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Viewport dimensions; GL rejects zero-sized viewports on some drivers.
    pub fn viewport(self) -> (i32, i32) {
        (
            i32::try_from(self.width.max(1)).unwrap_or(i32::MAX),
            i32::try_from(self.height.max(1)).unwrap_or(i32::MAX),
        )
    }

    pub fn as_uniform(self) -> [f32; 2] {
        [self.width.max(1) as f32, self.height.max(1) as f32]
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_languages_case_insensitively() {
        assert_eq!("GLSL".parse::<ShaderLanguage>(), Ok(ShaderLanguage::Glsl));
        assert_eq!("metal".parse::<ShaderLanguage>(), Ok(ShaderLanguage::Msl));
        assert_eq!(" wgsl ".parse::<ShaderLanguage>(), Ok(ShaderLanguage::Wgsl));
        assert!("cg".parse::<ShaderLanguage>().is_err());
        assert!("".parse::<ShaderLanguage>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for language in ShaderLanguage::ALL {
            assert_eq!(language.to_string().parse::<ShaderLanguage>(), Ok(language));
        }
    }

    #[test]
    fn guesses_language_from_extension() {
        assert_eq!(ShaderLanguage::from_extension("frag"), Some(ShaderLanguage::Glsl));
        assert_eq!(ShaderLanguage::from_extension("HLSL"), Some(ShaderLanguage::Hlsl));
        assert_eq!(ShaderLanguage::from_extension("txt"), None);
    }

    #[test]
    fn viewport_never_collapses_to_zero() {
        assert_eq!(SurfaceSize::new(0, 0).viewport(), (1, 1));
        assert_eq!(SurfaceSize::new(640, 480).as_uniform(), [640.0, 480.0]);
    }
}
