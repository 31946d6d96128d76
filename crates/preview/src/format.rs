//! Normalises incoming fragment-shader text into something the preview
//! context can compile.
//!
//! Text that already carries a `#version` pragma is assumed to be a complete
//! shader and is passed through untouched. Anything else is treated as a
//! snippet and gets a small declaration shell prepended:
//!
//! ```text
//! #version 300 es
//! precision highp float;
//! uniform vec2 resolution;
//! uniform float time;
//! uniform vec2 pointer;
//! out vec4 fragColor;
//! <original text>
//! ```
//!
//! The shell does not add an entry point. A snippet without `main()` still
//! fails to compile and that failure is reported through the controller.

use std::fmt;
use std::str::FromStr;

/// Uniform receiving the drawable size in pixels.
pub const RESOLUTION_UNIFORM: &str = "resolution";
/// Uniform receiving seconds since the program went live.
pub const TIME_UNIFORM: &str = "time";
/// Reserved pointer-position uniform; declared but never written.
pub const POINTER_UNIFORM: &str = "pointer";
/// Colour output declared for snippets.
pub const COLOR_OUTPUT: &str = "fragColor";
/// Vertex attribute carrying the full-screen quad corners.
pub const POSITION_ATTRIBUTE: &str = "position";

/// GLSL flavour accepted by the rendering context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderDialect {
    /// GLSL ES 3.00 (GLES 3 / WebGL2 class contexts).
    #[default]
    Es300,
    /// Desktop GLSL 3.30 core.
    Core330,
}

impl ShaderDialect {
    pub fn version_pragma(self) -> &'static str {
        match self {
            ShaderDialect::Es300 => "#version 300 es",
            ShaderDialect::Core330 => "#version 330 core",
        }
    }
}

impl fmt::Display for ShaderDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderDialect::Es300 => f.write_str("es300"),
            ShaderDialect::Core330 => f.write_str("core330"),
        }
    }
}

impl FromStr for ShaderDialect {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "es300" | "es" | "300es" | "gles" => Ok(Self::Es300),
            "core330" | "core" | "330" | "gl" => Ok(Self::Core330),
            other => Err(format!(
                "unknown GLSL dialect '{other}'; expected es300 or core330"
            )),
        }
    }
}

/// Returns `true` when the text already declares its own version pragma.
pub fn has_version_pragma(raw: &str) -> bool {
    raw.contains("#version")
}

/// Normalises `raw` using the default GLSL ES 3.00 dialect.
pub fn normalize(raw: &str) -> String {
    normalize_with(raw, ShaderDialect::default())
}

/// Normalises `raw` for the given dialect.
///
/// Complete shaders are returned byte-for-byte; snippets get the declaration
/// shell and keep their text as a contiguous suffix.
pub fn normalize_with(raw: &str, dialect: ShaderDialect) -> String {
    if has_version_pragma(raw) {
        return raw.to_string();
    }

    let header = fragment_header(dialect);
    let mut wrapped = String::with_capacity(header.len() + raw.len());
    wrapped.push_str(&header);
    wrapped.push_str(raw);
    wrapped
}

fn fragment_header(dialect: ShaderDialect) -> String {
    format!(
        "{pragma}\n\
         precision highp float;\n\
         uniform vec2 {RESOLUTION_UNIFORM};\n\
         uniform float {TIME_UNIFORM};\n\
         uniform vec2 {POINTER_UNIFORM};\n\
         out vec4 {COLOR_OUTPUT};\n",
        pragma = dialect.version_pragma(),
    )
}

/// Fixed full-screen-quad vertex shader for `dialect`.
pub fn vertex_shader(dialect: ShaderDialect) -> String {
    format!(
        "{pragma}\n\
         in vec2 {POSITION_ATTRIBUTE};\n\
         void main() {{\n    gl_Position = vec4({POSITION_ATTRIBUTE}, 0.0, 1.0);\n}}\n",
        pragma = dialect.version_pragma(),
    )
}
