//! Prompt construction for the completion service.

use preview::{ShaderLanguage, ShaderSourceText};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

const JSON_CONTRACT: &str = "Respond with a single JSON object and nothing else, shaped as \
{\"code\": \"<complete shader source>\", \"explanation\": \"<short notes on what changed>\"}. \
Do not wrap the code in Markdown fences.";

const GLSL_PREVIEW_CONTRACT: &str = "When producing GLSL, write a GLSL ES 3.00 fragment shader \
that writes its colour to `out vec4 fragColor` and may read the uniforms `float time` \
(seconds), `vec2 resolution` (pixels) and `vec2 pointer`. Omit the #version line and these \
declarations if you only produce the body.";

fn fenced(source: &ShaderSourceText) -> String {
    format!(
        "```{}\n{}\n```",
        source.language().extension(),
        source.text().trim_end()
    )
}

/// Messages asking for `source` to be rewritten in `target`.
pub fn translation(source: &ShaderSourceText, target: ShaderLanguage) -> Vec<ChatMessage> {
    let mut system = format!(
        "You are an expert graphics programmer who ports shaders between GLSL, HLSL, WGSL and \
         Metal Shading Language while preserving their visual output. {JSON_CONTRACT}"
    );
    if target == ShaderLanguage::Glsl {
        system.push(' ');
        system.push_str(GLSL_PREVIEW_CONTRACT);
    }
    let user = format!(
        "Translate this {} shader to {}.\n\n{}",
        source.language().display_name(),
        target.display_name(),
        fenced(source)
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Messages asking for a faster equivalent of `source` in its own language.
pub fn optimization(source: &ShaderSourceText) -> Vec<ChatMessage> {
    let mut system = format!(
        "You are an expert graphics programmer who optimizes shaders for GPU performance \
         without changing their visual output. {JSON_CONTRACT}"
    );
    if source.language() == ShaderLanguage::Glsl {
        system.push(' ');
        system.push_str(GLSL_PREVIEW_CONTRACT);
    }
    let user = format!(
        "Optimize this {} shader.\n\n{}",
        source.language().display_name(),
        fenced(source)
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Messages asking for a plain-text explanation of `source`.
pub fn analysis(source: &ShaderSourceText) -> Vec<ChatMessage> {
    let system = "You are an expert graphics programmer. Explain what the given shader does, \
                  how it works, and point out performance or portability concerns. Answer in \
                  plain text.";
    let user = format!(
        "Analyze this {} shader.\n\n{}",
        source.language().display_name(),
        fenced(source)
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
