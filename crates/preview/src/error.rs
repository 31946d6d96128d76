use crate::types::{ShaderLanguage, ShaderStage};

/// Failures surfaced by the preview core.
///
/// `Compilation` and `Link` never escape [`PreviewController`]; they are
/// folded into [`PreviewState::Failed`]. They are returned directly only from
/// the free functions in [`crate::compile`].
///
/// [`PreviewController`]: crate::PreviewController
/// [`PreviewState::Failed`]: crate::PreviewState::Failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreviewError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compilation { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
    #[error("drawable cannot provide a rendering context: {0}")]
    UnsupportedContext(String),
    #[error("shader source is empty")]
    EmptySource,
    #[error("{0} sources cannot be previewed; only GLSL is rendered")]
    UnsupportedLanguage(ShaderLanguage),
    #[error("failed to allocate driver resource: {0}")]
    Resource(String),
}

impl PreviewError {
    /// Diagnostic text for compile/link failures.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            PreviewError::Compilation { log, .. } | PreviewError::Link { log } => Some(log),
            _ => None,
        }
    }
}
