//! Shader translation, optimization and analysis through a hosted LLM
//! completion service.
//!
//! [`TranslationClient`] talks to any OpenAI-compatible chat completion
//! endpoint. Callers usually depend on the [`Translator`] trait so tests and
//! other front ends can substitute their own implementation.

mod client;
mod config;
mod error;
pub mod global;
pub mod prompt;
pub mod response;

pub use client::TranslationClient;
pub use config::{
    CompletionConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};
pub use error::TranslateError;

use preview::{ShaderLanguage, ShaderSourceText};

/// Rewritten shader code plus the model's notes about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub code: ShaderSourceText,
    pub explanation: String,
}

/// The three requests shaderlab makes of a completion service.
pub trait Translator {
    /// Ports `source` to `target`.
    fn translate(
        &self,
        source: &ShaderSourceText,
        target: ShaderLanguage,
    ) -> Result<Translation, TranslateError>;

    /// Returns a faster equivalent of `source` in the same language.
    fn optimize(&self, source: &ShaderSourceText) -> Result<Translation, TranslateError>;

    /// Explains what `source` does, in prose.
    fn analyze(&self, source: &ShaderSourceText) -> Result<String, TranslateError>;
}

impl<T: Translator + ?Sized> Translator for &T {
    fn translate(
        &self,
        source: &ShaderSourceText,
        target: ShaderLanguage,
    ) -> Result<Translation, TranslateError> {
        (**self).translate(source, target)
    }

    fn optimize(&self, source: &ShaderSourceText) -> Result<Translation, TranslateError> {
        (**self).optimize(source)
    }

    fn analyze(&self, source: &ShaderSourceText) -> Result<String, TranslateError> {
        (**self).analyze(source)
    }
}
