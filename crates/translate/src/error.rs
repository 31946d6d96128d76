/// Failures of the translation workflow.
///
/// Callers treat every variant the same way: no new source text is available
/// and whatever was displayed before stays on screen.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("invalid completion settings: {0}")]
    Config(String),
    #[error("shader source is empty")]
    EmptyInput,
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion service error: {0}")]
    Api(String),
    #[error("could not parse completion response: {0}")]
    Parse(String),
    #[error("translation client is already installed")]
    AlreadyInstalled,
    #[error("translation client has not been installed")]
    NotInstalled,
}

/// First `limit` characters of `body`, for error messages.
pub(crate) fn snippet(body: &str, limit: usize) -> String {
    let mut out: String = body.chars().take(limit).collect();
    if body.chars().count() > limit {
        out.push('…');
    }
    out
}
