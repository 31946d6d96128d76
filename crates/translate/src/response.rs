//! Parsing of chat completion bodies into translations.

use preview::{ShaderLanguage, ShaderSourceText};
use serde::Deserialize;

use crate::error::{snippet, TranslateError};
use crate::Translation;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TranslationPayload {
    code: String,
    #[serde(default)]
    explanation: String,
}

/// Extracts the error message from an `{"error": {"message": ...}}` body.
pub fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|err| err.error.message)
}

/// Returns the assistant text of the first choice.
pub fn completion_text(body: &str) -> Result<String, TranslateError> {
    if let Ok(completion) = serde_json::from_str::<ChatCompletion>(body) {
        if let Some(content) = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
        {
            return Ok(content);
        }
    }
    if let Some(message) = api_error_message(body) {
        return Err(TranslateError::Api(message));
    }
    Err(TranslateError::Parse(format!(
        "no assistant message in response; first 200 bytes: {}",
        snippet(body, 200)
    )))
}

/// Interprets assistant text as a `{code, explanation}` translation.
///
/// Accepts the JSON object with or without surrounding Markdown fences, and
/// falls back to the first fenced block when the model ignored the JSON
/// instructions.
pub fn parse_translation(
    content: &str,
    language: ShaderLanguage,
) -> Result<Translation, TranslateError> {
    let unfenced = strip_code_fence(content);
    let (code, explanation) = match serde_json::from_str::<TranslationPayload>(unfenced) {
        Ok(payload) => (
            strip_code_fence(&payload.code).to_string(),
            payload.explanation.trim().to_string(),
        ),
        Err(err) => match first_fenced_block(content) {
            Some((code, rest)) => (code.to_string(), rest),
            None => {
                return Err(TranslateError::Parse(format!(
                    "expected a JSON object with a 'code' field ({err}); got: {}",
                    snippet(content, 200)
                )))
            }
        },
    };

    if code.trim().is_empty() {
        return Err(TranslateError::Parse("response contained no code".to_string()));
    }
    Ok(Translation {
        code: ShaderSourceText::new(language, code),
        explanation,
    })
}

/// Removes one Markdown code fence wrapping the whole of `text`, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // The opening fence may carry a language tag up to the first newline.
    match body.split_once('\n') {
        Some((tag, inner)) if !tag.contains(char::is_whitespace) || tag.trim().is_empty() => {
            inner.trim()
        }
        _ => body.trim(),
    }
}

/// First fenced block in `text` and the surrounding prose.
fn first_fenced_block(text: &str) -> Option<(&str, String)> {
    let start = text.find("```")?;
    let after_open = &text[start + 3..];
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let end = body.find("```")?;
    let code = body[..end].trim();

    let before = text[..start].trim();
    let after = body[end + 3..].trim();
    let prose = [before, after]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    Some((code, prose))
}
