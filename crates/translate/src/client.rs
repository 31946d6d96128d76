use preview::{ShaderLanguage, ShaderSourceText};
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CompletionConfig;
use crate::error::{snippet, TranslateError};
use crate::prompt::{self, ChatMessage};
use crate::response;
use crate::{Translation, Translator};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Blocking client for an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct TranslationClient {
    http: Client,
    config: CompletionConfig,
}

impl TranslationClient {
    pub fn new(config: CompletionConfig) -> Result<Self, TranslateError> {
        config.validate()?;
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    fn complete(&self, messages: &[ChatMessage], expect_json: bool) -> Result<String, TranslateError> {
        let request = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages,
            response_format: expect_json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };
        debug!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            expect_json,
            "sending completion request"
        );

        let response = self
            .http
            .post(self.config.endpoint.clone())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()?;
        let status = response.status();
        let body = response.text()?;
        debug!(status = status.as_u16(), bytes = body.len(), "completion response received");

        if !status.is_success() {
            if let Some(message) = response::api_error_message(&body) {
                return Err(TranslateError::Api(format!("{message} (HTTP {})", status.as_u16())));
            }
            return Err(TranslateError::Status {
                status: status.as_u16(),
                body: snippet(&body, 200),
            });
        }
        response::completion_text(&body)
    }
}

fn ensure_source(source: &ShaderSourceText) -> Result<(), TranslateError> {
    if source.is_blank() {
        return Err(TranslateError::EmptyInput);
    }
    Ok(())
}

impl Translator for TranslationClient {
    fn translate(
        &self,
        source: &ShaderSourceText,
        target: ShaderLanguage,
    ) -> Result<Translation, TranslateError> {
        ensure_source(source)?;
        info!(from = %source.language(), to = %target, "translating shader");
        let content = self.complete(&prompt::translation(source, target), true)?;
        response::parse_translation(&content, target)
    }

    fn optimize(&self, source: &ShaderSourceText) -> Result<Translation, TranslateError> {
        ensure_source(source)?;
        info!(language = %source.language(), "optimizing shader");
        let content = self.complete(&prompt::optimization(source), true)?;
        response::parse_translation(&content, source.language())
    }

    fn analyze(&self, source: &ShaderSourceText) -> Result<String, TranslateError> {
        ensure_source(source)?;
        info!(language = %source.language(), "analyzing shader");
        let content = self.complete(&prompt::analysis(source), false)?;
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    use super::*;

    /// Serves one canned HTTP response and hands back the request body.
    fn serve_once(status: &str, body: String) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let status = status.to_string();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut content_length = 0usize;
            let mut authorization = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("header line");
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().expect("length");
                }
                if lower.starts_with("authorization:") {
                    authorization = line["authorization:".len()..].trim().to_string();
                }
            }
            let mut request = vec![0u8; content_length];
            reader.read_exact(&mut request).expect("body");
            tx.send(format!("{authorization}\n{}", String::from_utf8_lossy(&request)))
                .expect("send");

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("respond");
        });
        (format!("http://{addr}/v1/chat/completions"), rx)
    }

    fn client_for(endpoint: &str) -> TranslationClient {
        let config = CompletionConfig::new("sk-test")
            .expect("config")
            .with_endpoint(endpoint)
            .expect("endpoint");
        TranslationClient::new(config).expect("client")
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    #[test]
    fn translate_posts_chat_request_and_parses_code() {
        let content = r#"{"code": "void main() { fragColor = vec4(1.0); }", "explanation": "ported from HLSL"}"#;
        let (endpoint, requests) = serve_once("200 OK", completion(content));
        let client = client_for(&endpoint);

        let source = ShaderSourceText::new(ShaderLanguage::Hlsl, "float4 main() : SV_Target { return 1; }");
        let translation = client
            .translate(&source, ShaderLanguage::Glsl)
            .expect("translation");
        assert_eq!(translation.code.language(), ShaderLanguage::Glsl);
        assert!(translation.code.text().contains("fragColor"));
        assert_eq!(translation.explanation, "ported from HLSL");

        let captured = requests.recv().expect("request captured");
        let (authorization, body) = captured.split_once('\n').expect("two parts");
        assert_eq!(authorization, "Bearer sk-test");
        let body: serde_json::Value = serde_json::from_str(body).expect("json body");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn analyze_returns_plain_text_without_json_mode() {
        let (endpoint, requests) = serve_once("200 OK", completion("  It draws a gradient.\n"));
        let client = client_for(&endpoint);

        let text = client
            .analyze(&ShaderSourceText::glsl("void main() {}"))
            .expect("analysis");
        assert_eq!(text, "It draws a gradient.");

        let captured = requests.recv().expect("request captured");
        let body = captured.split_once('\n').map(|(_, body)| body).unwrap_or_default();
        let body: serde_json::Value = serde_json::from_str(body).expect("json body");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn http_errors_surface_api_message() {
        let body = r#"{"error": {"message": "Rate limit reached"}}"#.to_string();
        let (endpoint, _requests) = serve_once("429 Too Many Requests", body);
        let client = client_for(&endpoint);

        let err = client
            .optimize(&ShaderSourceText::glsl("void main() {}"))
            .expect_err("rate limited");
        match err {
            TranslateError::Api(message) => {
                assert!(message.contains("Rate limit reached"));
                assert!(message.contains("429"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn http_errors_without_json_report_status() {
        let (endpoint, _requests) = serve_once("502 Bad Gateway", "upstream down".to_string());
        let client = client_for(&endpoint);

        let err = client
            .translate(&ShaderSourceText::glsl("void main() {}"), ShaderLanguage::Wgsl)
            .expect_err("gateway error");
        assert!(matches!(err, TranslateError::Status { status: 502, .. }));
    }

    #[test]
    fn blank_sources_are_rejected_before_any_request() {
        let client = client_for("http://127.0.0.1:9/v1/chat/completions");
        let err = client
            .analyze(&ShaderSourceText::glsl("   "))
            .expect_err("empty input");
        assert!(matches!(err, TranslateError::EmptyInput));
    }
}
