use std::time::Duration;

use reqwest::Url;

use crate::error::TranslateError;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub endpoint: Url,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, TranslateError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TranslateError::Config(
                "completion API key must not be empty".to_string(),
            ));
        }
        let endpoint = Url::parse(DEFAULT_ENDPOINT)
            .map_err(|err| TranslateError::Config(format!("invalid default endpoint: {err}")))?;
        Ok(Self {
            api_key,
            endpoint,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, TranslateError> {
        self.endpoint = Url::parse(endpoint)
            .map_err(|err| TranslateError::Config(format!("invalid endpoint '{endpoint}': {err}")))?;
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), TranslateError> {
        if self.api_key.trim().is_empty() {
            return Err(TranslateError::Config(
                "completion API key must not be empty".to_string(),
            ));
        }
        if !matches!(self.endpoint.scheme(), "http" | "https") {
            return Err(TranslateError::Config(format!(
                "endpoint must use http or https, got '{}'",
                self.endpoint.scheme()
            )));
        }
        if self.model.trim().is_empty() {
            return Err(TranslateError::Config("model must not be empty".to_string()));
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(TranslateError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.timeout.is_zero() {
            return Err(TranslateError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
