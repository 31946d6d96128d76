use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// File name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "shaderlab.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewDialect {
    #[default]
    Es300,
    Core330,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LabConfig {
    pub version: u32,
    #[serde(default)]
    pub completion: CompletionSection,
    #[serde(default)]
    pub preview: PreviewSection,
}

/// Completion service overrides. Unset fields fall back to the client's
/// built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CompletionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PreviewSection {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_vsync")]
    pub vsync: bool,
    #[serde(
        default = "default_watch_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub watch_interval: Duration,
    #[serde(default)]
    pub dialect: PreviewDialect,
}

impl Default for PreviewSection {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            vsync: default_vsync(),
            watch_interval: default_watch_interval(),
            dialect: PreviewDialect::default(),
        }
    }
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            version: 1,
            completion: CompletionSection::default(),
            preview: PreviewSection::default(),
        }
    }
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_vsync() -> bool {
    true
}

fn default_watch_interval() -> Duration {
    Duration::from_millis(250)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer).map(|d| d.unwrap_or_else(default_watch_interval))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn serialize_duration_opt<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(duration) => serialize_duration(duration, serializer),
        None => serializer.serialize_none(),
    }
}

impl LabConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: LabConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(endpoint) = &self.completion.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "completion.endpoint '{endpoint}' must be an http(s) URL"
                )));
            }
        }

        if let Some(model) = &self.completion.model {
            if model.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "completion.model may not be empty".into(),
                ));
            }
        }

        if let Some(temperature) = self.completion.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::Invalid(format!(
                    "completion.temperature must be between 0 and 2, got {temperature}"
                )));
            }
        }

        if let Some(timeout) = self.completion.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "completion.timeout must be greater than zero".into(),
                ));
            }
        }

        if self.preview.width == 0 || self.preview.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "preview size must be non-zero, got {}x{}",
                self.preview.width, self.preview.height
            )));
        }

        if self.preview.watch_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "preview.watch_interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
