use std::fs;

use anyhow::{anyhow, Context, Result};
use labconfig::{LabConfig, PreviewDialect};
use preview::ShaderDialect;
use translate::CompletionConfig;

use crate::cli::GlobalArgs;
use crate::paths::AppPaths;

/// Reads the config file, falling back to defaults when the implicit file is
/// absent. A missing `--config` file is an error.
pub fn load_config(paths: &AppPaths) -> Result<LabConfig> {
    let path = paths.config_file();
    if !path.exists() {
        if paths.config_is_explicit() {
            return Err(anyhow!("config file {} does not exist", path.display()));
        }
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(LabConfig::default());
    }

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config = LabConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load config file at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Layers built-in defaults, the config file and command-line flags.
pub fn completion_config(global: &GlobalArgs, config: &LabConfig) -> Result<CompletionConfig> {
    let api_key = global
        .api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("no API key; pass --api-key or set SHADERLAB_API_KEY"))?;

    let mut completion =
        CompletionConfig::new(api_key).context("invalid completion configuration")?;

    let section = &config.completion;
    if let Some(endpoint) = global.endpoint.as_deref().or(section.endpoint.as_deref()) {
        completion = completion
            .with_endpoint(endpoint)
            .context("invalid completion endpoint")?;
    }
    if let Some(model) = global.model.as_deref().or(section.model.as_deref()) {
        completion = completion.with_model(model);
    }
    if let Some(temperature) = section.temperature {
        completion = completion.with_temperature(temperature);
    }
    if let Some(timeout) = section.timeout {
        completion = completion.with_timeout(timeout);
    }

    completion
        .validate()
        .context("invalid completion configuration")?;
    Ok(completion)
}

pub fn dialect(value: PreviewDialect) -> ShaderDialect {
    match value {
        PreviewDialect::Es300 => ShaderDialect::Es300,
        PreviewDialect::Core330 => ShaderDialect::Core330,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use translate::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

    fn paths_for(file: std::path::PathBuf) -> AppPaths {
        AppPaths::discover(Some(file)).unwrap()
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let root = TempDir::new().unwrap();
        let paths = paths_for(root.path().join("missing.toml"));
        assert!(load_config(&paths).is_err());
    }

    #[test]
    fn loads_and_validates_file() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("shaderlab.toml");
        fs::write(&file, "version = 1\n[preview]\ndialect = \"core330\"\n").unwrap();

        let config = load_config(&paths_for(file)).unwrap();
        assert_eq!(dialect(config.preview.dialect), ShaderDialect::Core330);
    }

    #[test]
    fn invalid_file_reports_path() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("shaderlab.toml");
        fs::write(&file, "version = 3\n").unwrap();

        let err = load_config(&paths_for(file.clone())).unwrap_err();
        assert!(format!("{err:#}").contains(&file.display().to_string()));
    }

    #[test]
    fn api_key_is_required() {
        let global = GlobalArgs::default();
        assert!(completion_config(&global, &LabConfig::default()).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let mut config = LabConfig::default();
        config.completion.model = Some("from-file".into());
        config.completion.endpoint = Some("http://localhost:8080/v1/chat/completions".into());
        config.completion.timeout = Some(Duration::from_secs(5));
        let global = GlobalArgs {
            api_key: Some("sk-test".into()),
            model: Some("from-flag".into()),
            ..GlobalArgs::default()
        };

        let completion = completion_config(&global, &config).unwrap();
        assert_eq!(completion.model, "from-flag");
        assert_eq!(
            completion.endpoint.as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(completion.timeout, Duration::from_secs(5));
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let global = GlobalArgs {
            api_key: Some("sk-test".into()),
            ..GlobalArgs::default()
        };
        let completion = completion_config(&global, &LabConfig::default()).unwrap();
        assert_eq!(completion.model, DEFAULT_MODEL);
        assert_eq!(completion.endpoint.as_str(), DEFAULT_ENDPOINT);
    }
}
