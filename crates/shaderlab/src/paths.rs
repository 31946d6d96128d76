use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use labconfig::CONFIG_FILE_NAME;

pub const ENV_CONFIG_DIR: &str = "SHADERLAB_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Shaderlab";
const APPLICATION: &str = "shaderlab";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    explicit_config: Option<PathBuf>,
}

impl AppPaths {
    /// Resolves the config directory. `explicit_config` comes from `--config`
    /// and wins over the directory lookup.
    pub fn discover(explicit_config: Option<PathBuf>) -> Result<Self> {
        let config_dir = match env_override(ENV_CONFIG_DIR) {
            Some(dir) => dir,
            None => ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
                .context("failed to determine user directories")?
                .config_dir()
                .to_path_buf(),
        };

        Ok(Self {
            config_dir,
            explicit_config,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.explicit_config
            .clone()
            .unwrap_or_else(|| self.config_dir.join(CONFIG_FILE_NAME))
    }

    /// True when the file came from `--config`, in which case it must exist.
    pub fn config_is_explicit(&self) -> bool {
        self.explicit_config.is_some()
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }

        fn clear(key: &'static str) -> Self {
            let previous = env::var_os(key);
            env::remove_var(key);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_override_takes_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);

        let paths = AppPaths::discover(None).unwrap();

        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.config_file(), config_dir.join("shaderlab.toml"));
        assert!(!paths.config_is_explicit());
    }

    #[test]
    fn explicit_config_file_wins() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, root.path());
        let file = root.path().join("elsewhere/custom.toml");

        let paths = AppPaths::discover(Some(file.clone())).unwrap();

        assert_eq!(paths.config_file(), file);
        assert!(paths.config_is_explicit());
    }

    #[test]
    fn defaults_to_project_config_dir() {
        let _guard = env_lock().lock().unwrap();
        let _config_guard = EnvGuard::clear(ENV_CONFIG_DIR);

        let paths = AppPaths::discover(None).unwrap();

        assert!(paths.config_file().ends_with(CONFIG_FILE_NAME));
    }
}
