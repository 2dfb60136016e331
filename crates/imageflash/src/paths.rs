use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "IMAGEFLASH_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "imageflash";
const APPLICATION: &str = "imageflash";
const CONFIG_FILE: &str = "config.toml";

/// Where the config file is looked up, and whether the user asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Given on the command line; it must exist.
    Explicit(PathBuf),
    /// The per-user default; a missing file means built-in defaults.
    Discovered(PathBuf),
}

impl ConfigLocation {
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::Explicit(path.to_path_buf()));
        }
        Ok(Self::Discovered(config_dir()?.join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::Discovered(path) => path,
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    if let Some(value) = env_override(ENV_CONFIG_DIR) {
        return Ok(value);
    }
    let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .ok_or_else(|| anyhow!("failed to determine user config directory"))?;
    Ok(project_dirs.config_dir().to_path_buf())
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
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
    fn explicit_path_wins() {
        let location = ConfigLocation::resolve(Some(Path::new("/tmp/flash.toml"))).unwrap();
        assert_eq!(
            location,
            ConfigLocation::Explicit(PathBuf::from("/tmp/flash.toml"))
        );
    }

    #[test]
    fn env_override_sets_config_dir() {
        let _lock = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let _guard = EnvGuard::set(ENV_CONFIG_DIR, root.path());

        let location = ConfigLocation::resolve(None).unwrap();
        assert_eq!(
            location,
            ConfigLocation::Discovered(root.path().join("config.toml"))
        );
        assert_eq!(location.path(), root.path().join("config.toml"));
    }
}
