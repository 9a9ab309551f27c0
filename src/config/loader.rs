use crate::config::schema::{Settings, ValidationError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a settings file.
pub const CONFIG_ENV: &str = "DOC_PATCHER_CONFIG";
/// Settings file picked up from the working directory.
pub const LOCAL_CONFIG: &str = "doc-patcher.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings{}: {source}", origin(.path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("rejected settings{}: {source}", origin(.path))]
    Validation {
        path: Option<PathBuf>,
        #[source]
        source: ValidationError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

impl ConfigError {
    /// Attach the file a parse or validation failure came from.
    fn in_file(self, file: &Path) -> Self {
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(file.to_path_buf()),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(file.to_path_buf()),
                source,
            },
            other => other,
        }
    }
}

/// Where the active settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Flag(PathBuf),
    Env(PathBuf),
    Local(PathBuf),
    Defaults,
}

/// Parse and validate settings. Relative paths are left as written.
pub fn load_from_str(input: &str) -> Result<Settings, ConfigError> {
    let settings: Settings =
        toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml { path: None, source })?;
    if let Err(source) = settings.validate() {
        return Err(ConfigError::Validation { path: None, source });
    }
    Ok(settings)
}

/// Load settings from a file, anchoring relative paths at its directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let file = path.as_ref();
    let text = fs::read_to_string(file).map_err(|source| ConfigError::Io {
        path: file.to_path_buf(),
        source,
    })?;
    let mut settings = load_from_str(&text).map_err(|e| e.in_file(file))?;
    settings.resolve_relative_to(file.parent().unwrap_or_else(|| Path::new(".")));
    Ok(settings)
}

/// Find and load settings: explicit flag, then `$DOC_PATCHER_CONFIG`, then
/// `./doc-patcher.toml`, then built-in defaults.
///
/// An explicit flag must name a readable file. A dangling environment
/// variable is skipped with a warning.
pub fn discover(flag: Option<&Path>) -> Result<(Settings, ConfigSource), ConfigError> {
    if let Some(path) = flag {
        return Ok((load_from_path(path)?, ConfigSource::Flag(path.to_path_buf())));
    }

    if let Some(value) = env::var_os(CONFIG_ENV) {
        let path = PathBuf::from(value);
        if path.is_file() {
            return Ok((load_from_path(&path)?, ConfigSource::Env(path)));
        }
        tracing::warn!(path = %path.display(), "{CONFIG_ENV} points at a missing file, ignoring");
    }

    let local = Path::new(LOCAL_CONFIG);
    if local.is_file() {
        return Ok((load_from_path(local)?, ConfigSource::Local(local.to_path_buf())));
    }

    Ok((Settings::default(), ConfigSource::Defaults))
}
