use serde::{Deserialize, Serialize};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const DEFAULT_CONFIG_FILE_NAME: &str = "diego-blame.toml";
pub const DEFAULT_CF_BINARY: &str = "cf";
pub const DEFAULT_APPS_ENDPOINT: &str = "/v2/apps";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigReadError {
    #[error("Error in configuration file {}", .path.display())]
    ConfigToml {
        path: PathBuf,
        #[source]
        error: Box<toml::de::Error>,
    },

    #[error("Invalid value in configuration file {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("Encountered an IO error while reading the configuration file")]
    Io(#[from] Box<io::Error>),
}

#[derive(Debug, thiserror::Error)]
#[error("Could not find a 'diego-blame.toml' file in '{}' or any of its parents", .0.display())]
pub struct ConfigNotFound(pub PathBuf);

#[derive(Debug, thiserror::Error)]
pub enum FindConfigError {
    #[error(transparent)]
    NotFound(#[from] ConfigNotFound),
    #[error("Could not determine the working directory")]
    Io(#[from] io::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Executable used to reach the control API, invoked as `<cf-binary> curl <path>`
    pub cf_binary: PathBuf,

    /// Application listing endpoint, the first page of the enumeration
    pub apps_endpoint: String,

    /// Upper bound on in-flight per-application requests
    pub max_concurrent_requests: usize,

    /// Look up the org and space names of every reported application
    pub resolve_placement: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cf_binary: DEFAULT_CF_BINARY.into(),
            apps_endpoint: DEFAULT_APPS_ENDPOINT.to_owned(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            resolve_placement: true,
        }
    }
}

impl Config {
    pub fn read<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigReadError> {
        let path = config_path.as_ref();
        let content = fs::read_to_string(path).map_err(Box::new)?;
        let cfg = Self::from_str(&content).map_err(|e| ConfigReadError::ConfigToml {
            path: path.to_owned(),
            error: Box::new(e),
        })?;
        cfg.validate().map_err(|reason| ConfigReadError::Invalid {
            path: path.to_owned(),
            reason,
        })?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_requests == 0 {
            return Err("max-concurrent-requests must be at least 1".to_owned());
        }
        if !self.apps_endpoint.starts_with('/') {
            return Err(format!(
                "apps-endpoint '{}' must be an absolute API path",
                self.apps_endpoint
            ));
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

/// Search the working directory and its ancestors for a config file
pub fn find_config_file() -> Result<PathBuf, FindConfigError> {
    let cwd = env::current_dir()?;
    Ok(find_config_file_from(&cwd)?)
}

pub fn find_config_file_from(start: &Path) -> Result<PathBuf, ConfigNotFound> {
    start
        .ancestors()
        .map(|dir| dir.join(DEFAULT_CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigNotFound(start.to_owned()))
}
