use crate::error::Error;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://www.eodms-sgdot.nrcan-rncan.gc.ca/wes/rapi";
pub const DEFAULT_MAX_RESULTS: usize = 150;
pub const DEFAULT_RESULT_LIMIT: usize = 10_000;
/// Host whose `.netrc` entry holds EODMS credentials.
pub const EODMS_HOSTNAME: &str = "data.eodms-sgdot.nrcan-rncan.gc.ca";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub credentials: CredentialsConfig,
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Search page size; raised by this amount whenever a page comes back full.
    pub max_results: usize,
    /// Page growth stops here; larger result sets are truncated.
    pub result_limit: usize,
    pub timeout_secs: u64,
    pub metadata_timeout_secs: u64,
    pub max_retries: u32,
    pub fetch_workers: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            result_limit: DEFAULT_RESULT_LIMIT,
            timeout_secs: 60,
            metadata_timeout_secs: 5,
            max_retries: 5,
            fetch_workers: 4,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_results == 0 {
            return Err(Error::InvalidConfig("service.max_results must be at least 1".to_string()));
        }
        if self.result_limit < self.max_results {
            return Err(Error::InvalidConfig(format!(
                "service.result_limit ({}) is below service.max_results ({})",
                self.result_limit, self.max_results
            )));
        }
        if self.fetch_workers == 0 {
            return Err(Error::InvalidConfig("service.fetch_workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub results_file: PathBuf,
    pub download_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_file: PathBuf::from("./query_results.geojson"),
            download_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Unable to read config file {}", path.as_ref().display()))?;
        let config: Self = toml::from_str(&content)?;
        config.service.validate()?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Loads `explicit` if given, else `$EODMS_CONFIG`, else
    /// `$HOME/.config/eodms/config.toml` when it exists, else defaults.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        if let Ok(path) = std::env::var("EODMS_CONFIG") {
            return Self::read(path);
        }
        if let Some(path) = home_dir().map(|h| h.join(".config").join("eodms").join("config.toml")) {
            if path.exists() {
                debug!("Using config file {}", path.display());
                return Self::read(path);
            }
        }
        Ok(Self::default())
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Resolves each of username and password from, in order: the command
    /// line, `EODMS_USERNAME`/`EODMS_PASSWORD`, the config file and finally the
    /// `.netrc` entry for the EODMS host.
    pub fn resolve(
        username: Option<String>,
        password: Option<String>,
        config: &CredentialsConfig,
        netrc: Option<&Path>,
    ) -> Result<Self, Error> {
        let mut username = username
            .or_else(|| std::env::var("EODMS_USERNAME").ok())
            .or_else(|| config.username.clone());
        let mut password = password
            .or_else(|| std::env::var("EODMS_PASSWORD").ok())
            .or_else(|| config.password.clone());

        if username.is_none() || password.is_none() {
            let default_netrc = home_dir().map(|h| h.join(".netrc"));
            let netrc = netrc.map(Path::to_path_buf).or(default_netrc);
            if let Some(entry) = netrc.and_then(|path| fs::read_to_string(path).ok()) {
                if let Some((login, secret)) = netrc_entry(&entry, EODMS_HOSTNAME) {
                    username = username.or(Some(login));
                    password = password.or(Some(secret));
                }
            }
        }

        match (username, password) {
            (Some(username), Some(password)) => Ok(Self { username, password }),
            _ => Err(Error::MissingCredentials),
        }
    }
}

/// Login and password of the `machine` entry (or the `default` entry) of a
/// `.netrc` file.
pub fn netrc_entry(content: &str, machine: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = content.split_whitespace().collect();
    let mut fallback = None;
    let mut i = 0;
    while i < tokens.len() {
        let matches = match tokens[i] {
            "machine" if i + 1 < tokens.len() => {
                i += 2;
                Some(tokens[i - 1] == machine)
            }
            "default" => {
                i += 1;
                Some(false)
            }
            _ => {
                i += 1;
                None
            }
        };
        let Some(is_machine) = matches else {
            continue;
        };

        let mut login = None;
        let mut password = None;
        while i + 1 < tokens.len() && tokens[i] != "machine" && tokens[i] != "default" {
            match tokens[i] {
                "login" => login = Some(tokens[i + 1].to_string()),
                "password" => password = Some(tokens[i + 1].to_string()),
                _ => {}
            }
            i += 2;
        }
        if let (Some(login), Some(password)) = (login, password) {
            if is_machine {
                return Some((login, password));
            }
            fallback.get_or_insert((login, password));
        }
    }
    fallback
}
