use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const UPLOAD_FOLDER: &str = "UPLOAD_FOLDER";
pub const PASSWORD_HASH: &str = "PASSWORD_HASH";
pub const MAX_FILE_SIZE: &str = "MAX_FILE_SIZE";
pub const AUTH_FAILURE_DELAY_MS: &str = "AUTH_FAILURE_DELAY_MS";
pub const MODE: &str = "MODE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("unknown MODE {0:?}, expected PRODUCTION, TESTING or DEVELOPMENT")]
    UnknownMode(String),

    #[error("PASSWORD_HASH is not a valid password hash string: {0}")]
    InvalidPasswordHash(String),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Which section of the config file applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Production,
    Testing,
    Development,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Production => "PRODUCTION",
            RunMode::Testing => "TESTING",
            RunMode::Development => "DEVELOPMENT",
        }
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PRODUCTION" => Ok(RunMode::Production),
            "TESTING" => Ok(RunMode::Testing),
            "DEVELOPMENT" => Ok(RunMode::Development),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `[MODE]` table of the TOML config file
#[derive(Debug, Default, serde::Deserialize)]
pub struct ConfigSection {
    #[serde(rename = "UPLOAD_FOLDER")]
    pub upload_folder: Option<PathBuf>,
    #[serde(rename = "PASSWORD_HASH")]
    pub password_hash: Option<String>,
    #[serde(rename = "MAX_FILE_SIZE")]
    pub max_file_size: Option<usize>,
    #[serde(rename = "AUTH_FAILURE_DELAY_MS")]
    pub auth_failure_delay_ms: Option<u64>,
}

/// Receiver configuration, built once at startup and read-only afterwards
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Directory accepted backups are written into. Must already exist.
    pub upload_folder: PathBuf,

    /// Argon2 PHC string of the shared upload password
    pub password_hash: String,

    /// Maximum file size in bytes (default: 1 GB)
    pub max_file_size: usize,

    /// Pause added before answering a rejected password (default: 1 s)
    pub auth_failure_delay: Duration,

    pub mode: RunMode,
}

impl ReceiverConfig {
    pub const DEFAULT_MAX_FILE_SIZE: usize = 1024 * 1024 * 1024; // 1 GB
    pub const DEFAULT_AUTH_FAILURE_DELAY: Duration = Duration::from_secs(1);

    pub fn new(upload_folder: impl Into<PathBuf>, password_hash: impl Into<String>) -> Self {
        Self {
            upload_folder: upload_folder.into(),
            password_hash: password_hash.into(),
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            auth_failure_delay: Self::DEFAULT_AUTH_FAILURE_DELAY,
            mode: RunMode::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load configuration from the `[MODE]` table of `config_file` (if any),
    /// letting environment variables override individual keys.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars().collect();
        let section = match config_file {
            Some(path) => {
                let mode = Self::mode_from(&vars)?;
                read_section(path, mode)?
            }
            None => ConfigSection::default(),
        };
        Self::resolve(&vars, section)
    }

    fn mode_from(vars: &HashMap<String, String>) -> Result<RunMode, ConfigError> {
        vars.get(MODE)
            .map(|v| v.parse::<RunMode>())
            .transpose()
            .map(Option::unwrap_or_default)
    }

    /// Merges a config file section with variables, variables winning.
    pub fn resolve(
        vars: &HashMap<String, String>,
        section: ConfigSection,
    ) -> Result<Self, ConfigError> {
        let mode = Self::mode_from(vars)?;

        let upload_folder = vars
            .get(UPLOAD_FOLDER)
            .map(PathBuf::from)
            .or(section.upload_folder)
            .ok_or(ConfigError::Missing(UPLOAD_FOLDER))?;

        let password_hash = vars
            .get(PASSWORD_HASH)
            .cloned()
            .or(section.password_hash)
            .ok_or(ConfigError::Missing(PASSWORD_HASH))?;
        let password_hash = password_hash.trim().to_string();
        argon2::PasswordHash::new(&password_hash)
            .map_err(|e| ConfigError::InvalidPasswordHash(e.to_string()))?;

        let max_file_size = parse_var(vars, MAX_FILE_SIZE)?
            .or(section.max_file_size)
            .unwrap_or(Self::DEFAULT_MAX_FILE_SIZE);

        let auth_failure_delay = parse_var(vars, AUTH_FAILURE_DELAY_MS)?
            .or(section.auth_failure_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(Self::DEFAULT_AUTH_FAILURE_DELAY);

        Ok(Self {
            upload_folder,
            password_hash,
            max_file_size,
            auth_failure_delay,
            mode,
        })
    }
}

fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match vars.get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key,
                value: value.clone(),
            }),
        None => Ok(None),
    }
}

fn read_section(path: &Path, mode: RunMode) -> Result<ConfigSection, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_section(&raw, mode)
}

/// Picks the table named after `mode` out of a TOML document.
pub fn parse_section(raw: &str, mode: RunMode) -> Result<ConfigSection, ConfigError> {
    let mut sections: HashMap<String, ConfigSection> = toml::from_str(raw)?;
    Ok(sections.remove(mode.as_str()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "$argon2id$v=19$m=8,t=1,p=1$c29tZXNhbHQ$Fy2wRb1Djq1kUdvjUHEMTQ";

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_from_vars() {
        let config = ReceiverConfig::resolve(
            &vars(&[(UPLOAD_FOLDER, "/srv/backups"), (PASSWORD_HASH, HASH)]),
            ConfigSection::default(),
        )
        .unwrap();

        assert_eq!(config.upload_folder, PathBuf::from("/srv/backups"));
        assert_eq!(config.password_hash, HASH);
        assert_eq!(config.max_file_size, ReceiverConfig::DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.auth_failure_delay, Duration::from_secs(1));
        assert_eq!(config.mode, RunMode::Production);
    }

    #[test]
    fn test_missing_required_keys() {
        let err = ReceiverConfig::resolve(&vars(&[(PASSWORD_HASH, HASH)]), ConfigSection::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(UPLOAD_FOLDER)));

        let err = ReceiverConfig::resolve(
            &vars(&[(UPLOAD_FOLDER, "/srv/backups")]),
            ConfigSection::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(PASSWORD_HASH)));
    }

    #[test]
    fn test_rejects_malformed_values() {
        let err = ReceiverConfig::resolve(
            &vars(&[(UPLOAD_FOLDER, "/srv/backups"), (PASSWORD_HASH, "plaintext")]),
            ConfigSection::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPasswordHash(_)));

        let err = ReceiverConfig::resolve(
            &vars(&[
                (UPLOAD_FOLDER, "/srv/backups"),
                (PASSWORD_HASH, HASH),
                (MAX_FILE_SIZE, "lots"),
            ]),
            ConfigSection::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: MAX_FILE_SIZE, .. }));

        let err = ReceiverConfig::resolve(
            &vars(&[
                (UPLOAD_FOLDER, "/srv/backups"),
                (PASSWORD_HASH, HASH),
                (MODE, "STAGING"),
            ]),
            ConfigSection::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMode(_)));
    }

    #[test]
    fn test_file_section_by_mode() {
        let raw = format!(
            r#"
[PRODUCTION]
UPLOAD_FOLDER = "/opt/backups"
PASSWORD_HASH = "{HASH}"

[TESTING]
UPLOAD_FOLDER = "/tmp/backups"
PASSWORD_HASH = "{HASH}"
AUTH_FAILURE_DELAY_MS = 0
"#
        );

        let section = parse_section(&raw, RunMode::Testing).unwrap();
        let config = ReceiverConfig::resolve(&vars(&[(MODE, "testing")]), section).unwrap();
        assert_eq!(config.upload_folder, PathBuf::from("/tmp/backups"));
        assert_eq!(config.auth_failure_delay, Duration::ZERO);
        assert_eq!(config.mode, RunMode::Testing);

        let section = parse_section(&raw, RunMode::Development).unwrap();
        assert!(section.upload_folder.is_none());
    }

    #[test]
    fn test_vars_override_file() {
        let raw = format!(
            r#"
[PRODUCTION]
UPLOAD_FOLDER = "/opt/backups"
PASSWORD_HASH = "{HASH}"
MAX_FILE_SIZE = 1024
"#
        );
        let section = parse_section(&raw, RunMode::Production).unwrap();
        let config = ReceiverConfig::resolve(
            &vars(&[(UPLOAD_FOLDER, "/mnt/other"), (AUTH_FAILURE_DELAY_MS, "250")]),
            section,
        )
        .unwrap();

        assert_eq!(config.upload_folder, PathBuf::from("/mnt/other"));
        assert_eq!(config.max_file_size, 1024);
        assert_eq!(config.auth_failure_delay, Duration::from_millis(250));
    }
}
