use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerts::TwilioConfig;

/// Overrides the configured Twilio auth token, so it can live in `.env`
pub const TWILIO_TOKEN_ENV: &str = "UPPE_TWILIO_AUTH_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },

    #[error("Failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },

    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("Neither XDG_CONFIG_HOME nor a home directory is available")]
    ConfigPathUnavailable,

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: Scheduler,
    pub storage: Storage,
    pub alerts: Alerts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub scan_interval_seconds: u64,
    pub rotation_interval_seconds: u64,
    /// Upper bound on probes in flight during one scan; unset is unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_probes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub data_dir: path::PathBuf,
    pub logs_dir: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alerts {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twilio: Option<TwilioConfig>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { scan_interval_seconds: 60, rotation_interval_seconds: 24 * 3600, max_concurrent_probes: None }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self { data_dir: ".data".into(), logs_dir: ".logs".into() }
    }
}

impl Default for Alerts {
    fn default() -> Self {
        Self { enabled: true, twilio: None }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/checks.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/checks.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Scan Interval (s)", &self.scheduler.scan_interval_seconds)?;
        write_1(f, "Rotation Interval (s)", &self.scheduler.rotation_interval_seconds)?;
        match self.scheduler.max_concurrent_probes {
            Some(limit) => write_1(f, "Max Concurrent Probes", &limit)?,
            None => write_1(f, "Max Concurrent Probes", &"unbounded")?,
        }
        write_title_1(f, "Storage")?;
        write_1(f, "Data Directory", &self.storage.data_dir.display())?;
        write_1(f, "Logs Directory", &self.storage.logs_dir.display())?;
        write_title_1(f, "Alerts")?;
        write_1(f, "Enabled", &self.alerts.enabled)?;
        match &self.alerts.twilio {
            Some(twilio) => {
                write_1(f, "Provider", &"twilio")?;
                write_1(f, "Account", &twilio.account_sid)?;
                write_1(f, "From", &twilio.from_phone)?;
            }
            None => write_1(f, "Provider", &"none (log only)")?,
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/checks.toml
    ///  or the specified path if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let mut config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str::<Self>(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    fn apply_env(&mut self) {
        if let (Some(twilio), Ok(token)) = (self.alerts.twilio.as_mut(), env::var(TWILIO_TOKEN_ENV)) {
            if !token.trim().is_empty() {
                twilio.auth_token = token.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.scan_interval_seconds == 0 {
            return Err(ConfigError::Invalid("scan_interval_seconds must be at least 1".into()));
        }
        if self.scheduler.rotation_interval_seconds == 0 {
            return Err(ConfigError::Invalid("rotation_interval_seconds must be at least 1".into()));
        }
        if self.scheduler.max_concurrent_probes == Some(0) {
            return Err(ConfigError::Invalid("max_concurrent_probes must be at least 1 when set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_reference_intervals() {
        let config = Config::default();
        assert_eq!(config.scheduler.scan_interval_seconds, 60);
        assert_eq!(config.scheduler.rotation_interval_seconds, 86_400);
        assert_eq!(config.scheduler.max_concurrent_probes, None);
        assert!(config.alerts.enabled);
        assert!(config.alerts.twilio.is_none());
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/checks.toml");

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_extension_is_normalized() {
        let dir = tempdir().unwrap();
        Config::from_config(Some(dir.path().join("checks"))).unwrap();
        assert!(dir.path().join("checks.toml").exists());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checks.toml");
        fs::write(
            &path,
            r#"
[scheduler]
scan_interval_seconds = 5
max_concurrent_probes = 32

[alerts.twilio]
account_sid = "AC123"
auth_token = "token"
from_phone = "+15005550006"
"#,
        )
        .unwrap();

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config.scheduler.scan_interval_seconds, 5);
        assert_eq!(config.scheduler.rotation_interval_seconds, 86_400);
        assert_eq!(config.scheduler.max_concurrent_probes, Some(32));
        assert_eq!(config.storage, Storage::default());
        let twilio = config.alerts.twilio.unwrap();
        assert_eq!(twilio.account_sid, "AC123");
        assert_eq!(twilio.api_base, "https://api.twilio.com");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checks.toml");
        fs::write(&path, "[scheduler]\nscan_interval_seconds = 0\n").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::Invalid(_))));

        fs::write(&path, "[scheduler\n").unwrap();
        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn test_display_lists_sections() {
        let rendered = Config::default().to_string();
        assert!(rendered.contains("Scheduler"));
        assert!(rendered.contains("Scan Interval (s): 60"));
        assert!(rendered.contains("Max Concurrent Probes: unbounded"));
        assert!(rendered.contains("Provider: none (log only)"));
    }
}
