use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Environment variable that overrides `openweather.api_key`.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Which part of the first `weather` array entry becomes the report's condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionField {
    /// The entry itself, read as a plain string.
    #[default]
    Scalar,
    /// The entry's `main` field, e.g. "Clouds".
    Main,
    /// The entry's `description` field, e.g. "broken clouds".
    Description,
}

/// Settings for the upstream OpenWeather call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenWeatherConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Percent-encode the city in the query string. When false the city is
    /// concatenated into the URL verbatim.
    pub encode_city: bool,
    pub condition_field: ConditionField,
}

impl ConditionField {
    pub const ALL: [ConditionField; 3] =
        [ConditionField::Scalar, ConditionField::Main, ConditionField::Description];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionField::Scalar => "scalar",
            ConditionField::Main => "main",
            ConditionField::Description => "description",
        }
    }
}

impl std::fmt::Display for ConditionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            encode_city: true,
            condition_field: ConditionField::default(),
        }
    }
}

impl OpenWeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the inbound HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Prefix every route is mounted under, e.g. "/weather-app". Empty for root.
    pub context_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            context_path: String::new(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [openweather]
/// api_key = "..."
/// condition_field = "description"
///
/// [server]
/// bind = "0.0.0.0:8080"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub openweather: OpenWeatherConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load config from the default location, or return defaults if it doesn't exist yet.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    /// Like [`Config::load`] for an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::read_from(path)?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Read the file only, without environment overrides. Used when the
    /// result is going to be written back.
    pub fn read_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        // reqwest fails every request immediately with a zero timeout.
        if self.openweather.timeout_secs == 0 {
            bail!("openweather.timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-server")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.openweather.api_key = Some(key);
        }
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.openweather.api_key = Some(api_key);
    }

    pub fn api_key(&self) -> Option<&str> {
        self.openweather.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_openweather() {
        let cfg = Config::default();

        assert_eq!(cfg.openweather.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.openweather.timeout(), Duration::from_secs(10));
        assert!(cfg.openweather.encode_city);
        assert_eq!(cfg.openweather.condition_field, ConditionField::Scalar);
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
        assert!(cfg.api_key().is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let cfg: Config = toml::from_str(
            r#"
            [openweather]
            api_key = "KEY"
            condition_field = "description"
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.api_key(), Some("KEY"));
        assert_eq!(cfg.openweather.condition_field, ConditionField::Description);
        assert_eq!(cfg.openweather.timeout_secs, 10);
        assert_eq!(cfg.server.context_path, "");
    }

    #[test]
    fn unknown_condition_field_is_rejected() {
        let res: Result<Config, _> = toml::from_str(
            r#"
            [openweather]
            condition_field = "icon"
            "#,
        );

        assert!(res.is_err());
    }

    #[test]
    fn condition_field_names_match_serde() {
        for field in ConditionField::ALL {
            let toml = format!("[openweather]\ncondition_field = \"{field}\"\n");
            let cfg: Config = toml::from_str(&toml).expect("valid toml");
            assert_eq!(cfg.openweather.condition_field, field);
        }
    }

    #[test]
    fn env_overrides_file_key() {
        let mut cfg = Config::default();
        cfg.set_api_key("FROM_FILE".into());

        cfg.apply_env_overrides(|key| (key == API_KEY_ENV).then(|| "FROM_ENV".to_string()));

        assert_eq!(cfg.api_key(), Some("FROM_ENV"));
    }

    #[test]
    fn empty_env_value_is_ignored() {
        let mut cfg = Config::default();
        cfg.set_api_key("FROM_FILE".into());

        cfg.apply_env_overrides(|_| Some(String::new()));

        assert_eq!(cfg.api_key(), Some("FROM_FILE"));
    }

    #[test]
    fn empty_key_counts_as_unset() {
        let mut cfg = Config::default();
        cfg.set_api_key(String::new());

        assert!(cfg.api_key().is_none());
    }

    #[test]
    fn save_and_load_from_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_api_key("SAVED".into());
        cfg.openweather.encode_city = false;
        cfg.server.context_path = "/app".into();
        cfg.save_to(&path).expect("save");

        let loaded = Config::read_from(&path).expect("load");
        assert_eq!(loaded.api_key(), Some("SAVED"));
        assert!(!loaded.openweather.encode_city);
        assert_eq!(loaded.server.context_path, "/app");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[openweather]\ntimeout_secs = 0\n").expect("write");

        let err = Config::read_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
        assert!(format!("{err:#}").contains("timeout_secs must be greater than zero"));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::read_from(&dir.path().join("absent.toml")).expect("load");

        assert_eq!(cfg.openweather.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[openweather\n").expect("write");

        let err = Config::read_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
