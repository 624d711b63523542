use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceFormatSetting {
    #[default]
    Bgra8,
    Rgba8,
}

/// Settings file for a conversion stage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageConfig {
    pub version: u32,
    #[serde(default)]
    pub gpu: GpuSection,
    #[serde(default)]
    pub frames: FramesSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GpuSection {
    #[serde(default, deserialize_with = "deserialize_power_opt")]
    pub power: Option<PowerSetting>,
    #[serde(default)]
    pub fallback_adapter: bool,
    #[serde(default)]
    pub surface_format: Option<SurfaceFormatSetting>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub submission_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FramesSection {
    #[serde(default = "default_assume_nv12")]
    pub assume_nv12_when_unset: bool,
}

impl Default for FramesSection {
    fn default() -> Self {
        Self {
            assume_nv12_when_unset: default_assume_nv12(),
        }
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gpu: GpuSection::default(),
            frames: FramesSection::default(),
        }
    }
}

fn default_assume_nv12() -> bool {
    true
}

/// Accepts `"2s"`-style strings as well as bare seconds.
pub fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
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
            parse_duration(v).map(Some).map_err(E::custom)
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
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be a finite, non-negative number"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Parses a human-readable duration such as `250ms` or `2s`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime::parse_duration(raw.trim()).map_err(|err| format!("invalid duration '{raw}': {err}"))
}

fn deserialize_power_opt<'de, D>(deserializer: D) -> Result<Option<PowerSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|raw| parse_power(&raw).map_err(de::Error::custom))
        .transpose()
}

/// Parses a power preference, accepting the common adapter-class aliases.
pub fn parse_power(raw: &str) -> Result<PowerSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "low" | "low-power" | "integrated" => Ok(PowerSetting::Low),
        "high" | "high-performance" | "discrete" => Ok(PowerSetting::High),
        other => Err(format!("invalid power preference '{other}'")),
    }
}

impl StageConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: StageConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(timeout) = self.gpu.submission_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "gpu.submission_timeout must be greater than zero; omit it to wait indefinitely"
                        .into(),
                ));
            }
        }

        Ok(())
    }
}
