use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{UpdateError, UpdateResult};
use crate::time::target_interval_usec;

/// How the avatar step is driven.
///
/// Chosen once when the scheduler is built. Switching requires a new scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "UpdateModeRepr")]
pub enum UpdateMode {
    /// The host calls `step()` once per frame on its own thread.
    #[default]
    Synchronous,
    /// A dedicated background thread runs the step at the target rate.
    Threaded,
}

impl UpdateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMode::Synchronous => "synchronous",
            UpdateMode::Threaded => "threaded",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `"threaded"`-style names as well as the old integer setting (0/1).
#[derive(Deserialize)]
#[serde(untagged)]
enum UpdateModeRepr {
    Name(String),
    Code(i64),
}

impl TryFrom<UpdateModeRepr> for UpdateMode {
    type Error = String;

    fn try_from(value: UpdateModeRepr) -> Result<Self, Self::Error> {
        match value {
            UpdateModeRepr::Name(name) => match name.trim().to_ascii_lowercase().as_str() {
                "synchronous" | "sync" => Ok(UpdateMode::Synchronous),
                "threaded" | "thread" => Ok(UpdateMode::Threaded),
                other => Err(format!("unknown update mode '{other}'")),
            },
            UpdateModeRepr::Code(0) => Ok(UpdateMode::Synchronous),
            UpdateModeRepr::Code(1) => Ok(UpdateMode::Threaded),
            UpdateModeRepr::Code(other) => Err(format!("unknown update mode code {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            update: UpdateConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Settings read once when the scheduler is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default = "default_target_simrate", alias = "AvatarUpdateTargetSimrate")]
    pub target_simrate: u32,
    #[serde(default, alias = "AvatarUpdateType")]
    pub update_type: UpdateMode,
    /// How often the simrate telemetry logs its average.
    #[serde(default = "default_telemetry_period_ms")]
    pub telemetry_period_ms: u32,
}

fn default_target_simrate() -> u32 { 60 }
fn default_telemetry_period_ms() -> u32 { 1000 }

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            target_simrate: default_target_simrate(),
            update_type: UpdateMode::default(),
            telemetry_period_ms: default_telemetry_period_ms(),
        }
    }
}

impl UpdateConfig {
    #[inline]
    pub fn new(update_type: UpdateMode, target_simrate: u32) -> Self {
        Self {
            target_simrate,
            update_type,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> UpdateResult<()> {
        target_interval_usec(self.target_simrate).map(|_| ())
    }

    #[inline]
    pub fn target_interval_usec(&self) -> UpdateResult<u64> {
        target_interval_usec(self.target_simrate)
    }
}

/// Host-side settings for the demo binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Rate of the host's own frame loop.
    #[serde(default = "default_host_hz")]
    pub host_hz: u32,
    /// Stop automatically after this long. Runs until Ctrl-C when absent.
    #[serde(default)]
    pub run_for_ms: Option<u64>,
    #[serde(default = "default_remote_avatars")]
    pub remote_avatars: u32,
}

fn default_host_hz() -> u32 { 60 }
fn default_remote_avatars() -> u32 { 8 }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            host_hz: default_host_hz(),
            run_for_ms: None,
            remote_avatars: default_remote_avatars(),
        }
    }
}

pub fn load_config_toml(path: impl AsRef<Path>) -> UpdateResult<AppConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| UpdateError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = AppConfig::from_toml_str(&text).map_err(|source| UpdateError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    cfg.update.validate()?;
    Ok(cfg)
}
