use crate::constants::{DEFAULT_PIPE_PATH, DEFAULT_VOLUME_GAIN, OPUS_BITRATE};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::read_to_string;

pub const CONFIG_FILE: &str = "Config.toml";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Discord bot token
    #[serde(default)]
    pub discord_token: String,

    /// Voice channel to stream into, 0 when unset
    #[serde(default)]
    pub voice_channel_id: u64,

    /// Named pipe the AirPlay receiver writes raw PCM into
    #[serde(default = "default_pipe_path")]
    pub pipe_path: PathBuf,

    #[serde(default = "default_volume_gain")]
    pub volume_gain: f64,

    #[serde(default = "default_opus_bitrate")]
    pub opus_bitrate: i32,
}

fn default_pipe_path() -> PathBuf {
    PathBuf::from(DEFAULT_PIPE_PATH)
}

fn default_volume_gain() -> f64 {
    DEFAULT_VOLUME_GAIN
}

fn default_opus_bitrate() -> i32 {
    OPUS_BITRATE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            voice_channel_id: 0,
            pipe_path: default_pipe_path(),
            volume_gain: default_volume_gain(),
            opus_bitrate: default_opus_bitrate(),
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Apply overrides from environment-style key/value pairs.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value: String = value.into();
            match key.as_ref() {
                "DISCORD_TOKEN" => self.discord_token = value,
                "VOICE_CHANNEL_ID" => {
                    self.voice_channel_id = value
                        .trim()
                        .parse()
                        .with_context(|| format!("VOICE_CHANNEL_ID is not a number: {value}"))?;
                }
                "AIRPLAY_PIPE_PATH" => self.pipe_path = PathBuf::from(value),
                _ => {}
            }
        }

        Ok(())
    }

    /// Fail on settings the bot cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            bail!("DISCORD_TOKEN is not set in environment or {CONFIG_FILE}");
        }

        if self.voice_channel_id == 0 {
            warn!("VOICE_CHANNEL_ID is not set, the bot will never join a voice channel");
        }

        Ok(())
    }
}

/// Load [`CONFIG_FILE`] if present, then layer environment variables on top.
pub async fn load() -> Result<Config> {
    let mut config = match read_to_string(CONFIG_FILE).await {
        Ok(contents) => {
            Config::from_toml(&contents).with_context(|| format!("Invalid {CONFIG_FILE}"))?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No {CONFIG_FILE} found, using defaults and environment");
            Config::default()
        }
        Err(e) => return Err(e).with_context(|| format!("Could not read {CONFIG_FILE}")),
    };

    config.apply_env(std::env::vars())?;
    config.validate()?;

    Ok(config)
}
