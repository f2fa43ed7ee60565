use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub check: CheckConfig,
    pub health: Option<HealthConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DiscordConfig {
    pub token: String,
    /// Channel the daily congratulations are posted to.
    pub birthday_channel_id: u64,
    #[serde(default)]
    pub admins: Vec<u64>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: "YOUR_DISCORD_BOT_TOKEN".to_string(),
            birthday_channel_id: 0,
            admins: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("birthdays.json")
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CheckConfig {
    /// How often the due-today check runs.
    #[serde(with = "humantime_serde", default = "default_check_interval")]
    pub interval: Duration,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            interval: default_check_interval(),
        }
    }
}

fn default_check_interval() -> Duration {
    Duration::from_secs(60 * 60 * 24)
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_bind")]
    pub bind: SocketAddr,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            bind: default_health_bind(),
        }
    }
}

fn default_health_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

pub fn open_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
    let config: Config = toml::from_str(&content).context("Failed to parse configuration file")?;
    Ok(config)
}

pub fn write_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = Config {
        health: Some(HealthConfig::default()),
        ..Default::default()
    };
    let content = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_example_config() {
        let content = include_str!("../../../config.example.toml");
        let config: Config = toml::from_str(content).expect("Failed to parse config.example.toml");

        let expected = Config {
            discord: DiscordConfig {
                token: "YOUR_DISCORD_BOT_TOKEN".to_string(),
                birthday_channel_id: 1236048095163318362,
                admins: vec![123456789012345678],
            },
            store: StoreConfig {
                path: PathBuf::from("birthdays.json"),
            },
            check: CheckConfig {
                interval: Duration::from_secs(60 * 60 * 24),
            },
            health: Some(HealthConfig {
                bind: "0.0.0.0:8080".parse().unwrap(),
            }),
        };

        assert_eq!(config, expected);
    }

    #[test]
    fn sections_with_defaults_may_be_omitted() {
        let config: Config = toml::from_str(
            r#"
            [discord]
            token = "t"
            birthday_channel_id = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.check.interval, Duration::from_secs(60 * 60 * 24));
        assert!(config.health.is_none());
        assert!(config.discord.admins.is_empty());
    }
}
