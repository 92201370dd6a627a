use std::path::PathBuf;

use anyhow::Context;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::*;

use crate::timeq::Tick;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    /// Seed of the host-wide RNG; every component RNG is derived from it.
    pub seed: u64,
    pub log_level: u64,
    pub timeout: Tick,
    /// Issue a drain once the requester has nothing left to send.
    pub drain_at_end: bool,
    pub stats_json: Option<PathBuf>,
}

pub trait Config: DeserializeOwned + Default {
    fn try_from_section(section: Option<&Value>) -> anyhow::Result<Self> {
        match section {
            Some(value) => value
                .clone()
                .try_into()
                .context("cannot deserialize config section"),
            None => {
                warn!("config section not found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            log_level: 0,
            timeout: 10_000_000,
            drain_at_end: true,
            stats_json: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_section_falls_back_to_defaults() {
        let table: Table = toml::from_str("[other]\nx = 1\n").unwrap();
        let cfg = SimConfig::try_from_section(table.get("sim")).unwrap();
        assert_eq!(10_000_000, cfg.timeout);
        assert!(cfg.drain_at_end);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let table: Table = toml::from_str("[sim]\nseed = 42\nstats_json = \"out.json\"\n").unwrap();
        let cfg = SimConfig::try_from_section(table.get("sim")).unwrap();
        assert_eq!(42, cfg.seed);
        assert_eq!(Some(PathBuf::from("out.json")), cfg.stats_json);
        assert_eq!(0, cfg.log_level);
    }

    #[test]
    fn malformed_section_is_an_error() {
        let table: Table = toml::from_str("[sim]\nseed = \"not a number\"\n").unwrap();
        assert!(SimConfig::try_from_section(table.get("sim")).is_err());
    }
}
