use anyhow::{bail, ensure};
use serde::Deserialize;

use crate::base::packet::AddrRange;
use crate::sim::config::Config;
use crate::timeq::Tick;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SpmConfig {
    pub name: String,
    pub range: AddrRange,
    /// Ticks from acceptance until the response may leave.
    pub latency_read: Tick,
    /// Upper bound of the uniform jitter added to `latency_read`.
    pub latency_read_var: Tick,
    /// Writes follow the read schedule unless this is set.
    pub latency_write: Option<Tick>,
    pub latency_write_var: Tick,
    /// Bytes per tick.
    pub bandwidth: f64,
}

impl Config for SpmConfig {}

impl Default for SpmConfig {
    fn default() -> Self {
        Self {
            name: "spm".to_string(),
            range: AddrRange::new(0x4000_0000, 64 << 10),
            latency_read: 10,
            latency_read_var: 0,
            latency_write: None,
            latency_write_var: 0,
            bandwidth: 1.0,
        }
    }
}

impl SpmConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.bandwidth.is_finite() && self.bandwidth > 0.0,
            "{}: bandwidth must be a positive number of bytes per tick, got {}",
            self.name,
            self.bandwidth
        );
        ensure!(self.range.size > 0, "{}: address range is empty", self.name);
        if self.range.start.checked_add(self.range.size).is_none() {
            bail!("{}: address range {:#x}+{:#x} overflows", self.name, self.range.start, self.range.size);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml::Table;

    #[test]
    fn parses_spm_section() {
        let text = r#"
            [spm]
            name = "spm0"
            range = { start = 0x1000, size = 4096 }
            latency_read = 20
            latency_read_var = 5
            latency_write = 8
            bandwidth = 2.5
        "#;
        let table: Table = toml::from_str(text).unwrap();
        let cfg = SpmConfig::try_from_section(table.get("spm")).unwrap();
        assert_eq!("spm0", cfg.name);
        assert_eq!(AddrRange::new(0x1000, 4096), cfg.range);
        assert_eq!(20, cfg.latency_read);
        assert_eq!(5, cfg.latency_read_var);
        assert_eq!(Some(8), cfg.latency_write);
        assert_eq!(0, cfg.latency_write_var);
        assert_eq!(2.5, cfg.bandwidth);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_bad_bandwidth_and_range() {
        let mut cfg = SpmConfig::default();
        cfg.bandwidth = 0.0;
        assert!(cfg.validate().is_err());
        cfg.bandwidth = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = SpmConfig::default();
        cfg.range.size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = SpmConfig::default();
        cfg.range = AddrRange::new(u64::MAX - 1, 16);
        assert!(cfg.validate().is_err());
    }
}
