use std::fs;

use anyhow::{bail, Context};
use clap::Parser;
use env_logger::Builder;
use spmsim::sim::top::Sim;
use spmsim::ui::{level_filter, load_configs, SpmArgs};

pub fn main() -> anyhow::Result<()> {
    let argv = SpmArgs::parse();
    let config = fs::read_to_string(&argv.config_path)
        .with_context(|| format!("failed to read config file {}", argv.config_path.display()))?;
    let configs = load_configs(&config, Some(&argv))?;

    Builder::new()
        .filter_level(level_filter(configs.sim.log_level))
        .parse_default_env()
        .init();

    let mut sim = Sim::new(configs.sim, configs.spm, configs.traffic)?;
    let summary = sim.simulate()?;
    if summary.timed_out {
        bail!("simulation timed out @ tick {}", summary.end_tick);
    }
    if summary.traffic.mismatches > 0 {
        bail!("{} reads returned stale data", summary.traffic.mismatches);
    }
    Ok(())
}
