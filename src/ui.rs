use anyhow::Context;
use clap::Parser;
use crate::sim::config::{Config, SimConfig};
use crate::sim::top::Sim;
use crate::spm::config::SpmConfig;
use crate::traffic::TrafficConfig;
use log::LevelFilter;
use std::path::PathBuf;
use toml::Table;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct SpmArgs {
    #[arg(help = "Path to config.toml")]
    pub config_path: PathBuf,
    #[arg(long, help = "Log at level (0:warn, 1:info, 2:debug, 3:trace)")]
    pub log: Option<u64>,
    #[arg(long, help = "Override the global RNG seed")]
    pub seed: Option<u64>,
    #[arg(long, help = "Write the run summary as JSON to this path")]
    pub stats_json: Option<PathBuf>,
    #[arg(long, help = "Override the simulation timeout in ticks")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SimConfigs {
    pub sim: SimConfig,
    pub spm: SpmConfig,
    pub traffic: TrafficConfig,
}

/// Parse every config section from the TOML text.
/// If `cli_args` is given, override TOML options with CLI arguments.
pub fn load_configs(toml_string: &str, cli_args: Option<&SpmArgs>) -> anyhow::Result<SimConfigs> {
    let config_table: Table = toml::from_str(toml_string).context("cannot parse config toml")?;
    let mut sim = SimConfig::try_from_section(config_table.get("sim")).context("[sim]")?;
    let spm = SpmConfig::try_from_section(config_table.get("spm")).context("[spm]")?;
    let traffic = TrafficConfig::try_from_section(config_table.get("traffic")).context("[traffic]")?;

    // override toml configs with CLI args
    if let Some(args) = cli_args {
        sim.log_level = args.log.unwrap_or(sim.log_level);
        sim.seed = args.seed.unwrap_or(sim.seed);
        sim.timeout = args.timeout.unwrap_or(sim.timeout);
        if args.stats_json.is_some() {
            sim.stats_json = args.stats_json.clone();
        }
    }

    Ok(SimConfigs { sim, spm, traffic })
}

/// Make a Sim object from the TOML configuration.
pub fn make_sim(toml_string: &str, cli_args: Option<&SpmArgs>) -> anyhow::Result<Sim> {
    let configs = load_configs(toml_string, cli_args)?;
    Sim::new(configs.sim, configs.spm, configs.traffic)
}

pub fn level_filter(log_level: u64) -> LevelFilter {
    match log_level {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
