use serde::Deserialize;

use crate::sim::config::Config;
use crate::timeq::Tick;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficConfig {
    pub enabled: bool,
    pub reqs_per_pattern: u32,
    pub address: TrafficAddressConfig,
    pub issue: TrafficIssueConfig,
    pub patterns: Vec<TrafficPatternSpec>,
}

impl Config for TrafficConfig {}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            reqs_per_pattern: 256,
            address: TrafficAddressConfig::default(),
            issue: TrafficIssueConfig::default(),
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficAddressConfig {
    pub base: u64,
    pub size: u64,
}

impl Default for TrafficAddressConfig {
    fn default() -> Self {
        Self {
            base: 0x4000_0000,
            size: 64 << 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficIssueConfig {
    /// Requests sent but not yet answered.
    pub max_outstanding: usize,
    /// Ticks between two issue attempts.
    pub issue_gap: Tick,
    /// Refuse every n-th response (0 never refuses).
    pub refuse_every: u64,
    /// Delay before a refused response is retried.
    pub resp_retry_delay: Tick,
}

impl Default for TrafficIssueConfig {
    fn default() -> Self {
        Self {
            max_outstanding: 16,
            issue_gap: 1,
            refuse_every: 0,
            resp_retry_delay: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficPatternSpec {
    pub name: String,
    pub kind: String,
    pub op: String,
    pub req_bytes: u32,
    pub stride: u32,
    pub tile_m: u32,
    pub tile_n: u32,
    pub transpose: bool,
    pub random_min: u32,
    pub random_max: u32,
    pub seed: u64,
    /// Writes go out without asking for a response.
    pub posted: bool,
    pub within_bytes: Option<u64>,
}

impl Default for TrafficPatternSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: String::new(),
            op: "read".to_string(),
            req_bytes: 4,
            stride: 1,
            tile_m: 16,
            tile_n: 16,
            transpose: false,
            random_min: 0,
            random_max: 0,
            seed: 0,
            posted: false,
            within_bytes: None,
        }
    }
}
