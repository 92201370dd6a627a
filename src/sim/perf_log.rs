use std::fs;
use std::path::Path;

use anyhow::Context;
use log::info;
use serde::Serialize;

use crate::spm::stats::{DerivedStats, SpmStats};
use crate::timeq::Tick;
use crate::traffic::TrafficSummary;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub end_tick: Tick,
    pub timed_out: bool,
    pub drained_at: Option<Tick>,
    pub drain_signals: u32,
    pub spm: SpmStats,
    pub spm_derived: DerivedStats,
    pub traffic: TrafficSummary,
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(summary).context("cannot serialize run summary")?;
    fs::write(path, payload).with_context(|| format!("cannot write {}", path.display()))?;
    info!("wrote run summary to {}", path.display());
    Ok(())
}

pub fn log_summary(summary: &RunSummary) {
    let spm = &summary.spm;
    let derived = &summary.spm_derived;
    let traffic = &summary.traffic;
    info!("run ended @ {} (drained @ {:?})", summary.end_tick, summary.drained_at);
    info!(
        "spm: {} reads / {} writes / {} other, {}B read, {}B written",
        spm.read_reqs(),
        spm.write_reqs(),
        spm.neither_read_nor_write(),
        spm.bytes_read(),
        spm.bytes_written()
    );
    info!(
        "spm: retries rd {} wr {} resp {}, max queue {}",
        spm.num_rd_retry(),
        spm.num_wr_retry(),
        spm.num_resp_retry(),
        spm.max_queue_depth()
    );
    info!(
        "spm: avg q lat {:.2}, avg mem acc lat {:.2}, avg bus lat {:.2}, avg gap {:.2}",
        derived.avg_q_lat, derived.avg_mem_acc_lat, derived.avg_bus_lat, derived.avg_gap
    );
    info!(
        "traffic: {} issued, {} completed, {} rejected, {} mismatches, avg latency {:.2}",
        traffic.issued, traffic.completed, traffic.rejected, traffic.mismatches, traffic.avg_latency
    );
}
