use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::base::packet::MemCmd;
use crate::spm::config::SpmConfig;
use crate::timeq::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Schedule {
    base: Tick,
    var: Tick,
}

impl Schedule {
    fn worst_case(self) -> Tick {
        self.base.saturating_add(self.var).max(1)
    }
}

/// Access latency: a fixed base plus uniform jitter over `[0, var]`, never below one tick.
#[derive(Debug, Clone)]
pub struct LatencyModel {
    read: Schedule,
    write: Schedule,
    rng: StdRng,
}

impl LatencyModel {
    pub fn new(config: &SpmConfig, seed: u64) -> Self {
        let read = Schedule {
            base: config.latency_read,
            var: config.latency_read_var,
        };
        let write = match config.latency_write {
            Some(base) => Schedule {
                base,
                var: config.latency_write_var,
            },
            None => read,
        };
        Self {
            read,
            write,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn sample(&mut self, cmd: MemCmd) -> Tick {
        let schedule = self.schedule_for(cmd);
        let jitter = if schedule.var > 0 {
            self.rng.gen_range(0..=schedule.var)
        } else {
            0
        };
        schedule.base.saturating_add(jitter).max(1)
    }

    /// Largest latency any command can draw.
    pub fn worst_case(&self) -> Tick {
        self.read.worst_case().max(self.write.worst_case())
    }

    fn schedule_for(&self, cmd: MemCmd) -> Schedule {
        if cmd.is_write() {
            self.write
        } else {
            self.read
        }
    }
}
