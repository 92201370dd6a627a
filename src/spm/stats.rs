use serde::Serialize;

use crate::base::packet::MemCmd;
use crate::timeq::Tick;

pub const LOG2_BUCKETS: usize = 16;

/// Histogram over power-of-two buckets: bucket `i` counts values `v` with
/// `ceil(log2(v)) == i`, and values of 0 or 1 land in bucket 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Log2Histogram {
    pub buckets: [u64; LOG2_BUCKETS],
    pub samples: u64,
    pub sum: u64,
}

impl Log2Histogram {
    pub fn bucket_of(value: u64) -> usize {
        let idx = value.max(1).next_power_of_two().trailing_zeros() as usize;
        idx.min(LOG2_BUCKETS - 1)
    }

    pub fn record(&mut self, value: u64) {
        let idx = Self::bucket_of(value);
        self.buckets[idx] = self.buckets[idx].saturating_add(1);
        self.samples = self.samples.saturating_add(1);
        self.sum = self.sum.saturating_add(value);
    }

    pub fn mean(&self) -> f64 {
        ratio(self.sum, self.samples)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

/// Observer for the scratchpad timing core.  Updated only at named transitions (admit,
/// refuse, release, dequeue, refuse-response); nothing here feeds back into timing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpmStats {
    read_reqs: u64,
    write_reqs: u64,
    neither_read_nor_write: u64,
    no_response_reqs: u64,
    bytes_read_sys: u64,
    bytes_written_sys: u64,
    bytes_read: u64,
    bytes_written: u64,
    faults: u64,
    num_rd_retry: u64,
    num_wr_retry: u64,
    num_resp_retry: u64,
    req_retries_sent: u64,
    responses_sent: u64,
    tot_q_lat: u64,
    tot_mem_acc_lat: u64,
    tot_bus_lat: u64,
    tot_gap: u64,
    max_queue_depth: u64,
    read_pkt_size: Log2Histogram,
    write_pkt_size: Log2Histogram,
    rd_q_len_pdf: Vec<u64>,
    wr_q_len_pdf: Vec<u64>,
    bytes_per_activate: Log2Histogram,
    rd_per_turnaround: Log2Histogram,
    wr_per_turnaround: Log2Histogram,
    #[serde(skip)]
    last_arrival: Option<Tick>,
    #[serde(skip)]
    open_activation_bytes: u64,
    #[serde(skip)]
    run: Option<(Direction, u64)>,
}

/// Averages computed from the raw counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DerivedStats {
    pub avg_q_lat: f64,
    pub avg_mem_acc_lat: f64,
    pub avg_bus_lat: f64,
    pub avg_gap: f64,
    pub avg_rd_bw: f64,
    pub avg_wr_bw: f64,
}

impl SpmStats {
    pub fn read_reqs(&self) -> u64 {
        self.read_reqs
    }

    pub fn write_reqs(&self) -> u64 {
        self.write_reqs
    }

    pub fn neither_read_nor_write(&self) -> u64 {
        self.neither_read_nor_write
    }

    pub fn no_response_reqs(&self) -> u64 {
        self.no_response_reqs
    }

    pub fn bytes_read_sys(&self) -> u64 {
        self.bytes_read_sys
    }

    pub fn bytes_written_sys(&self) -> u64 {
        self.bytes_written_sys
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn faults(&self) -> u64 {
        self.faults
    }

    pub fn num_rd_retry(&self) -> u64 {
        self.num_rd_retry
    }

    pub fn num_wr_retry(&self) -> u64 {
        self.num_wr_retry
    }

    pub fn num_resp_retry(&self) -> u64 {
        self.num_resp_retry
    }

    pub fn req_retries_sent(&self) -> u64 {
        self.req_retries_sent
    }

    pub fn responses_sent(&self) -> u64 {
        self.responses_sent
    }

    pub fn tot_q_lat(&self) -> u64 {
        self.tot_q_lat
    }

    pub fn tot_mem_acc_lat(&self) -> u64 {
        self.tot_mem_acc_lat
    }

    pub fn tot_bus_lat(&self) -> u64 {
        self.tot_bus_lat
    }

    pub fn max_queue_depth(&self) -> u64 {
        self.max_queue_depth
    }

    pub fn read_pkt_size(&self) -> &Log2Histogram {
        &self.read_pkt_size
    }

    pub fn write_pkt_size(&self) -> &Log2Histogram {
        &self.write_pkt_size
    }

    pub fn rd_q_len_pdf(&self) -> &[u64] {
        &self.rd_q_len_pdf
    }

    pub fn wr_q_len_pdf(&self) -> &[u64] {
        &self.wr_q_len_pdf
    }

    pub fn bytes_per_activate(&self) -> &Log2Histogram {
        &self.bytes_per_activate
    }

    pub fn rd_per_turnaround(&self) -> &Log2Histogram {
        &self.rd_per_turnaround
    }

    pub fn wr_per_turnaround(&self) -> &Log2Histogram {
        &self.wr_per_turnaround
    }

    pub fn total_requests(&self) -> u64 {
        self.read_reqs + self.write_reqs + self.neither_read_nor_write
    }

    /// A request was accepted.  `queue_len` is the deferred queue length seen on arrival.
    pub fn record_admit(&mut self, cmd: MemCmd, bytes: u32, queue_len: usize, now: Tick) {
        let bytes = bytes as u64;
        if let Some(last) = self.last_arrival.replace(now) {
            self.tot_gap = self.tot_gap.saturating_add(now.saturating_sub(last));
        }
        if cmd.is_read() {
            self.read_reqs = self.read_reqs.saturating_add(1);
            self.bytes_read_sys = self.bytes_read_sys.saturating_add(bytes);
            self.read_pkt_size.record(bytes);
            bump(&mut self.rd_q_len_pdf, queue_len);
            self.turnaround(Direction::Read);
        } else if cmd.is_write() {
            self.write_reqs = self.write_reqs.saturating_add(1);
            self.bytes_written_sys = self.bytes_written_sys.saturating_add(bytes);
            self.write_pkt_size.record(bytes);
            bump(&mut self.wr_q_len_pdf, queue_len);
            self.turnaround(Direction::Write);
        } else {
            self.neither_read_nor_write = self.neither_read_nor_write.saturating_add(1);
        }
        self.open_activation_bytes = self.open_activation_bytes.saturating_add(bytes);
    }

    pub fn record_bus_time(&mut self, ticks: Tick) {
        self.tot_bus_lat = self.tot_bus_lat.saturating_add(ticks);
    }

    pub fn record_no_response(&mut self) {
        self.no_response_reqs = self.no_response_reqs.saturating_add(1);
    }

    pub fn record_device_access(&mut self, cmd: MemCmd, bytes: u32) {
        if cmd.is_read() {
            self.bytes_read = self.bytes_read.saturating_add(bytes as u64);
        } else if cmd.is_write() {
            self.bytes_written = self.bytes_written.saturating_add(bytes as u64);
        }
    }

    pub fn record_fault(&mut self) {
        self.faults = self.faults.saturating_add(1);
    }

    pub fn record_queue_depth(&mut self, depth: usize) {
        self.max_queue_depth = self.max_queue_depth.max(depth as u64);
    }

    pub fn record_req_refused(&mut self, cmd: MemCmd) {
        if cmd.is_write() {
            self.num_wr_retry = self.num_wr_retry.saturating_add(1);
        } else {
            self.num_rd_retry = self.num_rd_retry.saturating_add(1);
        }
    }

    pub fn record_req_retry_sent(&mut self) {
        self.req_retries_sent = self.req_retries_sent.saturating_add(1);
    }

    pub fn record_resp_refused(&mut self) {
        self.num_resp_retry = self.num_resp_retry.saturating_add(1);
    }

    /// A response left the endpoint at `now`.
    pub fn record_response(&mut self, admitted_at: Tick, ready_tick: Tick, now: Tick) {
        self.responses_sent = self.responses_sent.saturating_add(1);
        self.tot_mem_acc_lat = self
            .tot_mem_acc_lat
            .saturating_add(ready_tick.saturating_sub(admitted_at));
        self.tot_q_lat = self.tot_q_lat.saturating_add(now.saturating_sub(ready_tick));
    }

    /// The deferred queue ran dry; close the current activation.
    pub fn close_activation(&mut self) {
        let bytes = std::mem::take(&mut self.open_activation_bytes);
        if bytes > 0 {
            self.bytes_per_activate.record(bytes);
        }
    }

    pub fn derived(&self, elapsed: Tick) -> DerivedStats {
        let admits = self.total_requests();
        DerivedStats {
            avg_q_lat: ratio(self.tot_q_lat, self.responses_sent),
            avg_mem_acc_lat: ratio(self.tot_mem_acc_lat, self.responses_sent),
            avg_bus_lat: ratio(self.tot_bus_lat, admits),
            avg_gap: ratio(self.tot_gap, admits.saturating_sub(1)),
            avg_rd_bw: ratio(self.bytes_read, elapsed),
            avg_wr_bw: ratio(self.bytes_written, elapsed),
        }
    }

    fn turnaround(&mut self, dir: Direction) {
        if let Some((last, count)) = self.run.as_mut() {
            if *last == dir {
                *count += 1;
                return;
            }
        }
        match self.run.take() {
            Some((Direction::Read, count)) => self.rd_per_turnaround.record(count),
            Some((Direction::Write, count)) => self.wr_per_turnaround.record(count),
            None => {}
        }
        self.run = Some((dir, 1));
    }
}

fn bump(pdf: &mut Vec<u64>, idx: usize) {
    if pdf.len() <= idx {
        pdf.resize(idx + 1, 0);
    }
    pdf[idx] = pdf[idx].saturating_add(1);
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
