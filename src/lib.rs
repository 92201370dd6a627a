pub mod base {
    pub mod mem;
    pub mod packet;
    pub mod port;
}
pub mod sim {
    pub mod config;
    pub mod flat_mem;
    pub mod perf_log;
    pub mod top;
}
pub mod spm;
pub mod timeq;
pub mod traffic;
pub mod ui;
