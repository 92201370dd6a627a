pub mod config;
pub mod patterns;
pub mod requester;

pub use config::TrafficConfig;
pub use requester::{TrafficEvent, TrafficRequester, TrafficSummary};
