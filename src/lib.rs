//! Polls LibreHardwareMonitor agents and turns their irregular sensor tree
//! into a flat, typed [`Snapshot`].

pub mod collectors;
pub mod config;
pub mod http;
pub mod lhm;
pub mod metrics;
pub mod state;

pub use collectors::fetch::{fetch_json, FetchError};
pub use collectors::{query_snapshot, SnapshotClient, SIMULATED_DATA_URL};
pub use lhm::reading::format_throughput;
pub use lhm::snapshot::{assemble, Snapshot};
