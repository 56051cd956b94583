//! Normalization of the LibreHardwareMonitor `data.json` sensor tree.

pub mod devices;
pub mod reading;
pub mod snapshot;
pub mod tree;

pub use reading::{format_throughput, normalize_throughput, parse_reading, Reading, SensorValue};
pub use snapshot::{assemble, Snapshot};
pub use tree::{Matcher, RawNode};
