use crate::collectors::fetch::FetchError;
use crate::config::DeviceConfig;
use crate::lhm::snapshot::Snapshot;

/// Latest poll outcome per configured device. Nothing older is kept.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub started_at_unix: i64,
    pub devices: Vec<DeviceState>,
}

#[derive(Debug, Clone)]
pub struct DeviceState {
    pub device: DeviceConfig,
    pub snapshot: Option<Snapshot>,
    pub last_error: Option<PollError>,
    pub last_poll_unix: i64,
    pub last_success_unix: i64,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PollError {
    pub status: u16,
    pub message: String,
}

impl From<&FetchError> for PollError {
    fn from(value: &FetchError) -> Self {
        Self {
            status: value.status(),
            message: value.message(),
        }
    }
}

impl DeviceState {
    fn new(device: DeviceConfig) -> Self {
        Self {
            device,
            snapshot: None,
            last_error: None,
            last_poll_unix: 0,
            last_success_unix: 0,
            consecutive_failures: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.snapshot.is_some() && self.last_error.is_none()
    }
}

impl State {
    pub fn new(now_unix: i64, devices: &[DeviceConfig]) -> Self {
        Self {
            started_at_unix: now_unix,
            devices: devices.iter().cloned().map(DeviceState::new).collect(),
        }
    }

    pub fn device(&self, id: &str) -> Option<&DeviceState> {
        self.devices.iter().find(|d| d.device.id == id)
    }

    fn device_mut(&mut self, id: &str) -> Option<&mut DeviceState> {
        self.devices.iter_mut().find(|d| d.device.id == id)
    }

    /// Returns false when `id` is not a configured device.
    pub fn record_success(&mut self, id: &str, now_unix: i64, snapshot: Snapshot) -> bool {
        let Some(entry) = self.device_mut(id) else {
            return false;
        };
        entry.snapshot = Some(snapshot);
        entry.last_error = None;
        entry.last_poll_unix = now_unix;
        entry.last_success_unix = now_unix;
        entry.consecutive_failures = 0;
        true
    }

    /// A failed poll drops the previous snapshot so stale readings are never served.
    pub fn record_failure(&mut self, id: &str, now_unix: i64, err: &FetchError) -> bool {
        let Some(entry) = self.device_mut(id) else {
            return false;
        };
        entry.snapshot = None;
        entry.last_error = Some(PollError::from(err));
        entry.last_poll_unix = now_unix;
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        true
    }
}
