use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Binary factor between KB/s and MB/s.
pub const BYTES_THRESHOLD: f64 = 1024.0;

pub const UNIT_KBPS: &str = "KB/s";
pub const UNIT_MBPS: &str = "MB/s";

static READING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(-?(?:\d+\.?\d*|\.\d+))\s*(.*)$").expect("reading pattern is valid")
});

/// One parsed value such as `42.3 °C`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "val")]
    pub value: f64,
    pub unit: String,
}

impl Reading {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// Min/current/max triple attached to every measured quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    pub min: Reading,
    pub current: Reading,
    pub max: Reading,
}

impl SensorValue {
    /// True for the all-zero value produced when a sensor could not be found.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn readings_mut(&mut self) -> [&mut Reading; 3] {
        [&mut self.min, &mut self.current, &mut self.max]
    }
}

/// A per-lane sensor (a CPU core, a GPU fan) tagged with its display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedSensor {
    pub name: String,
    pub value: SensorValue,
}

/// Splits `"<number> <unit>"`. Text without a numeric prefix yields the zero reading.
pub fn parse_reading(text: &str) -> Reading {
    let Some(caps) = READING_RE.captures(text) else {
        return Reading::default();
    };
    match caps[1].parse::<f64>() {
        Ok(value) => Reading {
            value,
            unit: caps[2].to_string(),
        },
        Err(_) => Reading::default(),
    }
}

pub fn parse_sensor_value(min: &str, current: &str, max: &str) -> SensorValue {
    SensorValue {
        min: parse_reading(min),
        current: parse_reading(current),
        max: parse_reading(max),
    }
}

/// Returns a copy with every `MB/s` reading rewritten to `KB/s`.
pub fn normalize_throughput(value: &SensorValue) -> SensorValue {
    let mut out = value.clone();
    for reading in out.readings_mut() {
        if reading.unit == UNIT_MBPS {
            reading.value *= BYTES_THRESHOLD;
            reading.unit = UNIT_KBPS.to_string();
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedReading {
    #[serde(rename = "val")]
    pub value: String,
    pub unit: String,
}

/// Display helper for a KB/s throughput reading.
///
/// Readings of 999 KB/s and above are shown in MB/s. Precision is picked from
/// the magnitude as received: below 10 gets one decimal, anything else is a
/// rounded integer.
pub fn format_throughput(reading: &Reading) -> FormattedReading {
    let mut value = reading.value;
    let mut unit = reading.unit.as_str();
    if unit == UNIT_KBPS && value >= 999.0 {
        value /= BYTES_THRESHOLD;
        unit = UNIT_MBPS;
    }

    let value = if reading.value < 10.0 {
        format!("{value:.1}")
    } else {
        format!("{:.0}", value.round())
    };

    FormattedReading {
        value,
        unit: unit.to_string(),
    }
}
