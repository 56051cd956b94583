use crate::lhm::devices::{
    CpuClocks, CpuInfo, CpuLoads, GpuClocks, GpuData, GpuInfo, MemoryInfo, NetworkData,
    NetworkInfo, NetworkThroughput, StorageData, StorageInfo, StorageLoad, StorageThroughput,
};
use crate::lhm::reading::{NamedSensor, Reading, SensorValue, UNIT_KBPS};
use crate::lhm::snapshot::Snapshot;
use rand::Rng;

pub const CPU_CORES: usize = 12;
pub const GPU_FANS: usize = 2;

/// Synthetic snapshot from thread-local entropy.
pub fn simulated_snapshot() -> Snapshot {
    simulated_snapshot_with(&mut rand::rng())
}

/// Synthetic snapshot with every reading drawn uniformly from a plausible
/// range. Min and max are the range endpoints.
pub fn simulated_snapshot_with<R: Rng + ?Sized>(rng: &mut R) -> Snapshot {
    Snapshot {
        name: "SIMULATED-PC".to_string(),
        cpu: cpu(rng),
        gpus: vec![gpu(rng)],
        memory_total: MemoryInfo {
            load: sample(rng, 12.0, 95.0, "%"),
            used: sample(rng, 3.8, 29.6, "GB"),
            available: sample(rng, 2.2, 28.0, "GB"),
        },
        memory_virtual: MemoryInfo {
            load: sample(rng, 15.0, 90.0, "%"),
            used: sample(rng, 7.5, 41.0, "GB"),
            available: sample(rng, 4.0, 37.5, "GB"),
        },
        networks: vec![network(rng)],
        hdds: vec![storage(rng)],
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64, unit: &str) -> SensorValue {
    SensorValue {
        min: Reading::new(min, unit),
        current: Reading::new(rng.random_range(min..=max), unit),
        max: Reading::new(max, unit),
    }
}

fn fixed(value: f64, unit: &str) -> SensorValue {
    let reading = Reading::new(value, unit);
    SensorValue {
        min: reading.clone(),
        current: reading.clone(),
        max: reading,
    }
}

fn lanes<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    label: &str,
    min: f64,
    max: f64,
    unit: &str,
) -> Vec<NamedSensor> {
    (1..=count)
        .map(|i| NamedSensor {
            name: format!("{label}{i}"),
            value: sample(rng, min, max, unit),
        })
        .collect()
}

fn cpu<R: Rng + ?Sized>(rng: &mut R) -> CpuInfo {
    CpuInfo {
        name: "AMD Ryzen 9 5900X".to_string(),
        voltage: sample(rng, 0.85, 1.45, "V"),
        power: sample(rng, 24.6, 142.0, "W"),
        clocks: CpuClocks {
            main: sample(rng, 2200.0, 4950.0, "MHz"),
            cores: lanes(rng, CPU_CORES, "Core #", 2200.0, 4950.0, "MHz"),
        },
        temperature: sample(rng, 30.3, 78.5, "°C"),
        loads: CpuLoads {
            main: sample(rng, 0.8, 100.0, "%"),
            cores: lanes(rng, CPU_CORES, "CPU Core #", 0.3, 100.0, "%"),
        },
    }
}

fn gpu<R: Rng + ?Sized>(rng: &mut R) -> GpuInfo {
    GpuInfo {
        name: "NVIDIA GeForce RTX 3080".to_string(),
        power: sample(rng, 18.4, 320.0, "W"),
        temperature: sample(rng, 34.0, 83.0, "°C"),
        load: sample(rng, 1.0, 100.0, "%"),
        clocks: GpuClocks {
            core: sample(rng, 210.0, 1905.0, "MHz"),
            memory: sample(rng, 405.0, 9501.0, "MHz"),
        },
        fans: lanes(rng, GPU_FANS, "GPU Fan ", 350.0, 3200.0, "RPM"),
        data: GpuData {
            used: sample(rng, 512.0, 10240.0, "MB"),
            total: fixed(10240.0, "MB"),
        },
    }
}

fn network<R: Rng + ?Sized>(rng: &mut R) -> NetworkInfo {
    NetworkInfo {
        name: "Ethernet".to_string(),
        data: NetworkData {
            uploaded: sample(rng, 0.1, 24.7, "GB"),
            downloaded: sample(rng, 1.2, 251.3, "GB"),
        },
        throughput: NetworkThroughput {
            upload_speed: sample(rng, 0.4, 2048.0, UNIT_KBPS),
            download_speed: sample(rng, 1.1, 12800.0, UNIT_KBPS),
        },
        utilization: sample(rng, 0.1, 98.0, "%"),
    }
}

fn storage<R: Rng + ?Sized>(rng: &mut R) -> StorageInfo {
    StorageInfo {
        name: "Samsung SSD 980 PRO 1TB".to_string(),
        temperature: sample(rng, 28.0, 65.0, "°C"),
        load: StorageLoad {
            used_space: sample(rng, 5.0, 95.0, "%"),
            read_activity: sample(rng, 0.1, 100.0, "%"),
            write_activity: sample(rng, 0.1, 100.0, "%"),
            total_activity: sample(rng, 0.1, 100.0, "%"),
        },
        data: StorageData {
            read: sample(rng, 120.0, 51200.0, "GB"),
            written: sample(rng, 95.0, 40960.0, "GB"),
        },
        throughput: StorageThroughput {
            read: sample(rng, 0.5, 51200.0, UNIT_KBPS),
            write: sample(rng, 0.5, 40960.0, UNIT_KBPS),
        },
    }
}
