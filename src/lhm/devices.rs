use crate::lhm::reading::{normalize_throughput, NamedSensor, SensorValue};
use crate::lhm::tree::{Matcher, RawNode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static SVI2_TFN_RE: Lazy<Regex> = Lazy::new(|| pattern("SVI2 TFN"));
static FIRST_CORE_RE: Lazy<Regex> = Lazy::new(|| pattern(r"Core #1\b"));
static TCTL_TDIE_RE: Lazy<Regex> = Lazy::new(|| pattern("Tctl/Tdie"));
static CORES_AVERAGE_RE: Lazy<Regex> = Lazy::new(|| pattern(r"Cores \(Average\)$"));
static CORE_CLOCK_RE: Lazy<Regex> = Lazy::new(|| pattern(r"Core #\d+$"));
static CORE_LOAD_RE: Lazy<Regex> = Lazy::new(|| pattern(r"Core #\d+"));
static GPU_POWER_RE: Lazy<Regex> = Lazy::new(|| pattern("Package|Total"));

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("sensor pattern is valid")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    pub name: String,
    pub voltage: SensorValue,
    pub power: SensorValue,
    pub clocks: CpuClocks,
    pub temperature: SensorValue,
    pub loads: CpuLoads,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuClocks {
    pub main: SensorValue,
    pub cores: Vec<NamedSensor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuLoads {
    pub main: SensorValue,
    pub cores: Vec<NamedSensor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuInfo {
    pub name: String,
    pub power: SensorValue,
    pub temperature: SensorValue,
    pub load: SensorValue,
    pub clocks: GpuClocks,
    pub fans: Vec<NamedSensor>,
    pub data: GpuData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuClocks {
    pub core: SensorValue,
    pub memory: SensorValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuData {
    pub used: SensorValue,
    pub total: SensorValue,
}

/// Shared by physical and virtual memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub load: SensorValue,
    pub used: SensorValue,
    pub available: SensorValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub name: String,
    pub temperature: SensorValue,
    pub load: StorageLoad,
    pub data: StorageData,
    pub throughput: StorageThroughput,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLoad {
    pub used_space: SensorValue,
    pub read_activity: SensorValue,
    pub write_activity: SensorValue,
    pub total_activity: SensorValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageData {
    pub read: SensorValue,
    pub written: SensorValue,
}

/// Always in KB/s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageThroughput {
    pub read: SensorValue,
    pub write: SensorValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub name: String,
    pub data: NetworkData,
    pub throughput: NetworkThroughput,
    pub utilization: SensorValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkData {
    pub uploaded: SensorValue,
    pub downloaded: SensorValue,
}

/// Always in KB/s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkThroughput {
    pub upload_speed: SensorValue,
    pub download_speed: SensorValue,
}

fn first_value(hw: &RawNode, category: &str, candidates: &[Matcher<'_>]) -> SensorValue {
    hw.first_sensor_in_category(category, candidates)
        .map(RawNode::sensor_value)
        .unwrap_or_default()
}

fn lanes(category: Option<&RawNode>, re: &Regex) -> Vec<NamedSensor> {
    category
        .map(|cat| {
            cat.find_children(re)
                .into_iter()
                .map(RawNode::named_sensor)
                .collect()
        })
        .unwrap_or_default()
}

/// Unweighted mean of every lane; units come from the last lane.
fn mean_of(cores: &[NamedSensor]) -> SensorValue {
    let mut acc = SensorValue::default();
    if cores.is_empty() {
        return acc;
    }
    let n = cores.len() as f64;
    for core in cores {
        for (sum, reading) in [
            (&mut acc.min, &core.value.min),
            (&mut acc.current, &core.value.current),
            (&mut acc.max, &core.value.max),
        ] {
            sum.value += reading.value / n;
            sum.unit.clone_from(&reading.unit);
        }
    }
    acc
}

pub fn map_cpu(hw: &RawNode) -> CpuInfo {
    let voltage = first_value(
        hw,
        "Voltages",
        &[
            Matcher::Pattern(&SVI2_TFN_RE),
            Matcher::Exact("Vcore"),
            Matcher::Pattern(&FIRST_CORE_RE),
        ],
    );
    let power = first_value(
        hw,
        "Powers",
        &[Matcher::Exact("Package"), Matcher::Exact("CPU Package")],
    );
    let temperature = first_value(
        hw,
        "Temperatures",
        &[
            Matcher::Pattern(&TCTL_TDIE_RE),
            Matcher::Exact("CPU Package"),
            Matcher::Exact("Core"),
        ],
    );

    let clock_cat = hw.find_child("Clocks");
    let core_clocks = lanes(clock_cat, &CORE_CLOCK_RE);
    let main_clock = match hw.first_sensor_in_category(
        "Clocks",
        &[
            Matcher::Pattern(&CORES_AVERAGE_RE),
            Matcher::Exact("Core #1"),
        ],
    ) {
        Some(node) => node.sensor_value(),
        None if !core_clocks.is_empty() => {
            debug!(
                cpu = %hw.text,
                cores = core_clocks.len(),
                "no aggregate clock sensor, averaging per-core clocks"
            );
            mean_of(&core_clocks)
        }
        None => SensorValue::default(),
    };

    let main_load = first_value(
        hw,
        "Load",
        &[Matcher::Exact("CPU Total"), Matcher::Exact("Total Activity")],
    );
    let core_loads = lanes(hw.find_child("Load"), &CORE_LOAD_RE);

    CpuInfo {
        name: hw.text.clone(),
        voltage,
        power,
        clocks: CpuClocks {
            main: main_clock,
            cores: core_clocks,
        },
        temperature,
        loads: CpuLoads {
            main: main_load,
            cores: core_loads,
        },
    }
}

pub fn map_gpu(hw: &RawNode) -> GpuInfo {
    let fans = hw
        .find_child("Fans")
        .map(|cat| cat.children.iter().map(RawNode::named_sensor).collect())
        .unwrap_or_default();

    GpuInfo {
        name: hw.text.clone(),
        power: hw.sensor_in_category("Powers", &*GPU_POWER_RE),
        temperature: hw.sensor_in_category("Temperatures", "GPU Core"),
        load: hw.sensor_in_category("Load", "GPU Core"),
        clocks: GpuClocks {
            core: hw.sensor_in_category("Clocks", "GPU Core"),
            memory: hw.sensor_in_category("Clocks", "GPU Memory"),
        },
        fans,
        data: GpuData {
            used: hw.sensor_in_category("Data", "D3D Dedicated Memory Used"),
            total: hw.sensor_in_category("Data", "GPU Memory Total"),
        },
    }
}

pub fn map_memory(hw: &RawNode) -> MemoryInfo {
    MemoryInfo {
        load: hw.sensor_in_category("Load", "Memory"),
        used: hw.sensor_in_category("Data", "Memory Used"),
        available: hw.sensor_in_category("Data", "Memory Available"),
    }
}

pub fn map_storage(hw: &RawNode) -> StorageInfo {
    StorageInfo {
        name: hw.text.clone(),
        temperature: hw.sensor_in_category("Temperatures", "Temperature"),
        load: StorageLoad {
            used_space: hw.sensor_in_category("Load", "Used Space"),
            read_activity: hw.sensor_in_category("Load", "Read Activity"),
            write_activity: hw.sensor_in_category("Load", "Write Activity"),
            total_activity: hw.sensor_in_category("Load", "Total Activity"),
        },
        data: StorageData {
            read: hw.sensor_in_category("Data", "Data read"),
            written: hw.sensor_in_category("Data", "Data written"),
        },
        throughput: StorageThroughput {
            read: normalize_throughput(&hw.sensor_in_category("Throughput", "Read Rate")),
            write: normalize_throughput(&hw.sensor_in_category("Throughput", "Write Rate")),
        },
    }
}

pub fn map_network(hw: &RawNode) -> NetworkInfo {
    NetworkInfo {
        name: hw.text.clone(),
        data: NetworkData {
            uploaded: hw.sensor_in_category("Data", "Data Uploaded"),
            downloaded: hw.sensor_in_category("Data", "Data Downloaded"),
        },
        throughput: NetworkThroughput {
            upload_speed: normalize_throughput(
                &hw.sensor_in_category("Throughput", "Upload Speed"),
            ),
            download_speed: normalize_throughput(
                &hw.sensor_in_category("Throughput", "Download Speed"),
            ),
        },
        utilization: hw.sensor_in_category("Load", "Network Utilization"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lhm::reading::Reading;
    use serde_json::{json, Value};

    fn leaf(text: &str, min: &str, value: &str, max: &str) -> Value {
        json!({ "Text": text, "Min": min, "Value": value, "Max": max, "ImageURL": "", "Children": [] })
    }

    fn same(text: &str, value: &str) -> Value {
        leaf(text, value, value, value)
    }

    fn category(text: &str, children: Vec<Value>) -> Value {
        json!({ "Text": text, "Min": "", "Value": "", "Max": "", "ImageURL": "", "Children": children })
    }

    fn hardware(text: &str, id: &str, categories: Vec<Value>) -> RawNode {
        RawNode::from(&json!({
            "Text": text, "HardwareId": id, "ImageURL": "", "Children": categories
        }))
    }

    #[test]
    fn cpu_prefers_first_voltage_candidate() {
        let hw = hardware(
            "AMD Ryzen 7 5800X",
            "/amdcpu/0",
            vec![category(
                "Voltages",
                vec![
                    same("Core #1", "1.350 V"),
                    same("Vcore", "1.300 V"),
                    same("Core (SVI2 TFN)", "1.281 V"),
                ],
            )],
        );
        assert_eq!(map_cpu(&hw).voltage.current.value, 1.281);
    }

    #[test]
    fn cpu_voltage_falls_back_to_vcore_then_core() {
        let hw = hardware(
            "cpu",
            "/intelcpu/0",
            vec![category(
                "Voltages",
                vec![same("Core #1", "1.35 V"), same("Vcore", "1.30 V")],
            )],
        );
        assert_eq!(map_cpu(&hw).voltage.current.value, 1.30);

        let hw = hardware(
            "cpu",
            "/intelcpu/0",
            vec![category(
                "Voltages",
                vec![same("Core #10", "1.10 V"), same("Core #1", "1.35 V")],
            )],
        );
        assert_eq!(map_cpu(&hw).voltage.current.value, 1.35);
    }

    #[test]
    fn cpu_temperature_and_power_fallbacks() {
        let hw = hardware(
            "cpu",
            "/intelcpu/0",
            vec![
                category("Temperatures", vec![same("Core", "55 °C"), same("CPU Package", "61 °C")]),
                category("Powers", vec![same("CPU Package", "88.5 W")]),
            ],
        );
        let cpu = map_cpu(&hw);
        assert_eq!(cpu.temperature.current.value, 61.0);
        assert_eq!(cpu.power.current, Reading::new(88.5, "W"));

        let hw = hardware(
            "cpu",
            "/amdcpu/0",
            vec![category(
                "Temperatures",
                vec![same("CPU Package", "61 °C"), same("Core (Tctl/Tdie)", "66.4 °C")],
            )],
        );
        assert_eq!(map_cpu(&hw).temperature.current.value, 66.4);
    }

    #[test]
    fn cpu_main_clock_uses_average_sensor() {
        let hw = hardware(
            "cpu",
            "/amdcpu/0",
            vec![category(
                "Clocks",
                vec![
                    same("Core #1", "3000 MHz"),
                    same("Core #2", "3200 MHz"),
                    same("Cores (Average)", "3111 MHz"),
                ],
            )],
        );
        let cpu = map_cpu(&hw);
        assert_eq!(cpu.clocks.main.current.value, 3111.0);
        assert_eq!(cpu.clocks.cores.len(), 2);
    }

    #[test]
    fn cpu_main_clock_averages_cores_without_aggregate() {
        let hw = hardware(
            "cpu",
            "/amdcpu/0",
            vec![category(
                "Clocks",
                vec![
                    leaf("Core #2", "2000 MHz", "3000 MHz", "4000 MHz"),
                    leaf("Core #3", "2000 MHz", "3200 MHz", "4400 MHz"),
                    leaf("Core #4", "2000 MHz", "3100 MHz", "4400 MHz"),
                    leaf("Core #5", "2000 MHz", "3300 MHz", "4400 MHz"),
                    same("Bus Speed", "100 MHz"),
                ],
            )],
        );
        let cpu = map_cpu(&hw);
        assert_eq!(cpu.clocks.main.current, Reading::new(3150.0, "MHz"));
        assert_eq!(cpu.clocks.main.min.value, 2000.0);
        assert_eq!(cpu.clocks.main.max.value, 4300.0);
        let names: Vec<_> = cpu.clocks.cores.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Core #2", "Core #3", "Core #4", "Core #5"]);
    }

    #[test]
    fn cpu_loads_capture_core_lanes() {
        let hw = hardware(
            "cpu",
            "/intelcpu/0",
            vec![category(
                "Load",
                vec![
                    same("CPU Total", "12.5 %"),
                    same("CPU Core #1", "10 %"),
                    same("CPU Core #2", "15 %"),
                ],
            )],
        );
        let cpu = map_cpu(&hw);
        assert_eq!(cpu.loads.main.current.value, 12.5);
        assert_eq!(cpu.loads.cores.len(), 2);
        assert_eq!(cpu.loads.cores[1].name, "CPU Core #2");
    }

    #[test]
    fn empty_cpu_node_is_all_zero() {
        let cpu = map_cpu(&RawNode::default());
        assert_eq!(cpu, CpuInfo::default());
    }

    #[test]
    fn gpu_maps_fans_and_memory() {
        let hw = hardware(
            "NVIDIA GeForce RTX 3070",
            "/gpu-nvidia/0",
            vec![
                category("Powers", vec![same("GPU Package", "180 W")]),
                category("Clocks", vec![same("GPU Core", "1905 MHz"), same("GPU Memory", "7000 MHz")]),
                category("Fans", vec![same("GPU Fan 1", "1500 RPM"), same("GPU Fan 2", "1550 RPM")]),
                category(
                    "Data",
                    vec![same("GPU Memory Total", "8192 MB"), same("D3D Dedicated Memory Used", "2100 MB")],
                ),
            ],
        );
        let gpu = map_gpu(&hw);
        assert_eq!(gpu.power.current.value, 180.0);
        assert_eq!(gpu.clocks.memory.current.value, 7000.0);
        assert_eq!(gpu.fans.len(), 2);
        assert_eq!(gpu.fans[0].name, "GPU Fan 1");
        assert_eq!(gpu.data.used.current.value, 2100.0);
        assert_eq!(gpu.data.total.current.value, 8192.0);
        assert!(gpu.temperature.is_empty());
    }

    #[test]
    fn gpu_without_fans_has_empty_list() {
        let gpu = map_gpu(&hardware("iGPU", "/gpu-intel/0", vec![]));
        assert!(gpu.fans.is_empty());
        assert_eq!(gpu.name, "iGPU");
    }

    #[test]
    fn storage_throughput_is_normalized() {
        let hw = hardware(
            "Samsung SSD 970 EVO",
            "/nvme/0",
            vec![
                category("Throughput", vec![same("Read Rate", "2 MB/s"), same("Write Rate", "12 KB/s")]),
                category("Data", vec![same("Data read", "1234 GB")]),
            ],
        );
        let disk = map_storage(&hw);
        assert_eq!(disk.throughput.read.current, Reading::new(2048.0, "KB/s"));
        assert_eq!(disk.throughput.write.current, Reading::new(12.0, "KB/s"));
        assert_eq!(disk.data.read.current.value, 1234.0);
        assert!(disk.load.used_space.is_empty());
    }

    #[test]
    fn network_maps_all_fields() {
        let hw = hardware(
            "Ethernet",
            "/nic/%7B1234%7D",
            vec![
                category("Data", vec![same("Data Uploaded", "1.2 GB"), same("Data Downloaded", "9.8 GB")]),
                category(
                    "Throughput",
                    vec![same("Upload Speed", "0.5 MB/s"), same("Download Speed", "300 KB/s")],
                ),
                category("Load", vec![same("Network Utilization", "3.1 %")]),
            ],
        );
        let nic = map_network(&hw);
        assert_eq!(nic.throughput.upload_speed.current, Reading::new(512.0, "KB/s"));
        assert_eq!(nic.throughput.download_speed.current, Reading::new(300.0, "KB/s"));
        assert_eq!(nic.utilization.current.value, 3.1);
        assert_eq!(nic.data.downloaded.current.unit, "GB");
    }

    #[test]
    fn memory_maps_load_and_data() {
        let hw = hardware(
            "Total Memory",
            "/ram",
            vec![
                category("Load", vec![same("Memory", "48.2 %")]),
                category("Data", vec![same("Memory Used", "15.4 GB"), same("Memory Available", "16.5 GB")]),
            ],
        );
        let mem = map_memory(&hw);
        assert_eq!(mem.load.current.value, 48.2);
        assert_eq!(mem.used.current.value, 15.4);
        assert_eq!(mem.available.current.value, 16.5);
    }
}
