use crate::lhm::devices::{
    map_cpu, map_gpu, map_memory, map_network, map_storage, CpuInfo, GpuInfo, MemoryInfo,
    NetworkInfo, StorageInfo,
};
use crate::lhm::tree::RawNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const UNKNOWN_COMPUTER: &str = "Unknown";

/// Display-ready view of one poll. Rebuilt from scratch every time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub name: String,
    pub cpu: CpuInfo,
    pub gpus: Vec<GpuInfo>,
    pub memory_total: MemoryInfo,
    pub memory_virtual: MemoryInfo,
    pub networks: Vec<NetworkInfo>,
    pub hdds: Vec<StorageInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareKind {
    Cpu,
    Gpu,
    MemoryTotal,
    MemoryVirtual,
    Storage,
    Network,
}

struct Rule {
    kind: HardwareKind,
    matches: fn(id: &str, image: &str, text: &str) -> bool,
}

// Evaluated top to bottom, first hit wins.
const RULES: &[Rule] = &[
    Rule {
        kind: HardwareKind::Cpu,
        matches: |id, img, _| id.contains("/cpu") || img.contains("cpu.png"),
    },
    Rule {
        kind: HardwareKind::Gpu,
        matches: |id, img, _| {
            id.contains("/gpu") || img.contains("nvidia.png") || img.contains("ati.png")
        },
    },
    Rule {
        kind: HardwareKind::MemoryTotal,
        matches: |id, img, text| id == "/ram" || (img.contains("ram.png") && text == "Total Memory"),
    },
    Rule {
        kind: HardwareKind::MemoryVirtual,
        matches: |id, _, text| id == "/vram" || text == "Virtual Memory",
    },
    Rule {
        kind: HardwareKind::Storage,
        matches: |id, img, _| id.contains("/nvme") || id.contains("/hdd") || img.contains("hdd.png"),
    },
    Rule {
        kind: HardwareKind::Network,
        matches: |id, img, _| id.contains("/nic") || img.contains("nic.png"),
    },
];

pub fn classify(hw: &RawNode) -> Option<HardwareKind> {
    let (id, img, text) = (hw.hardware_id(), hw.image_url.as_str(), hw.text.as_str());
    RULES.iter().find(|r| (r.matches)(id, img, text)).map(|r| r.kind)
}

/// Builds a snapshot from the agent's raw JSON. Never fails.
pub fn assemble(payload: &Value) -> Snapshot {
    assemble_node(&RawNode::from(payload))
}

pub fn assemble_node(root: &RawNode) -> Snapshot {
    let Some(computer) = root.children.first() else {
        return Snapshot {
            name: UNKNOWN_COMPUTER.to_string(),
            ..Snapshot::default()
        };
    };

    let mut snapshot = Snapshot {
        name: computer.text.clone(),
        ..Snapshot::default()
    };

    for hw in &computer.children {
        match classify(hw) {
            Some(HardwareKind::Cpu) => snapshot.cpu = map_cpu(hw),
            Some(HardwareKind::Gpu) => snapshot.gpus.push(map_gpu(hw)),
            Some(HardwareKind::MemoryTotal) => snapshot.memory_total = map_memory(hw),
            Some(HardwareKind::MemoryVirtual) => snapshot.memory_virtual = map_memory(hw),
            Some(HardwareKind::Storage) => snapshot.hdds.push(map_storage(hw)),
            Some(HardwareKind::Network) => snapshot.networks.push(map_network(hw)),
            None => debug!(
                hardware_id = hw.hardware_id(),
                text = %hw.text,
                "skipping unrecognised hardware"
            ),
        }
    }

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hw(text: &str, id: Option<&str>, img: &str, categories: Value) -> Value {
        let mut node = json!({
            "Text": text, "Min": "", "Value": "", "Max": "", "ImageURL": img, "Children": categories
        });
        if let Some(id) = id {
            node["HardwareId"] = json!(id);
        }
        node
    }

    fn payload(hardware: Vec<Value>) -> Value {
        json!({
            "id": 0,
            "Text": "Sensor",
            "Children": [{ "id": 1, "Text": "DESKTOP-1", "ImageURL": "images_icon/computer.png", "Children": hardware }]
        })
    }

    #[test]
    fn assemble_is_total_on_degenerate_input() {
        for input in [json!({}), json!(null), json!([]), json!({ "Children": [] }), json!("x")] {
            let snap = assemble(&input);
            assert_eq!(snap.name, UNKNOWN_COMPUTER);
            assert!(snap.gpus.is_empty());
            assert!(snap.hdds.is_empty());
            assert!(snap.networks.is_empty());
            assert_eq!(snap.cpu, CpuInfo::default());
        }
    }

    #[test]
    fn unknown_hardware_is_skipped() {
        let snap = assemble(&payload(vec![
            hw("Gigabyte B550", Some("/lpc/it8688e/0"), "images_icon/mainboard.png", json!([])),
            hw("Battery", Some("/battery/0"), "", json!([])),
        ]));
        assert_eq!(snap.name, "DESKTOP-1");
        assert!(snap.gpus.is_empty());
        assert!(snap.hdds.is_empty());
        assert!(snap.networks.is_empty());
        assert!(snap.memory_total.load.is_empty());
    }

    #[test]
    fn gpu_with_two_fans() {
        let snap = assemble(&payload(vec![hw(
            "Radeon RX 6800",
            Some("/gpu/0"),
            "",
            json!([{
                "Text": "Fans", "Min": "", "Value": "", "Max": "", "ImageURL": "",
                "Children": [
                    { "Text": "Fan #1", "Min": "0 RPM", "Value": "1100 RPM", "Max": "2000 RPM", "ImageURL": "", "Children": [] },
                    { "Text": "Fan #2", "Min": "0 RPM", "Value": "1150 RPM", "Max": "2100 RPM", "ImageURL": "", "Children": [] }
                ]
            }]),
        )]));
        assert_eq!(snap.gpus.len(), 1);
        let fans: Vec<_> = snap.gpus[0].fans.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fans, vec!["Fan #1", "Fan #2"]);
        assert_eq!(snap.gpus[0].fans[1].value.current.value, 1150.0);
    }

    #[test]
    fn classifies_by_id_icon_and_label() {
        let snap = assemble(&payload(vec![
            hw("AMD Ryzen 5", None, "images_icon/cpu.png", json!([])),
            hw("NVIDIA RTX", None, "images_icon/nvidia.png", json!([])),
            hw("Total Memory", None, "images_icon/ram.png", json!([])),
            hw("Virtual Memory", None, "images_icon/ram.png", json!([])),
            hw("WDC WD10", Some("/hdd/1"), "", json!([])),
            hw("Samsung 980", Some("/nvme/0"), "", json!([])),
            hw("Wi-Fi", None, "images_icon/nic.png", json!([])),
        ]));
        assert_eq!(snap.cpu.name, "AMD Ryzen 5");
        assert_eq!(snap.gpus.len(), 1);
        let disks: Vec<_> = snap.hdds.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(disks, vec!["WDC WD10", "Samsung 980"]);
        assert_eq!(snap.networks.len(), 1);
    }

    #[test]
    fn last_cpu_wins() {
        let snap = assemble(&payload(vec![
            hw("first", Some("/amdcpu/0"), "images_icon/cpu.png", json!([])),
            hw("second", Some("/cpu/1"), "", json!([])),
        ]));
        assert_eq!(snap.cpu.name, "second");
    }

    #[test]
    fn memory_slots_are_distinguished() {
        let ram = |label: &str, id: &str, used: &str| {
            hw(label, Some(id), "images_icon/ram.png", json!([{
                "Text": "Data", "Children": [
                    { "Text": "Memory Used", "Min": used, "Value": used, "Max": used }
                ]
            }]))
        };
        let snap = assemble(&payload(vec![
            ram("Generic Memory", "/ram", "12.1 GB"),
            ram("Virtual Memory", "/vram", "20.4 GB"),
        ]));
        assert_eq!(snap.memory_total.used.current.value, 12.1);
        assert_eq!(snap.memory_virtual.used.current.value, 20.4);
    }

    #[test]
    fn icon_without_label_is_not_total_memory() {
        let node = RawNode::from(&hw("DIMM #1", None, "images_icon/ram.png", json!([])));
        assert_eq!(classify(&node), None);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(assemble(&payload(vec![]))).unwrap();
        assert!(json.get("memoryTotal").is_some());
        assert!(json.get("memoryVirtual").is_some());
        assert!(json["cpu"]["clocks"]["cores"].is_array());
    }
}
