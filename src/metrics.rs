use crate::lhm::reading::SensorValue;
use crate::state::State;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub lhm_device_up: GaugeVec,
    pub lhm_device_last_poll_timestamp_seconds: GaugeVec,
    pub lhm_cpu_temperature_celsius: GaugeVec,
    pub lhm_cpu_load_percent: GaugeVec,
    pub lhm_cpu_clock_mhz: GaugeVec,
    pub lhm_cpu_power_watts: GaugeVec,
    pub lhm_memory_load_percent: GaugeVec,
    pub lhm_gpu_temperature_celsius: GaugeVec,
    pub lhm_gpu_load_percent: GaugeVec,
    pub lhm_disk_temperature_celsius: GaugeVec,
    pub lhm_disk_used_space_percent: GaugeVec,
    pub lhm_net_upload_kbps: GaugeVec,
    pub lhm_net_download_kbps: GaugeVec,
    pub lhm_uptime_seconds: Gauge,
    pub lhm_scrape_count_total: Counter,
    pub lhm_polls_total: CounterVec,
    pub lhm_poll_errors_total: CounterVec,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let lhm_device_up = GaugeVec::new(
            opts!("lhm_device_up", "1 when the last poll produced a snapshot"),
            &["device"],
        )?;
        let lhm_device_last_poll_timestamp_seconds = GaugeVec::new(
            opts!(
                "lhm_device_last_poll_timestamp_seconds",
                "Unix time of the last poll attempt"
            ),
            &["device"],
        )?;
        let lhm_cpu_temperature_celsius = GaugeVec::new(
            opts!("lhm_cpu_temperature_celsius", "CPU temperature in Celsius"),
            &["device"],
        )?;
        let lhm_cpu_load_percent = GaugeVec::new(
            opts!("lhm_cpu_load_percent", "Total CPU load in percent"),
            &["device"],
        )?;
        let lhm_cpu_clock_mhz = GaugeVec::new(
            opts!("lhm_cpu_clock_mhz", "Main CPU clock in MHz"),
            &["device"],
        )?;
        let lhm_cpu_power_watts = GaugeVec::new(
            opts!("lhm_cpu_power_watts", "CPU package power in watts"),
            &["device"],
        )?;
        let lhm_memory_load_percent = GaugeVec::new(
            opts!("lhm_memory_load_percent", "Memory load in percent"),
            &["device", "kind"],
        )?;
        let lhm_gpu_temperature_celsius = GaugeVec::new(
            opts!("lhm_gpu_temperature_celsius", "GPU core temperature in Celsius"),
            &["device", "gpu", "index"],
        )?;
        let lhm_gpu_load_percent = GaugeVec::new(
            opts!("lhm_gpu_load_percent", "GPU core load in percent"),
            &["device", "gpu", "index"],
        )?;
        let lhm_disk_temperature_celsius = GaugeVec::new(
            opts!("lhm_disk_temperature_celsius", "Drive temperature in Celsius"),
            &["device", "disk", "index"],
        )?;
        let lhm_disk_used_space_percent = GaugeVec::new(
            opts!("lhm_disk_used_space_percent", "Drive used space in percent"),
            &["device", "disk", "index"],
        )?;
        let lhm_net_upload_kbps = GaugeVec::new(
            opts!("lhm_net_upload_kbps", "Upload speed in KB/s"),
            &["device", "index", "nic"],
        )?;
        let lhm_net_download_kbps = GaugeVec::new(
            opts!("lhm_net_download_kbps", "Download speed in KB/s"),
            &["device", "index", "nic"],
        )?;
        let lhm_uptime_seconds =
            Gauge::with_opts(opts!("lhm_uptime_seconds", "Daemon uptime in seconds"))?;
        let lhm_scrape_count_total = Counter::with_opts(opts!(
            "lhm_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;
        let lhm_polls_total = CounterVec::new(
            opts!("lhm_polls_total", "Poll attempts per device"),
            &["device"],
        )?;
        let lhm_poll_errors_total = CounterVec::new(
            opts!(
                "lhm_poll_errors_total",
                "Failed polls per device and status (0 = network, 408 = timeout)"
            ),
            &["device", "status"],
        )?;

        register(&registry, &lhm_device_up)?;
        register(&registry, &lhm_device_last_poll_timestamp_seconds)?;
        register(&registry, &lhm_cpu_temperature_celsius)?;
        register(&registry, &lhm_cpu_load_percent)?;
        register(&registry, &lhm_cpu_clock_mhz)?;
        register(&registry, &lhm_cpu_power_watts)?;
        register(&registry, &lhm_memory_load_percent)?;
        register(&registry, &lhm_gpu_temperature_celsius)?;
        register(&registry, &lhm_gpu_load_percent)?;
        register(&registry, &lhm_disk_temperature_celsius)?;
        register(&registry, &lhm_disk_used_space_percent)?;
        register(&registry, &lhm_net_upload_kbps)?;
        register(&registry, &lhm_net_download_kbps)?;
        register(&registry, &lhm_uptime_seconds)?;
        register(&registry, &lhm_scrape_count_total)?;
        register(&registry, &lhm_polls_total)?;
        register(&registry, &lhm_poll_errors_total)?;

        Ok(Arc::new(Self {
            registry,
            lhm_device_up,
            lhm_device_last_poll_timestamp_seconds,
            lhm_cpu_temperature_celsius,
            lhm_cpu_load_percent,
            lhm_cpu_clock_mhz,
            lhm_cpu_power_watts,
            lhm_memory_load_percent,
            lhm_gpu_temperature_celsius,
            lhm_gpu_load_percent,
            lhm_disk_temperature_celsius,
            lhm_disk_used_space_percent,
            lhm_net_upload_kbps,
            lhm_net_download_kbps,
            lhm_uptime_seconds,
            lhm_scrape_count_total,
            lhm_polls_total,
            lhm_poll_errors_total,
        }))
    }

    pub fn update_from_state(&self, state: &State) {
        self.lhm_device_up.reset();
        self.lhm_device_last_poll_timestamp_seconds.reset();
        self.lhm_cpu_temperature_celsius.reset();
        self.lhm_cpu_load_percent.reset();
        self.lhm_cpu_clock_mhz.reset();
        self.lhm_cpu_power_watts.reset();
        self.lhm_memory_load_percent.reset();
        self.lhm_gpu_temperature_celsius.reset();
        self.lhm_gpu_load_percent.reset();
        self.lhm_disk_temperature_celsius.reset();
        self.lhm_disk_used_space_percent.reset();
        self.lhm_net_upload_kbps.reset();
        self.lhm_net_download_kbps.reset();

        for entry in &state.devices {
            let device = entry.device.id.as_str();
            self.lhm_device_up
                .with_label_values(&[device])
                .set(if entry.is_ok() { 1.0 } else { 0.0 });
            self.lhm_device_last_poll_timestamp_seconds
                .with_label_values(&[device])
                .set(entry.last_poll_unix as f64);

            let Some(snap) = &entry.snapshot else {
                continue;
            };

            set_current(&self.lhm_cpu_temperature_celsius, &[device], &snap.cpu.temperature);
            set_current(&self.lhm_cpu_load_percent, &[device], &snap.cpu.loads.main);
            set_current(&self.lhm_cpu_clock_mhz, &[device], &snap.cpu.clocks.main);
            set_current(&self.lhm_cpu_power_watts, &[device], &snap.cpu.power);
            set_current(
                &self.lhm_memory_load_percent,
                &[device, "total"],
                &snap.memory_total.load,
            );
            set_current(
                &self.lhm_memory_load_percent,
                &[device, "virtual"],
                &snap.memory_virtual.load,
            );

            // Identical cards or drives are told apart by position.
            for (i, gpu) in snap.gpus.iter().enumerate() {
                let index = i.to_string();
                let labels = [device, gpu.name.as_str(), index.as_str()];
                set_current(&self.lhm_gpu_temperature_celsius, &labels, &gpu.temperature);
                set_current(&self.lhm_gpu_load_percent, &labels, &gpu.load);
            }
            for (i, disk) in snap.hdds.iter().enumerate() {
                let index = i.to_string();
                let labels = [device, disk.name.as_str(), index.as_str()];
                set_current(&self.lhm_disk_temperature_celsius, &labels, &disk.temperature);
                set_current(&self.lhm_disk_used_space_percent, &labels, &disk.load.used_space);
            }
            for (i, nic) in snap.networks.iter().enumerate() {
                let index = i.to_string();
                let labels = [device, index.as_str(), nic.name.as_str()];
                set_current(&self.lhm_net_upload_kbps, &labels, &nic.throughput.upload_speed);
                set_current(&self.lhm_net_download_kbps, &labels, &nic.throughput.download_speed);
            }
        }

        let now = now_unix();
        let uptime = now.saturating_sub(state.started_at_unix) as f64;
        self.lhm_uptime_seconds.set(uptime);
    }

    pub fn inc_scrape_count(&self) {
        self.lhm_scrape_count_total.inc();
    }

    pub fn inc_poll(&self, device: &str) {
        self.lhm_polls_total.with_label_values(&[device]).inc();
    }

    pub fn inc_poll_error(&self, device: &str, status: u16) {
        let status = status.to_string();
        self.lhm_poll_errors_total
            .with_label_values(&[device, status.as_str()])
            .inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

// Sensors the agent did not report are left unset rather than exported as 0.
fn set_current(gauge: &GaugeVec, labels: &[&str], value: &SensorValue) {
    if value.is_empty() {
        return;
    }
    gauge
        .with_label_values(labels)
        .set(value.current.value);
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
