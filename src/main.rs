use axum::serve;
use clap::Parser;
use lhmsnap::collectors::fetch::FetchError;
use lhmsnap::collectors::{SnapshotClient, DEFAULT_TIMEOUT};
use lhmsnap::config::{Config, DeviceConfig};
use lhmsnap::http;
use lhmsnap::lhm::snapshot::Snapshot;
use lhmsnap::metrics::Metrics;
use lhmsnap::state::State;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lhmsnapd")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./config.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    /// Query one agent url (or SIMULATED), print the snapshot as JSON and exit
    #[arg(long, value_name = "URL")]
    once: Option<String>,
    /// Agent request timeout; overrides request_timeout_ms from the config
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    if let Some(url) = cli.once.as_deref() {
        let timeout = cli
            .timeout_ms
            .map(|ms| Duration::from_millis(ms.max(1)))
            .unwrap_or(DEFAULT_TIMEOUT);
        let client = match SnapshotClient::new(timeout) {
            Ok(client) => client,
            Err(err) => {
                error!(error = %err, "не удалось создать HTTP-клиент");
                std::process::exit(1);
            }
        };
        match client.query_snapshot(url).await {
            Ok(snapshot) => match serde_json::to_string_pretty(&snapshot) {
                Ok(text) => println!("{text}"),
                Err(err) => {
                    error!(error = %err, "не удалось сериализовать снимок");
                    std::process::exit(1);
                }
            },
            Err(err) => {
                error!(url, status = err.status(), error = %err, "не удалось получить снимок");
                std::process::exit(1);
            }
        }
        return;
    }

    let mut cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            std::process::exit(1);
        }
    };

    cfg.apply_timeout_override(cli.timeout_ms);

    info!(
        listen = %cfg.listen,
        interval_secs = cfg.interval_secs,
        request_timeout_ms = cfg.request_timeout_ms,
        devices = cfg.devices.len(),
        "запуск lhmsnapd"
    );

    let client = match SnapshotClient::new(cfg.request_timeout()) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "не удалось создать HTTP-клиент");
            std::process::exit(1);
        }
    };

    let shared_state = Arc::new(RwLock::new(State::new(now_unix(), &cfg.devices)));
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "не удалось инициализировать метрики");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = {
        let cfg = cfg.clone();
        let metrics = metrics.clone();
        let http_state = shared_state.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let app = http::build_router(metrics, http_state);
            let addr: SocketAddr = match cfg.listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %cfg.listen, "некорректный адрес listen");
                    return;
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "не удалось запустить HTTP-сервер");
                    return;
                }
            };

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "ошибка HTTP-сервера");
            }
        })
    };

    let poll_task = {
        let cfg = cfg.clone();
        let metrics = metrics.clone();
        let shared_state = shared_state.clone();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        info!("получен сигнал остановки цикла опроса");
                        break;
                    }
                    _ = ticker.tick() => {
                        let results = poll_devices(&client, &cfg.devices).await;
                        let now = now_unix();
                        let snapshot = {
                            let mut guard = shared_state.write().await;
                            for (id, result) in results {
                                metrics.inc_poll(&id);
                                match result {
                                    Ok(snapshot) => {
                                        guard.record_success(&id, now, snapshot);
                                    }
                                    Err(err) => {
                                        metrics.inc_poll_error(&id, err.status());
                                        guard.record_failure(&id, now, &err);
                                    }
                                }
                            }
                            guard.clone()
                        };
                        metrics.update_from_state(&snapshot);
                    }
                }
            }
        })
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "не удалось дождаться Ctrl+C");
    }
    info!("получен Ctrl+C, выполняется остановка");

    let _ = shutdown_tx.send(true);

    let _ = poll_task.await;
    let _ = http_task.await;
}

/// Polls every device concurrently; one slow agent does not hold up the rest.
async fn poll_devices(
    client: &SnapshotClient,
    devices: &[DeviceConfig],
) -> Vec<(String, Result<Snapshot, FetchError>)> {
    let mut set = JoinSet::new();
    for device in devices {
        let client = client.clone();
        let device = device.clone();
        set.spawn(async move {
            let result = client.query_snapshot(&device.url).await;
            match &result {
                Ok(snapshot) => debug!(
                    device = %device.id,
                    computer = %snapshot.name,
                    gpus = snapshot.gpus.len(),
                    disks = snapshot.hdds.len(),
                    "опрос выполнен"
                ),
                Err(err) => warn!(
                    device = %device.id,
                    url = %device.url,
                    status = err.status(),
                    error = %err,
                    "опрос не удался"
                ),
            }
            (device.id, result)
        });
    }

    let mut out = Vec::with_capacity(devices.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(item) => out.push(item),
            Err(err) => error!(error = %err, "задача опроса завершилась аварийно"),
        }
    }
    out
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
