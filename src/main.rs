mod agent;
mod collectors;
mod config;
mod report;
mod reporter;
mod transport;

use agent::Agent;
use collectors::system::SystemProbe;
use collectors::Collector;
use config::Config;
use reporter::Reporter;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            std::process::exit(1);
        }
    };

    let client = match transport::build_client(&cfg.tls) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "не удалось загрузить TLS-материалы");
            std::process::exit(1);
        }
    };

    info!(
        device_id = %cfg.device_id,
        supervisor = %cfg.supervisor_url,
        interval = %humantime::format_duration(cfg.interval),
        timeout = %humantime::format_duration(cfg.request_timeout),
        "запуск healthagent"
    );

    let collector = Collector::new(
        cfg.device_id.clone(),
        cfg.thresholds.clone(),
        SystemProbe::new(),
    );
    let reporter = Reporter::new(client, cfg.supervisor_url.clone(), cfg.request_timeout);
    let agent = Agent::new(collector, reporter, cfg.interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let agent_task = tokio::spawn(agent.run(shutdown_rx));

    shutdown_signal().await;
    info!("получен сигнал остановки, выполняется остановка");

    let _ = shutdown_tx.send(true);
    if let Err(err) = agent_task.await {
        error!(error = %err, "цикл отправки завершился аварийно");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "не удалось дождаться Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!(error = %err, "не удалось подписаться на SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
