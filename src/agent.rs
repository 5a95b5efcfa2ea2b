use crate::collectors::{Collector, Probe};
use crate::reporter::Reporter;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub delivered: u64,
    pub failed: u64,
}

pub struct Agent<P> {
    collector: Collector<P>,
    reporter: Reporter,
    interval: Duration,
}

impl<P: Probe> Agent<P> {
    pub fn new(collector: Collector<P>, reporter: Reporter, interval: Duration) -> Self {
        Self {
            collector,
            reporter,
            interval,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            url = %self.reporter.url(),
            interval = %humantime::format_duration(self.interval),
            "цикл отправки запущен"
        );

        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                _ = ticker.tick() => {
                    summary.ticks += 1;
                    let report = self.collector.collect();
                    debug!(
                        ts = report.ts,
                        cpu_pct = report.cpu_pct,
                        net_loss = report.net_loss,
                        status = %report.status,
                        "снимок состояния собран"
                    );

                    tokio::select! {
                        biased;
                        _ = stopped(&mut shutdown) => {
                            info!("остановка во время отправки, запрос отменён");
                            break;
                        }
                        result = self.reporter.send(&report) => {
                            match result {
                                Ok(code) => {
                                    summary.delivered += 1;
                                    debug!(status_code = code.as_u16(), "отчёт доставлен");
                                }
                                Err(err) => {
                                    summary.failed += 1;
                                    warn!(error = %err, "ошибка отправки отчёта");
                                }
                            }
                        }
                    }
                }
            }
        }

        info!(
            ticks = summary.ticks,
            delivered = summary.delivered,
            failed = summary.failed,
            "цикл отправки остановлен"
        );
        summary
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
