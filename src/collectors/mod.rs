pub mod system;

use crate::config::Thresholds;
use crate::report::{HealthReport, HealthStatus};
use tracing::debug;

// None: источник не удалось прочитать.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeSample {
    pub cpu_pct: Option<f64>,
    pub net_loss: Option<f64>,
}

pub trait Probe {
    fn sample(&mut self) -> ProbeSample;
}

pub struct Collector<P> {
    device_id: String,
    thresholds: Thresholds,
    probe: P,
}

impl<P: Probe> Collector<P> {
    pub fn new(device_id: impl Into<String>, thresholds: Thresholds, probe: P) -> Self {
        Self {
            device_id: device_id.into(),
            thresholds,
            probe,
        }
    }

    pub fn collect(&mut self) -> HealthReport {
        let raw = self.probe.sample();
        let sample = ProbeSample {
            cpu_pct: raw.cpu_pct.filter(|v| v.is_finite()),
            net_loss: raw.net_loss.filter(|v| v.is_finite()),
        };
        let status = assess(&sample, &self.thresholds);
        if sample.cpu_pct.is_none() || sample.net_loss.is_none() {
            debug!(?raw, %status, "датчик не вернул значение");
        }

        HealthReport {
            device_id: self.device_id.clone(),
            ts: crate::now_unix(),
            cpu_pct: sample.cpu_pct.map_or(0.0, |v| v.clamp(0.0, 100.0)),
            net_loss: sample.net_loss.map_or(0.0, |v| v.clamp(0.0, 1.0)),
            status,
        }
    }
}

pub fn assess(sample: &ProbeSample, thresholds: &Thresholds) -> HealthStatus {
    if sample.cpu_pct.is_none() && sample.net_loss.is_none() {
        return HealthStatus::Fail;
    }

    let cpu = grade(
        sample.cpu_pct,
        thresholds.cpu_degraded_percent,
        thresholds.cpu_fail_percent,
    );
    let net = grade(
        sample.net_loss,
        thresholds.net_loss_degraded,
        thresholds.net_loss_fail,
    );
    cpu.max(net)
}

fn grade(value: Option<f64>, degraded: f64, fail: f64) -> HealthStatus {
    match value {
        Some(v) if v >= fail => HealthStatus::Fail,
        Some(v) if v >= degraded => HealthStatus::Degraded,
        Some(_) => HealthStatus::Ok,
        None => HealthStatus::Degraded,
    }
}
