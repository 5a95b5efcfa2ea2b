use crate::collectors::{Probe, ProbeSample};
use std::collections::HashMap;
use sysinfo::{CpuExt, NetworkExt, NetworksExt, System, SystemExt};
use tracing::debug;

const LOOPBACK_IFACE: &str = "lo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceTotals {
    pub iface: String,
    pub packets: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceDelta {
    pub packets: u64,
    pub errors: u64,
}

pub trait HostCounters {
    fn refresh(&mut self);
    fn cpu_usages(&self) -> Vec<f32>;
    fn interfaces(&self) -> Vec<InterfaceTotals>;
}

impl HostCounters for System {
    fn refresh(&mut self) {
        self.refresh_cpu();
        self.refresh_networks_list();
        self.refresh_networks();
    }

    fn cpu_usages(&self) -> Vec<f32> {
        self.cpus().iter().map(|c| c.cpu_usage()).collect()
    }

    fn interfaces(&self) -> Vec<InterfaceTotals> {
        self.networks()
            .iter()
            .filter(|(iface, _)| iface.as_str() != LOOPBACK_IFACE)
            .map(|(iface, data)| InterfaceTotals {
                iface: iface.to_string(),
                packets: data.total_packets_received() + data.total_packets_transmitted(),
                errors: data.total_errors_on_received() + data.total_errors_on_transmitted(),
            })
            .collect()
    }
}

// Новый интерфейс только задаёт базу, пропавший забывается.
#[derive(Debug, Default)]
pub struct NetworkTracker {
    last: HashMap<String, (u64, u64)>,
}

impl NetworkTracker {
    pub fn observe(&mut self, current: &[InterfaceTotals]) -> Vec<InterfaceDelta> {
        let mut next = HashMap::with_capacity(current.len());
        let mut deltas = Vec::with_capacity(current.len());
        for t in current {
            let delta = match self.last.get(&t.iface) {
                Some(&(packets, errors)) => InterfaceDelta {
                    packets: counter_delta(packets, t.packets),
                    errors: counter_delta(errors, t.errors),
                },
                None => InterfaceDelta::default(),
            };
            debug!(iface = %t.iface, packets = delta.packets, errors = delta.errors, "прирост счётчиков сети");
            deltas.push(delta);
            next.insert(t.iface.clone(), (t.packets, t.errors));
        }
        self.last = next;
        deltas
    }
}

// Счётчик уменьшился: был сброшен.
fn counter_delta(previous: u64, current: u64) -> u64 {
    if current >= previous {
        current - previous
    } else {
        current
    }
}

pub struct SystemProbe<H = System> {
    host: H,
    network: NetworkTracker,
}

impl SystemProbe<System> {
    pub fn new() -> Self {
        Self::with_host(System::new())
    }
}

impl Default for SystemProbe<System> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HostCounters> SystemProbe<H> {
    pub fn with_host(mut host: H) -> Self {
        host.refresh();
        let mut network = NetworkTracker::default();
        network.observe(&host.interfaces());
        Self { host, network }
    }
}

impl<H: HostCounters> Probe for SystemProbe<H> {
    fn sample(&mut self) -> ProbeSample {
        self.host.refresh();
        let deltas = self.network.observe(&self.host.interfaces());

        ProbeSample {
            cpu_pct: mean_cpu_usage(&self.host.cpu_usages()),
            net_loss: loss_ratio(&deltas),
        }
    }
}

pub fn mean_cpu_usage(usages: &[f32]) -> Option<f64> {
    if usages.is_empty() {
        return None;
    }
    let sum: f32 = usages.iter().sum();
    Some((sum / usages.len() as f32) as f64)
}

pub fn loss_ratio(deltas: &[InterfaceDelta]) -> Option<f64> {
    if deltas.is_empty() {
        return None;
    }
    let packets: u64 = deltas.iter().map(|d| d.packets).sum();
    let errors: u64 = deltas.iter().map(|d| d.errors).sum();
    if packets == 0 {
        return Some(0.0);
    }
    Some((errors as f64 / packets as f64).min(1.0))
}
