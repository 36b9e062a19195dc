//! Plain text rendering of channel state, for the terminal.
use crate::cli::WatchChannel;
use snaptrack_channel::{
    ActionResponse, ChannelSnapshot, FirewallRule, Metrics, RunningPort, RunningProcess,
    ServiceInfo,
};
use std::sync::Arc;

/// Renders the slices which were replaced between two snapshots.
pub fn changes(previous: &ChannelSnapshot, current: &ChannelSnapshot, filter: WatchChannel) -> Vec<String> {
    let mut lines = Vec::new();

    if filter.includes(WatchChannel::Metrics) && replaced(&previous.metrics, &current.metrics) {
        if let Some(ref stats) = current.metrics {
            lines.push(metrics(stats));
        }
    }

    if filter.includes(WatchChannel::Services) && replaced(&previous.services, &current.services) {
        if let Some(ref services) = current.services {
            lines.push(format!("services ({})", services.len()));
            lines.extend(services.iter().map(service));
        }
    }

    if filter.includes(WatchChannel::Processes) && replaced(&previous.processes, &current.processes) {
        if let Some(ref processes) = current.processes {
            lines.push(format!("processes ({})", processes.len()));
            lines.extend(processes.iter().map(process));
        }
    }

    if filter.includes(WatchChannel::Firewall)
        && replaced(&previous.firewall_rules, &current.firewall_rules)
    {
        if let Some(ref rules) = current.firewall_rules {
            lines.push(format!("firewall rules ({})", rules.len()));
            lines.extend(rules.iter().map(rule));
        }
    }

    if filter.includes(WatchChannel::Ports) && replaced(&previous.ports, &current.ports) {
        if let Some(ref ports) = current.ports {
            lines.push(format!("ports ({})", ports.len()));
            lines.extend(ports.iter().map(port));
        }
    }

    if filter.includes(WatchChannel::Logs) {
        for (service, log) in current.logs.iter() {
            let unchanged = previous
                .logs
                .get(service)
                .map(|previous| Arc::ptr_eq(previous, log))
                .unwrap_or(false);

            if unchanged {
                continue;
            }

            lines.push(format!("logs for {}", service));
            lines.extend(log.iter().map(|line| format!("  {}", line)));
        }
    }

    lines
}

// frames always allocate a new slice, so pointer equality detects every update
fn replaced<T: ?Sized>(previous: &Option<Arc<T>>, current: &Option<Arc<T>>) -> bool {
    match (previous, current) {
        (Some(previous), Some(current)) => !Arc::ptr_eq(previous, current),
        (None, None) => false,
        _ => true,
    }
}

pub fn metrics(stats: &Metrics) -> String {
    format!(
        "cpu {:.1}%  ram {:.1}% ({} / {})  disk {:.1}% ({} / {})  net in {} out {}  up {}",
        stats.cpu_percent,
        stats.ram_percent,
        bytes(stats.ram_used_bytes),
        bytes(stats.ram_total_bytes),
        stats.disk_percent,
        bytes(stats.disk_used),
        bytes(stats.disk_total),
        bytes(stats.net_in_bytes),
        bytes(stats.net_out_bytes),
        duration(stats.uptime_seconds),
    )
}

fn service(service: &ServiceInfo) -> String {
    format!(
        "  {:<24} {:<10} {:<12} {:<10} {}",
        service.name, service.status, service.uptime, service.memory, service.version
    )
}

fn process(process: &RunningProcess) -> String {
    format!(
        "  {:>7} {:<24} cpu {:>5.1}%  mem {:>5.1}%  {}",
        process.pid, process.name, process.cpu_percent, process.mem_percent, process.status
    )
}

fn rule(rule: &FirewallRule) -> String {
    format!(
        "  [{}] {} {}/{} {} -> {}",
        rule.id, rule.action, rule.port, rule.protocol, rule.source, rule.destination
    )
}

fn port(port: &RunningPort) -> String {
    format!(
        "  {:>5}/{:<4} {} ({})",
        port.port, port.protocol, port.process, port.pid
    )
}

pub fn action(response: &ActionResponse) -> String {
    let status = if response.success { "ok" } else { "failed" };

    match response.service {
        Some(ref service) => format!("{} {}: {}", status, service, response.message),
        None => format!("{}: {}", status, response.message),
    }
}

pub fn bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, seconds % 60)
    }
}
