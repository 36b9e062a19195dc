use snaptrack_api::frame::{FirewallRule, Frame, Metrics, RunningPort, RunningProcess, ServiceInfo};
use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

/// The number of network samples retained in the history window.
pub const NETWORK_HISTORY_LEN: usize = 10;

/// Cumulative network counters, taken from a metrics sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkSample {
    pub net_in_bytes: u64,
    pub net_out_bytes: u64,
}

/// An immutable view of every channel.
///
/// Slices are `None` until the first frame for the channel arrives.
/// Updates replace a slice (or a single service's log lines), and never mutate shared data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSnapshot {
    /// Incremented for every applied change.
    pub revision: u64,
    pub metrics: Option<Arc<Metrics>>,
    pub services: Option<Arc<[ServiceInfo]>>,
    pub processes: Option<Arc<[RunningProcess]>>,
    pub firewall_rules: Option<Arc<[FirewallRule]>>,
    pub ports: Option<Arc<[RunningPort]>>,
    pub logs: Arc<BTreeMap<String, Arc<[String]>>>,
    pub network_history: Arc<VecDeque<NetworkSample>>,
}

/// The change produced by a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StateDelta {
    Metrics(Arc<Metrics>),
    Services(Arc<[ServiceInfo]>),
    Processes(Arc<[RunningProcess]>),
    FirewallRules(Arc<[FirewallRule]>),
    Ports(Arc<[RunningPort]>),
    Log {
        service: String,
        lines: Arc<[String]>,
    },
    Unchanged,
}

impl StateDelta {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, StateDelta::Unchanged)
    }
}

impl ChannelSnapshot {
    /// Applies the frame, returning the next snapshot and the change that was made.
    ///
    /// Acknowledgements and unknown frames leave the state unchanged.
    pub fn apply(&self, frame: Frame) -> (ChannelSnapshot, StateDelta) {
        let mut next = self.clone();

        let delta = match frame {
            Frame::Metrics { stats } => {
                let sample = NetworkSample {
                    net_in_bytes: stats.net_in_bytes,
                    net_out_bytes: stats.net_out_bytes,
                };

                let mut history = (*self.network_history).clone();
                history.push_back(sample);
                while history.len() > NETWORK_HISTORY_LEN {
                    history.pop_front();
                }

                let metrics = Arc::new(stats);
                next.metrics = Some(metrics.clone());
                next.network_history = Arc::new(history);
                StateDelta::Metrics(metrics)
            }
            Frame::Services { services } => {
                let services: Arc<[ServiceInfo]> = services.into();
                next.services = Some(services.clone());
                StateDelta::Services(services)
            }
            Frame::ProcessList { processes } => {
                let processes: Arc<[RunningProcess]> = processes.into();
                next.processes = Some(processes.clone());
                StateDelta::Processes(processes)
            }
            Frame::Firewalls { rules } => {
                let rules: Arc<[FirewallRule]> = rules.into();
                next.firewall_rules = Some(rules.clone());
                StateDelta::FirewallRules(rules)
            }
            Frame::Ports { ports } => {
                let ports: Arc<[RunningPort]> = ports.into();
                next.ports = Some(ports.clone());
                StateDelta::Ports(ports)
            }
            Frame::Log { service, log } => {
                let lines: Arc<[String]> = split_log_lines(log.as_str()).into();

                let mut logs = (*self.logs).clone();
                logs.insert(service.clone(), lines.clone());
                next.logs = Arc::new(logs);

                StateDelta::Log { service, lines }
            }
            Frame::ActionResponse(_) | Frame::Unknown => return (next, StateDelta::Unchanged),
        };

        next.revision = self.revision + 1;
        (next, delta)
    }

    pub fn log_lines(&self, service: &str) -> Option<&[String]> {
        self.logs.get(service).map(|lines| lines.as_ref())
    }
}

/// Splits a log payload into lines, dropping blank lines.
pub fn split_log_lines(log: &str) -> Vec<String> {
    log.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
