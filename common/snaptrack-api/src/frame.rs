//! Inbound frames pushed by the monitoring agent.
use serde::{Deserialize, Deserializer, Serialize};

/// A system metrics sample.  Missing fields default to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metrics {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub disk_percent: f64,
    pub ram_total_bytes: u64,
    pub ram_used_bytes: u64,
    #[serde(alias = "diskTotalBytes")]
    pub disk_total: u64,
    #[serde(alias = "diskUsedBytes")]
    pub disk_used: u64,
    pub net_in_bytes: u64,
    pub net_out_bytes: u64,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceInfo {
    pub name: String,
    pub status: String,
    pub uptime: String,
    pub memory: String,
    pub version: String,
}

/// A row of the process table.  The agent sends snake_case keys, camelCase is accepted too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunningProcess {
    pub pid: i32,
    pub name: String,
    #[serde(alias = "cpuPercent")]
    pub cpu_percent: f64,
    #[serde(alias = "memPercent")]
    pub mem_percent: f64,
    pub status: String,
    #[serde(alias = "readBytes")]
    pub read_bytes: u64,
    #[serde(alias = "writeBytes")]
    pub write_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallRule {
    pub id: String,
    pub protocol: String,
    pub port: String,
    pub source: String,
    pub destination: String,
    pub action: String,
}

/// A listening socket on the monitored host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunningPort {
    pub protocol: String,
    pub port: u16,
    pub process: String,
    pub pid: i32,
}

/// The agent's reply to a command.  There is no request id; replies arrive in command order at best.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// A decoded inbound frame, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Metrics {
        #[serde(default)]
        stats: Metrics,
    },
    Services {
        #[serde(default, deserialize_with = "nullable_list")]
        services: Vec<ServiceInfo>,
    },
    Firewalls {
        #[serde(default, deserialize_with = "nullable_list")]
        rules: Vec<FirewallRule>,
    },
    Ports {
        #[serde(default, deserialize_with = "nullable_list")]
        ports: Vec<RunningPort>,
    },
    ProcessList {
        #[serde(default, deserialize_with = "nullable_list")]
        processes: Vec<RunningProcess>,
    },
    Log {
        service: String,
        #[serde(default)]
        log: String,
    },
    ActionResponse(ActionResponse),
    #[serde(other)]
    Unknown,
}

// the agent encodes an empty list as null
fn nullable_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Frame {
    /// The channel name carried by the frame, as it appears on the wire.
    pub fn channel(&self) -> &'static str {
        match self {
            Frame::Metrics { .. } => "metrics",
            Frame::Services { .. } => "services",
            Frame::Firewalls { .. } => "firewalls",
            Frame::Ports { .. } => "ports",
            Frame::ProcessList { .. } => "process_list",
            Frame::Log { .. } => "log",
            Frame::ActionResponse(_) => "action_response",
            Frame::Unknown => "unknown",
        }
    }
}
