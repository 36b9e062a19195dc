//! The realtime channel manager for the snaptrack host monitor.
//!
//! A `ChannelScope` owns a single websocket connection to the monitoring agent.
//! Inbound frames (metrics, services, processes, firewall rules, ports, logs) are applied
//! to an immutable `ChannelSnapshot`, which is fanned out to any number of observers.
//! Commands are validated, encoded, and queued onto the same connection by the `CommandDispatcher`.

mod bus;
mod config;
mod dispatch;
mod fanout;
mod message;
mod prelude;
mod scope;
mod service;
mod state;
mod utils;

pub use bus::ChannelBus;
pub use config::ChannelConfig;
pub use dispatch::{CommandDispatcher, DispatchError};
pub use fanout::{FanOut, Observer, Subscription};
pub use message::{inbound::Inbound, notification::Notification};
pub use scope::ChannelScope;
pub use state::{
    connection::{ConnectionId, ConnectionState, Lifecycle, Teardown},
    snapshot::{ChannelSnapshot, NetworkSample, StateDelta, NETWORK_HISTORY_LEN},
};
pub use utils::StateClosedError;

pub use snaptrack_api::{
    codec::{EncodeError, WireCommand},
    command::{CommandIntent, CommandKind, CommandTarget, Protocol, RuleAction, RuleSpec},
    frame::{ActionResponse, FirewallRule, Frame, Metrics, RunningPort, RunningProcess, ServiceInfo},
};
