//! Outbound command intents, before they are encoded onto the wire.
use std::{fmt, str::FromStr};
use thiserror::Error;

/// The kind of command sent to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Start,
    Stop,
    Restart,
    Logs,
    StopPort,
    AddPort,
    AddRule,
}

impl CommandKind {
    /// The discriminant written into the `type` field of the outbound frame.
    pub fn wire_type(&self) -> &'static str {
        match self {
            CommandKind::Start => "services_start",
            CommandKind::Stop => "services_stop",
            CommandKind::Restart => "services_restart",
            CommandKind::Logs => "services_logs",
            CommandKind::StopPort => "stop_port",
            CommandKind::AddPort => "add_port",
            CommandKind::AddRule => "firewall_add_rule",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Start => "start",
            CommandKind::Stop => "stop",
            CommandKind::Restart => "restart",
            CommandKind::Logs => "logs",
            CommandKind::StopPort => "stop_port",
            CommandKind::AddPort => "add_port",
            CommandKind::AddRule => "add_rule",
        }
    }

    pub fn is_service_command(&self) -> bool {
        matches!(
            self,
            CommandKind::Start | CommandKind::Stop | CommandKind::Restart | CommandKind::Logs
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown command kind: {0}")]
pub struct CommandParseError(pub String);

impl FromStr for CommandKind {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(CommandKind::Start),
            "stop" => Ok(CommandKind::Stop),
            "restart" => Ok(CommandKind::Restart),
            "logs" => Ok(CommandKind::Logs),
            "stop_port" => Ok(CommandKind::StopPort),
            "add_port" => Ok(CommandKind::AddPort),
            "add_rule" => Ok(CommandKind::AddRule),
            _ => Err(CommandParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn lower(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    pub fn upper(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Tcp
    }
}

impl FromStr for Protocol {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(CommandParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Allow,
    Deny,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Deny => "deny",
        }
    }
}

impl FromStr for RuleAction {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(RuleAction::Allow),
            "deny" => Ok(RuleAction::Deny),
            _ => Err(CommandParseError(s.to_string())),
        }
    }
}

/// A firewall rule to be added on the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub port: u32,
    pub protocol: Protocol,
    pub source: String,
    pub destination: String,
    pub action: RuleAction,
}

impl RuleSpec {
    pub fn new(port: u32, protocol: Protocol, action: RuleAction) -> Self {
        Self {
            port,
            protocol,
            source: "any".to_string(),
            destination: "any".to_string(),
            action,
        }
    }
}

/// The payload of a command.  Which variant is legal depends on the `CommandKind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    Service(String),
    Port { port: u32, pid: u32 },
    NewPort { port: u32, protocol: Protocol },
    Rule(RuleSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandIntent {
    pub kind: CommandKind,
    pub target: CommandTarget,
}

impl CommandIntent {
    pub fn new(kind: CommandKind, target: CommandTarget) -> Self {
        Self { kind, target }
    }

    pub fn service(kind: CommandKind, name: impl Into<String>) -> Self {
        Self::new(kind, CommandTarget::Service(name.into()))
    }

    pub fn stop_port(port: u32, pid: u32) -> Self {
        Self::new(CommandKind::StopPort, CommandTarget::Port { port, pid })
    }

    pub fn add_port(port: u32, protocol: Protocol) -> Self {
        Self::new(CommandKind::AddPort, CommandTarget::NewPort { port, protocol })
    }

    pub fn add_rule(rule: RuleSpec) -> Self {
        Self::new(CommandKind::AddRule, CommandTarget::Rule(rule))
    }
}
