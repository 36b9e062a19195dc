//! Encodes outbound command intents, and decodes inbound agent frames.
//!
//! Inbound frames are JSON objects with a string `type` discriminant.
//! Outbound frames are `{"type": <wire type>, "data": <payload>}`.
use crate::{
    command::{CommandIntent, CommandKind, CommandTarget},
    frame::Frame,
};
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

const KNOWN_TYPES: &[&str] = &[
    "metrics",
    "services",
    "firewalls",
    "ports",
    "process_list",
    "log",
    "action_response",
];

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame is not a json object")]
    NotAnObject,

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("invalid `{kind}` frame: {source}")]
    InvalidPayload {
        kind: String,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("service name is required")]
    EmptyServiceName,

    #[error("service name may not contain whitespace: {0:?}")]
    InvalidServiceName(String),

    #[error("port {0} is out of range (1-65535)")]
    InvalidPort(u32),

    #[error("a pid is required to stop port {0}")]
    MissingPid(u32),

    #[error("command `{kind}` does not accept a {target} target")]
    TargetMismatch {
        kind: CommandKind,
        target: &'static str,
    },
}

/// A command, encoded and ready to be written to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCommand {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl WireCommand {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decodes a raw text frame.
///
/// Frames with an unrecognized `type` decode to `Frame::Unknown`.
pub fn decode(raw: &str) -> Result<Frame, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;

    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_string();

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        warn!("ignoring frame with unknown type: {}", kind);
        return Ok(Frame::Unknown);
    }

    trace!("decoding {} frame", kind);
    Frame::deserialize(value).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

/// Validates the intent, and encodes it into a wire command.
pub fn encode_command(intent: &CommandIntent) -> Result<WireCommand, EncodeError> {
    let kind = intent.kind;

    let data = match (kind, &intent.target) {
        (kind, CommandTarget::Service(name)) if kind.is_service_command() => {
            validate_service_name(name)?;
            Value::String(name.clone())
        }
        (CommandKind::StopPort, CommandTarget::Port { port, pid }) => {
            validate_port(*port)?;
            if *pid == 0 {
                return Err(EncodeError::MissingPid(*port));
            }

            json!({ "port": port, "pid": pid })
        }
        (CommandKind::AddPort, CommandTarget::NewPort { port, protocol }) => {
            validate_port(*port)?;
            json!({ "port": port, "protocol": protocol.upper() })
        }
        (CommandKind::AddRule, CommandTarget::Rule(rule)) => {
            validate_port(rule.port)?;
            json!({
                "port": rule.port.to_string(),
                "protocol": rule.protocol.lower(),
                "source": or_any(&rule.source),
                "destination": or_any(&rule.destination),
                "action": rule.action.as_str(),
            })
        }
        (kind, target) => {
            return Err(EncodeError::TargetMismatch {
                kind,
                target: target_name(target),
            })
        }
    };

    Ok(WireCommand {
        kind: kind.wire_type().to_string(),
        data,
    })
}

/// Validates and encodes the intent into the raw text frame.
pub fn encode(intent: &CommandIntent) -> anyhow::Result<String> {
    let command = encode_command(intent)?;
    Ok(command.to_text()?)
}

fn validate_service_name(name: &str) -> Result<(), EncodeError> {
    if name.trim().is_empty() {
        return Err(EncodeError::EmptyServiceName);
    }

    if name.chars().any(char::is_whitespace) {
        return Err(EncodeError::InvalidServiceName(name.to_string()));
    }

    Ok(())
}

fn validate_port(port: u32) -> Result<(), EncodeError> {
    if port == 0 || port > 65535 {
        return Err(EncodeError::InvalidPort(port));
    }

    Ok(())
}

fn or_any(address: &str) -> &str {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        "any"
    } else {
        trimmed
    }
}

fn target_name(target: &CommandTarget) -> &'static str {
    match target {
        CommandTarget::Service(_) => "service",
        CommandTarget::Port { .. } => "port",
        CommandTarget::NewPort { .. } => "new port",
        CommandTarget::Rule(_) => "rule",
    }
}
