use std::fmt;
use tungstenite::Message as TungsteniteMessage;

#[derive(Debug)]
pub struct WebsocketRecv(pub TungsteniteMessage);

#[derive(Debug)]
pub struct WebsocketSend(pub TungsteniteMessage);

/// Sent once, when the socket runloop terminates.
#[derive(Debug, Clone, PartialEq)]
pub struct WebsocketDisconnected(pub DisconnectReason);

#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    /// The remote side sent a close frame, or the stream ended.
    RemoteClosed,
    /// The socket failed with a transport error.
    Error(String),
    /// The local send channel was dropped, and a close frame was sent.
    ChannelClosed,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::RemoteClosed => f.write_str("closed by remote"),
            DisconnectReason::Error(err) => write!(f, "transport error: {}", err),
            DisconnectReason::ChannelClosed => f.write_str("closed locally"),
        }
    }
}
