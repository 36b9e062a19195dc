use snaptrack_api::frame::Frame;

/// Messages received from the agent's socket, in arrival order.
///
/// `Disconnected` is always last.  Frames queued before it are still applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Frame(Frame),
    Disconnected { reason: String },
}
