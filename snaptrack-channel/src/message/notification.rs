use crate::state::connection::ConnectionId;
use snaptrack_api::frame::ActionResponse;

/// Events surfaced to the user, in the order they occur.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Sent once, when the scope's connection opens.
    Connected(ConnectionId),
    /// The connection closed, or failed to open.
    Disconnected { reason: String },
    /// An acknowledgement from the agent.  These are not correlated with the command that caused them.
    Action(ActionResponse),
}
