use crate::WebsocketConnection;
use futures::executor::block_on;
use lifeline::impl_storage_take;
use log::{debug, error};

/// A resource which wraps an established websocket connection.
///
/// The socket is closed when the resource is dropped, unless a close frame was already sent.
#[derive(Debug)]
pub struct WebsocketResource {
    pub websocket: WebsocketConnection,
    close_sent: bool,
}

impl WebsocketResource {
    pub fn new(websocket: WebsocketConnection) -> Self {
        Self {
            websocket,
            close_sent: false,
        }
    }

    /// Records that a close frame has been sent on the socket.
    pub fn set_close_sent(&mut self) {
        self.close_sent = true;
    }

    pub fn close_sent(&self) -> bool {
        self.close_sent
    }
}

impl Drop for WebsocketResource {
    fn drop(&mut self) {
        if self.close_sent {
            return;
        }

        match block_on(self.websocket.close(None)) {
            Ok(_) => debug!("websocket closed"),
            Err(err) => match err {
                tungstenite::Error::ConnectionClosed => {}
                tungstenite::Error::AlreadyClosed => {}
                tungstenite::Error::Protocol(_) => {}
                tungstenite::Error::Io(_) => {}
                _ => error!("failed to close websocket: {}", err),
            },
        }
    }
}

impl_storage_take!(WebsocketResource);
