use crate::{
    bus::WebsocketConnectionBus,
    message::connection::{DisconnectReason, WebsocketDisconnected, WebsocketRecv, WebsocketSend},
    resource::connection::WebsocketResource,
};
use futures::{SinkExt, StreamExt};
use lifeline::{Bus, Lifeline, Service, Task};
use log::{debug, error, trace};
use std::fmt::Display;
use thiserror::Error;
use tokio::{select, sync::mpsc};
use tungstenite::{Error, Message as TungsteniteMessage};

/// Owns the socket, forwarding WebsocketSend onto the socket, and socket messages as WebsocketRecv.
///
/// When the runloop terminates, the socket is closed and WebsocketDisconnected is sent.
pub struct WebsocketService {
    _runloop: Lifeline,
}

impl Service for WebsocketService {
    type Bus = WebsocketConnectionBus;
    type Lifeline = Result<Self, WebsocketSpawnError>;

    fn spawn(bus: &WebsocketConnectionBus) -> Result<Self, WebsocketSpawnError> {
        let websocket = bus
            .resource::<WebsocketResource>()
            .map_err(WebsocketSpawnError::socket_error)?;

        let rx = bus
            .rx::<WebsocketSend>()
            .map_err(WebsocketSpawnError::link_taken)?;

        let tx = bus
            .tx::<WebsocketRecv>()
            .map_err(WebsocketSpawnError::link_taken)?;

        let tx_disconnected = bus
            .tx::<WebsocketDisconnected>()
            .map_err(WebsocketSpawnError::link_taken)?;

        let _runloop = Self::task("run", async move {
            let reason = runloop(websocket, rx, tx).await;
            debug!("websocket runloop terminated: {}", &reason);
            tx_disconnected
                .send(WebsocketDisconnected(reason))
                .await
                .ok();
        });

        Ok(Self { _runloop })
    }
}

async fn runloop(
    mut websocket_drop: WebsocketResource,
    mut rx: mpsc::Receiver<WebsocketSend>,
    tx: mpsc::Sender<WebsocketRecv>,
) -> DisconnectReason {
    let websocket = &mut websocket_drop.websocket;
    let mut close_sent = false;

    let reason = loop {
        select!(
            message = websocket.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(Error::ConnectionClosed)) | Some(Err(Error::AlreadyClosed)) | None => {
                        break DisconnectReason::RemoteClosed;
                    },
                    Some(Err(e)) => {
                        error!("websocket error: {}", e);
                        break DisconnectReason::Error(e.to_string());
                    }
                };

                trace!("message received: {:?}", &message);

                match message {
                    TungsteniteMessage::Close(_) => {
                        debug!("terminating - received close");
                        break DisconnectReason::RemoteClosed;
                    },
                    TungsteniteMessage::Ping(_) | TungsteniteMessage::Pong(_) => {},
                    message => {
                        if tx.send(WebsocketRecv(message)).await.is_err() {
                            debug!("terminating - receiver disconnected");
                            break DisconnectReason::ChannelClosed;
                        }
                    }
                }
            },
            message = rx.recv() => {
                let message = match message {
                    Some(message) => message,
                    None => {
                        debug!("terminating - channel disconnected");
                        send_close(websocket).await;
                        close_sent = true;
                        break DisconnectReason::ChannelClosed;
                    }
                };

                trace!("send message: {:?}", &message);
                if let Err(e) = websocket.send(message.0).await {
                    match e {
                        Error::ConnectionClosed | Error::AlreadyClosed => {
                            break DisconnectReason::RemoteClosed;
                        },
                        _ => {
                            error!("failed to send websocket message: {}", e);
                            break DisconnectReason::Error(e.to_string());
                        }
                    }
                }
            },
        );
    };

    if close_sent {
        websocket_drop.set_close_sent();
    }

    reason
}

async fn send_close(websocket: &mut crate::WebsocketConnection) {
    if let Err(e) = websocket.send(TungsteniteMessage::Close(None)).await {
        match e {
            Error::ConnectionClosed | Error::AlreadyClosed => {}
            _ => error!("failed to send close frame: {}", e),
        }
    }
}

#[derive(Error, Debug)]
pub enum WebsocketSpawnError {
    #[error("websocket resource unavailable: {0}")]
    Socket(String),

    #[error("websocket channel taken: {0}")]
    LinkTaken(String),
}

impl WebsocketSpawnError {
    pub fn socket_error(err: impl Display) -> Self {
        Self::Socket(err.to_string())
    }

    pub fn link_taken(err: impl Display) -> Self {
        Self::LinkTaken(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::WebsocketService;
    use crate::{
        bus::WebsocketConnectionBus,
        connect_authorized,
        message::connection::{DisconnectReason, WebsocketDisconnected},
        resource::connection::WebsocketResource,
    };
    use async_tungstenite::tokio::accept_async;
    use futures::StreamExt;
    use lifeline::{assert_completes, dyn_bus::DynBus, Bus, Service};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dropped_bus_sends_one_close_frame() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("ws://{}/ws", listener.local_addr()?);

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept failed");
            let mut websocket = accept_async(stream).await.expect("handshake failed");

            let mut closes = 0usize;
            while let Some(Ok(message)) = websocket.next().await {
                if message.is_close() {
                    closes += 1;
                }
            }

            closes
        });

        let bus = WebsocketConnectionBus::default();
        let websocket = connect_authorized(url, None, None).await?;
        bus.store_resource(WebsocketResource::new(websocket));

        let mut rx_disconnected = bus.rx::<WebsocketDisconnected>()?;
        let _service = WebsocketService::spawn(&bus)?;

        // the send channel closes with the bus
        drop(bus);

        let disconnected = assert_completes!(rx_disconnected.recv(), 2000);
        assert_eq!(
            Some(WebsocketDisconnected(DisconnectReason::ChannelClosed)),
            disconnected
        );

        let closes = assert_completes!(server, 2000)?;
        assert_eq!(1, closes);

        Ok(())
    }
}
