use super::connection::WebsocketConnectionBus;
use crate::message::connection::{
    DisconnectReason, WebsocketDisconnected, WebsocketRecv, WebsocketSend,
};
use lifeline::{dyn_bus::DynBus, Bus, CarryFrom, Lifeline, Message, Task};
use log::*;
use postage::sink::Sink;
use std::fmt::Debug;
use tokio::{select, sync::mpsc};
use tungstenite::Message as TungsteniteMessage;

/// Carries text frames between the websocket, and the attached bus (which must implement WebsocketMessageBus).
///
/// The carrier does not own the socket.  Store a WebsocketResource on the connection bus,
/// and spawn a WebsocketService, once the connection is established.
///
/// When the socket disconnects, the carrier forwards every remaining frame,
/// and then a single `WebsocketMessageBus::disconnected` message.
pub struct WebsocketCarrier {
    _websocket_send: Lifeline,
    _websocket_recv: Lifeline,
}

/// Defines the Send and Recv message types, and how they are represented as websocket text frames.
pub trait WebsocketMessageBus: Sized {
    type Send: Message<Self, Channel = mpsc::Sender<Self::Send>> + Debug + Send + Sync + 'static;

    type Recv: Message<Self, Channel = postage::mpsc::Sender<Self::Recv>>
        + Debug
        + Send
        + Sync
        + 'static;

    fn encode(message: &Self::Send) -> anyhow::Result<String>;

    fn decode(text: &str) -> anyhow::Result<Self::Recv>;

    /// The message forwarded after the last frame, once the socket has disconnected.
    fn disconnected(reason: DisconnectReason) -> Self::Recv;
}

impl<B: DynBus> CarryFrom<B> for WebsocketConnectionBus
where
    B: WebsocketMessageBus,
{
    type Lifeline = anyhow::Result<WebsocketCarrier>;

    fn carry_from(&self, bus: &B) -> Self::Lifeline {
        self.capacity::<WebsocketSend>(512)?;
        self.capacity::<WebsocketRecv>(512)?;

        let _websocket_send = {
            let mut rx = bus.rx::<B::Send>()?;
            let tx = self.tx::<WebsocketSend>()?;

            Self::try_task("forward_send", async move {
                while let Some(msg) = rx.recv().await {
                    trace!("send message: {:?}", &msg);
                    match B::encode(&msg) {
                        Ok(text) => {
                            let send = tx.send(WebsocketSend(TungsteniteMessage::Text(text))).await;

                            if send.is_err() {
                                debug!("sender disconnected - aborting carry.");
                                break;
                            }
                        }
                        Err(e) => error!("failed to encode websocket msg: {}", e),
                    };
                }

                Ok(())
            })
        };

        let _websocket_recv = {
            let mut rx = self.rx::<WebsocketRecv>()?;
            let mut rx_disconnected = self.rx::<WebsocketDisconnected>()?;
            let mut tx = bus.tx::<B::Recv>()?;

            Self::try_task("forward_recv", async move {
                loop {
                    select! {
                        biased;

                        msg = rx.recv() => {
                            let msg = match msg {
                                Some(msg) => msg,
                                None => break,
                            };

                            if !forward_recv::<B>(&mut tx, msg).await {
                                debug!("receiver disconnected - aborting carry.");
                                break;
                            }
                        },
                        disconnected = rx_disconnected.recv() => {
                            // the socket service sends every frame before it reports the disconnect
                            while let Ok(msg) = rx.try_recv() {
                                if !forward_recv::<B>(&mut tx, msg).await {
                                    break;
                                }
                            }

                            let reason = match disconnected {
                                Some(WebsocketDisconnected(reason)) => reason,
                                None => DisconnectReason::Error("websocket service terminated".to_string()),
                            };

                            debug!("forwarding disconnect: {}", &reason);
                            tx.send(B::disconnected(reason)).await.ok();

                            break;
                        },
                    }
                }

                Ok(())
            })
        };

        Ok(WebsocketCarrier {
            _websocket_send,
            _websocket_recv,
        })
    }
}

/// Decodes and forwards a received message.  Returns false if the receiver has disconnected.
async fn forward_recv<B: WebsocketMessageBus>(
    tx: &mut postage::mpsc::Sender<B::Recv>,
    msg: WebsocketRecv,
) -> bool {
    let text = match msg.0 {
        TungsteniteMessage::Text(text) => text,
        TungsteniteMessage::Binary(data) => match String::from_utf8(data) {
            Ok(text) => text,
            Err(e) => {
                error!("binary websocket msg is not utf-8: {}", e);
                return true;
            }
        },
        _ => return true,
    };

    match B::decode(text.as_str()) {
        Ok(message) => {
            trace!("recv message: {:?}", &message);
            tx.send(message).await.is_ok()
        }
        Err(e) => {
            error!("failed to decode websocket msg: {}", e);
            true
        }
    }
}
