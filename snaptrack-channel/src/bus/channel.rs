use crate::{
    config::ChannelConfig,
    fanout::FanOut,
    message::{inbound::Inbound, notification::Notification},
    state::{
        connection::{ConnectionState, SharedLifecycle},
        snapshot::ChannelSnapshot,
    },
};
use lifeline::{lifeline_bus, Message, Resource};
use snaptrack_api::codec::{self, WireCommand};
use snaptrack_websocket::{bus::WebsocketMessageBus, message::connection::DisconnectReason};
use tokio::sync::{broadcast, mpsc};

lifeline_bus!(pub struct ChannelBus);

// inbound frames, in arrival order, followed by the disconnect
impl Message<ChannelBus> for Inbound {
    type Channel = postage::mpsc::Sender<Self>;
}

// outbound commands, in submission order
impl Message<ChannelBus> for WireCommand {
    type Channel = mpsc::Sender<Self>;
}

impl Message<ChannelBus> for ConnectionState {
    type Channel = postage::watch::Sender<Self>;
}

impl Message<ChannelBus> for ChannelSnapshot {
    type Channel = postage::watch::Sender<Self>;
}

impl Message<ChannelBus> for Notification {
    type Channel = broadcast::Sender<Self>;
}

impl Resource<ChannelBus> for ChannelConfig {}
impl Resource<ChannelBus> for SharedLifecycle {}
impl Resource<ChannelBus> for FanOut {}

impl WebsocketMessageBus for ChannelBus {
    type Send = WireCommand;
    type Recv = Inbound;

    fn encode(command: &WireCommand) -> anyhow::Result<String> {
        Ok(command.to_text()?)
    }

    fn decode(text: &str) -> anyhow::Result<Inbound> {
        Ok(Inbound::Frame(codec::decode(text)?))
    }

    fn disconnected(reason: DisconnectReason) -> Inbound {
        Inbound::Disconnected {
            reason: reason.to_string(),
        }
    }
}
