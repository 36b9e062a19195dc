use crate::{
    fanout::FanOut,
    message::{inbound::Inbound, notification::Notification},
    prelude::*,
    state::{connection::SharedLifecycle, snapshot::ChannelSnapshot},
};
use postage::{sink::Sink, stream::Stream};
use snaptrack_api::frame::Frame;

/// Applies inbound frames to the channel state, strictly in arrival order.
///
/// Each change is published on the ChannelSnapshot watch, and then to the fan-out observers.
/// Acknowledgements are forwarded as notifications.
///
/// A remote close arrives after the last frame, and moves the connection to Closed.
/// Frames are only dropped once the scope is closing.
pub struct StoreService {
    _run: Lifeline,
}

impl Service for StoreService {
    type Bus = ChannelBus;
    type Lifeline = anyhow::Result<Self>;

    fn spawn(bus: &Self::Bus) -> Self::Lifeline {
        let mut rx = bus.rx::<Inbound>()?;
        let mut tx = bus.tx::<ChannelSnapshot>()?;
        let tx_notify = bus.tx::<Notification>()?;
        let lifecycle = bus.resource::<SharedLifecycle>()?;
        let fanout = bus.resource::<FanOut>()?;

        let _run = Self::try_task("run", async move {
            let mut snapshot = ChannelSnapshot::default();

            while let Some(inbound) = rx.recv().await {
                let frame = match inbound {
                    Inbound::Frame(frame) => frame,
                    Inbound::Disconnected { reason } => {
                        info!("connection closed: {}", &reason);
                        if lifecycle.transport_closed() {
                            tx_notify.send(Notification::Disconnected { reason }).ok();
                        }

                        continue;
                    }
                };

                let state = lifecycle.state();
                if !state.is_open() {
                    debug!("dropping {} frame: connection is {}", frame.channel(), state);
                    continue;
                }

                if let Frame::ActionResponse(ref response) = frame {
                    debug!("action response: {:?}", response);
                    tx_notify.send(Notification::Action(response.clone())).ok();
                }

                let channel = frame.channel();
                let (next, delta) = snapshot.apply(frame);
                if delta.is_unchanged() {
                    continue;
                }

                trace!("{} updated, revision {}", channel, next.revision);
                snapshot = next;
                tx.send(snapshot.clone()).await.ok();
                fanout.publish(&snapshot);
            }

            Ok(())
        });

        Ok(Self { _run })
    }
}
