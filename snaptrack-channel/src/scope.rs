use crate::{
    config::ChannelConfig,
    dispatch::{CommandDispatcher, DispatchError},
    fanout::{FanOut, Subscription},
    message::{inbound::Inbound, notification::Notification},
    prelude::*,
    service::{connection::ConnectionService, store::StoreService},
    state::{
        connection::{ConnectionId, ConnectionState, SharedLifecycle, Teardown},
        snapshot::ChannelSnapshot,
    },
    utils::{await_condition, StateClosedError},
};
use postage::watch;
use snaptrack_api::{
    codec::WireCommand,
    command::{CommandIntent, CommandKind, CommandTarget},
};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

/// Owns the single connection to the agent, and everything that observes it.
///
/// Any number of consumers may attach or subscribe; the connection is created once, on the first attach.
/// The connection is closed when the scope is closed or dropped, and is never re-opened.
///
/// Must be created within a tokio runtime.
pub struct ChannelScope {
    bus: ChannelBus,
    lifecycle: SharedLifecycle,
    fanout: FanOut,
    dispatcher: CommandDispatcher,
    rx_state: watch::Receiver<ConnectionState>,
    rx_snapshot: watch::Receiver<ChannelSnapshot>,
    tx_notify: broadcast::Sender<Notification>,
    connection: Mutex<Option<ConnectionService>>,
    _store: StoreService,
}

impl ChannelScope {
    pub fn new(config: ChannelConfig) -> anyhow::Result<Self> {
        let bus = ChannelBus::default();
        bus.capacity::<Inbound>(512)?;
        bus.capacity::<WireCommand>(512)?;
        bus.capacity::<Notification>(64)?;

        let lifecycle = SharedLifecycle::new(bus.tx::<ConnectionState>()?);
        let fanout = FanOut::default();

        bus.store_resource(config);
        bus.store_resource(lifecycle.clone());
        bus.store_resource(fanout.clone());

        let rx_state = bus.rx::<ConnectionState>()?;
        let rx_snapshot = bus.rx::<ChannelSnapshot>()?;
        let tx_notify = bus.tx::<Notification>()?;
        let dispatcher = CommandDispatcher::new(rx_state.clone(), bus.tx::<WireCommand>()?);

        let _store = StoreService::spawn(&bus)?;

        Ok(Self {
            bus,
            lifecycle,
            fanout,
            dispatcher,
            rx_state,
            rx_snapshot,
            tx_notify,
            connection: Mutex::new(None),
            _store,
        })
    }

    /// Creates the connection, if this is the first attach.  Later attaches are no-ops.
    pub fn attach(&self) -> anyhow::Result<()> {
        let mut slot = self.slot();

        let id = match self.lifecycle.attach() {
            Some(id) => id,
            None => return Ok(()),
        };

        debug!("attaching connection {}", id);
        match ConnectionService::spawn(&self.bus) {
            Ok(service) => {
                *slot = Some(service);
                Ok(())
            }
            Err(err) => {
                error!("failed to spawn connection {}: {}", id, err);
                if self.lifecycle.transport_closed() {
                    let reason = err.to_string();
                    self.tx_notify
                        .send(Notification::Disconnected { reason })
                        .ok();
                }

                Err(err)
            }
        }
    }

    /// Attaches, and registers an observer for every snapshot change.
    pub fn subscribe<F>(&self, observer: F) -> anyhow::Result<Subscription>
    where
        F: Fn(&ChannelSnapshot) + Send + Sync + 'static,
    {
        self.attach()?;
        Ok(self.fanout.subscribe(observer))
    }

    /// Closes the connection.  Safe to call at any time, and any number of times.
    pub fn close(&self) {
        let mut slot = self.slot();

        match self.lifecycle.teardown() {
            Teardown::CloseTransport(id) => {
                info!("closing connection {}", id);
                drop(slot.take());
                self.lifecycle.finish_close();

                let reason = "closed by client".to_string();
                self.tx_notify
                    .send(Notification::Disconnected { reason })
                    .ok();
            }
            Teardown::Detached => {
                debug!("scope closed before a connection was attached");
            }
            Teardown::AlreadyClosed => {
                drop(slot.take());
            }
        }
    }

    /// The current snapshot of every channel.
    pub fn snapshot(&self) -> ChannelSnapshot {
        self.rx_snapshot.borrow().clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<ChannelSnapshot> {
        self.rx_snapshot.clone()
    }

    pub fn states(&self) -> watch::Receiver<ConnectionState> {
        self.rx_state.clone()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.tx_notify.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.lifecycle.connection()
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        self.dispatcher.clone()
    }

    pub fn send(&self, kind: CommandKind, target: CommandTarget) -> Result<(), DispatchError> {
        self.dispatcher.send(kind, target)
    }

    pub fn dispatch(&self, intent: CommandIntent) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(intent)
    }

    /// Waits until the connection opens or closes, and returns the state it settled in.
    pub async fn wait_for_open(&self) -> Result<ConnectionState, StateClosedError> {
        let mut rx = self.rx_state.clone();
        await_condition(&mut rx, |state| state.is_open() || state.is_closed()).await
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<ConnectionService>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChannelScope {
    fn drop(&mut self) {
        self.close();
    }
}
