use crate::{
    config::ChannelConfig,
    message::notification::Notification,
    prelude::*,
    state::connection::{ConnectionId, ConnectionState, SharedLifecycle},
    utils::await_condition,
};
use postage::watch;
use snaptrack_websocket::{
    bus::{WebsocketCarrier, WebsocketConnectionBus},
    connect_authorized,
    resource::connection::WebsocketResource,
    service::WebsocketService,
};
use tokio::sync::broadcast;

/// Owns the scope's single connection.
///
/// Connects to the agent, and carries frames & commands between the socket and the ChannelBus.
/// Dropping the service cancels the connect, or closes the socket.
///
/// The remote close travels through the ChannelBus behind the last frame, and the StoreService closes the lifecycle.
pub struct ConnectionService {
    _run: Lifeline,
}

impl Service for ConnectionService {
    type Bus = ChannelBus;
    type Lifeline = anyhow::Result<Self>;

    fn spawn(bus: &Self::Bus) -> Self::Lifeline {
        let config = bus.resource::<ChannelConfig>()?;
        let lifecycle = bus.resource::<SharedLifecycle>()?;
        let tx_notify = bus.tx::<Notification>()?;
        let rx_state = bus.rx::<ConnectionState>()?;

        let connection = lifecycle
            .connection()
            .context("the connection service requires an attached lifecycle")?;

        let websocket_bus = WebsocketConnectionBus::default();
        let carrier = websocket_bus.carry_from(bus)?;

        let _run = Self::try_task(
            "run",
            run(
                connection,
                config,
                lifecycle,
                websocket_bus,
                carrier,
                tx_notify,
                rx_state,
            ),
        );

        Ok(Self { _run })
    }
}

async fn run(
    connection: ConnectionId,
    config: ChannelConfig,
    lifecycle: SharedLifecycle,
    websocket_bus: WebsocketConnectionBus,
    _carrier: WebsocketCarrier,
    tx_notify: broadcast::Sender<Notification>,
    mut rx_state: watch::Receiver<ConnectionState>,
) -> anyhow::Result<()> {
    info!("connection {} connecting to {}", connection, config.endpoint);

    let websocket = match connect_authorized(
        &config.endpoint,
        Some(config.origin.clone()),
        config.auth_token.clone(),
    )
    .await
    {
        Ok(websocket) => websocket,
        Err(err) => {
            error!("connection {} failed: {}", connection, err);

            if lifecycle.transport_closed() {
                let reason = format!("failed to connect to {}: {}", config.endpoint, err);
                tx_notify.send(Notification::Disconnected { reason }).ok();
            }

            return Ok(());
        }
    };

    let websocket = WebsocketResource::new(websocket);

    // the state is Open before the socket is read, so no frame is dropped
    if lifecycle.opened() {
        info!("connection {} open", connection);
        tx_notify.send(Notification::Connected(connection)).ok();
    } else {
        debug!("connection {} opened after teardown, closing", connection);
        return Ok(());
    }

    websocket_bus.store_resource(websocket);
    let _websocket = WebsocketService::spawn(&websocket_bus)?;

    // the socket and the carrier live until the store has applied the disconnect
    await_condition(&mut rx_state, ConnectionState::is_closed).await?;
    debug!("connection {} released", connection);

    Ok(())
}
