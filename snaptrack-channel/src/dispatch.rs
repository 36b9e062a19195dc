use crate::state::connection::ConnectionState;
use log::{debug, trace};
use postage::watch;
use snaptrack_api::{
    codec::{encode_command, EncodeError, WireCommand},
    command::{CommandIntent, CommandKind, CommandTarget},
};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("not connected (connection is {0})")]
    NotConnected(ConnectionState),

    #[error("invalid command: {0}")]
    Invalid(#[from] EncodeError),

    #[error("the outbound queue is full")]
    QueueFull,
}

/// Validates and encodes command intents, and queues them for the connection to write.
///
/// Dispatch never blocks.  Commands are written in the order they were dispatched.
#[derive(Clone)]
pub struct CommandDispatcher {
    rx_state: watch::Receiver<ConnectionState>,
    tx_command: mpsc::Sender<WireCommand>,
}

impl CommandDispatcher {
    pub fn new(
        rx_state: watch::Receiver<ConnectionState>,
        tx_command: mpsc::Sender<WireCommand>,
    ) -> Self {
        Self {
            rx_state,
            tx_command,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.rx_state.borrow()
    }

    pub fn send(&self, kind: CommandKind, target: CommandTarget) -> Result<(), DispatchError> {
        self.dispatch(CommandIntent::new(kind, target))
    }

    pub fn dispatch(&self, intent: CommandIntent) -> Result<(), DispatchError> {
        let state = self.state();
        if !state.is_open() {
            debug!("rejecting {} command: connection is {}", intent.kind, state);
            return Err(DispatchError::NotConnected(state));
        }

        let command = encode_command(&intent)?;
        trace!("queueing command: {:?}", &command);

        self.tx_command.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => DispatchError::QueueFull,
            TrySendError::Closed(_) => DispatchError::NotConnected(ConnectionState::Closed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandDispatcher, DispatchError};
    use crate::state::connection::ConnectionState;
    use postage::{sink::Sink, watch};
    use snaptrack_api::{
        codec::EncodeError,
        command::{CommandIntent, CommandKind, CommandTarget, Protocol},
    };
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn rejects_before_open() {
        let (_tx_state, rx_state) = watch::channel::<ConnectionState>();
        let (tx, mut rx) = mpsc::channel(8);
        let dispatcher = CommandDispatcher::new(rx_state, tx);

        let result = dispatcher.send(CommandKind::Stop, CommandTarget::Service("web".into()));
        assert_eq!(
            Err(DispatchError::NotConnected(ConnectionState::Idle)),
            result
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejects_after_close() -> anyhow::Result<()> {
        let (mut tx_state, rx_state) = watch::channel::<ConnectionState>();
        let (tx, mut rx) = mpsc::channel(8);
        let dispatcher = CommandDispatcher::new(rx_state, tx);

        tx_state.send(ConnectionState::Closed).await?;

        let result = dispatcher.dispatch(CommandIntent::service(CommandKind::Restart, "web"));
        assert_eq!(
            Err(DispatchError::NotConnected(ConnectionState::Closed)),
            result
        );
        assert!(rx.try_recv().is_err());

        Ok(())
    }

    #[tokio::test]
    async fn writes_in_submission_order() -> anyhow::Result<()> {
        let (mut tx_state, rx_state) = watch::channel::<ConnectionState>();
        let (tx, mut rx) = mpsc::channel(8);
        let dispatcher = CommandDispatcher::new(rx_state, tx);

        tx_state.send(ConnectionState::Open).await?;

        dispatcher.dispatch(CommandIntent::service(CommandKind::Stop, "web"))?;
        dispatcher.dispatch(CommandIntent::add_port(443, Protocol::Tcp))?;

        assert_eq!("services_stop", rx.recv().await.unwrap().kind);
        assert_eq!("add_port", rx.recv().await.unwrap().kind);

        Ok(())
    }

    #[tokio::test]
    async fn rejects_invalid_intents() -> anyhow::Result<()> {
        let (mut tx_state, rx_state) = watch::channel::<ConnectionState>();
        let (tx, mut rx) = mpsc::channel(8);
        let dispatcher = CommandDispatcher::new(rx_state, tx);

        tx_state.send(ConnectionState::Open).await?;

        let result = dispatcher.dispatch(CommandIntent::stop_port(0, 12));
        assert_eq!(
            Err(DispatchError::Invalid(EncodeError::InvalidPort(0))),
            result
        );
        assert!(rx.try_recv().is_err());

        Ok(())
    }

    #[tokio::test]
    async fn reports_full_queue() -> anyhow::Result<()> {
        let (mut tx_state, rx_state) = watch::channel::<ConnectionState>();
        let (tx, _rx) = mpsc::channel(1);
        let dispatcher = CommandDispatcher::new(rx_state, tx);

        tx_state.send(ConnectionState::Open).await?;

        dispatcher.dispatch(CommandIntent::service(CommandKind::Logs, "nginx"))?;
        assert_eq!(
            Err(DispatchError::QueueFull),
            dispatcher.dispatch(CommandIntent::service(CommandKind::Logs, "nginx"))
        );

        Ok(())
    }
}
