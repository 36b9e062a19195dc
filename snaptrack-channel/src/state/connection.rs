use lifeline::impl_storage_clone;
use log::debug;
use postage::{sink::Sink, watch};
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

/// The lifecycle state of the scope's single connection.
///
/// `Closed` is terminal.  There is no reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Idle
    }
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };

        f.write_str(name)
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier for a connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The transport work required by a teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// A connection exists, and must be closed.  The state is now `Closing`.
    CloseTransport(ConnectionId),
    /// No connection was ever created.  The state is now `Closed`.
    Detached,
    /// Teardown already happened, or the transport already closed.
    AlreadyClosed,
}

/// The connection state machine.  Transitions are pure, and return the work the caller must perform.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: ConnectionState,
    connection: Option<ConnectionId>,
    notified: bool,
}

impl Lifecycle {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Idle -> Connecting.  Returns the id of the connection to create,
    /// or None if a connection was already created for this scope.
    pub fn attach(&mut self) -> Option<ConnectionId> {
        if self.state != ConnectionState::Idle {
            return None;
        }

        let id = ConnectionId::next();
        self.connection = Some(id);
        self.state = ConnectionState::Connecting;

        Some(id)
    }

    /// Connecting -> Open.  Returns true exactly once, when the Connected notification should be sent.
    pub fn opened(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }

        self.state = ConnectionState::Open;

        if self.notified {
            return false;
        }

        self.notified = true;
        true
    }

    /// Open|Connecting -> Closed, after a remote close or a transport error.
    /// Returns true if the Disconnected notification should be sent.
    pub fn transport_closed(&mut self) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                self.state = ConnectionState::Closed;
                true
            }
            _ => false,
        }
    }

    pub fn teardown(&mut self) -> Teardown {
        match self.state {
            ConnectionState::Idle => {
                self.state = ConnectionState::Closed;
                Teardown::Detached
            }
            ConnectionState::Connecting | ConnectionState::Open => {
                self.state = ConnectionState::Closing;
                match self.connection {
                    Some(id) => Teardown::CloseTransport(id),
                    None => Teardown::Detached,
                }
            }
            ConnectionState::Closing | ConnectionState::Closed => Teardown::AlreadyClosed,
        }
    }

    /// Closing -> Closed, once the transport has been released.
    pub fn finish_close(&mut self) -> bool {
        if self.state != ConnectionState::Closing {
            return false;
        }

        self.state = ConnectionState::Closed;
        true
    }
}

struct LifecycleCell {
    lifecycle: Lifecycle,
    tx_state: watch::Sender<ConnectionState>,
}

/// The lifecycle, shared between the scope and the connection service.
///
/// Every transition is published on the ConnectionState watch channel while the lock is held,
/// so observers see transitions in order.
#[derive(Clone)]
pub struct SharedLifecycle {
    cell: Arc<Mutex<LifecycleCell>>,
}

impl_storage_clone!(SharedLifecycle);

impl fmt::Debug for SharedLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.cell.lock().unwrap_or_else(PoisonError::into_inner);

        f.debug_struct("SharedLifecycle")
            .field("state", &guard.lifecycle.state())
            .field("connection", &guard.lifecycle.connection())
            .finish()
    }
}

impl SharedLifecycle {
    pub fn new(tx_state: watch::Sender<ConnectionState>) -> Self {
        let cell = LifecycleCell {
            lifecycle: Lifecycle::default(),
            tx_state,
        };

        Self {
            cell: Arc::new(Mutex::new(cell)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.update(|lifecycle| lifecycle.state())
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.update(|lifecycle| lifecycle.connection())
    }

    pub fn attach(&self) -> Option<ConnectionId> {
        self.update(Lifecycle::attach)
    }

    pub fn opened(&self) -> bool {
        self.update(Lifecycle::opened)
    }

    pub fn transport_closed(&self) -> bool {
        self.update(Lifecycle::transport_closed)
    }

    pub fn teardown(&self) -> Teardown {
        self.update(Lifecycle::teardown)
    }

    pub fn finish_close(&self) -> bool {
        self.update(Lifecycle::finish_close)
    }

    fn update<R>(&self, transition: impl FnOnce(&mut Lifecycle) -> R) -> R {
        let mut guard = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        let cell = &mut *guard;

        let before = cell.lifecycle.state();
        let ret = transition(&mut cell.lifecycle);
        let after = cell.lifecycle.state();

        if before != after {
            debug!("connection state: {} -> {}", before, after);
            cell.tx_state.try_send(after).ok();
        }

        ret
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionState, Lifecycle, SharedLifecycle, Teardown};
    use postage::watch;

    #[test]
    fn attach_is_idempotent() {
        let mut lifecycle = Lifecycle::default();

        let id = lifecycle.attach();
        assert!(id.is_some());
        assert_eq!(ConnectionState::Connecting, lifecycle.state());

        for _ in 0..5 {
            assert_eq!(None, lifecycle.attach());
        }

        assert!(lifecycle.opened());
        assert_eq!(None, lifecycle.attach());
        assert_eq!(id, lifecycle.connection());
    }

    #[test]
    fn connected_is_reported_once() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.attach();

        assert!(lifecycle.opened());
        assert!(!lifecycle.opened());
        assert_eq!(ConnectionState::Open, lifecycle.state());
    }

    #[test]
    fn close_before_open() {
        let mut lifecycle = Lifecycle::default();

        assert_eq!(Teardown::Detached, lifecycle.teardown());
        assert_eq!(ConnectionState::Closed, lifecycle.state());
        assert_eq!(Teardown::AlreadyClosed, lifecycle.teardown());

        assert_eq!(None, lifecycle.attach());
        assert!(!lifecycle.opened());
    }

    #[test]
    fn close_while_connecting() {
        let mut lifecycle = Lifecycle::default();
        let id = lifecycle.attach().unwrap();

        assert_eq!(Teardown::CloseTransport(id), lifecycle.teardown());
        assert_eq!(ConnectionState::Closing, lifecycle.state());

        // the connect completes after the teardown began
        assert!(!lifecycle.opened());

        assert!(lifecycle.finish_close());
        assert_eq!(ConnectionState::Closed, lifecycle.state());
    }

    #[test]
    fn single_close() {
        let mut lifecycle = Lifecycle::default();
        let id = lifecycle.attach().unwrap();
        lifecycle.opened();

        assert_eq!(Teardown::CloseTransport(id), lifecycle.teardown());
        assert_eq!(Teardown::AlreadyClosed, lifecycle.teardown());
        assert!(lifecycle.finish_close());
        assert!(!lifecycle.finish_close());
        assert_eq!(Teardown::AlreadyClosed, lifecycle.teardown());
    }

    #[test]
    fn remote_close_is_terminal() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.attach();
        lifecycle.opened();

        assert!(lifecycle.transport_closed());
        assert!(!lifecycle.transport_closed());
        assert_eq!(ConnectionState::Closed, lifecycle.state());
        assert_eq!(Teardown::AlreadyClosed, lifecycle.teardown());
        assert_eq!(None, lifecycle.attach());
    }

    #[test]
    fn connection_ids_are_unique() {
        let mut first = Lifecycle::default();
        let mut second = Lifecycle::default();

        assert_ne!(first.attach(), second.attach());
    }

    #[test]
    fn shared_lifecycle_publishes_transitions() {
        let (tx, rx) = watch::channel::<ConnectionState>();
        let lifecycle = SharedLifecycle::new(tx);

        assert_eq!(ConnectionState::Idle, *rx.borrow());

        lifecycle.attach();
        assert_eq!(ConnectionState::Connecting, *rx.borrow());

        lifecycle.opened();
        assert_eq!(ConnectionState::Open, *rx.borrow());

        lifecycle.teardown();
        assert_eq!(ConnectionState::Closing, *rx.borrow());

        lifecycle.finish_close();
        assert_eq!(ConnectionState::Closed, *rx.borrow());
        assert_eq!(ConnectionState::Closed, lifecycle.state());
    }

    #[test]
    fn shared_lifecycle_debug_shows_state() {
        let (tx, _rx) = watch::channel::<ConnectionState>();
        let lifecycle = SharedLifecycle::new(tx);

        assert_eq!(
            "SharedLifecycle { state: Idle, connection: None }",
            format!("{:?}", lifecycle)
        );

        let id = lifecycle.attach().unwrap();
        assert_eq!(
            format!("SharedLifecycle {{ state: Connecting, connection: Some({:?}) }}", id),
            format!("{:?}", lifecycle)
        );
    }
}
