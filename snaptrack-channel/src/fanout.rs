//! Distributes snapshot updates to independent observers.
use crate::state::snapshot::ChannelSnapshot;
use lifeline::impl_storage_clone;
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError, Weak},
};

pub type Observer = Arc<dyn Fn(&ChannelSnapshot) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: Vec<(u64, Observer)>,
}

/// The set of snapshot observers, in subscription order.
///
/// Observers are invoked outside the registry lock, so they may subscribe or unsubscribe from within a callback.
#[derive(Clone, Default)]
pub struct FanOut {
    registry: Arc<Mutex<Registry>>,
}

impl_storage_clone!(FanOut);

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut")
            .field("observers", &self.len())
            .finish()
    }
}

impl FanOut {
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&ChannelSnapshot) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.observers.push((id, Arc::new(observer)));

        Subscription {
            id,
            registry: Some(Arc::downgrade(&self.registry)),
        }
    }

    /// Calls each observer registered at the time of the call, in subscription order.
    pub fn publish(&self, snapshot: &ChannelSnapshot) {
        let observers: Vec<Observer> = self
            .lock()
            .observers
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for observer in observers {
            observer(snapshot);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A handle to a registered observer.  The observer is removed when the handle is dropped.
pub struct Subscription {
    id: u64,
    registry: Option<Weak<Mutex<Registry>>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    /// Keeps the observer registered for the lifetime of the fan-out.
    pub fn detach(mut self) {
        self.registry = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let registry = match self.registry.take().and_then(|weak| weak.upgrade()) {
            Some(registry) => registry,
            None => return,
        };

        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = self.id;
        registry.observers.retain(|(observer_id, _)| *observer_id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::{FanOut, Subscription};
    use crate::state::snapshot::ChannelSnapshot;
    use std::sync::{Arc, Mutex};

    fn revision(revision: u64) -> ChannelSnapshot {
        ChannelSnapshot {
            revision,
            ..Default::default()
        }
    }

    fn recorder(fanout: &FanOut) -> (Arc<Mutex<Vec<u64>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let subscription = fanout.subscribe(move |snapshot| {
            record.lock().unwrap().push(snapshot.revision);
        });

        (seen, subscription)
    }

    #[test]
    fn every_observer_sees_every_update_in_order() {
        let fanout = FanOut::default();
        let (first, _first) = recorder(&fanout);
        let (second, _second) = recorder(&fanout);

        for i in 1..=3 {
            fanout.publish(&revision(i));
        }

        assert_eq!(vec![1, 2, 3], *first.lock().unwrap());
        assert_eq!(vec![1, 2, 3], *second.lock().unwrap());
    }

    #[test]
    fn unsubscribe_removes_only_that_observer() {
        let fanout = FanOut::default();
        let (first, first_sub) = recorder(&fanout);
        let (second, _second_sub) = recorder(&fanout);

        fanout.publish(&revision(1));
        first_sub.unsubscribe();
        fanout.publish(&revision(2));

        assert_eq!(vec![1], *first.lock().unwrap());
        assert_eq!(vec![1, 2], *second.lock().unwrap());
        assert_eq!(1, fanout.len());
    }

    #[test]
    fn debug_shows_observer_count() {
        let fanout = FanOut::default();
        let (_seen, _subscription) = recorder(&fanout);

        assert_eq!("FanOut { observers: 1 }", format!("{:?}", fanout));
    }

    #[test]
    fn detached_observer_stays_registered() {
        let fanout = FanOut::default();
        let (seen, subscription) = recorder(&fanout);
        subscription.detach();

        fanout.publish(&revision(7));
        assert_eq!(vec![7], *seen.lock().unwrap());
        assert_eq!(1, fanout.len());
    }

    #[test]
    fn unsubscribe_from_within_callback() {
        let fanout = FanOut::default();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0));

        let subscription = {
            let slot = slot.clone();
            let calls = calls.clone();
            fanout.subscribe(move |_| {
                *calls.lock().unwrap() += 1;
                let subscription = slot.lock().unwrap().take();
                drop(subscription);
            })
        };
        *slot.lock().unwrap() = Some(subscription);

        fanout.publish(&revision(1));
        fanout.publish(&revision(2));

        assert_eq!(1, *calls.lock().unwrap());
        assert!(fanout.is_empty());
    }

    #[test]
    fn subscribe_from_within_callback() {
        let fanout = FanOut::default();
        let nested: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let _outer = {
            let inner_fanout = fanout.clone();
            let nested = nested.clone();
            fanout.subscribe(move |_| {
                let subscription = inner_fanout.subscribe(|_| {});
                nested.lock().unwrap().push(subscription);
            })
        };

        fanout.publish(&revision(1));
        assert_eq!(2, fanout.len());
        assert_eq!(1, nested.lock().unwrap().len());
    }
}
