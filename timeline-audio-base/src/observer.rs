use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A minimal fine-grained pub/sub broadcaster.
///
/// Listeners are appended, never removed in place: `notify` iterates a
/// snapshot of the listener list so a listener that unsubscribes itself (or
/// another listener) during notification doesn't perturb the in-flight
/// iteration. Events are never coalesced; every call to `notify` reaches
/// every still-subscribed listener exactly once, in subscription order.
pub struct Observable<E> {
    listeners: Mutex<Vec<(u64, Arc<dyn Fn(&E) + Send + Sync>)>>,
    next_id: AtomicU64,
}

impl<E> Default for Observable<E> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<E> Observable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns a handle that removes it when
    /// [`unsubscribe`](SubscriptionHandle::unsubscribe) is called explicitly.
    ///
    /// We intentionally don't remove-on-drop: managers hold their
    /// subscription handles for their entire lifetime and unsubscribe is
    /// only ever called explicitly on teardown, matching the observer
    /// lifecycle in the rest of the engine.
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        SubscriptionHandle { id }
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.listeners.lock().unwrap().retain(|(id, _)| *id != handle.id);
    }

    /// Notifies every currently-subscribed listener with `event`.
    ///
    /// Takes a snapshot (a cheap `Arc` clone per listener) before invoking
    /// anything, so a listener that unsubscribes itself or another listener
    /// mid-notification can't invalidate the iteration.
    pub fn notify(&self, event: &E) {
        let snapshot: Vec<_> = self.listeners.lock().unwrap().clone();
        for (_, listener) in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

/// Opaque handle returned by [`Observable::subscribe`], passed back to
/// [`Observable::unsubscribe`] to remove a listener.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SubscriptionHandle {
    id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn notify_reaches_all_listeners_in_order() {
        let observable = Observable::<u32>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let order = order.clone();
            observable.subscribe(move |e| order.lock().unwrap().push((1, *e)));
        }
        {
            let order = order.clone();
            observable.subscribe(move |e| order.lock().unwrap().push((2, *e)));
        }
        observable.notify(&42);
        assert_eq!(*order.lock().unwrap(), vec![(1, 42), (2, 42)]);
    }

    #[test]
    fn reentrant_unsubscribe_during_notify_does_not_panic_or_skip() {
        let observable = Arc::new(Observable::<u32>::new());
        let calls = Arc::new(AtomicU32::new(0));
        let handle_slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));
        {
            let observable = observable.clone();
            let handle_slot = handle_slot.clone();
            let calls = calls.clone();
            let h = observable.subscribe(move |_| {
                calls.fetch_add(1, Ordering::Relaxed);
                if let Some(h) = handle_slot.lock().unwrap().take() {
                    observable.unsubscribe(h);
                }
            });
            // Subscribing itself for removal on first notification.
            *handle_slot.lock().unwrap() = Some(h);
        }
        observable.notify(&1);
        observable.notify(&2);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(observable.listener_count(), 0);
    }

    #[test]
    fn unsubscribe_stops_further_notifications() {
        let observable = Observable::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));
        let handle = {
            let calls = calls.clone();
            observable.subscribe(move |_| {
                calls.fetch_add(1, Ordering::Relaxed);
            })
        };
        observable.notify(&1);
        observable.unsubscribe(handle);
        observable.notify(&2);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
