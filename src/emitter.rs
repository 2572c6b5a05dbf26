use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle identifying one registered listener
pub type SubscriberId = u64;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Many-listener broadcast channel
///
/// Every emitted item is delivered to every listener registered at the
/// moment of emission. Listeners may be added and removed concurrently
/// with emission, including from within a listener's own callback: `emit`
/// snapshots the listener set under the lock and invokes callbacks with
/// the lock released, so `remove` never deadlocks against a running
/// delivery. A listener removed mid-delivery may still observe the item
/// being delivered; consumers needing at-most-once semantics guard with
/// their own retirement state.
pub struct Emitter<T> {
    listeners: Mutex<HashMap<SubscriberId, Listener<T>>>,
    next_id: AtomicU64,
}

impl<T> Emitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener, returning the handle that removes it
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(id, Arc::new(listener));
        id
    }

    /// Deliver one item to every currently registered listener
    pub fn emit(&self, item: &T) {
        let snapshot: Vec<Listener<T>> = self.lock().values().cloned().collect();
        for listener in snapshot {
            listener(item);
        }
    }

    /// Unregister a listener; removing an unknown id is a no-op
    pub fn remove(&self, id: SubscriberId) {
        self.lock().remove(&id);
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Listener<T>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_every_listener_receives_every_emit() {
        let emitter = Emitter::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        {
            let first = first.clone();
            emitter.subscribe(move |value: &usize| {
                first.fetch_add(*value, Ordering::SeqCst);
            });
        }
        {
            let second = second.clone();
            emitter.subscribe(move |value: &usize| {
                second.fetch_add(*value, Ordering::SeqCst);
            });
        }

        emitter.emit(&1);
        emitter.emit(&2);

        assert_eq!(first.load(Ordering::SeqCst), 3);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_removed_listener_no_longer_fires() {
        let emitter = Emitter::new();
        let count = Arc::new(AtomicUsize::new(0));

        let id = {
            let count = count.clone();
            emitter.subscribe(move |_: &()| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        emitter.emit(&());
        emitter.remove(id);
        emitter.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let emitter: Emitter<()> = Emitter::new();
        emitter.remove(999);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself_from_its_own_callback() {
        let emitter = Arc::new(Emitter::new());
        let count = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let id = {
            let inner = emitter.clone();
            let count = count.clone();
            let own_id = own_id.clone();
            emitter.subscribe(move |_: &()| {
                count.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *own_id.lock().unwrap() {
                    inner.remove(id);
                }
            })
        };
        *own_id.lock().unwrap() = Some(id);

        emitter.emit(&());
        emitter.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_emit_and_subscribe() {
        let emitter: Arc<Emitter<usize>> = Arc::new(Emitter::new());
        let total = Arc::new(AtomicUsize::new(0));

        let emit_side = {
            let emitter = emitter.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    emitter.emit(&i);
                }
            })
        };
        let subscribe_side = {
            let emitter = emitter.clone();
            let total = total.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    let total = total.clone();
                    let id = emitter.subscribe(move |_: &usize| {
                        total.fetch_add(1, Ordering::SeqCst);
                    });
                    emitter.remove(id);
                }
            })
        };

        emit_side.join().unwrap();
        subscribe_side.join().unwrap();
    }
}
