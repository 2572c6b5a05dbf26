use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::emitter::{Emitter, SubscriberId};
use crate::engine::ResponseEvent;
use crate::types::{Outcome, RequestId};

/// Per-call options for [`Engine::call_with`](crate::Engine::call_with)
///
/// An absent `id` is replaced with a generated random text id; an absent
/// `timeout` falls back to the transport's default deadline.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub id: Option<RequestId>,
    pub timeout: Option<Duration>,
}

type Completion<R, E> = Box<dyn FnOnce(Outcome<R, E>) + Send>;

/// Shared state of one in-flight call
///
/// Three independent paths race to retire a call: a matching inbound
/// response, the deadline timer, and caller-driven cancellation. The
/// completion slot is the single retirement point - whichever path takes
/// the closure out of the slot delivers the outcome (or, for cancel,
/// discards it); every later path finds the slot empty and does nothing.
pub(crate) struct Waiter<R, E> {
    slot: Mutex<Option<Completion<R, E>>>,
    watcher: Mutex<Option<SubscriberId>>,
    timer: Mutex<Option<AbortHandle>>,
}

impl<R, E> Waiter<R, E> {
    pub(crate) fn new(completion: Completion<R, E>) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Some(completion)),
            watcher: Mutex::new(None),
            timer: Mutex::new(None),
        })
    }

    /// Attempt the PENDING -> retired transition; at most one caller ever
    /// receives the completion
    pub(crate) fn take(&self) -> Option<Completion<R, E>> {
        lock(&self.slot).take()
    }

    pub(crate) fn retired(&self) -> bool {
        lock(&self.slot).is_none()
    }

    /// Record the response watcher registered for this call. A response
    /// that raced the registration may have already retired the call, in
    /// which case the subscription is torn down on the spot.
    pub(crate) fn attach_watcher(&self, responses: &Emitter<ResponseEvent>, id: SubscriberId) {
        *lock(&self.watcher) = Some(id);
        if self.retired() {
            self.unregister(responses);
        }
    }

    /// Record the armed deadline timer, aborting it immediately if the
    /// call retired before the timer task was registered
    pub(crate) fn arm_timer(&self, handle: AbortHandle) {
        if self.retired() {
            handle.abort();
            return;
        }
        *lock(&self.timer) = Some(handle);
    }

    /// Drop the response watcher and stop the deadline timer; called on
    /// every retirement so neither source can fire again
    pub(crate) fn unregister(&self, responses: &Emitter<ResponseEvent>) {
        if let Some(id) = lock(&self.watcher).take() {
            responses.remove(id);
        }
        if let Some(timer) = lock(&self.timer).take() {
            timer.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancellation handle bound to one in-flight call's response watcher
///
/// Dropping the handle leaves the call pending; only an explicit `cancel`
/// retires it.
pub struct CallHandle {
    cancel: Arc<dyn Fn() + Send + Sync>,
}

impl CallHandle {
    pub(crate) fn new<R, E>(
        waiter: Arc<Waiter<R, E>>,
        responses: Arc<Emitter<ResponseEvent>>,
    ) -> Self
    where
        R: 'static,
        E: 'static,
    {
        Self {
            cancel: Arc::new(move || {
                // Discarding the completion retires the call, so a late
                // response or timer fire finds the slot empty.
                let _ = waiter.take();
                waiter.unregister(&responses);
            }),
        }
    }

    /// Retire the call without delivering any outcome
    ///
    /// Idempotent. Once this returns, the watcher is unregistered and the
    /// completion is guaranteed never to be invoked, even if a matching
    /// response or the deadline timer races the cancellation. Nothing is
    /// sent to the remote peer.
    pub fn cancel(&self) {
        (self.cancel)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_waiter() -> Arc<Waiter<i64, i64>> {
        Waiter::new(Box::new(|_| {}))
    }

    #[test]
    fn test_slot_is_taken_exactly_once() {
        let waiter = noop_waiter();
        assert!(!waiter.retired());
        assert!(waiter.take().is_some());
        assert!(waiter.retired());
        assert!(waiter.take().is_none());
    }

    #[test]
    fn test_racing_takers_get_at_most_one_completion() {
        let waiter = noop_waiter();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let waiter = waiter.clone();
                std::thread::spawn(move || waiter.take().is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_attach_watcher_after_retirement_unsubscribes() {
        let responses: Emitter<ResponseEvent> = Emitter::new();
        let waiter = noop_waiter();
        let id = responses.subscribe(|_| {});

        let _ = waiter.take();
        waiter.attach_watcher(&responses, id);

        // The subscription registered for an already-retired call must be
        // gone: removing it again is a no-op either way, but a second
        // attach sees no recorded watcher.
        assert!(lock(&waiter.watcher).is_none());
    }
}
