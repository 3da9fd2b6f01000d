//! Ordered listener registry and fan-out
//!
//! Listeners are kept in registration order and invoked one after another for
//! each event. A reentrant delivery gate is held for the duration of one
//! event's fan-out; removal takes the gate after unregistering, so once
//! `remove` returns the listener can no longer be running or about to run.

use parking_lot::{Mutex, ReentrantMutex};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::ListenerError;
use crate::event::NotificationEvent;

/// Receives notification events.
///
/// Listeners run on the connection task, one event at a time. They should
/// return quickly; hand heavy work off to another task. Returning an error or
/// panicking does not affect other listeners.
pub trait NotificationListener: Send + Sync + 'static {
    fn on_event(&self, event: &NotificationEvent) -> Result<(), ListenerError>;
}

impl<F> NotificationListener for F
where
    F: Fn(&NotificationEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    fn on_event(&self, event: &NotificationEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Adapter for closures that cannot fail
pub(crate) struct InfallibleListener<F>(pub(crate) F);

impl<F> NotificationListener for InfallibleListener<F>
where
    F: Fn(&NotificationEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &NotificationEvent) -> Result<(), ListenerError> {
        (self.0)(event);
        Ok(())
    }
}

/// Unique identifier for a listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct ListenerSlot {
    id: ListenerId,
    listener: Arc<dyn NotificationListener>,
    active: AtomicBool,
}

/// Outcome of one event's fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DeliveryReport {
    pub(crate) delivered: u64,
    pub(crate) failed: u64,
    /// Fan-out stopped because the connection was retired
    pub(crate) interrupted: bool,
}

pub(crate) struct ListenerRegistry {
    slots: Mutex<BTreeMap<ListenerId, Arc<ListenerSlot>>>,
    next_id: AtomicU64,
    gate: ReentrantMutex<()>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            gate: ReentrantMutex::new(()),
        }
    }

    pub(crate) fn register(&self, listener: Arc<dyn NotificationListener>) -> ListenerId {
        // Ids only grow, so map order is registration order
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(ListenerSlot {
            id,
            listener,
            active: AtomicBool::new(true),
        });
        self.slots.lock().insert(id, slot);
        tracing::debug!(listener_id = %id, "Listener registered");
        id
    }

    /// Unregister `id`. Returns once no fan-out can still invoke it.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let removed = self.slots.lock().remove(&id);
        match removed {
            Some(slot) => {
                slot.active.store(false, Ordering::SeqCst);
                self.quiesce();
                tracing::debug!(listener_id = %id, "Listener removed");
                true
            }
            None => false,
        }
    }

    /// Remove every listener
    pub(crate) fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.slots.lock());
        for slot in drained.values() {
            slot.active.store(false, Ordering::SeqCst);
        }
        self.quiesce();
        drained.len()
    }

    /// Wait until any fan-out in progress on another thread has finished.
    ///
    /// Reentrant, so listeners may call this indirectly from inside `on_event`.
    pub(crate) fn quiesce(&self) {
        drop(self.gate.lock());
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.slots.lock().contains_key(&id)
    }

    /// Deliver `event` to every active listener in registration order.
    ///
    /// `is_current` is checked before the first and every following
    /// invocation; once it returns false the fan-out stops.
    pub(crate) fn fan_out(
        &self,
        event: &NotificationEvent,
        is_current: impl Fn() -> bool,
    ) -> DeliveryReport {
        let _gate = self.gate.lock();
        let mut report = DeliveryReport::default();
        if !is_current() {
            report.interrupted = true;
            return report;
        }

        let snapshot: Vec<Arc<ListenerSlot>> = self.slots.lock().values().cloned().collect();
        for slot in snapshot {
            if !is_current() {
                report.interrupted = true;
                break;
            }
            if !slot.active.load(Ordering::SeqCst) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| slot.listener.on_event(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(error)) => {
                    report.failed += 1;
                    tracing::warn!(
                        listener_id = %slot.id,
                        sequence = event.sequence(),
                        %error,
                        "Listener failed to handle event"
                    );
                }
                Err(panic) => {
                    report.failed += 1;
                    tracing::warn!(
                        listener_id = %slot.id,
                        sequence = event.sequence(),
                        panic = panic_message(panic.as_ref()),
                        "Listener panicked while handling event"
                    );
                }
            }
        }

        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle to one listener registration.
///
/// Dropping the handle leaves the listener registered; call [`remove`] or
/// convert it with [`into_guard`] to tie the registration to a scope.
///
/// [`remove`]: ListenerHandle::remove
/// [`into_guard`]: ListenerHandle::into_guard
#[derive(Debug)]
pub struct ListenerHandle {
    id: ListenerId,
    registry: Weak<ListenerRegistry>,
}

impl ListenerHandle {
    pub(crate) fn new(id: ListenerId, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether the listener is still registered
    pub fn is_registered(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.id))
    }

    /// Unregister the listener.
    ///
    /// Returns `true` if this call removed it. After it returns the listener
    /// is never invoked again, even for an event already being delivered on
    /// another thread. Calling it again, or after the broker is gone, is a
    /// no-op returning `false`.
    pub fn remove(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }

    /// Tie the registration to the returned guard's lifetime
    pub fn into_guard(self) -> ListenerGuard {
        ListenerGuard { handle: self }
    }
}

/// Removes its listener when dropped.
#[derive(Debug)]
pub struct ListenerGuard {
    handle: ListenerHandle,
}

impl ListenerGuard {
    pub fn id(&self) -> ListenerId {
        self.handle.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.handle.remove();
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
