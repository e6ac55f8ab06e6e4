//! Observer channel for map notifications.
//!
//! Listeners are registered explicitly and removed with the id returned at
//! subscription time. Everything runs on the UI thread, so listeners are
//! plain `Rc<dyn Fn>` and emission is synchronous.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Rc<dyn Fn(&E)>;

/// A single-threaded publish/subscribe channel for events of type `E`.
pub struct EventBus<E> {
    listeners: RefCell<Vec<(SubscriptionId, Listener<E>)>>,
    next_id: Cell<u64>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Delivers `event` to every listener registered when the call started.
    ///
    /// Listeners may subscribe or unsubscribe from inside the callback; the
    /// change takes effect from the next emission.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let bus: EventBus<u32> = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let id = bus.subscribe(move |v| sink.borrow_mut().push(*v));
        bus.emit(&1);
        bus.emit(&2);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&3);

        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_unsubscribe_during_emit() {
        let bus = Rc::new(EventBus::<()>::new());
        let calls = Rc::new(Cell::new(0));
        let own_id = Rc::new(Cell::new(None));

        let (bus_ref, calls_ref, id_ref) = (Rc::clone(&bus), Rc::clone(&calls), Rc::clone(&own_id));
        let id = bus.subscribe(move |_| {
            calls_ref.set(calls_ref.get() + 1);
            if let Some(id) = id_ref.get() {
                bus_ref.unsubscribe(id);
            }
        });
        own_id.set(Some(id));

        bus.emit(&());
        bus.emit(&());
        assert_eq!(calls.get(), 1);
    }
}
