//! # Event Bus
//!
//! A synchronous listener registry. [`EventBus::emit`] always invokes *every*
//! listener registered for an event, in registration order, and folds their
//! [`Signal`]s into a single advisory boolean. A listener returning
//! [`Signal::Cancel`] never stops the remaining listeners from running; it is
//! up to the caller to look at the aggregate result after emission.
//!
//! ```rust
//! use resource_model::events::EventBus;
//!
//! let bus = EventBus::<u32>::new();
//! bus.on("save, delete", |n: &u32| println!("got {n}"));
//! bus.on("save", |n: &u32| *n < 10);
//!
//! assert!(bus.emit("save", &3));
//! assert!(!bus.emit("save", &42));
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// What a listener asks of the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signal {
    #[default]
    Continue,
    Cancel,
}

impl From<()> for Signal {
    fn from(_: ()) -> Self {
        Signal::Continue
    }
}

impl From<bool> for Signal {
    fn from(proceed: bool) -> Self {
        if proceed {
            Signal::Continue
        } else {
            Signal::Cancel
        }
    }
}

type Listener<E> = Arc<dyn Fn(&E) -> Signal + Send + Sync>;

/// Listener registry keyed by event name.
pub struct EventBus<E> {
    listeners: RwLock<HashMap<String, Vec<Listener<E>>>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` under each comma-separated name in `events`.
    ///
    /// Listeners may return `()` (continue), a `bool` (`false` cancels) or a [`Signal`].
    pub fn on<F, R>(&self, events: &str, listener: F)
    where
        F: Fn(&E) -> R + Send + Sync + 'static,
        R: Into<Signal>,
    {
        let listener: Listener<E> = Arc::new(move |event| listener(event).into());
        let mut listeners = self.listeners.write();
        for name in events.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            listeners
                .entry(name.to_string())
                .or_default()
                .push(Arc::clone(&listener));
        }
    }

    /// Removes every listener registered for `event`.
    pub fn off(&self, event: &str) {
        self.listeners.write().remove(event);
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }

    /// Invokes all listeners for `event`. Returns `false` if any of them cancelled.
    pub fn emit(&self, event: &str, context: &E) -> bool {
        // Snapshot so listeners may register or emit re-entrantly.
        let listeners = self.listeners.read().get(event).cloned().unwrap_or_default();

        let mut proceed = true;
        for listener in &listeners {
            if listener(context) == Signal::Cancel {
                proceed = false;
            }
        }
        proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_all_listeners_run_after_cancel() {
        let bus = EventBus::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        bus.on("save", move |_: &()| {
            c.fetch_add(1, Ordering::SeqCst);
            false
        });
        let c = calls.clone();
        bus.on("save", move |_: &()| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!bus.emit("save", &()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_comma_separated_names() {
        let bus = EventBus::<i32>::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.on("fetch, save,delete", move |n: &i32| s.lock().push(*n));

        assert_eq!(bus.listener_count("fetch"), 1);
        assert_eq!(bus.listener_count("delete"), 1);
        bus.emit("fetch", &1);
        bus.emit("delete", &2);
        bus.emit("other", &3);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_registration_order() {
        let bus = EventBus::<()>::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..3 {
            let o = order.clone();
            bus.on("change", move |_: &()| o.lock().push(i));
        }
        assert!(bus.emit("change", &()));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_off_and_unknown_event() {
        let bus = EventBus::<()>::new();
        bus.on("change", |_: &()| false);
        bus.off("change");
        assert!(bus.emit("change", &()));
        assert_eq!(bus.listener_count("change"), 0);
    }
}
