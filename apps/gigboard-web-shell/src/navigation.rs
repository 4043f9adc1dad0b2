//! Navigation fragment boundary.
//!
//! The fragment is the part of the address after `#`. Hosts report it
//! without the leading `#` and notify subscribers after it changes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type NavigationListener = Rc<dyn Fn()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

pub trait NavigationHost {
    /// Current fragment without the leading `#`.
    fn fragment(&self) -> String;

    /// Moves to `fragment`. Returns true when a change notification will be
    /// delivered to subscribers later.
    fn set_fragment(&self, fragment: &str) -> bool;

    fn subscribe(&self, listener: NavigationListener) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId);
}

#[must_use]
pub fn strip_hash(fragment: &str) -> &str {
    fragment.strip_prefix('#').unwrap_or(fragment)
}

/// In-process navigation host. Change notifications are queued, like the
/// browser's asynchronous `hashchange`, until [`MemoryNavigation::flush`].
#[derive(Default)]
pub struct MemoryNavigation {
    fragment: RefCell<String>,
    listeners: RefCell<Vec<(ListenerId, NavigationListener)>>,
    next_listener: Cell<u64>,
    queued: Cell<usize>,
}

impl MemoryNavigation {
    #[must_use]
    pub fn new(initial: &str) -> Self {
        let navigation = Self::default();
        navigation.fragment.replace(strip_hash(initial).to_string());
        navigation
    }

    /// User-initiated navigation; same semantics as `set_fragment`.
    pub fn navigate(&self, fragment: &str) -> bool {
        self.set_fragment(fragment)
    }

    #[must_use]
    pub fn queued_events(&self) -> usize {
        self.queued.get()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Delivers queued change notifications to the listeners subscribed at
    /// delivery time. Returns the number of notifications delivered.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        while self.queued.get() > 0 {
            self.queued.set(self.queued.get() - 1);
            let listeners: Vec<NavigationListener> = self
                .listeners
                .borrow()
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect();
            for listener in listeners {
                listener();
            }
            delivered += 1;
        }
        delivered
    }
}

impl NavigationHost for MemoryNavigation {
    fn fragment(&self) -> String {
        self.fragment.borrow().clone()
    }

    fn set_fragment(&self, fragment: &str) -> bool {
        let next = strip_hash(fragment);
        if *self.fragment.borrow() == next {
            return false;
        }
        self.fragment.replace(next.to_string());
        self.queued.set(self.queued.get() + 1);
        true
    }

    fn subscribe(&self, listener: NavigationListener) -> ListenerId {
        let id = ListenerId::from_raw(self.next_listener.get());
        self.next_listener.set(self.next_listener.get() + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }
}
