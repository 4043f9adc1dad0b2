use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::navigation::{ListenerId, NavigationHost, NavigationListener, strip_hash};

type Listeners = Rc<RefCell<Vec<(ListenerId, NavigationListener)>>>;

/// `location.hash` with a single window `hashchange` listener fanning out to
/// subscribers. The browser listener is installed only while someone is
/// subscribed.
pub(super) struct HashNavigation {
    listeners: Listeners,
    next_listener: Cell<u64>,
    callback: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>>,
}

impl HashNavigation {
    pub(super) fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Vec::new())),
            next_listener: Cell::new(0),
            callback: RefCell::new(None),
        }
    }

    fn install(&self) {
        if self.callback.borrow().is_some() {
            return;
        }
        let Some(window) = web_sys::window() else {
            return;
        };
        let listeners = self.listeners.clone();
        let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event| {
            let current: Vec<NavigationListener> = listeners
                .borrow()
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect();
            for listener in current {
                listener();
            }
        }));
        let _ = window
            .add_event_listener_with_callback("hashchange", callback.as_ref().unchecked_ref());
        self.callback.replace(Some(callback));
    }

    fn uninstall(&self) {
        let Some(callback) = self.callback.borrow_mut().take() else {
            return;
        };
        if let Some(window) = web_sys::window() {
            let _ = window.remove_event_listener_with_callback(
                "hashchange",
                callback.as_ref().unchecked_ref(),
            );
        }
    }
}

impl NavigationHost for HashNavigation {
    fn fragment(&self) -> String {
        web_sys::window()
            .and_then(|window| window.location().hash().ok())
            .map(|hash| strip_hash(&hash).to_string())
            .unwrap_or_default()
    }

    fn set_fragment(&self, fragment: &str) -> bool {
        let next = strip_hash(fragment);
        if self.fragment() == next {
            return false;
        }
        let Some(window) = web_sys::window() else {
            return false;
        };
        window.location().set_hash(next).is_ok()
    }

    fn subscribe(&self, listener: NavigationListener) -> ListenerId {
        let id = ListenerId::from_raw(self.next_listener.get());
        self.next_listener.set(self.next_listener.get() + 1);
        self.listeners.borrow_mut().push((id, listener));
        self.install();
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
        if self.listeners.borrow().is_empty() {
            self.uninstall();
        }
    }
}
