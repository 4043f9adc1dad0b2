//! Fragment router.
//!
//! A fragment `key/arg1/arg2` selects the handler registered for `key` and
//! passes the remaining segments coerced to numbers. Unknown keys fall back
//! to the default handler. Every handler invocation is bracketed by the busy
//! indicator.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::indicators::{BusyGuard, BusyIndicator};
use crate::navigation::{ListenerId, NavigationHost, strip_hash};

pub type RouteHandler = Rc<dyn Fn(&[f64]) -> anyhow::Result<()>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFragment {
    pub key: String,
    pub args: Vec<f64>,
}

#[must_use]
pub fn parse_fragment(fragment: &str) -> ParsedFragment {
    let mut segments = strip_hash(fragment).split('/');
    let key = segments.next().unwrap_or_default().to_string();
    let args = segments.map(coerce_numeric).collect();
    ParsedFragment { key, args }
}

/// Numeric coercion with browser semantics: blank is zero, anything that is
/// not a number literal is NaN.
#[must_use]
pub fn coerce_numeric(segment: &str) -> f64 {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).map_or(f64::NAN, |value| value as f64);
        }
    }
    let literal = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !literal {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Swallowed by a pending `suppress_next`.
    Suppressed,
    Matched(String),
    Fallback,
}

pub struct RouteDispatcher {
    navigation: Rc<dyn NavigationHost>,
    busy: Rc<dyn BusyIndicator>,
    routes: HashMap<String, RouteHandler>,
    fallback: Option<RouteHandler>,
    suppress_next: Cell<bool>,
    listener: Cell<Option<ListenerId>>,
}

impl RouteDispatcher {
    pub fn new(navigation: Rc<dyn NavigationHost>, busy: Rc<dyn BusyIndicator>) -> Self {
        Self {
            navigation,
            busy,
            routes: HashMap::new(),
            fallback: None,
            suppress_next: Cell::new(false),
            listener: Cell::new(None),
        }
    }

    pub fn register_default(&mut self, handler: impl Fn() -> anyhow::Result<()> + 'static) {
        self.fallback = Some(Rc::new(move |_: &[f64]| handler()));
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        handler: impl Fn(&[f64]) -> anyhow::Result<()> + 'static,
    ) {
        self.routes.insert(key.into(), Rc::new(handler));
    }

    #[must_use]
    pub fn has_route(&self, key: &str) -> bool {
        self.routes.contains_key(key)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.listener.get().is_some()
    }

    /// Subscribes to navigation changes and dispatches the current fragment.
    pub fn start(self: &Rc<Self>) -> anyhow::Result<DispatchOutcome> {
        if !self.is_active() {
            let dispatcher: Weak<Self> = Rc::downgrade(self);
            let id = self.navigation.subscribe(Rc::new(move || {
                let Some(dispatcher) = dispatcher.upgrade() else {
                    return;
                };
                if let Err(error) = dispatcher.dispatch() {
                    tracing::warn!(error = %error, "Route handler failed");
                }
            }));
            self.listener.set(Some(id));
        }
        self.dispatch()
    }

    pub fn stop(&self) {
        if let Some(id) = self.listener.take() {
            self.navigation.unsubscribe(id);
        }
    }

    /// Swallows the next dispatch only.
    pub fn suppress_next(&self) {
        self.suppress_next.set(true);
    }

    pub fn dispatch(&self) -> anyhow::Result<DispatchOutcome> {
        if self.suppress_next.replace(false) {
            tracing::debug!("Navigation suppressed");
            return Ok(DispatchOutcome::Suppressed);
        }

        let ParsedFragment { key, args } = parse_fragment(&self.navigation.fragment());
        if let Some(handler) = self.routes.get(&key) {
            tracing::debug!(route = %key, ?args, "Dispatching route");
            self.invoke(handler, &args)?;
            return Ok(DispatchOutcome::Matched(key));
        }

        tracing::debug!(route = %key, "No route matched; using default");
        if let Some(handler) = &self.fallback {
            self.invoke(handler, &[])?;
        }
        Ok(DispatchOutcome::Fallback)
    }

    fn invoke(&self, handler: &RouteHandler, args: &[f64]) -> anyhow::Result<()> {
        let _busy = BusyGuard::raise(self.busy.as_ref());
        handler(args)
    }
}

impl Drop for RouteDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
