//! Role-scoped dispatcher lifecycle.
//!
//! One dispatcher is live at a time. A transition stops the old dispatcher
//! before the replacement subscribes, so navigation events never reach two
//! route tables.

use std::cell::RefCell;
use std::rc::Rc;

use futures::StreamExt;
use futures::channel::mpsc;
use gigboard_client_core::auth::persisted_role;
use gigboard_client_core::{DurableStorage, Role};

use crate::indicators::BusyIndicator;
use crate::navigation::NavigationHost;
use crate::pages::{PageRenderer, build_dispatcher};
use crate::routing::RouteDispatcher;

pub const DEFAULT_LANDING: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    SignedIn,
    SignedOut,
    /// Credentials could not be refreshed.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTransition {
    pub reason: TransitionReason,
    /// Fragment forced before the new dispatcher starts.
    pub landing: Option<String>,
}

impl SessionTransition {
    #[must_use]
    pub fn signed_in() -> Self {
        Self {
            reason: TransitionReason::SignedIn,
            landing: Some(DEFAULT_LANDING.to_string()),
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            reason: TransitionReason::SignedOut,
            landing: Some(DEFAULT_LANDING.to_string()),
        }
    }

    #[must_use]
    pub fn expired() -> Self {
        Self {
            reason: TransitionReason::Expired,
            landing: Some(DEFAULT_LANDING.to_string()),
        }
    }

    #[must_use]
    pub fn with_landing(mut self, landing: Option<String>) -> Self {
        self.landing = landing;
        self
    }
}

pub type TransitionSender = mpsc::UnboundedSender<SessionTransition>;
pub type TransitionReceiver = mpsc::UnboundedReceiver<SessionTransition>;

#[must_use]
pub fn transition_channel() -> (TransitionSender, TransitionReceiver) {
    mpsc::unbounded()
}

struct ActiveShell {
    role: Role,
    dispatcher: Rc<RouteDispatcher>,
}

pub struct SessionBootstrapper {
    storage: Rc<dyn DurableStorage>,
    navigation: Rc<dyn NavigationHost>,
    busy: Rc<dyn BusyIndicator>,
    renderer: Rc<dyn PageRenderer>,
    active: RefCell<Option<ActiveShell>>,
}

impl SessionBootstrapper {
    pub fn new(
        storage: Rc<dyn DurableStorage>,
        navigation: Rc<dyn NavigationHost>,
        busy: Rc<dyn BusyIndicator>,
        renderer: Rc<dyn PageRenderer>,
    ) -> Self {
        Self {
            storage,
            navigation,
            busy,
            renderer,
            active: RefCell::new(None),
        }
    }

    /// Starts the dispatcher for the persisted role, leaving the current
    /// fragment alone.
    pub fn boot(&self) -> anyhow::Result<Role> {
        let role = persisted_role(self.storage.as_ref());
        tracing::info!(%role, "Booting session");
        self.replace(role, None)
    }

    pub fn transition(&self, transition: SessionTransition) -> anyhow::Result<Role> {
        let role = match transition.reason {
            TransitionReason::SignedIn => persisted_role(self.storage.as_ref()),
            TransitionReason::SignedOut | TransitionReason::Expired => Role::Guest,
        };
        tracing::info!(reason = ?transition.reason, %role, "Session transition");
        self.replace(role, transition.landing.as_deref())
    }

    /// Applies transitions in arrival order until every sender is dropped.
    pub async fn run(&self, mut transitions: TransitionReceiver) {
        while let Some(transition) = transitions.next().await {
            if let Err(error) = self.transition(transition) {
                tracing::warn!(error = %error, "Landing page failed to render");
            }
        }
        tracing::debug!("Session transition channel closed");
    }

    #[must_use]
    pub fn active_role(&self) -> Option<Role> {
        self.active.borrow().as_ref().map(|shell| shell.role)
    }

    #[must_use]
    pub fn dispatcher(&self) -> Option<Rc<RouteDispatcher>> {
        self.active
            .borrow()
            .as_ref()
            .map(|shell| shell.dispatcher.clone())
    }

    pub fn shutdown(&self) {
        if let Some(previous) = self.active.borrow_mut().take() {
            previous.dispatcher.stop();
        }
    }

    fn replace(&self, role: Role, landing: Option<&str>) -> anyhow::Result<Role> {
        self.shutdown();

        let dispatcher = Rc::new(build_dispatcher(
            role,
            self.navigation.clone(),
            self.busy.clone(),
            self.renderer.clone(),
        ));
        let pending_change = landing.is_some_and(|fragment| self.navigation.set_fragment(fragment));

        self.active.replace(Some(ActiveShell {
            role,
            dispatcher: dispatcher.clone(),
        }));
        let outcome = dispatcher.start();

        // The forced fragment was already rendered by `start`; its change
        // event must not render it again.
        if pending_change {
            dispatcher.suppress_next();
        }

        let outcome = outcome?;
        tracing::debug!(%role, ?outcome, "Dispatcher started");
        Ok(role)
    }
}
