//! Per-role route tables.

use std::rc::Rc;

use gigboard_client_core::Role;
use serde::Serialize;

use crate::indicators::BusyIndicator;
use crate::navigation::NavigationHost;
use crate::routing::RouteDispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "page", rename_all = "kebab-case")]
pub enum Page {
    Landing,
    Login,
    Register,
    Dashboard,
    Orders,
    Replies,
    Profile,
    Order { id: Option<f64> },
    CreateOrder,
}

/// The view layer. Receives the page to show for the active role.
pub trait PageRenderer {
    fn render(&self, role: Role, page: Page) -> anyhow::Result<()>;
}

#[must_use]
pub fn default_page(role: Role) -> Page {
    match role {
        Role::Guest => Page::Landing,
        Role::Contractor | Role::Contractee | Role::Admin => Page::Dashboard,
    }
}

/// Route keys registered for `role`. The empty key is the bare fragment.
#[must_use]
pub fn route_keys(role: Role) -> &'static [&'static str] {
    match role {
        Role::Guest => &["", "login", "register"],
        Role::Contractor => &["", "dashboard", "orders", "profile", "order", "create-order"],
        Role::Contractee => &["", "dashboard", "replies", "profile", "order"],
        Role::Admin => &["", "dashboard", "orders", "profile", "order"],
    }
}

/// Page for a registered `key`, or `None` when `role` has no such route.
#[must_use]
pub fn page_for(role: Role, key: &str, args: &[f64]) -> Option<Page> {
    if !route_keys(role).iter().any(|candidate| *candidate == key) {
        return None;
    }
    let page = match key {
        "" | "dashboard" => default_page(role),
        "login" => Page::Login,
        "register" => Page::Register,
        "orders" => Page::Orders,
        "replies" => Page::Replies,
        "profile" => Page::Profile,
        "order" => Page::Order {
            id: args.first().copied(),
        },
        "create-order" => Page::CreateOrder,
        _ => return None,
    };
    Some(page)
}

/// Builds the dispatcher for `role`, wiring every route to `renderer`.
pub fn build_dispatcher(
    role: Role,
    navigation: Rc<dyn NavigationHost>,
    busy: Rc<dyn BusyIndicator>,
    renderer: Rc<dyn PageRenderer>,
) -> RouteDispatcher {
    let mut dispatcher = RouteDispatcher::new(navigation, busy);

    let fallback = renderer.clone();
    dispatcher.register_default(move || fallback.render(role, default_page(role)));

    for key in route_keys(role) {
        let renderer = renderer.clone();
        dispatcher.register(*key, move |args: &[f64]| {
            let page = page_for(role, key, args).unwrap_or_else(|| default_page(role));
            renderer.render(role, page)
        });
    }
    dispatcher
}
