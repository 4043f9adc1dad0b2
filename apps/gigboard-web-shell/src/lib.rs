//! Browser shell for the gigboard client: the fragment router, per-role
//! route tables and the session bootstrapper that swaps them on sign-in and
//! sign-out.
//!
//! Everything outside `wasm` is target-independent and driven through the
//! [`NavigationHost`], [`BusyIndicator`] and [`PageRenderer`] boundaries.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bootstrap;
pub mod flows;
pub mod indicators;
pub mod navigation;
pub mod pages;
pub mod routing;

pub use bootstrap::{
    DEFAULT_LANDING, SessionBootstrapper, SessionTransition, TransitionReason, TransitionReceiver,
    TransitionSender, transition_channel,
};
pub use flows::SessionFlows;
pub use indicators::{BusyGuard, BusyIndicator, TracingBusyIndicator};
pub use navigation::{ListenerId, MemoryNavigation, NavigationHost, NavigationListener};
pub use pages::{Page, PageRenderer, build_dispatcher, default_page, page_for, route_keys};
pub use routing::{DispatchOutcome, ParsedFragment, RouteDispatcher, coerce_numeric, parse_fragment};

#[cfg(target_arch = "wasm32")]
mod wasm {
    mod dom;
    mod navigation;
    mod network;
    mod storage;

    use std::rc::Rc;

    use gigboard_client_core::{
        ApiRequest, AuthSessionManager, GatewayConfig, HttpMethod, RequestGateway, TokenStore,
    };
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;

    use crate::{SessionBootstrapper, SessionFlows, transition_channel};

    use dom::{AlertErrorSink, CallbackRenderer, PreloaderIndicator};
    use navigation::HashNavigation;
    use network::FetchTransport;
    use storage::BrowserStorage;

    thread_local! {
        static FLOWS: std::cell::RefCell<Option<Rc<SessionFlows>>> = const { std::cell::RefCell::new(None) };
    }

    /// Wires the browser boundaries, boots the shell for the persisted role
    /// and starts applying session transitions. `render` is called with the
    /// role name and a JSON page descriptor.
    #[wasm_bindgen]
    pub fn boot_web_shell(render: js_sys::Function, api_base_url: Option<String>) -> Result<(), JsValue> {
        console_error_panic_hook::set_once();

        let base_url = api_base_url
            .as_deref()
            .unwrap_or(gigboard_client_core::config::DEFAULT_API_BASE_URL);
        let config = GatewayConfig::new(base_url).map_err(|error| JsValue::from_str(&error.to_string()))?;
        let storage = Rc::new(BrowserStorage::local().ok_or_else(|| JsValue::from_str("localStorage is unavailable"))?);
        let tokens = Rc::new(TokenStore::load(storage.clone()));
        let gateway = Rc::new(RequestGateway::new(
            config,
            tokens.clone(),
            Rc::new(FetchTransport),
            Rc::new(AlertErrorSink),
        ));
        let auth = Rc::new(AuthSessionManager::new(gateway, tokens, storage.clone()));

        let (sender, receiver) = transition_channel();
        let flows = Rc::new(SessionFlows::new(auth, sender));
        FLOWS.with(|slot| {
            slot.replace(Some(flows));
        });

        let bootstrapper = Rc::new(SessionBootstrapper::new(
            storage,
            Rc::new(HashNavigation::new()),
            Rc::new(PreloaderIndicator),
            Rc::new(CallbackRenderer::new(render)),
        ));
        bootstrapper
            .boot()
            .map_err(|error| JsValue::from_str(&error.to_string()))?;

        spawn_local(async move {
            bootstrapper.run(receiver).await;
        });
        Ok(())
    }

    fn flows() -> Result<Rc<SessionFlows>, JsValue> {
        FLOWS
            .with(|slot| slot.borrow().clone())
            .ok_or_else(|| JsValue::from_str("web shell is not booted"))
    }

    #[wasm_bindgen]
    pub async fn sign_in(username: String, password: String) -> Result<String, JsValue> {
        let role = flows()?
            .sign_in(&username, &password)
            .await
            .map_err(|error| JsValue::from_str(&error.to_string()))?;
        Ok(role.to_string())
    }

    #[wasm_bindgen]
    pub async fn register(role: String, profile: JsValue) -> Result<String, JsValue> {
        let profile = from_js(&profile)?;
        let flows = flows()?;
        let outcome = match role.as_str() {
            "contractor" => flows.register_contractor(profile).await,
            "contractee" => flows.register_contractee(profile).await,
            other => return Err(JsValue::from_str(&format!("cannot register as `{other}`"))),
        };
        outcome
            .map(|role| role.to_string())
            .map_err(|error| JsValue::from_str(&error.to_string()))
    }

    /// Sends an authenticated API call for the view layer. `body`, when not
    /// `undefined`/`null`, is sent as JSON. Resolves to the parsed response or
    /// `null`; a failed credential refresh also signs the user out.
    #[wasm_bindgen]
    pub async fn api_request(method: String, path: String, body: JsValue) -> Result<JsValue, JsValue> {
        let method = HttpMethod::parse(&method)
            .ok_or_else(|| JsValue::from_str(&format!("unsupported method `{method}`")))?;
        let mut request = ApiRequest::new(method, path);
        if !body.is_undefined() && !body.is_null() {
            request = request.json(from_js(&body)?);
        }

        let value = flows()?
            .request(request)
            .await
            .map_err(|error| JsValue::from_str(&error.to_string()))?;
        match value {
            Some(value) => js_sys::JSON::parse(&value.to_string()),
            None => Ok(JsValue::NULL),
        }
    }

    fn from_js(value: &JsValue) -> Result<serde_json::Value, JsValue> {
        js_sys::JSON::stringify(value)
            .ok()
            .and_then(|raw| raw.as_string())
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .ok_or_else(|| JsValue::from_str("value is not JSON-serializable"))
    }

    #[wasm_bindgen]
    pub async fn sign_out() -> Result<(), JsValue> {
        flows()?
            .sign_out()
            .await
            .map_err(|error| JsValue::from_str(&error.to_string()))
    }
}
