#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use gigboard_client_core::{
    AuthSessionManager, DurableStorage, GatewayConfig, HttpTransport, MemoryStorage,
    RequestGateway, Role, TokenStore, TracingErrorSink, TransportError, TransportRequest,
    TransportResponse,
};
use gigboard_web_shell::{BusyIndicator, MemoryNavigation, Page, PageRenderer, SessionBootstrapper};

#[derive(Default)]
pub struct RecordingIndicator {
    events: RefCell<Vec<&'static str>>,
}

impl RecordingIndicator {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.borrow().clone()
    }
}

impl BusyIndicator for RecordingIndicator {
    fn show(&self) {
        self.events.borrow_mut().push("show");
    }

    fn hide(&self) {
        self.events.borrow_mut().push("hide");
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    pages: RefCell<Vec<(Role, Page)>>,
}

impl RecordingRenderer {
    pub fn pages(&self) -> Vec<(Role, Page)> {
        self.pages.borrow().clone()
    }

    pub fn last(&self) -> Option<(Role, Page)> {
        self.pages.borrow().last().copied()
    }
}

impl PageRenderer for RecordingRenderer {
    fn render(&self, role: Role, page: Page) -> anyhow::Result<()> {
        self.pages.borrow_mut().push((role, page));
        Ok(())
    }
}

pub struct Shell {
    pub storage: Rc<MemoryStorage>,
    pub navigation: Rc<MemoryNavigation>,
    pub busy: Rc<RecordingIndicator>,
    pub renderer: Rc<RecordingRenderer>,
    pub bootstrapper: SessionBootstrapper,
}

impl Shell {
    pub fn new(fragment: &str, role: Option<&str>) -> Self {
        let storage = Rc::new(MemoryStorage::new());
        if let Some(role) = role {
            storage.set("role", role);
        }
        let navigation = Rc::new(MemoryNavigation::new(fragment));
        let busy = Rc::new(RecordingIndicator::default());
        let renderer = Rc::new(RecordingRenderer::default());
        let bootstrapper = SessionBootstrapper::new(
            storage.clone(),
            navigation.clone(),
            busy.clone(),
            renderer.clone(),
        );
        Self {
            storage,
            navigation,
            busy,
            renderer,
            bootstrapper,
        }
    }
}

type Handler = Box<dyn Fn(&TransportRequest) -> TransportResponse>;

pub struct FakeApi {
    handler: Handler,
}

impl FakeApi {
    pub fn new(handler: impl Fn(&TransportRequest) -> TransportResponse + 'static) -> Rc<Self> {
        Rc::new(Self {
            handler: Box::new(handler),
        })
    }
}

#[async_trait(?Send)]
impl HttpTransport for FakeApi {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        Ok((self.handler)(&request))
    }
}

pub fn json(status: u16, body: serde_json::Value) -> TransportResponse {
    TransportResponse {
        status,
        content_type: Some("application/json".to_string()),
        body: body.to_string().into_bytes(),
    }
}

pub fn path_of(request: &TransportRequest) -> &str {
    request
        .url
        .strip_prefix("http://api.test/api")
        .unwrap_or(&request.url)
}

pub fn auth_manager(storage: &Rc<MemoryStorage>, api: Rc<FakeApi>) -> Rc<AuthSessionManager> {
    let tokens = Rc::new(TokenStore::load(storage.clone()));
    let config = GatewayConfig::new("http://api.test/api").expect("valid base url");
    let gateway = Rc::new(RequestGateway::new(
        config,
        tokens.clone(),
        api,
        Rc::new(TracingErrorSink),
    ));
    Rc::new(AuthSessionManager::new(gateway, tokens, storage.clone()))
}
