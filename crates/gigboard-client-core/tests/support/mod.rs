#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use gigboard_client_core::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use gigboard_client_core::{
    DurableStorage, ErrorSink, GatewayConfig, HttpTransport, MemoryStorage, RequestGateway, TokenStore,
    TransportError, TransportRequest, TransportResponse,
};

pub const BASE_URL: &str = "http://api.test/api";

type Handler = Box<dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError>>;

/// Transport that records every request and yields once before answering, so
/// concurrent callers interleave on a single-threaded executor.
pub struct ScriptedTransport {
    handler: Handler,
    requests: RefCell<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            handler: Box::new(handler),
            requests: RefCell::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let url = format!("{BASE_URL}{path}");
        self.requests
            .borrow()
            .iter()
            .filter(|request| request.url == url)
            .count()
    }
}

#[async_trait(?Send)]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        YieldOnce::default().await;
        (self.handler)(&request)
    }
}

#[derive(Default)]
struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[derive(Default)]
pub struct RecordingSink {
    messages: RefCell<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn notify(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

pub fn json(status: u16, body: serde_json::Value) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status,
        content_type: Some("application/json".to_string()),
        body: body.to_string().into_bytes(),
    })
}

pub fn status(status: u16) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status,
        content_type: None,
        body: Vec::new(),
    })
}

pub fn bearer(request: &TransportRequest) -> Option<String> {
    request
        .header("authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(ToString::to_string)
}

pub fn is_refresh(request: &TransportRequest) -> bool {
    request.url == format!("{BASE_URL}/auth/refresh")
}

pub fn path_of(request: &TransportRequest) -> String {
    request
        .url
        .strip_prefix(BASE_URL)
        .unwrap_or(&request.url)
        .to_string()
}

/// Refresh endpoint that issues `fresh-N`/`refresh-N` on the Nth call.
pub fn rotating_refresh(counter: &Rc<Cell<u32>>) -> Result<TransportResponse, TransportError> {
    counter.set(counter.get() + 1);
    let n = counter.get();
    json(
        200,
        serde_json::json!({
            "access_token": format!("fresh-{n}"),
            "refresh_token": format!("refresh-{n}"),
        }),
    )
}

pub struct Harness {
    pub storage: Rc<MemoryStorage>,
    pub tokens: Rc<TokenStore>,
    pub transport: Rc<ScriptedTransport>,
    pub sink: Rc<RecordingSink>,
    pub gateway: Rc<RequestGateway>,
}

impl Harness {
    pub fn new(
        access: Option<&str>,
        refresh: Option<&str>,
        transport: Rc<ScriptedTransport>,
    ) -> Self {
        Self::with_limit(access, refresh, transport, Some(2))
    }

    pub fn with_limit(
        access: Option<&str>,
        refresh: Option<&str>,
        transport: Rc<ScriptedTransport>,
        refresh_cycle_limit: Option<u32>,
    ) -> Self {
        let storage = Rc::new(MemoryStorage::new());
        if let Some(access) = access {
            storage.set(ACCESS_TOKEN_KEY, access);
        }
        if let Some(refresh) = refresh {
            storage.set(REFRESH_TOKEN_KEY, refresh);
        }
        let tokens = Rc::new(TokenStore::load(storage.clone()));
        let sink = Rc::new(RecordingSink::default());
        let config = GatewayConfig::new(BASE_URL)
            .expect("valid base url")
            .with_refresh_cycle_limit(refresh_cycle_limit);
        let gateway = Rc::new(RequestGateway::new(
            config,
            tokens.clone(),
            transport.clone(),
            sink.clone(),
        ));
        Self {
            storage,
            tokens,
            transport,
            sink,
            gateway,
        }
    }
}
