//! Client core for the gigboard marketplace: credential storage, the
//! authenticated request gateway with its refresh protocol, and session
//! management.
//!
//! Everything here assumes a single-threaded cooperative executor (the
//! browser event loop, or a current-thread runtime natively) and shares
//! state through `Rc`.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod auth;
pub mod config;
pub mod gateway;
pub mod request;
pub mod storage;
pub mod tokens;
pub mod transport;

pub use auth::{AuthError, AuthInputError, AuthSession, AuthSessionManager, Role};
pub use config::{ConfigError, GatewayConfig};
pub use gateway::{ApiError, ErrorSink, GatewayError, RequestGateway, TracingErrorSink};
pub use request::{ApiRequest, RequestBody};
pub use storage::{DurableStorage, FileStorage, MemoryStorage};
pub use tokens::{Credentials, TokenStore, TokenUpdate};
pub use transport::{HttpMethod, HttpTransport, TransportError, TransportRequest, TransportResponse};

#[cfg(not(target_arch = "wasm32"))]
pub use transport::ReqwestTransport;
