//! Authenticated request pipeline.
//!
//! Every API call goes through [`RequestGateway::send`]. A 401 response
//! starts the refresh protocol: the first caller to observe it refreshes the
//! credential pair while later 401s queue behind it. Once the refresh settles
//! the queue is drained, each queued request replaying through `send` on its
//! own.

use std::cell::RefCell;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::request::{ApiRequest, CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE, RequestBody};
use crate::tokens::{TokenStore, TokenUpdate};
use crate::transport::{
    HttpMethod, HttpTransport, TransportError, TransportRequest, TransportResponse,
};

pub const REFRESH_PATH: &str = "/auth/refresh";
pub const UNAUTHORIZED_STATUS: u16 = 401;

/// Structured application error decoded from a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn from_response(response: &TransportResponse) -> Self {
        let raw = response.text();
        let parsed = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .filter(serde_json::Value::is_object);

        let status = parsed
            .as_ref()
            .and_then(|body| body.get("status"))
            .and_then(serde_json::Value::as_u64)
            .and_then(|status| u16::try_from(status).ok())
            .unwrap_or(response.status);
        let message = parsed
            .as_ref()
            .and_then(error_message_from_body)
            .or_else(|| non_empty_trimmed(&raw))
            .unwrap_or_else(|| format!("request failed with status {}", response.status));

        Self { status, message }
    }

    /// Text handed to the notification sink.
    #[must_use]
    pub fn notification(&self) -> String {
        format!("Error {}: {}", self.status, self.message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "api_http_{}:{}", self.status, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway_transport_failed:{message}")]
    Transport { message: String },
    #[error("{0}")]
    Api(ApiError),
    #[error("gateway_encode_failed:{message}")]
    Encode { message: String },
    #[error("gateway_decode_failed:{message}")]
    Decode { message: String },
    #[error("no refresh token available")]
    RefreshUnavailable,
    #[error("failed to refresh token (status {status})")]
    RefreshRejected { status: u16 },
    #[error("invalid tokens received from refresh")]
    RefreshMalformed,
    #[error("refresh was abandoned before it settled")]
    RefreshAbandoned,
    #[error("request still unauthorized after {cycles} refresh cycles")]
    RefreshLimitExceeded { cycles: u32 },
}

impl GatewayError {
    /// True when the credential pair could not be renewed; callers treat this
    /// as a forced sign-out.
    #[must_use]
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            Self::RefreshUnavailable
                | Self::RefreshRejected { .. }
                | Self::RefreshMalformed
                | Self::RefreshAbandoned
                | Self::RefreshLimitExceeded { .. }
        )
    }

    #[must_use]
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(error) => Some(error),
            _ => None,
        }
    }
}

impl From<TransportError> for GatewayError {
    fn from(error: TransportError) -> Self {
        Self::Transport {
            message: error.message,
        }
    }
}

/// Global user-facing notification surface for application errors.
pub trait ErrorSink {
    fn notify(&self, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn notify(&self, message: &str) {
        tracing::warn!(%message, "API error");
    }
}

struct PendingRequest {
    request: ApiRequest,
    resolver: oneshot::Sender<Result<ApiRequest, GatewayError>>,
}

enum RefreshState {
    Idle,
    Refreshing(Vec<PendingRequest>),
}

/// Returns the state to `Idle` if the refreshing caller is dropped before the
/// cycle settles; dropping the queued resolvers wakes their waiters.
struct RefreshCycleGuard<'a> {
    state: &'a RefCell<RefreshState>,
    finished: bool,
}

impl RefreshCycleGuard<'_> {
    fn finish(mut self) -> Vec<PendingRequest> {
        self.finished = true;
        match self.state.replace(RefreshState::Idle) {
            RefreshState::Refreshing(pending) => pending,
            RefreshState::Idle => Vec::new(),
        }
    }
}

impl Drop for RefreshCycleGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let RefreshState::Refreshing(pending) = self.state.replace(RefreshState::Idle) {
            tracing::warn!(pending = pending.len(), "Refresh cycle abandoned");
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshPayload {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

pub struct RequestGateway {
    base_url: String,
    refresh_cycle_limit: Option<u32>,
    tokens: Rc<TokenStore>,
    transport: Rc<dyn HttpTransport>,
    errors: Rc<dyn ErrorSink>,
    refresh: RefCell<RefreshState>,
}

impl RequestGateway {
    pub fn new(
        config: GatewayConfig,
        tokens: Rc<TokenStore>,
        transport: Rc<dyn HttpTransport>,
        errors: Rc<dyn ErrorSink>,
    ) -> Self {
        Self {
            base_url: config.base_url,
            refresh_cycle_limit: config.refresh_cycle_limit,
            tokens,
            transport,
            errors,
            refresh: RefCell::new(RefreshState::Idle),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn tokens(&self) -> &Rc<TokenStore> {
        &self.tokens
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.refresh.borrow(), RefreshState::Refreshing(_))
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        match &*self.refresh.borrow() {
            RefreshState::Refreshing(pending) => pending.len(),
            RefreshState::Idle => 0,
        }
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends `request`, transparently refreshing credentials on 401.
    ///
    /// Returns `None` for success responses without a JSON body.
    pub async fn send(&self, request: ApiRequest) -> Result<Option<serde_json::Value>, GatewayError> {
        self.send_with_cycles(request, 0).await
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, GatewayError> {
        let path = request.path.clone();
        let value = self.send(request).await?.ok_or_else(|| GatewayError::Decode {
            message: format!("{path} returned no JSON body"),
        })?;
        serde_json::from_value(value).map_err(|error| GatewayError::Decode {
            message: error.to_string(),
        })
    }

    fn send_with_cycles(
        &self,
        request: ApiRequest,
        refresh_cycles: u32,
    ) -> LocalBoxFuture<'_, Result<Option<serde_json::Value>, GatewayError>> {
        async move {
            let request_id = Uuid::new_v4().simple().to_string();
            tracing::debug!(
                %request_id,
                method = request.method.as_str(),
                path = %request.path,
                refresh_cycles,
                "Sending API request"
            );

            let wire = self.compose(&request)?;
            let response = self.transport.execute(wire).await?;

            if response.status == UNAUTHORIZED_STATUS {
                tracing::debug!(%request_id, path = %request.path, "API request unauthorized");
                return self.handle_unauthorized(request, refresh_cycles).await;
            }

            if !response.is_success() {
                let error = ApiError::from_response(&response);
                tracing::debug!(%request_id, status = error.status, "API request failed");
                self.errors.notify(&error.notification());
                return Err(GatewayError::Api(error));
            }

            decode_success_body(&response)
        }
        .boxed_local()
    }

    async fn handle_unauthorized(
        &self,
        request: ApiRequest,
        refresh_cycles: u32,
    ) -> Result<Option<serde_json::Value>, GatewayError> {
        if let Some(limit) = self.refresh_cycle_limit {
            if refresh_cycles >= limit {
                tracing::warn!(path = %request.path, cycles = refresh_cycles, "Refresh cycle limit reached");
                return Err(GatewayError::RefreshLimitExceeded {
                    cycles: refresh_cycles,
                });
            }
        }

        // The check-and-set below happens before the first suspension point.
        let mut state = self.refresh.borrow_mut();
        if let RefreshState::Refreshing(pending) = &mut *state {
            let (resolver, receiver) = oneshot::channel();
            pending.push(PendingRequest { request, resolver });
            tracing::debug!(pending = pending.len(), "Queued request behind in-flight refresh");
            drop(state);

            let request = receiver.await.map_err(|_| GatewayError::RefreshAbandoned)??;
            return self
                .send_with_cycles(request.with_refreshed_auth(), refresh_cycles + 1)
                .await;
        }
        *state = RefreshState::Refreshing(Vec::new());
        drop(state);

        let cycle = RefreshCycleGuard {
            state: &self.refresh,
            finished: false,
        };
        let outcome = self.refresh_credentials().await;
        let pending = cycle.finish();

        match outcome {
            Ok(()) => {
                tracing::info!(replayed = pending.len() + 1, "Credentials refreshed");
                for record in pending {
                    if record.resolver.send(Ok(record.request)).is_err() {
                        tracing::debug!("Queued caller dropped before replay");
                    }
                }
                self.send_with_cycles(request.with_refreshed_auth(), refresh_cycles + 1)
                    .await
            }
            Err(error) => {
                tracing::info!(error = %error, rejected = pending.len() + 1, "Credential refresh failed");
                for record in pending {
                    if record.resolver.send(Err(error.clone())).is_err() {
                        tracing::debug!("Queued caller dropped before refresh failure");
                    }
                }
                Err(error)
            }
        }
    }

    async fn refresh_credentials(&self) -> Result<(), GatewayError> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .ok_or(GatewayError::RefreshUnavailable)?;

        let request = TransportRequest {
            method: HttpMethod::Post,
            url: self.endpoint(REFRESH_PATH),
            headers: vec![
                (CONTENT_TYPE_HEADER.to_string(), JSON_CONTENT_TYPE.to_string()),
                (
                    "Authorization".to_string(),
                    format!("Bearer {refresh_token}"),
                ),
            ],
            body: None,
        };
        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            return Err(GatewayError::RefreshRejected {
                status: response.status,
            });
        }

        let payload: RefreshPayload =
            serde_json::from_slice(&response.body).map_err(|_| GatewayError::RefreshMalformed)?;
        let access_token = payload.access_token.filter(|token| !token.is_empty());
        let refresh_token = payload.refresh_token.filter(|token| !token.is_empty());
        let (Some(access_token), Some(refresh_token)) = (access_token, refresh_token) else {
            return Err(GatewayError::RefreshMalformed);
        };

        self.tokens
            .set_tokens(TokenUpdate::both(access_token, refresh_token));
        Ok(())
    }

    fn compose(&self, request: &ApiRequest) -> Result<TransportRequest, GatewayError> {
        let mut headers = Vec::with_capacity(request.headers.len() + 2);
        let mut body = None;

        if let RequestBody::Binary(payload) = &request.body {
            headers.extend(request.headers.iter().cloned());
            if request.method.allows_body() {
                body = Some(payload.clone());
            }
        } else {
            let content_type = request
                .header_value(CONTENT_TYPE_HEADER)
                .unwrap_or(JSON_CONTENT_TYPE)
                .to_string();
            headers.push((CONTENT_TYPE_HEADER.to_string(), content_type));
            headers.extend(
                request
                    .headers
                    .iter()
                    .filter(|(name, _)| !name.eq_ignore_ascii_case(CONTENT_TYPE_HEADER))
                    .cloned(),
            );
            if request.method.allows_body() {
                body = match &request.body {
                    RequestBody::Empty | RequestBody::Binary(_) => None,
                    RequestBody::Json(value) => {
                        Some(serde_json::to_vec(value).map_err(|error| GatewayError::Encode {
                            message: error.to_string(),
                        })?)
                    }
                    RequestBody::Text(text) => Some(text.clone().into_bytes()),
                };
            }
        }

        if request.require_auth {
            if let Some(access_token) = self.tokens.access_token() {
                headers.push((
                    "Authorization".to_string(),
                    format!("Bearer {access_token}"),
                ));
            }
        }

        Ok(TransportRequest {
            method: request.method,
            url: self.endpoint(&request.path),
            headers,
            body,
        })
    }
}

fn decode_success_body(
    response: &TransportResponse,
) -> Result<Option<serde_json::Value>, GatewayError> {
    if !response.is_json() || response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&response.body)
        .map(Some)
        .map_err(|error| GatewayError::Decode {
            message: error.to_string(),
        })
}

fn error_message_from_body(body: &serde_json::Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(serde_json::Value::as_str) {
        return non_empty_trimmed(message);
    }
    match body.get("detail")? {
        serde_json::Value::String(detail) => non_empty_trimmed(detail),
        serde_json::Value::Null => None,
        detail => Some(detail.to_string()),
    }
}

fn non_empty_trimmed(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
