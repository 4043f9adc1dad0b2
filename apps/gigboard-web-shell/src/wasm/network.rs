use async_trait::async_trait;
use gigboard_client_core::{
    HttpMethod, HttpTransport, TransportError, TransportRequest, TransportResponse,
};
use gloo_net::http::Request;

/// `fetch` through gloo-net.
pub(super) struct FetchTransport;

fn map_network_error(error: gloo_net::Error) -> TransportError {
    TransportError::new(error.to_string())
}

#[async_trait(?Send)]
impl HttpTransport for FetchTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => Request::get(&request.url),
            HttpMethod::Post => Request::post(&request.url),
            HttpMethod::Patch => Request::patch(&request.url),
            HttpMethod::Put => Request::put(&request.url),
            HttpMethod::Delete => Request::delete(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = match request.body {
            Some(body) => {
                let payload = js_sys::Uint8Array::from(body.as_slice());
                builder
                    .body(payload)
                    .map_err(map_network_error)?
                    .send()
                    .await
            }
            None => builder.send().await,
        }
        .map_err(map_network_error)?;

        let status = response.status();
        let content_type = response.headers().get("content-type");
        let body = response.binary().await.map_err(map_network_error)?;
        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}
