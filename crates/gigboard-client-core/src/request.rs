use crate::transport::HttpMethod;

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized with `serde_json` when the method allows a body.
    Json(serde_json::Value),
    /// Pre-encoded text sent verbatim, e.g. a url-encoded form.
    Text(String),
    /// Multipart or other binary payload. Headers pass through untouched and
    /// no content type is added.
    Binary(Vec<u8>),
}

/// One logical API call, kept intact so it can be replayed after a
/// credential refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub path: String,
    pub method: HttpMethod,
    pub body: RequestBody,
    pub headers: Vec<(String, String)>,
    pub require_auth: bool,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: RequestBody::Empty,
            headers: Vec::new(),
            require_auth: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    pub fn binary(mut self, body: Vec<u8>) -> Self {
        self.body = RequestBody::Binary(body);
        self
    }

    /// Url-encodes `pairs` and marks the request as a form submission.
    pub fn form<'a>(self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.text(encoded).header(CONTENT_TYPE_HEADER, FORM_CONTENT_TYPE)
    }

    /// Sets a header, replacing any existing value with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.require_auth = false;
        self
    }

    /// Replays after a credential refresh always carry the new access token.
    #[must_use]
    pub fn with_refreshed_auth(mut self) -> Self {
        self.require_auth = true;
        self
    }

    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
