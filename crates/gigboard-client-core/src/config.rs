pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:80/api";
pub const ENV_API_BASE_URL: &str = "GIGBOARD_API_BASE_URL";
pub const ENV_REFRESH_CYCLE_LIMIT: &str = "GIGBOARD_REFRESH_CYCLE_LIMIT";
pub const DEFAULT_REFRESH_CYCLE_LIMIT: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("base url must not be empty")]
    EmptyBaseUrl,
    #[error("base url must use http:// or https:// and include a host")]
    InvalidBaseUrl,
    #[error("refresh cycle limit must be a non-negative integer or `unbounded`, got `{0}`")]
    InvalidRefreshCycleLimit(String),
}

/// Settings for a [`crate::gateway::RequestGateway`].
///
/// `refresh_cycle_limit` bounds how many refresh cycles a single logical
/// request may trigger. `None` keeps retrying on every 401 that follows a
/// successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub refresh_cycle_limit: Option<u32>,
}

impl GatewayConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Self::parse_base_url(base_url)?,
            refresh_cycle_limit: Some(DEFAULT_REFRESH_CYCLE_LIMIT),
        })
    }

    #[must_use]
    pub fn with_refresh_cycle_limit(mut self, limit: Option<u32>) -> Self {
        self.refresh_cycle_limit = limit;
        self
    }

    /// Builds a config from the process environment, falling back to the
    /// local default API origin. The second value names where the base URL
    /// came from.
    pub fn from_env() -> Result<(Self, &'static str), ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GatewayConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, &'static str), ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let (raw_base_url, source) = match var(ENV_API_BASE_URL) {
            Some(value) => (value, ENV_API_BASE_URL),
            None => (DEFAULT_API_BASE_URL.to_string(), "default_local"),
        };
        let refresh_cycle_limit = match var(ENV_REFRESH_CYCLE_LIMIT) {
            Some(raw) => parse_refresh_cycle_limit(&raw)?,
            None => Some(DEFAULT_REFRESH_CYCLE_LIMIT),
        };
        let config = Self::new(&raw_base_url)?.with_refresh_cycle_limit(refresh_cycle_limit);
        Ok((config, source))
    }

    /// Accepts absolute http(s) URLs with a host; surrounding whitespace and
    /// trailing slashes are dropped so paths can be appended directly.
    fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        let parsed = url::Url::parse(trimmed).map_err(|_| ConfigError::InvalidBaseUrl)?;
        let explicit_host = trimmed
            .split_once("://")
            .is_some_and(|(_, authority)| !authority.starts_with('/'));
        let web_scheme = matches!(parsed.scheme(), "http" | "https");
        if !web_scheme || !explicit_host || parsed.host_str().is_none() {
            return Err(ConfigError::InvalidBaseUrl);
        }
        Ok(trimmed.to_string())
    }
}

pub fn parse_refresh_cycle_limit(raw: &str) -> Result<Option<u32>, ConfigError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "unbounded" | "none" | "0" => Ok(None),
        value => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidRefreshCycleLimit(raw.trim().to_string())),
    }
}
