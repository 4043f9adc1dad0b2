use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::gateway::{GatewayError, RequestGateway};
use crate::request::ApiRequest;
use crate::storage::{DurableStorage, ROLE_KEY, USER_ID_KEY};
use crate::tokens::{TokenStore, TokenUpdate};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const REGISTER_CONTRACTOR_PATH: &str = "/auth/register/contractor";
pub const REGISTER_CONTRACTEE_PATH: &str = "/auth/register/contractee";
pub const CURRENT_USER_PATH: &str = "/users/me";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Guest,
    Contractor,
    Contractee,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Self::Guest, Self::Contractor, Self::Contractee, Self::Admin];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Contractor => "contractor",
            Self::Contractee => "contractee",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "guest" => Some(Self::Guest),
            "contractor" => Some(Self::Contractor),
            "contractee" => Some(Self::Contractee),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_guest(self) -> bool {
        matches!(self, Self::Guest)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads the persisted role flag; absent or unrecognized values are guests.
#[must_use]
pub fn persisted_role(storage: &dyn DurableStorage) -> Role {
    storage
        .get(ROLE_KEY)
        .as_deref()
        .and_then(Role::parse)
        .unwrap_or_default()
}

pub fn persist_role(storage: &dyn DurableStorage, role: Role) {
    storage.set(ROLE_KEY, role.as_str());
}

#[must_use]
pub fn persisted_user_id(storage: &dyn DurableStorage) -> Option<String> {
    storage.get(USER_ID_KEY).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthInputError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("password must not be empty")]
    EmptyPassword,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Input(#[from] AuthInputError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("auth response did not contain a session")]
    MissingSession,
    #[error("current user has unknown role `{0}`")]
    UnknownRole(String),
}

impl AuthError {
    #[must_use]
    pub fn is_refresh_failure(&self) -> bool {
        matches!(self, Self::Gateway(error) if error.is_refresh_failure())
    }
}

/// Tokens and identity issued by login or registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthSession {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_identity")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    token: Option<AuthSession>,
}

#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    role: String,
}

pub fn normalize_username(raw: &str) -> Result<String, AuthInputError> {
    let normalized = raw.trim();
    if normalized.is_empty() {
        return Err(AuthInputError::EmptyUsername);
    }
    Ok(normalized.to_string())
}

/// Login, registration and logout on top of the request gateway.
pub struct AuthSessionManager {
    gateway: Rc<RequestGateway>,
    tokens: Rc<TokenStore>,
    storage: Rc<dyn DurableStorage>,
}

impl AuthSessionManager {
    pub fn new(
        gateway: Rc<RequestGateway>,
        tokens: Rc<TokenStore>,
        storage: Rc<dyn DurableStorage>,
    ) -> Self {
        Self {
            gateway,
            tokens,
            storage,
        }
    }

    /// Submits the credentials as a form.
    ///
    /// Wrong credentials come back as 401 and go through the refresh
    /// protocol like any other request, so for a guest they surface as
    /// [`GatewayError::RefreshUnavailable`]. Callers showing a login form
    /// should read that as "invalid credentials".
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession, AuthError> {
        let username = normalize_username(username)?;
        if password.is_empty() {
            return Err(AuthInputError::EmptyPassword.into());
        }

        let request =
            ApiRequest::post(LOGIN_PATH).form([("username", username.as_str()), ("password", password)]);
        let session: AuthSession = self.gateway.send_json(request).await?;
        self.store_session(&session);
        tracing::info!(user_id = ?session.user_id, "Logged in");
        Ok(session)
    }

    pub async fn register_contractor(
        &self,
        profile: serde_json::Value,
    ) -> Result<AuthSession, AuthError> {
        self.register(REGISTER_CONTRACTOR_PATH, profile).await
    }

    pub async fn register_contractee(
        &self,
        profile: serde_json::Value,
    ) -> Result<AuthSession, AuthError> {
        self.register(REGISTER_CONTRACTEE_PATH, profile).await
    }

    async fn register(
        &self,
        path: &str,
        profile: serde_json::Value,
    ) -> Result<AuthSession, AuthError> {
        let response: RegistrationResponse = self
            .gateway
            .send_json(ApiRequest::post(path).json(profile))
            .await?;
        let session = response.token.ok_or(AuthError::MissingSession)?;
        self.store_session(&session);
        tracing::info!(user_id = ?session.user_id, path, "Registered");
        Ok(session)
    }

    /// Fetches the current user's role and persists it as the role flag.
    pub async fn resolve_role(&self) -> Result<Role, AuthError> {
        let user: CurrentUserResponse = self
            .gateway
            .send_json(ApiRequest::get(CURRENT_USER_PATH))
            .await?;
        let role = Role::parse(&user.role).ok_or(AuthError::UnknownRole(user.role))?;
        persist_role(self.storage.as_ref(), role);
        Ok(role)
    }

    /// Notifies the server, then forgets local credentials whatever the
    /// server outcome was. The server error, if any, is still returned.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let outcome = self.gateway.send(ApiRequest::post(LOGOUT_PATH)).await;
        self.forget_local_session();
        match outcome {
            Ok(_) => {
                tracing::info!("Logged out");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(error = %error, "Server logout failed; local session cleared");
                Err(error.into())
            }
        }
    }

    /// Drops credentials, identity and role without contacting the server.
    pub fn forget_local_session(&self) {
        self.tokens.clear();
        self.storage.remove(USER_ID_KEY);
        self.storage.remove(ROLE_KEY);
    }

    #[must_use]
    pub fn gateway(&self) -> &Rc<RequestGateway> {
        &self.gateway
    }

    #[must_use]
    pub fn current_role(&self) -> Role {
        persisted_role(self.storage.as_ref())
    }

    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        persisted_user_id(self.storage.as_ref())
    }

    fn store_session(&self, session: &AuthSession) {
        if let (Some(access_token), Some(refresh_token)) =
            (&session.access_token, &session.refresh_token)
        {
            self.tokens
                .set_tokens(TokenUpdate::both(access_token.clone(), refresh_token.clone()));
        }
        if let Some(user_id) = &session.user_id {
            self.storage.set(USER_ID_KEY, user_id);
        }
    }
}

fn deserialize_identity<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(id)) if !id.is_empty() => Some(id),
        Some(serde_json::Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}
