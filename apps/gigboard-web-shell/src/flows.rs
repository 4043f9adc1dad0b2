//! Sign-in and sign-out flows. Each completed flow is announced as a
//! [`SessionTransition`] instead of calling back into the bootstrapper.

use std::rc::Rc;

use gigboard_client_core::{ApiRequest, AuthError, AuthSessionManager, GatewayError, Role};

use crate::bootstrap::{SessionTransition, TransitionSender};

pub struct SessionFlows {
    auth: Rc<AuthSessionManager>,
    transitions: TransitionSender,
}

impl SessionFlows {
    pub fn new(auth: Rc<AuthSessionManager>, transitions: TransitionSender) -> Self {
        Self { auth, transitions }
    }

    #[must_use]
    pub fn auth(&self) -> &Rc<AuthSessionManager> {
        &self.auth
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Role, AuthError> {
        self.auth.login(username, password).await?;
        self.enter().await
    }

    pub async fn register_contractor(&self, profile: serde_json::Value) -> Result<Role, AuthError> {
        self.auth.register_contractor(profile).await?;
        self.enter().await
    }

    pub async fn register_contractee(&self, profile: serde_json::Value) -> Result<Role, AuthError> {
        self.auth.register_contractee(profile).await?;
        self.enter().await
    }

    /// Always ends on the guest table, even when the server call failed.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let outcome = self.auth.logout().await;
        self.emit(SessionTransition::signed_out());
        outcome
    }

    /// Sends `request` through the gateway, expiring the session when its
    /// credentials can no longer be refreshed.
    pub async fn request(
        &self,
        request: ApiRequest,
    ) -> Result<Option<serde_json::Value>, GatewayError> {
        let result = self.auth.gateway().send(request).await;
        self.observe(result)
    }

    /// Passes `result` through. A refresh failure additionally forgets the
    /// local session and announces the expiry.
    pub fn observe<T>(&self, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
        if let Err(error) = &result {
            if error.is_refresh_failure() {
                tracing::info!(error = %error, "Session expired");
                self.auth.forget_local_session();
                self.emit(SessionTransition::expired());
            }
        }
        result
    }

    async fn enter(&self) -> Result<Role, AuthError> {
        let role = self.auth.resolve_role().await?;
        self.emit(SessionTransition::signed_in());
        Ok(role)
    }

    fn emit(&self, transition: SessionTransition) {
        if self.transitions.unbounded_send(transition).is_err() {
            tracing::debug!("Session transition dropped; bootstrapper is gone");
        }
    }
}
