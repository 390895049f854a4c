use std::sync::Arc;

use tracing::{info, warn};

use crate::error::AuthError;
use crate::remote::AuthApi;
use crate::session::{Session, SessionProvider, SessionStore};

pub const CODE_LENGTH: usize = 6;

/// Email one-time-password login.
#[derive(Clone)]
pub struct AuthService {
    api: Arc<dyn AuthApi>,
    session: SessionProvider,
    store: Option<SessionStore>,
}

impl AuthService {
    pub fn new(api: Arc<dyn AuthApi>, session: SessionProvider) -> Self {
        Self {
            api,
            session,
            store: None,
        }
    }

    /// Persist sessions so the next start resumes signed in.
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Publishes the persisted session, if any.
    pub async fn restore(&self) -> Option<Session> {
        let session = self.store.as_ref()?.load().await?;
        self.session.set(Some(session.clone()));
        Some(session)
    }

    pub async fn request_code(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::EmptyEmail);
        }
        self.api.request_code(email).await?;
        info!(email, "login code requested");
        Ok(())
    }

    pub async fn verify_code(&self, email: &str, code: &str) -> Result<Session, AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::EmptyEmail);
        }
        let code = code.trim();
        if code.len() != CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AuthError::InvalidCode);
        }
        let session = self.api.verify_code(email, code).await?;
        if let Some(store) = &self.store {
            store.save(&session).await?;
        }
        info!(user = %session.user_id, "signed in");
        self.session.set(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.session.current() {
            if let Err(e) = self.api.sign_out(&session).await {
                warn!(error = %e, "backend sign-out failed, clearing local session anyway");
            }
        }
        self.session.set(None);
        if let Some(store) = &self.store {
            store.clear().await?;
        }
        Ok(())
    }
}
