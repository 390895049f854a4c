use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProfileError;
use crate::models::Profile;
use crate::remote::RemoteStore;
use crate::session::SessionProvider;

pub(crate) fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or_default()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

/// Editable first/last name fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
}

impl ProfileForm {
    /// Stored names win; otherwise guess from a `first.last@…` address.
    pub fn prefill(profile: Option<&Profile>, email: Option<&str>) -> Self {
        let mut guessed = email
            .map(email_local_part)
            .unwrap_or_default()
            .split('.')
            .map(str::to_uppercase);
        let first_guess = guessed.next().unwrap_or_default();
        let last_guess = guessed.next().unwrap_or_default();

        Self {
            first_name: non_empty(profile.and_then(|p| p.first_name.as_ref()))
                .unwrap_or(first_guess),
            last_name: non_empty(profile.and_then(|p| p.last_name.as_ref()))
                .unwrap_or(last_guess),
        }
    }
}

/// Signed-in member's profile, kept in sync with the session.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn RemoteStore>,
    session: SessionProvider,
    current: Arc<RwLock<Option<Profile>>>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn RemoteStore>, session: SessionProvider) -> Self {
        Self {
            store,
            session,
            current: Arc::default(),
        }
    }

    pub async fn current(&self) -> Option<Profile> {
        self.current.read().await.clone()
    }

    pub async fn refresh(&self) -> Result<Option<Profile>, ProfileError> {
        let user = self.session.user_id().ok_or(ProfileError::NotSignedIn)?;
        let profile = self.store.fetch_profile(&user).await?;
        *self.current.write().await = profile.clone();
        Ok(profile)
    }

    pub async fn form(&self) -> ProfileForm {
        let email = self.session.current().and_then(|s| s.email);
        ProfileForm::prefill(self.current().await.as_ref(), email.as_deref())
    }

    pub async fn save(&self, form: &ProfileForm) -> Result<Profile, ProfileError> {
        let user = self.session.user_id().ok_or(ProfileError::NotSignedIn)?;
        let profile = Profile {
            id: user,
            first_name: Some(form.first_name.trim().to_owned()),
            last_name: Some(form.last_name.trim().to_owned()),
            updated_at: Some(Utc::now()),
        };
        self.store.upsert_profile(&profile).await?;
        Ok(self.refresh().await?.unwrap_or(profile))
    }

    /// Reloads the profile on sign-in and forgets it on sign-out.
    pub fn follow_session(&self) -> JoinHandle<()> {
        let service = self.clone();
        let mut rx = self.session.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let signed_in = rx.borrow_and_update().is_some();
                if signed_in {
                    if let Err(e) = service.refresh().await {
                        warn!(error = %e, "failed to load profile");
                    }
                } else {
                    debug!("signed out, dropping profile");
                    *service.current.write().await = None;
                }
            }
        })
    }
}
