use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Source of truth for "who is signed in". Clones share the same state, and
/// every component gets one passed in rather than reaching for a global.
#[derive(Debug, Clone)]
pub struct SessionProvider {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionProvider {
    pub fn new(initial: Option<Session>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.tx.borrow().as_ref().map(|s| s.user_id.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn set(&self, session: Option<Session>) {
        debug!(signed_in = session.is_some(), "session changed");
        self.tx.send_replace(session);
    }

    /// Receiver woken on every sign-in / sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    pub fn screen_set(&self) -> ScreenSet {
        ScreenSet::for_session(self.tx.borrow().as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    News,
    Perks,
    Card,
    Profile,
}

/// Which group of screens the navigation host shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenSet {
    /// Login then code verification.
    Auth,
    /// Tabbed member area, opening on `initial`.
    App { initial: Tab },
}

impl ScreenSet {
    pub fn for_session(session: Option<&Session>) -> Self {
        match session {
            Some(_) => ScreenSet::App { initial: Tab::News },
            None => ScreenSet::Auth,
        }
    }
}

/// Session persisted as JSON so a restart resumes the login.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("session.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means signed out. A corrupt file falls back to the
    /// temp file left by an interrupted save.
    pub async fn load(&self) -> Option<Session> {
        let bytes = tokio::fs::read(&self.path).await.ok()?;
        match serde_json::from_slice::<Option<Session>>(&bytes) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "failed to parse session, trying tmp fallback");
                let tmp = self.path.with_extension("json.tmp");
                let tmp_bytes = tokio::fs::read(&tmp).await.ok()?;
                serde_json::from_slice::<Option<Session>>(&tmp_bytes)
                    .ok()
                    .flatten()
            }
        }
    }

    pub async fn save(&self, session: &Session) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(session)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Ecriture atomique
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }

    pub async fn clear(&self) -> std::io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user: &str) -> Session {
        Session {
            user_id: UserId::from(user),
            email: Some(format!("{user}@iut-dijon.u-bourgogne.fr")),
            access_token: "token".into(),
            refresh_token: None,
        }
    }

    #[tokio::test]
    async fn subscribers_see_sign_in_and_sign_out() {
        let provider = SessionProvider::default();
        let mut rx = provider.subscribe();
        assert_eq!(provider.screen_set(), ScreenSet::Auth);

        provider.set(Some(session("u1")));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|s| s.user_id.0.as_str()), Some("u1"));
        assert_eq!(provider.screen_set(), ScreenSet::App { initial: Tab::News });

        provider.set(None);
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(!provider.is_authenticated());
    }

    #[tokio::test]
    async fn store_round_trips_and_clears() {
        let dir = std::env::temp_dir().join(format!("bde_session_{}", std::process::id()));
        let store = SessionStore::in_dir(&dir);
        assert_eq!(store.load().await, None);

        store.save(&session("u2")).await.unwrap();
        assert_eq!(store.load().await, Some(session("u2")));

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await, None);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
