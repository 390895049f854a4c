use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use crate::error::RemoteError;
use crate::models::{NewsId, NewsItem, Perk, Profile, UserId};
use crate::remote::{AuthApi, RemoteStore};
use crate::session::Session;

#[derive(Debug, Default)]
struct MemoryData {
    news: Vec<NewsItem>,
    perks: Vec<Perk>,
    profiles: HashMap<UserId, Profile>,
    fail_fetches: bool,
    failing_updates: usize,
    updates: Vec<(NewsId, BTreeSet<UserId>)>,
    accepted_code: Option<String>,
    codes_requested: Vec<String>,
}

/// In-process backend. Writes can be held in flight and made to fail so the
/// optimistic paths can be driven deterministically.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryData>>,
    update_gate: Arc<std::sync::Mutex<Option<Arc<Semaphore>>>>,
}

impl MemoryBackend {
    pub fn new(news: Vec<NewsItem>, perks: Vec<Perk>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryData {
                news,
                perks,
                ..MemoryData::default()
            })),
            update_gate: Arc::default(),
        }
    }

    pub async fn set_fetch_failure(&self, fail: bool) {
        self.inner.lock().await.fail_fetches = fail;
    }

    /// The next `count` reaction updates are rejected.
    pub async fn fail_next_updates(&self, count: usize) {
        self.inner.lock().await.failing_updates = count;
    }

    /// Accepts `code` for any email that requested one.
    pub async fn accept_code(&self, code: &str) {
        self.inner.lock().await.accepted_code = Some(code.to_owned());
    }

    pub async fn codes_requested(&self) -> Vec<String> {
        self.inner.lock().await.codes_requested.clone()
    }

    /// Reaction updates received so far, in arrival order.
    pub async fn updates(&self) -> Vec<(NewsId, BTreeSet<UserId>)> {
        self.inner.lock().await.updates.clone()
    }

    pub async fn news_item(&self, id: NewsId) -> Option<NewsItem> {
        self.inner
            .lock()
            .await
            .news
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub async fn profile(&self, user: &UserId) -> Option<Profile> {
        self.inner.lock().await.profiles.get(user).cloned()
    }

    /// Parks every reaction update until [`release_updates`](Self::release_updates).
    pub fn hold_updates(&self) {
        if let Ok(mut gate) = self.update_gate.lock() {
            *gate = Some(Arc::new(Semaphore::new(0)));
        }
    }

    /// Lets `count` parked (or future) updates through.
    pub fn release_updates(&self, count: usize) {
        if let Ok(gate) = self.update_gate.lock() {
            if let Some(semaphore) = gate.as_ref() {
                semaphore.add_permits(count);
            }
        }
    }

    fn current_gate(&self) -> Option<Arc<Semaphore>> {
        self.update_gate.lock().ok().and_then(|gate| gate.clone())
    }
}

#[async_trait]
impl RemoteStore for MemoryBackend {
    async fn fetch_news(&self) -> Result<Vec<NewsItem>, RemoteError> {
        let data = self.inner.lock().await;
        if data.fail_fetches {
            return Err(RemoteError::Unavailable("news fetch disabled".into()));
        }
        let mut news = data.news.clone();
        news.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(news)
    }

    async fn update_news_reactions(
        &self,
        id: NewsId,
        users: &BTreeSet<UserId>,
    ) -> Result<(), RemoteError> {
        if let Some(gate) = self.current_gate() {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        let mut data = self.inner.lock().await;
        if data.failing_updates > 0 {
            data.failing_updates -= 1;
            return Err(RemoteError::Status {
                status: 503,
                body: "update rejected".into(),
            });
        }
        let Some(item) = data.news.iter_mut().find(|item| item.id == id) else {
            return Err(RemoteError::NotFound(format!("news {id}")));
        };
        item.replace_reactions(users.clone());
        data.updates.push((id, users.clone()));
        Ok(())
    }

    async fn fetch_perks(&self) -> Result<Vec<Perk>, RemoteError> {
        let data = self.inner.lock().await;
        if data.fail_fetches {
            return Err(RemoteError::Unavailable("perks fetch disabled".into()));
        }
        Ok(data.perks.clone())
    }

    async fn fetch_profile(&self, user: &UserId) -> Result<Option<Profile>, RemoteError> {
        Ok(self.inner.lock().await.profiles.get(user).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), RemoteError> {
        self.inner
            .lock()
            .await
            .profiles
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }
}

#[async_trait]
impl AuthApi for MemoryBackend {
    async fn request_code(&self, email: &str) -> Result<(), RemoteError> {
        self.inner.lock().await.codes_requested.push(email.to_owned());
        Ok(())
    }

    async fn verify_code(&self, email: &str, code: &str) -> Result<Session, RemoteError> {
        let data = self.inner.lock().await;
        let requested = data.codes_requested.iter().any(|e| e == email);
        if !requested || data.accepted_code.as_deref() != Some(code) {
            return Err(RemoteError::Status {
                status: 403,
                body: "Token has expired or is invalid".into(),
            });
        }
        Ok(Session {
            user_id: UserId(format!("user-{email}")),
            email: Some(email.to_owned()),
            access_token: format!("token-{email}"),
            refresh_token: None,
        })
    }

    async fn sign_out(&self, _session: &Session) -> Result<(), RemoteError> {
        Ok(())
    }
}
