use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::models::{NewsId, NewsItem, UserId};

#[derive(Debug, Default)]
struct Feed {
    items: Vec<NewsItem>,
    // placeholder items share ids with real rows and must never be written
    placeholder: bool,
}

/// Last known-good news list, most recent first. Clones share the same list.
#[derive(Debug, Clone)]
pub struct FeedCache {
    feed: Arc<RwLock<Feed>>,
    revision: Arc<watch::Sender<u64>>,
}

/// Result of [`FeedCache::flip_reaction`].
#[derive(Debug)]
pub(crate) struct Flip {
    pub will_react: bool,
    pub before: BTreeSet<UserId>,
    pub after: BTreeSet<UserId>,
    pub placeholder: bool,
}

impl Default for FeedCache {
    fn default() -> Self {
        let (revision, _rx) = watch::channel(0);
        Self {
            feed: Arc::default(),
            revision: Arc::new(revision),
        }
    }
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Receiver woken after every mutation, for the rendering layer.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Full replace, never a merge.
    pub async fn load(&self, items: Vec<NewsItem>) {
        self.replace(items, false).await;
    }

    /// Full replace with local placeholder content. Reactions on these items
    /// are kept on this device only.
    pub async fn load_placeholder(&self, items: Vec<NewsItem>) {
        self.replace(items, true).await;
    }

    async fn replace(&self, mut items: Vec<NewsItem>, placeholder: bool) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        *self.feed.write().await = Feed { items, placeholder };
        self.bump();
    }

    pub async fn is_placeholder(&self) -> bool {
        self.feed.read().await.placeholder
    }

    /// No-op (returns `false`) when the item is not cached any more.
    pub async fn apply_reaction_toggle(
        &self,
        id: NewsId,
        user: &UserId,
        now_reacting: bool,
    ) -> bool {
        let mut feed = self.feed.write().await;
        let Some(item) = feed.items.iter_mut().find(|item| item.id == id) else {
            debug!(item = %id, "reaction target not in cache");
            return false;
        };
        item.set_reaction(user, now_reacting);
        drop(feed);
        self.bump();
        true
    }

    /// Flips `user`'s membership as one step and returns the sets on both
    /// sides of the flip.
    pub(crate) async fn flip_reaction(&self, id: NewsId, user: &UserId) -> Option<Flip> {
        let mut feed = self.feed.write().await;
        let placeholder = feed.placeholder;
        let item = feed.items.iter_mut().find(|item| item.id == id)?;
        let before = item.reacting_users().clone();
        let will_react = !item.has_reacted(user);
        item.set_reaction(user, will_react);
        let after = item.reacting_users().clone();
        drop(feed);
        self.bump();
        Some(Flip {
            will_react,
            before,
            after,
            placeholder,
        })
    }

    pub async fn get(&self, id: NewsId) -> Option<NewsItem> {
        self.feed
            .read()
            .await
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub async fn snapshot(&self) -> Vec<NewsItem> {
        self.feed.read().await.items.clone()
    }

    pub async fn len(&self) -> usize {
        self.feed.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.feed.read().await.items.is_empty()
    }
}
