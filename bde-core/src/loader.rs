use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::cache::FeedCache;
use crate::models::{NewsId, NewsItem};
use crate::reaction::ReactionState;
use crate::remote::RemoteStore;
use crate::session::SessionProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Remote,
    /// Fetch failed or came back empty; placeholder items were loaded.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub source: FeedSource,
    pub items: usize,
    /// Current user's state per item; empty when signed out.
    pub reacted: HashMap<NewsId, ReactionState>,
}

/// Placeholder news shown when the backend has nothing to offer.
pub fn fallback_news(now: DateTime<Utc>) -> Vec<NewsItem> {
    vec![
        NewsItem::new(
            NewsId(1),
            "Soirée d'intégration",
            "Rendez-vous ce jeudi à 20h ! N'oubliez pas vos préventes au BDE.",
            now,
        ),
        NewsItem::new(
            NewsId(2),
            "Nouveaux pulls de promo",
            "Les essayages auront lieu en salle 104.",
            now - Duration::days(1),
        ),
    ]
}

#[derive(Clone)]
pub struct FeedLoader {
    store: Arc<dyn RemoteStore>,
    cache: FeedCache,
    session: SessionProvider,
}

impl FeedLoader {
    pub fn new(store: Arc<dyn RemoteStore>, cache: FeedCache, session: SessionProvider) -> Self {
        Self {
            store,
            cache,
            session,
        }
    }

    pub async fn load(&self) -> LoadReport {
        let (items, source) = match self.store.fetch_news().await {
            Ok(items) if !items.is_empty() => (items, FeedSource::Remote),
            Ok(_) => {
                info!("news feed is empty, using placeholder items");
                (fallback_news(Utc::now()), FeedSource::Fallback)
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch news, using placeholder items");
                (fallback_news(Utc::now()), FeedSource::Fallback)
            }
        };

        let reacted = match self.session.user_id() {
            Some(user) => items
                .iter()
                .map(|item| (item.id, ReactionState::from(item.has_reacted(&user))))
                .collect(),
            None => HashMap::new(),
        };
        let count = items.len();
        match source {
            FeedSource::Remote => self.cache.load(items).await,
            FeedSource::Fallback => self.cache.load_placeholder(items).await,
        }

        LoadReport {
            source,
            items: count,
            reacted,
        }
    }
}
