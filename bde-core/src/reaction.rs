//! Optimistic "like" toggling on news items.
//!
//! A toggle mutates the [`FeedCache`] before any network round-trip, then a
//! background write sends the item's whole reacting-user set to the backend.
//! Writes for one item go out one at a time; a write that already has a newer
//! toggle queued behind it is dropped because the newer one carries the full
//! set anyway. When a write fails and nothing newer is queued, the user's
//! membership is put back to what the backend last confirmed.
//!
//! Placeholder items loaded after a failed fetch reuse ids of real rows, so
//! toggles on them never reach the backend.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::FeedCache;
use crate::error::ReactionError;
use crate::models::{NewsId, UserId};
use crate::remote::RemoteStore;
use crate::session::SessionProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionState {
    NotReacted,
    Reacted,
}

impl From<bool> for ReactionState {
    fn from(reacting: bool) -> Self {
        if reacting {
            ReactionState::Reacted
        } else {
            ReactionState::NotReacted
        }
    }
}

impl ReactionState {
    pub fn is_reacted(self) -> bool {
        self == ReactionState::Reacted
    }
}

/// How a background write ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The backend stored the set.
    Confirmed,
    /// Skipped: a newer toggle on the same item writes the full set instead.
    Superseded,
    /// The backend refused; the local toggle was rolled back.
    Reverted,
    /// The backend refused, but a newer toggle already owns the item's
    /// reconciliation.
    Deferred,
    /// Placeholder item: the toggle stays on this device, nothing was sent.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub item: NewsId,
    pub user: UserId,
    pub outcome: Reconciliation,
}

/// Handle on the in-flight write of one toggle.
#[derive(Debug)]
pub struct PendingWrite {
    join: JoinHandle<Reconciliation>,
}

impl PendingWrite {
    pub async fn outcome(self) -> Result<Reconciliation, ReactionError> {
        self.join.await.map_err(ReactionError::from)
    }
}

#[derive(Debug)]
pub enum ToggleOutcome {
    /// No signed-in user; nothing changed.
    Unauthenticated,
    /// The item is not in the cache (a refresh dropped it); nothing changed.
    UnknownItem,
    /// Applied locally; `pending` resolves once the backend answered.
    Applied {
        state: ReactionState,
        count: usize,
        pending: PendingWrite,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionView {
    pub state: ReactionState,
    pub count: usize,
}

#[derive(Debug, Default)]
struct ItemSync {
    // bumped by every optimistic toggle on the item
    version: u64,
    in_flight: usize,
    confirmed: BTreeSet<UserId>,
    write_lock: Arc<Mutex<()>>,
}

#[derive(Clone)]
pub struct ReactionController {
    cache: FeedCache,
    store: Arc<dyn RemoteStore>,
    session: SessionProvider,
    items: Arc<Mutex<HashMap<NewsId, ItemSync>>>,
    events: broadcast::Sender<ReactionEvent>,
}

impl ReactionController {
    pub fn new(cache: FeedCache, store: Arc<dyn RemoteStore>, session: SessionProvider) -> Self {
        let (events, _rx) = broadcast::channel(64);
        Self {
            cache,
            store,
            session,
            items: Arc::default(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReactionEvent> {
        self.events.subscribe()
    }

    /// Current user's state and the count for rendering.
    pub async fn view(&self, id: NewsId) -> Option<ReactionView> {
        let item = self.cache.get(id).await?;
        let state = self
            .session
            .user_id()
            .map(|user| ReactionState::from(item.has_reacted(&user)))
            .unwrap_or(ReactionState::NotReacted);
        Some(ReactionView {
            state,
            count: item.reaction_count(),
        })
    }

    pub async fn is_pending(&self, id: NewsId) -> bool {
        self.items
            .lock()
            .await
            .get(&id)
            .map(|sync| sync.in_flight > 0)
            .unwrap_or(false)
    }

    pub async fn toggle(&self, id: NewsId) -> ToggleOutcome {
        let Some(user) = self.session.user_id() else {
            debug!(item = %id, "ignoring reaction from signed-out user");
            return ToggleOutcome::Unauthenticated;
        };

        // Held across the cache flip so version order matches toggle order.
        let mut items = self.items.lock().await;
        let Some(flip) = self.cache.flip_reaction(id, &user).await else {
            debug!(item = %id, "reaction target no longer cached");
            return ToggleOutcome::UnknownItem;
        };
        let state = ReactionState::from(flip.will_react);
        let count = flip.after.len();

        if flip.placeholder {
            drop(items);
            debug!(item = %id, "placeholder item, reaction kept locally");
            let controller = self.clone();
            let join =
                tokio::spawn(async move { controller.emit(id, user, Reconciliation::Local) });
            return ToggleOutcome::Applied {
                state,
                count,
                pending: PendingWrite { join },
            };
        }

        let sync = items.entry(id).or_default();
        if sync.in_flight == 0 {
            sync.confirmed = flip.before;
        }
        sync.in_flight += 1;
        sync.version += 1;
        let version = sync.version;
        let write_lock = sync.write_lock.clone();
        drop(items);

        let users = flip.after;
        let controller = self.clone();
        let join = tokio::spawn(async move {
            controller
                .write(id, user, version, users, write_lock)
                .await
        });

        ToggleOutcome::Applied {
            state,
            count,
            pending: PendingWrite { join },
        }
    }

    async fn write(
        self,
        id: NewsId,
        user: UserId,
        version: u64,
        users: BTreeSet<UserId>,
        write_lock: Arc<Mutex<()>>,
    ) -> Reconciliation {
        let _turn = write_lock.lock().await;

        if self.latest_version(id).await != version {
            self.settle(id).await;
            return self.emit(id, user, Reconciliation::Superseded);
        }

        let result = self.store.update_news_reactions(id, &users).await;

        let mut items = self.items.lock().await;
        let Some(sync) = items.get_mut(&id) else {
            return self.emit(id, user, Reconciliation::Superseded);
        };
        sync.in_flight = sync.in_flight.saturating_sub(1);
        let outcome = match result {
            Ok(()) => {
                sync.confirmed = users;
                Reconciliation::Confirmed
            }
            Err(e) if sync.version == version => {
                warn!(item = %id, error = %e, "reaction update failed, reverting");
                let confirmed = sync.confirmed.contains(&user);
                self.cache.apply_reaction_toggle(id, &user, confirmed).await;
                Reconciliation::Reverted
            }
            Err(e) => {
                warn!(item = %id, error = %e, "reaction update failed, newer toggle pending");
                Reconciliation::Deferred
            }
        };
        drop(items);
        info!(item = %id, ?outcome, "reaction reconciled");
        self.emit(id, user, outcome)
    }

    async fn latest_version(&self, id: NewsId) -> u64 {
        self.items
            .lock()
            .await
            .get(&id)
            .map(|sync| sync.version)
            .unwrap_or(0)
    }

    async fn settle(&self, id: NewsId) {
        if let Some(sync) = self.items.lock().await.get_mut(&id) {
            sync.in_flight = sync.in_flight.saturating_sub(1);
        }
    }

    fn emit(&self, item: NewsId, user: UserId, outcome: Reconciliation) -> Reconciliation {
        let _ = self.events.send(ReactionEvent {
            item,
            user,
            outcome,
        });
        outcome
    }
}
