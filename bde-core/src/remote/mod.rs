//! Seams towards the managed backend: row storage for the `news`, `perks`
//! and `profiles` collections, and the email one-time-password auth API.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{NewsId, NewsItem, Perk, Profile, UserId};
use crate::session::Session;

pub mod memory;
pub mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All news items, most recent first.
    async fn fetch_news(&self) -> Result<Vec<NewsItem>, RemoteError>;

    /// Overwrites the item's whole reacting-user set.
    async fn update_news_reactions(
        &self,
        id: NewsId,
        users: &BTreeSet<UserId>,
    ) -> Result<(), RemoteError>;

    async fn fetch_perks(&self) -> Result<Vec<Perk>, RemoteError>;

    async fn fetch_profile(&self, user: &UserId) -> Result<Option<Profile>, RemoteError>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn request_code(&self, email: &str) -> Result<(), RemoteError>;

    async fn verify_code(&self, email: &str, code: &str) -> Result<Session, RemoteError>;

    async fn sign_out(&self, session: &Session) -> Result<(), RemoteError>;
}
