pub mod auth;
pub mod cache;
pub mod card;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod perks;
pub mod profile;
pub mod reaction;
pub mod remote;
pub mod session;

pub use auth::AuthService;
pub use cache::FeedCache;
pub use card::MemberCard;
pub use config::AppConfig;
pub use error::{AuthError, ConfigError, ProfileError, ReactionError, RemoteError};
pub use loader::{fallback_news, FeedLoader, FeedSource, LoadReport};
pub use models::{NewsId, NewsItem, Perk, Profile, UserId};
pub use perks::{fallback_perks, MapRegion, PerkDirectory, ViewMode};
pub use profile::{ProfileForm, ProfileService};
pub use reaction::{
    PendingWrite, ReactionController, ReactionEvent, ReactionState, ReactionView, Reconciliation,
    ToggleOutcome,
};
pub use remote::{AuthApi, MemoryBackend, RemoteStore, RestBackend};
pub use session::{ScreenSet, Session, SessionProvider, SessionStore, Tab};
