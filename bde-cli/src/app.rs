use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use bde_core::{
    AppConfig, AuthService, FeedCache, FeedLoader, FeedSource, MemberCard, NewsId, PerkDirectory,
    ProfileForm, ProfileService, ReactionController, ReactionState, Reconciliation, RemoteStore,
    RestBackend, ScreenSet, SessionProvider, SessionStore, ToggleOutcome,
};
use chrono::{Datelike, Utc};
use reqwest::Client;
use tracing::debug;

use crate::{Commands, ProfileCommand};

pub struct App {
    session: SessionProvider,
    auth: AuthService,
    cache: FeedCache,
    loader: FeedLoader,
    reactions: ReactionController,
    perks: PerkDirectory,
    profiles: ProfileService,
}

impl App {
    pub async fn init(config: &AppConfig, client: Client, data_dir: &Path) -> anyhow::Result<Self> {
        let session = SessionProvider::default();
        let backend = Arc::new(
            RestBackend::new(client, config, session.clone()).context("invalid backend url")?,
        );
        let store: Arc<dyn RemoteStore> = backend.clone();
        let auth = AuthService::new(backend, session.clone())
            .with_store(SessionStore::in_dir(data_dir));
        if auth.restore().await.is_some() {
            debug!("resumed stored session");
        }

        let cache = FeedCache::new();
        Ok(Self {
            loader: FeedLoader::new(store.clone(), cache.clone(), session.clone()),
            reactions: ReactionController::new(cache.clone(), store.clone(), session.clone()),
            perks: PerkDirectory::new(store.clone()),
            profiles: ProfileService::new(store, session.clone()),
            auth,
            cache,
            session,
        })
    }

    fn require_member_area(&self) -> anyhow::Result<()> {
        if self.session.screen_set() == ScreenSet::Auth {
            bail!("not signed in; run `bde login <email>` first");
        }
        Ok(())
    }

    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Login { email } => {
                self.auth.request_code(&email).await?;
                println!("Code envoyé à {}", email.trim());
            }
            Commands::Verify { email, code } => {
                let session = self.auth.verify_code(&email, &code).await?;
                println!("Connecté ({})", session.email.unwrap_or_default());
            }
            Commands::Logout => {
                self.auth.sign_out().await?;
                println!("Déconnecté");
            }
            Commands::News => {
                self.require_member_area()?;
                self.print_news().await;
            }
            Commands::Like { id } => {
                self.require_member_area()?;
                self.like(NewsId(id)).await?;
            }
            Commands::Perks { map } => {
                self.require_member_area()?;
                self.print_perks(map).await;
            }
            Commands::Card => {
                self.require_member_area()?;
                self.print_card().await;
            }
            Commands::Profile { action } => {
                self.require_member_area()?;
                self.profile(action).await?;
            }
        }
        Ok(())
    }

    async fn print_news(&self) {
        let report = self.loader.load().await;
        if report.source == FeedSource::Fallback {
            debug!("showing placeholder news");
        }
        println!("ACTUALITÉS - BDE MMI DIJON\n");
        for item in self.cache.snapshot().await {
            let heart = match report.reacted.get(&item.id) {
                Some(ReactionState::Reacted) => "♥",
                _ => "♡",
            };
            println!("[{}] {}", item.id, item.created_at.format("%d/%m/%Y"));
            println!("  {}", item.title);
            if !item.content.is_empty() {
                println!("  {}", item.content);
            }
            println!("  {heart} {}\n", item.reaction_count());
        }
    }

    async fn like(&self, id: NewsId) -> anyhow::Result<()> {
        self.loader.load().await;
        match self.reactions.toggle(id).await {
            ToggleOutcome::Unauthenticated => bail!("not signed in"),
            ToggleOutcome::UnknownItem => println!("Actualité {id} introuvable"),
            ToggleOutcome::Applied { pending, .. } => match pending.outcome().await? {
                Reconciliation::Reverted => bail!("le serveur a refusé la réaction"),
                Reconciliation::Local => {
                    println!("Actualités hors ligne, réaction non envoyée");
                    self.print_reaction(id).await;
                }
                _ => self.print_reaction(id).await,
            },
        }
        Ok(())
    }

    async fn print_reaction(&self, id: NewsId) {
        if let Some(view) = self.reactions.view(id).await {
            let heart = if view.state.is_reacted() { "♥" } else { "♡" };
            println!("{heart} {}", view.count);
        }
    }

    async fn print_perks(&self, map: bool) {
        self.perks.load().await;
        let perks = if map {
            self.perks.markers().await
        } else {
            self.perks.list().await
        };
        println!("AVANTAGES\n");
        for perk in perks {
            println!("{} - {}", perk.company, perk.title);
            println!("  {}", perk.description);
            if let (true, Some((lat, lon))) = (map, perk.coordinates()) {
                println!("  @ {lat:.5}, {lon:.5}");
            }
        }
    }

    async fn print_card(&self) {
        let Some(session) = self.session.current() else {
            return;
        };
        let profile = match self.profiles.refresh().await {
            Ok(profile) => profile,
            Err(e) => {
                debug!(error = %e, "profile not loaded, card uses the email");
                None
            }
        };
        let card = MemberCard::build(&session, profile.as_ref(), Utc::now().year());
        println!("BDE MMI {}", card.year);
        println!("TITULAIRE  {}", card.display_name);
        println!("QR         {}", card.qr_payload);
    }

    async fn profile(&self, action: ProfileCommand) -> anyhow::Result<()> {
        if let Err(e) = self.profiles.refresh().await {
            debug!(error = %e, "profile not loaded");
        }
        match action {
            ProfileCommand::Show => {
                let form = self.profiles.form().await;
                println!("PRÉNOM  {}", form.first_name);
                println!("NOM     {}", form.last_name);
            }
            ProfileCommand::Set {
                first_name,
                last_name,
            } => {
                self.profiles
                    .save(&ProfileForm {
                        first_name,
                        last_name,
                    })
                    .await?;
                println!("Profil mis à jour !");
            }
        }
        Ok(())
    }
}
