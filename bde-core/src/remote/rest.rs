use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::config::{AppConfig, FeedConfig};
use crate::error::RemoteError;
use crate::models::{NewsId, NewsItem, Perk, Profile, UserId};
use crate::remote::{AuthApi, RemoteStore};
use crate::session::{Session, SessionProvider};

/// Client for a PostgREST + GoTrue style backend (`/rest/v1`, `/auth/v1`).
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base: Url,
    anon_key: String,
    session: SessionProvider,
    retry: FeedConfig,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: VerifiedUser,
}

#[derive(Debug, Deserialize)]
struct VerifiedUser {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

impl RestBackend {
    pub fn new(
        client: Client,
        config: &AppConfig,
        session: SessionProvider,
    ) -> Result<Self, RemoteError> {
        let mut base = Url::parse(&config.backend.url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            anon_key: config.backend.anon_key.clone(),
            session,
            retry: config.feed.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base.join(path)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .session
            .current()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        request.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET with retries on transport errors and 5xx answers.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        let mut attempt: u8 = 0;
        loop {
            let result = match self.send(self.client.get(url.clone())).await {
                Ok(response) => Self::read_json(response).await,
                Err(e) => Err(e),
            };
            match result {
                Err(e) if attempt < self.retry.retry_attempts && is_transient(&e) => {
                    attempt += 1;
                    warn!(url = %url, attempt, error = %e, "request failed, retrying");
                    tokio::time::sleep(self.retry.backoff_for(attempt)).await;
                }
                other => return other,
            }
        }
    }
}

fn is_transient(error: &RemoteError) -> bool {
    match error {
        RemoteError::Network(_) => true,
        RemoteError::Status { status, .. } => *status >= 500,
        _ => false,
    }
}

#[async_trait]
impl RemoteStore for RestBackend {
    async fn fetch_news(&self) -> Result<Vec<NewsItem>, RemoteError> {
        let mut url = self.endpoint("rest/v1/news")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");
        self.get_json(url).await
    }

    async fn update_news_reactions(
        &self,
        id: NewsId,
        users: &BTreeSet<UserId>,
    ) -> Result<(), RemoteError> {
        let mut url = self.endpoint("rest/v1/news")?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        debug!(item = %id, count = users.len(), "sending reaction set");
        let response = self
            .send(
                self.client
                    .patch(url)
                    .header("Prefer", "return=representation")
                    .json(&json!({ "likes": users })),
            )
            .await?;
        // PostgREST answers 2xx even when the filter matched nothing (row
        // deleted or hidden by RLS).
        let rows: Vec<IgnoredAny> = Self::read_json(response).await?;
        if rows.is_empty() {
            return Err(RemoteError::NotFound(format!("news {id}")));
        }
        Ok(())
    }

    async fn fetch_perks(&self) -> Result<Vec<Perk>, RemoteError> {
        let mut url = self.endpoint("rest/v1/perks")?;
        url.query_pairs_mut().append_pair("select", "*");
        self.get_json(url).await
    }

    async fn fetch_profile(&self, user: &UserId) -> Result<Option<Profile>, RemoteError> {
        let mut url = self.endpoint("rest/v1/profiles")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{user}"));
        let rows: Vec<Profile> = self.get_json(url).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), RemoteError> {
        let url = self.endpoint("rest/v1/profiles")?;
        self.send(
            self.client
                .post(url)
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(profile),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthApi for RestBackend {
    async fn request_code(&self, email: &str) -> Result<(), RemoteError> {
        let url = self.endpoint("auth/v1/otp")?;
        self.send(
            self.client
                .post(url)
                .json(&json!({ "email": email, "create_user": true })),
        )
        .await?;
        Ok(())
    }

    async fn verify_code(&self, email: &str, code: &str) -> Result<Session, RemoteError> {
        let url = self.endpoint("auth/v1/verify")?;
        let response = self
            .send(
                self.client
                    .post(url)
                    .json(&json!({ "type": "email", "email": email, "token": code })),
            )
            .await?;
        let verified: VerifyResponse = Self::read_json(response).await?;
        Ok(Session {
            user_id: verified.user.id,
            email: verified.user.email.or_else(|| Some(email.to_owned())),
            access_token: verified.access_token,
            refresh_token: verified.refresh_token,
        })
    }

    async fn sign_out(&self, session: &Session) -> Result<(), RemoteError> {
        let url = self.endpoint("auth/v1/logout")?;
        self.client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
