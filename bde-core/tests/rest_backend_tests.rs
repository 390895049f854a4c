use std::collections::BTreeSet;
use std::sync::Arc;

use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bde_core::{
    AppConfig, AuthApi, FeedCache, FeedLoader, FeedSource, NewsId, ReactionController,
    Reconciliation, RemoteError, RemoteStore, RestBackend, Session, SessionProvider,
    ToggleOutcome, UserId,
};

fn config(server: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.backend.url = server.uri();
    cfg.backend.anon_key = "anon".into();
    cfg.feed.retry_attempts = 1;
    cfg.feed.retry_backoff_ms = 10;
    cfg
}

fn signed_in() -> SessionProvider {
    SessionProvider::new(Some(Session {
        user_id: UserId::from("u1"),
        email: Some("jean.dupont@bde.fr".into()),
        access_token: "user-token".into(),
        refresh_token: None,
    }))
}

fn news_body() -> serde_json::Value {
    json!([
        {"id": 2, "title": "Gala", "content": "Samedi", "created_at": "2024-10-22T18:00:00Z", "likes": ["u1", "u9"]},
        {"id": 1, "title": "AG", "content": null, "created_at": "2024-10-21T07:28:00Z", "likes": null}
    ])
}

#[tokio::test]
async fn fetch_news_queries_most_recent_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/news"))
        .and(query_param("select", "*"))
        .and(query_param("order", "created_at.desc"))
        .and(header("apikey", "anon"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(news_body()))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RestBackend::new(Client::new(), &config(&server), signed_in()).unwrap();
    let items = backend.fetch_news().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].reaction_count(), 2);
    assert_eq!(items[1].reaction_count(), 0);
}

#[tokio::test]
async fn anonymous_requests_use_the_anon_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/perks"))
        .and(header("authorization", "Bearer anon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "title": "Verre à 5€", "description": "d", "company_name": "Le 3310", "latitude": 47.3, "longitude": 5.03}
        ])))
        .mount(&server)
        .await;

    let backend =
        RestBackend::new(Client::new(), &config(&server), SessionProvider::default()).unwrap();
    let perks = backend.fetch_perks().await.unwrap();
    assert_eq!(perks[0].company, "Le 3310");
    assert_eq!(perks[0].coordinates(), Some((47.3, 5.03)));
}

#[tokio::test]
async fn transient_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/news"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(news_body()))
        .mount(&server)
        .await;

    let backend = RestBackend::new(Client::new(), &config(&server), signed_in()).unwrap();
    assert_eq!(backend.fetch_news().await.unwrap().len(), 2);
}

#[tokio::test]
async fn update_sends_the_whole_set() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/news"))
        .and(query_param("id", "eq.5"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({"likes": ["u1", "u2"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 5, "title": "t", "content": "", "created_at": "2024-10-22T18:00:00Z", "likes": ["u1", "u2"]}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RestBackend::new(Client::new(), &config(&server), signed_in()).unwrap();
    let users: BTreeSet<UserId> = [UserId::from("u2"), UserId::from("u1")].into_iter().collect();
    backend.update_news_reactions(NewsId(5), &users).await.unwrap();
}

#[tokio::test]
async fn rejected_update_is_reverted_locally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(news_body()))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/news"))
        .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
        .mount(&server)
        .await;

    let session = signed_in();
    let backend: Arc<dyn RemoteStore> =
        Arc::new(RestBackend::new(Client::new(), &config(&server), session.clone()).unwrap());
    let cache = FeedCache::new();
    let report = FeedLoader::new(backend.clone(), cache.clone(), session.clone())
        .load()
        .await;
    assert_eq!(report.source, FeedSource::Remote);

    let controller = ReactionController::new(cache.clone(), backend, session);
    let ToggleOutcome::Applied { count, pending, .. } = controller.toggle(NewsId(2)).await else {
        panic!("toggle should apply");
    };
    assert_eq!(count, 1);
    assert_eq!(pending.outcome().await.unwrap(), Reconciliation::Reverted);
    let item = cache.get(NewsId(2)).await.unwrap();
    assert_eq!(item.reaction_count(), 2);
    assert!(item.has_reacted(&UserId::from("u1")));
}

#[tokio::test]
async fn update_matching_no_row_is_reverted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(news_body()))
        .mount(&server)
        .await;
    // row deleted or hidden by RLS: PostgREST still answers 200
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/news"))
        .and(query_param("id", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let session = signed_in();
    let backend =
        Arc::new(RestBackend::new(Client::new(), &config(&server), session.clone()).unwrap());
    let users: BTreeSet<UserId> = [UserId::from("u1")].into_iter().collect();
    assert!(matches!(
        backend.update_news_reactions(NewsId(1), &users).await,
        Err(RemoteError::NotFound(_))
    ));

    let store: Arc<dyn RemoteStore> = backend;
    let cache = FeedCache::new();
    FeedLoader::new(store.clone(), cache.clone(), session.clone())
        .load()
        .await;
    let controller = ReactionController::new(cache.clone(), store, session);
    let ToggleOutcome::Applied { count, pending, .. } = controller.toggle(NewsId(1)).await else {
        panic!("toggle should apply");
    };
    assert_eq!(count, 1);
    assert_eq!(pending.outcome().await.unwrap(), Reconciliation::Reverted);
    assert_eq!(cache.get(NewsId(1)).await.unwrap().reaction_count(), 0);
}

#[tokio::test]
async fn status_errors_carry_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/otp"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let backend =
        RestBackend::new(Client::new(), &config(&server), SessionProvider::default()).unwrap();
    match backend.request_code("a.b@bde.fr").await {
        Err(RemoteError::Status { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn verify_code_builds_a_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/verify"))
        .and(body_json(json!({"type": "email", "email": "a.b@bde.fr", "token": "123456"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt",
            "refresh_token": "refresh",
            "user": {"id": "9f1c", "email": "a.b@bde.fr"}
        })))
        .mount(&server)
        .await;

    let backend =
        RestBackend::new(Client::new(), &config(&server), SessionProvider::default()).unwrap();
    let session = backend.verify_code("a.b@bde.fr", "123456").await.unwrap();
    assert_eq!(session.user_id, UserId::from("9f1c"));
    assert_eq!(session.access_token, "jwt");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn profile_lookup_and_upsert() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "u1", "first_name": "Jean", "last_name": null}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(header("prefer", "resolution=merge-duplicates,return=minimal"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RestBackend::new(Client::new(), &config(&server), signed_in()).unwrap();
    let profile = backend
        .fetch_profile(&UserId::from("u1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.first_name.as_deref(), Some("Jean"));
    assert_eq!(profile.last_name, None);
    backend.upsert_profile(&profile).await.unwrap();
}
