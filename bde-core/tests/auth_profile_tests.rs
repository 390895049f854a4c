use std::sync::Arc;
use std::time::Duration;

use bde_core::{
    AuthError, AuthService, MemberCard, MemoryBackend, ProfileError, ProfileForm, ProfileService,
    RemoteStore, ScreenSet, SessionProvider, SessionStore, Tab,
};

fn temp_dir(tag: &str) -> std::path::PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "bde_{tag}_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    dir
}

#[tokio::test]
async fn code_format_is_checked_before_calling_the_backend() {
    let backend = MemoryBackend::default();
    let auth = AuthService::new(Arc::new(backend.clone()), SessionProvider::default());

    assert!(matches!(auth.request_code("   ").await, Err(AuthError::EmptyEmail)));
    assert!(backend.codes_requested().await.is_empty());

    for code in ["12345", "12a456", "1234567"] {
        assert!(matches!(
            auth.verify_code("a.b@bde.fr", code).await,
            Err(AuthError::InvalidCode)
        ));
    }
}

#[tokio::test]
async fn login_persists_and_logout_clears() {
    let dir = temp_dir("auth");
    let backend = MemoryBackend::default();
    backend.accept_code("424242").await;
    let session = SessionProvider::default();
    let auth = AuthService::new(Arc::new(backend.clone()), session.clone())
        .with_store(SessionStore::in_dir(&dir));

    auth.request_code(" jean.dupont@bde.fr ").await.unwrap();
    assert_eq!(backend.codes_requested().await, vec!["jean.dupont@bde.fr"]);

    assert!(matches!(
        auth.verify_code("jean.dupont@bde.fr", "000000").await,
        Err(AuthError::Remote(_))
    ));
    assert_eq!(session.screen_set(), ScreenSet::Auth);

    let signed = auth.verify_code("jean.dupont@bde.fr", "424242").await.unwrap();
    assert_eq!(session.user_id(), Some(signed.user_id.clone()));
    assert_eq!(session.screen_set(), ScreenSet::App { initial: Tab::News });

    // A fresh process picks the session back up
    let restarted = SessionProvider::default();
    let auth2 = AuthService::new(Arc::new(backend.clone()), restarted.clone())
        .with_store(SessionStore::in_dir(&dir));
    assert_eq!(auth2.restore().await, Some(signed));
    assert!(restarted.is_authenticated());

    auth2.sign_out().await.unwrap();
    assert!(!restarted.is_authenticated());
    assert_eq!(SessionStore::in_dir(&dir).load().await, None);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn profile_requires_a_session() {
    let service = ProfileService::new(Arc::new(MemoryBackend::default()), SessionProvider::default());
    assert!(matches!(service.refresh().await, Err(ProfileError::NotSignedIn)));
    assert!(matches!(
        service.save(&ProfileForm::default()).await,
        Err(ProfileError::NotSignedIn)
    ));
}

#[tokio::test]
async fn profile_edit_flows_into_the_member_card() {
    let backend = MemoryBackend::default();
    backend.accept_code("111111").await;
    let store: Arc<dyn RemoteStore> = Arc::new(backend.clone());
    let session = SessionProvider::default();
    let auth = AuthService::new(Arc::new(backend.clone()), session.clone());
    let profiles = ProfileService::new(store, session.clone());
    let follower = profiles.follow_session();

    auth.request_code("lea.bernard@bde.fr").await.unwrap();
    let signed = auth.verify_code("lea.bernard@bde.fr", "111111").await.unwrap();

    let form = profiles.form().await;
    assert_eq!(form.first_name, "LEA");
    assert_eq!(form.last_name, "BERNARD");
    let card = MemberCard::build(&signed, profiles.current().await.as_ref(), 2026);
    assert_eq!(card.display_name, "LEA BERNARD");

    let saved = profiles
        .save(&ProfileForm {
            first_name: " Léa ".into(),
            last_name: "Bernard".into(),
        })
        .await
        .unwrap();
    assert_eq!(saved.first_name.as_deref(), Some("Léa"));
    assert!(saved.updated_at.is_some());
    assert_eq!(backend.profile(&signed.user_id).await, Some(saved.clone()));

    let card = MemberCard::build(&signed, profiles.current().await.as_ref(), 2026);
    assert_eq!(card.display_name, "Léa Bernard");
    assert_eq!(card.qr_payload, signed.user_id.to_string());

    auth.sign_out().await.unwrap();
    let cleared = tokio::time::timeout(Duration::from_secs(2), async {
        while profiles.current().await.is_some() {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(cleared.is_ok(), "profile should be dropped after sign-out");
    follower.abort();
}
