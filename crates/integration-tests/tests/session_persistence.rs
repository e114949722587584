//! Session survives a restart when backed by the file store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use bynona_client::storage::FileStore;
use bynona_core::{Locale, PriceMode};
use bynona_integration_tests::{MockApi, sign_in};

#[tokio::test]
async fn test_session_and_preferences_reload_from_disk() {
    let api = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let client = api.client_with_store(Arc::new(FileStore::open(&path).unwrap()));
        sign_in(&client).await;
        client.preferences().set_locale(Locale::En).unwrap();
        client.preferences().set_price_mode(PriceMode::Wholesale).unwrap();
    }

    let client = api.client_with_store(Arc::new(FileStore::open(&path).unwrap()));
    assert!(client.is_authenticated().unwrap());
    let user = client.current_user().unwrap().unwrap();
    assert_eq!(user.email.as_deref(), Some("mona@example.com"));
    assert_eq!(user.extra["wallet_balance"], "120.50");

    client.categories().await.unwrap();
    let sent = api.requests_to("/categories");
    assert_eq!(sent[0].authorization.as_deref(), Some("Bearer access-1"));
    assert_eq!(sent[0].accept_language.as_deref(), Some("en"));
    assert_eq!(sent[0].price_mode.as_deref(), Some("wholesale"));
}
