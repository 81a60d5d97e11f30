/// Integration tests for passwordless sign-in and profiles

mod common;

use chrono::Duration;
use cofound_shared::auth::magic_link::{request_sign_in, verify_sign_in};
use cofound_shared::error::ServiceError;
use cofound_shared::models::user::User;
use cofound_shared::services::profiles::{self, ProfileChanges};
use common::{create_user, query_param, test_pool, unique, RecordingSender};

const BASE_URL: &str = "http://localhost:3000";

#[tokio::test]
async fn test_sign_in_link_creates_user_once() {
    let Some(pool) = test_pool().await else { return };
    let sender = RecordingSender::default();
    let email = format!("{}@Example.com", unique("Founder"));

    request_sign_in(&pool, &sender, BASE_URL, &email, Duration::minutes(15))
        .await
        .unwrap();

    let sent = sender.last().unwrap();
    assert_eq!(sent.email, email.to_lowercase());
    assert!(sent.url.starts_with(BASE_URL));

    let token = query_param(&sent.url, "token").unwrap();
    let user = verify_sign_in(&pool, &email, &token).await.unwrap();
    assert_eq!(user.email, email.to_lowercase());

    // Tokens are single use
    let reused = verify_sign_in(&pool, &email, &token).await;
    assert!(matches!(reused, Err(ServiceError::Unauthorized(_))));

    // Signing in again finds the same account
    request_sign_in(&pool, &sender, BASE_URL, &email, Duration::minutes(15))
        .await
        .unwrap();
    let token = query_param(&sender.last().unwrap().url, "token").unwrap();
    let again = verify_sign_in(&pool, &email.to_uppercase(), &token).await.unwrap();
    assert_eq!(again.id, user.id);
}

#[tokio::test]
async fn test_expired_link_is_rejected() {
    let Some(pool) = test_pool().await else { return };
    let sender = RecordingSender::default();
    let email = format!("{}@example.com", unique("late"));

    request_sign_in(&pool, &sender, BASE_URL, &email, Duration::minutes(-1))
        .await
        .unwrap();
    let token = query_param(&sender.last().unwrap().url, "token").unwrap();

    let result = verify_sign_in(&pool, &email, &token).await;
    assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
    assert!(User::find_by_email(&pool, &email).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_delivery_reports_email_error() {
    let Some(pool) = test_pool().await else { return };
    let sender = RecordingSender::failing();
    let email = format!("{}@example.com", unique("bounce"));

    let result = request_sign_in(&pool, &sender, BASE_URL, &email, Duration::minutes(15)).await;
    assert!(matches!(result, Err(ServiceError::Email(_))));
}

#[tokio::test]
async fn test_malformed_email_is_rejected() {
    let Some(pool) = test_pool().await else { return };
    let sender = RecordingSender::default();

    let result =
        request_sign_in(&pool, &sender, BASE_URL, "not-an-email", Duration::minutes(15)).await;
    assert!(matches!(result, Err(ServiceError::Validation { .. })));
    assert!(sender.last().is_none());
}

#[tokio::test]
async fn test_profile_update_and_username_lookup() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool, "profile").await;
    let username = format!("u_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);

    let profile = profiles::update_profile(
        &pool,
        user.id,
        ProfileChanges {
            username: Some(username.clone()),
            description: Some("Backend engineer".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(profile.user.username.as_deref(), Some(username.as_str()));
    assert_eq!(profile.user.name.as_deref(), Some("profile"));

    let found = profiles::get_profile_by_username(&pool, &username).await.unwrap();
    assert_eq!(found.user.id, user.id);

    // Empty string clears
    let cleared = profiles::update_profile(
        &pool,
        user.id,
        ProfileChanges {
            description: Some(String::new()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(cleared.user.description.is_none());

    let other = create_user(&pool, "other").await;
    let taken = profiles::update_profile(
        &pool,
        other.id,
        ProfileChanges {
            username: Some(username),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(taken, Err(ServiceError::InvalidState(_))));
}
