// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running with
//! FIRESTORE_EMULATOR_HOST set. They skip otherwise.

use clubhouse::error::AppError;
use clubhouse::models::{
    token_digest, AuthProvider, Class, EnrollOutcome, Role, StoredToken, User, UserUpdate,
};
use uuid::Uuid;

mod common;
use common::test_db;

fn test_user(email: &str, role: Role, clubs: &[&str]) -> User {
    let now = chrono::Utc::now();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        name: None,
        picture: None,
        password_hash: String::new(),
        role,
        assigned_club_ids: clubs.iter().map(|c| c.to_string()).collect(),
        active: true,
        provider: AuthProvider::Local,
        provider_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_crud() {
    require_emulator!();

    let db = test_db().await;
    let email = format!("{}@example.com", unique("crud"));
    let mut user = test_user(&email, Role::Office, &["club-a"]);

    assert!(db.get_user(user.id).await.unwrap().is_none());
    db.create_user(&user).await.unwrap();

    let fetched = db.get_user(user.id).await.unwrap().expect("user exists");
    assert_eq!(fetched.email, email);
    assert_eq!(fetched.role, Role::Office);
    assert_eq!(fetched.assigned_club_ids, vec!["club-a"]);

    let by_email = db.find_user_by_email(&email).await.unwrap().expect("by email");
    assert_eq!(by_email.id, user.id);

    user.first_name = "Changed".to_string();
    db.upsert_user(&user).await.unwrap();
    assert_eq!(db.get_user(user.id).await.unwrap().unwrap().first_name, "Changed");

    assert!(db.delete_user(user.id).await.unwrap());
    assert!(!db.delete_user(user.id).await.unwrap());
    assert!(db.get_user(user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_user_by_provider() {
    require_emulator!();

    let db = test_db().await;
    let provider_id = unique("gh");
    let mut user = test_user(&format!("{provider_id}@example.com"), Role::Classes, &[]);
    user.provider = AuthProvider::Github;
    user.provider_id = Some(provider_id.clone());
    db.create_user(&user).await.unwrap();

    let found = db
        .find_user_by_provider("github", &provider_id)
        .await
        .unwrap()
        .expect("found by provider");
    assert_eq!(found.id, user.id);
    assert!(db
        .find_user_by_provider("google", &provider_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_list_users_by_club() {
    require_emulator!();

    let db = test_db().await;
    let club = unique("club");
    let a = test_user(&format!("{}@example.com", unique("a")), Role::Restaurant, &[&club]);
    let b = test_user(&format!("{}@example.com", unique("b")), Role::Office, &[&club]);
    db.create_user(&a).await.unwrap();
    db.create_user(&b).await.unwrap();

    let members = db.list_users(None, Some(&club)).await.unwrap();
    assert_eq!(members.len(), 2);

    let restaurant = db.list_users(Some(Role::Restaurant), Some(&club)).await.unwrap();
    assert_eq!(restaurant.len(), 1);
    assert_eq!(restaurant[0].id, a.id);
}

#[tokio::test]
async fn test_email_claim_is_exclusive() {
    require_emulator!();

    let db = test_db().await;
    let email = format!("{}@example.com", unique("claim"));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let db = db.clone();
            let user = test_user(&email, Role::Classes, &[]);
            tokio::spawn(async move { db.create_user(&user).await })
        })
        .collect();
    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => created += 1,
            Err(AppError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(created, 1);

    let owner = db.find_user_by_email(&email).await.unwrap().expect("owner");
    assert!(db.delete_user(owner.id).await.unwrap());
    // Deleting the account frees the address
    db.create_user(&test_user(&email, Role::Classes, &[]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_field_updates_and_email_change() {
    require_emulator!();

    let db = test_db().await;
    let taken = format!("{}@example.com", unique("taken"));
    let fresh = format!("{}@example.com", unique("fresh"));
    let user = test_user(&format!("{}@example.com", unique("u")), Role::Office, &[]);
    db.create_user(&user).await.unwrap();
    db.create_user(&test_user(&taken, Role::Office, &[]))
        .await
        .unwrap();

    db.update_user(
        user.id,
        &UserUpdate {
            active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let touched = db
        .update_user(user.id, &UserUpdate::touch())
        .await
        .unwrap()
        .unwrap();
    assert!(!touched.active);
    assert!(!db.get_user(user.id).await.unwrap().unwrap().active);

    assert!(matches!(
        db.change_user_email(user.id, &taken).await,
        Err(AppError::Conflict(_))
    ));
    let moved = db.change_user_email(user.id, &fresh).await.unwrap().unwrap();
    assert_eq!(moved.email, fresh);
    assert_eq!(db.get_user(user.id).await.unwrap().unwrap().email, fresh);
    db.create_user(&test_user(&user.email, Role::Office, &[]))
        .await
        .unwrap();

    assert!(db
        .update_user(Uuid::new_v4(), &UserUpdate::touch())
        .await
        .unwrap()
        .is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// TOKEN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_session_and_refresh_rows() {
    require_emulator!();

    let db = test_db().await;
    let user_id = Uuid::new_v4();
    let raw = unique("token");

    let session = StoredToken::new(user_id, &raw, chrono::Duration::hours(1));
    db.insert_session(&session).await.unwrap();
    let stored = db
        .get_session(&token_digest(&raw))
        .await
        .unwrap()
        .expect("session stored");
    assert_eq!(stored.user_id, user_id);
    assert!(!stored.is_expired(chrono::Utc::now()));

    db.delete_session(&token_digest(&raw)).await.unwrap();
    assert!(db.get_session(&token_digest(&raw)).await.unwrap().is_none());

    let refresh = StoredToken::new(user_id, &raw, chrono::Duration::days(7));
    db.insert_refresh_token(&refresh).await.unwrap();
    assert!(db
        .get_refresh_token(&token_digest(&raw))
        .await
        .unwrap()
        .is_some());
    db.delete_refresh_token(&token_digest(&raw)).await.unwrap();
    // Deleting twice is fine
    db.delete_refresh_token(&token_digest(&raw)).await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// CLASS TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_enrollment_transaction() {
    require_emulator!();

    let db = test_db().await;
    let now = chrono::Utc::now();
    let class = Class {
        id: unique("class"),
        name: "Yoga".to_string(),
        description: String::new(),
        instructor: "Kim".to_string(),
        starts_at: now,
        duration_minutes: 60,
        capacity: 1,
        enrolled_members: vec![],
        wait_list: vec![],
        created_at: now,
        updated_at: now,
    };
    db.insert_class(&class).await.unwrap();

    assert_eq!(
        db.enroll_member(&class.id, "m1").await.unwrap(),
        EnrollOutcome::Enrolled
    );
    assert_eq!(
        db.enroll_member(&class.id, "m2").await.unwrap(),
        EnrollOutcome::Waitlisted
    );
    assert!(db.enroll_member(&class.id, "m1").await.is_err());

    let promoted = db.unenroll_member(&class.id, "m1").await.unwrap();
    assert_eq!(promoted.as_deref(), Some("m2"));

    let stored = db.get_class(&class.id).await.unwrap().unwrap();
    assert_eq!(stored.enrolled_members, vec!["m2"]);
    assert!(stored.wait_list.is_empty());

    assert!(db.enroll_member(&unique("missing"), "m1").await.is_err());
}

#[tokio::test]
async fn test_concurrent_unenroll_transaction() {
    require_emulator!();

    let db = test_db().await;
    let now = chrono::Utc::now();
    let class = Class {
        id: unique("class"),
        name: "Spin".to_string(),
        description: String::new(),
        instructor: "Kim".to_string(),
        starts_at: now,
        duration_minutes: 45,
        capacity: 2,
        enrolled_members: vec!["a".to_string(), "b".to_string()],
        wait_list: vec!["c".to_string(), "d".to_string(), "e".to_string()],
        created_at: now,
        updated_at: now,
    };
    db.insert_class(&class).await.unwrap();

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|member| {
            let db = db.clone();
            let class_id = class.id.clone();
            tokio::spawn(async move { db.unenroll_member(&class_id, member).await })
        })
        .collect();
    let mut promoted = Vec::new();
    for handle in handles {
        promoted.extend(handle.await.unwrap().unwrap());
    }
    promoted.sort();
    assert_eq!(promoted, vec!["c", "d"]);

    let stored = db.get_class(&class.id).await.unwrap().unwrap();
    assert!(stored.enrolled_members.len() <= 2);
    assert_eq!(stored.wait_list, vec!["e"]);
    assert!(stored
        .enrolled_members
        .iter()
        .all(|m| !stored.wait_list.contains(m)));
}
