//! Storage layer tests for the webhook registry.

use qaas_core::{CallbackBase, Owner, ValidationError};

use super::db::QaasDatabase;
use super::queries::RegistryError;

const ID: &str = "550e8400-e29b-41d4-a716-446655440001";
const ID2: &str = "550e8400-e29b-41d4-a716-446655440002";
const CREATED: &str = "2026-01-01T00:00:00+00:00";

async fn test_db() -> QaasDatabase {
    QaasDatabase::open_in_memory().await.unwrap()
}

fn owner(group: &str, user: &str) -> Owner {
    Owner::new(group, user).unwrap()
}

fn base() -> CallbackBase {
    CallbackBase::new("https", "qaas.example.org", 5111)
}

#[tokio::test]
async fn add_and_get_entry() {
    let db = test_db().await;
    db.add_entry(ID, &owner("g", "u"), "desc", CREATED)
        .await
        .unwrap();

    let entry = db.get_entry_by_identifier(ID).await.unwrap();
    assert_eq!(entry.hash, ID);
    assert_eq!(entry.groupname, "g");
    assert_eq!(entry.username, "u");
    assert_eq!(entry.description, "desc");
    assert_eq!(entry.created, CREATED);

    let view = entry.into_view(&base());
    assert_eq!(view.url, format!("https://qaas.example.org:5111/webhook/{ID}"));
}

#[tokio::test]
async fn duplicate_identifier_is_rejected() {
    let db = test_db().await;
    db.add_entry(ID, &owner("g", "u"), "", CREATED).await.unwrap();

    let err = db
        .add_entry(ID, &owner("other", "someone"), "", CREATED)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Duplicate(ref h) if h == ID), "{err:?}");

    // The first row is untouched.
    let entry = db.get_entry_by_identifier(ID).await.unwrap();
    assert_eq!(entry.groupname, "g");
}

#[tokio::test]
async fn invalid_identifier_never_reaches_the_store() {
    let db = test_db().await;

    for bad in ["nonexisting", "550E8400-E29B-41D4-A716-446655440001", ""] {
        let err = db
            .add_entry(bad, &owner("g", "u"), "", CREATED)
            .await
            .unwrap_err();
        assert!(
            matches!(err, RegistryError::Invalid(ValidationError::Identifier(_))),
            "{err:?}"
        );
        assert!(matches!(
            db.delete_entry(bad, &owner("g", "u")).await.unwrap_err(),
            RegistryError::Invalid(_)
        ));
        assert!(matches!(
            db.get_entry_by_identifier(bad).await.unwrap_err(),
            RegistryError::Invalid(_)
        ));
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhooks")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn get_unknown_identifier_is_not_found() {
    let db = test_db().await;
    let err = db.get_entry_by_identifier(ID).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn delete_succeeds_at_most_once() {
    let db = test_db().await;
    let o = owner("g", "u");
    db.add_entry(ID, &o, "", CREATED).await.unwrap();

    db.delete_entry(ID, &o).await.unwrap();
    let err = db.delete_entry(ID, &o).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn delete_is_scoped_to_owner() {
    let db = test_db().await;
    db.add_entry(ID, &owner("groupB", "userB"), "", CREATED)
        .await
        .unwrap();

    let err = db
        .delete_entry(ID, &owner("groupA", "userA"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)), "{err:?}");

    // Same user in a different group is a different owner.
    assert!(db.delete_entry(ID, &owner("groupA", "userB")).await.is_err());

    assert!(db.get_entry_by_identifier(ID).await.is_ok());
}

#[tokio::test]
async fn list_returns_only_owner_rows_with_urls() {
    let db = test_db().await;
    db.add_entry(ID, &owner("g", "u"), "first", CREATED)
        .await
        .unwrap();
    db.add_entry(ID2, &owner("g", "u"), "second", CREATED)
        .await
        .unwrap();
    db.add_entry(
        "550e8400-e29b-41d4-a716-446655440003",
        &owner("g", "other"),
        "",
        CREATED,
    )
    .await
    .unwrap();

    let list = db
        .list_entries_for_owner(&owner("g", "u"), &base())
        .await
        .unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].hash, ID);
    assert_eq!(list[0].description, "first");
    assert_eq!(list[1].hash, ID2);
    assert!(list.iter().all(|w| w.url.ends_with(&format!("/webhook/{}", w.hash))));

    let empty = db
        .list_entries_for_owner(&owner("nobody", "nobody"), &base())
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn multiple_rows_for_identifier_is_integrity_error() {
    let db = test_db().await;
    sqlx::query("DROP INDEX idx_webhooks_hash")
        .execute(db.pool())
        .await
        .unwrap();
    for user in ["a", "b"] {
        sqlx::query(
            "INSERT INTO webhooks (hash, groupname, username, description, created) VALUES (?, 'g', ?, '', ?)",
        )
        .bind(ID)
        .bind(user)
        .bind(CREATED)
        .execute(db.pool())
        .await
        .unwrap();
    }

    let err = db.get_entry_by_identifier(ID).await.unwrap_err();
    assert!(
        matches!(err, RegistryError::Integrity { count: 2, .. }),
        "{err:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_of_same_identifier_has_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let db = QaasDatabase::open(&dir.path().join("qaas.db")).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                db.add_entry(ID, &owner("g", "u"), &format!("attempt {i}"), CREATED)
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => winners += 1,
            Err(e) => assert!(matches!(e, RegistryError::Duplicate(_)), "{e:?}"),
        }
    }
    assert_eq!(winners, 1);
    let listed = db
        .list_entries_for_owner(&owner("g", "u"), &base())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn file_backed_database_persists_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qaas.db");

    {
        let db = QaasDatabase::open(&path).await.unwrap();
        db.add_entry(ID, &owner("g", "u"), "", CREATED)
            .await
            .unwrap();
    }

    let db = QaasDatabase::open(&path).await.unwrap();
    assert_eq!(db.get_entry_by_identifier(ID).await.unwrap().username, "u");
}
