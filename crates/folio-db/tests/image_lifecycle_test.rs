//! Content-image lifecycle against PostgreSQL: reference rows, ownership
//! checks, and orphan reaping all on one transaction.

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value as JsonValue};

use folio_db::test_fixtures::TestDatabase;
use folio_db::{
    date_slug, reap_orphans, removed_image_ids, validate_content_ownership, validate_main_visual,
    Error, ImageRepository, NewNote, Note, PgImageCatalog,
};

fn content_with(ids: &[i64]) -> JsonValue {
    let nodes: Vec<JsonValue> = ids
        .iter()
        .map(|id| json!({"type": "image", "attrs": {"image_id": id}}))
        .collect();
    json!({"type": "doc", "content": nodes})
}

/// Create a note the same way the note service does.
async fn create_note(test_db: &TestDatabase, user_id: i64, content: JsonValue) -> Note {
    let db = &test_db.db;
    let mut tx = db.begin().await.unwrap();
    let ids = {
        let mut catalog = PgImageCatalog::new(&mut tx);
        validate_content_ownership(&mut catalog, user_id, &content)
            .await
            .unwrap()
    };
    let title = format!("Lifecycle {}", TestDatabase::unique_suffix());
    let slug = db
        .notes
        .unique_slug_tx(&mut tx, &date_slug(&title, Utc::now().date_naive()), None)
        .await
        .unwrap();
    let note = db
        .notes
        .insert_tx(
            &mut tx,
            NewNote {
                title: &title,
                slug: &slug,
                lead: "lead",
                content: &content,
                user_id,
                main_visual_id: None,
            },
        )
        .await
        .unwrap();
    PgImageCatalog::new(&mut tx)
        .replace_references(note.id, &ids)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    note
}

/// Replace a note's content and reap what dropped out. Returns reaped ids.
async fn replace_content(
    test_db: &TestDatabase,
    user_id: i64,
    note_id: i64,
    new_content: JsonValue,
) -> Vec<i64> {
    let db = &test_db.db;
    let mut tx = db.begin().await.unwrap();
    let mut note = db
        .notes
        .lock_owned_tx(&mut tx, note_id, user_id)
        .await
        .unwrap()
        .expect("note should be owned");
    let removed = removed_image_ids(&note.content, &new_content);
    let ids = {
        let mut catalog = PgImageCatalog::new(&mut tx);
        validate_content_ownership(&mut catalog, user_id, &new_content)
            .await
            .unwrap()
    };
    note.content = new_content;
    db.notes.update_tx(&mut tx, &note).await.unwrap();
    let reaped = {
        let mut catalog = PgImageCatalog::new(&mut tx);
        catalog.replace_references(note_id, &ids).await.unwrap();
        reap_orphans(&mut catalog, user_id, note_id, &removed)
            .await
            .unwrap()
    };
    tx.commit().await.unwrap();
    reaped.into_iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn test_removed_image_is_reaped() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let a = test_db.create_image(user.id).await;
    let b = test_db.create_image(user.id).await;

    let note = create_note(&test_db, user.id, content_with(&[a.id, b.id])).await;
    let reaped = replace_content(&test_db, user.id, note.id, content_with(&[b.id])).await;

    assert_eq!(reaped, vec![a.id]);
    assert!(test_db.db.images.fetch(a.id).await.unwrap().is_none());
    assert!(test_db.db.images.fetch(b.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_image_shared_with_other_note_survives() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let shared = test_db.create_image(user.id).await;

    let first = create_note(&test_db, user.id, content_with(&[shared.id])).await;
    let _second = create_note(&test_db, user.id, content_with(&[shared.id])).await;

    let reaped = replace_content(&test_db, user.id, first.id, json!({"content": []})).await;
    assert!(reaped.is_empty());
    assert!(test_db.db.images.fetch(shared.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_main_visual_survives_content_removal() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let visual = test_db.create_image(user.id).await;

    let note = create_note(&test_db, user.id, content_with(&[visual.id])).await;

    // Point the note's main visual at the image, then drop it from content.
    let mut tx = test_db.db.begin().await.unwrap();
    let mut locked = test_db
        .db
        .notes
        .lock_owned_tx(&mut tx, note.id, user.id)
        .await
        .unwrap()
        .unwrap();
    locked.main_visual_id = Some(visual.id);
    test_db.db.notes.update_tx(&mut tx, &locked).await.unwrap();
    tx.commit().await.unwrap();

    let reaped = replace_content(&test_db, user.id, note.id, json!([])).await;
    assert!(reaped.is_empty());
    assert!(test_db.db.images.fetch(visual.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_foreign_image_rejected_in_content() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.create_user().await;
    let intruder = test_db.create_user().await;
    let image = test_db.create_image(owner.id).await;

    let mut tx = test_db.db.begin().await.unwrap();
    let mut catalog = PgImageCatalog::new(&mut tx);
    let err = validate_content_ownership(&mut catalog, intruder.id, &content_with(&[image.id]))
        .await
        .unwrap_err();
    match err {
        Error::ImageNotOwned { field, image_id } => {
            assert_eq!(field, "content");
            assert_eq!(image_id, image.id);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_main_visual_missing_and_foreign() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.create_user().await;
    let other = test_db.create_user().await;
    let image = test_db.create_image(owner.id).await;

    let mut tx = test_db.db.begin().await.unwrap();
    let mut catalog = PgImageCatalog::new(&mut tx);
    assert!(validate_main_visual(&mut catalog, owner.id, image.id).await.is_ok());
    assert!(matches!(
        validate_main_visual(&mut catalog, other.id, image.id).await,
        Err(Error::ImageNotOwned { .. })
    ));
    assert!(matches!(
        validate_main_visual(&mut catalog, owner.id, i64::MAX).await,
        Err(Error::ImageNotFound(_))
    ));
}

#[tokio::test]
async fn test_deleting_note_cascades_reference_rows() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let image = test_db.create_image(user.id).await;
    let note = create_note(&test_db, user.id, content_with(&[image.id])).await;

    let mut tx = test_db.db.begin().await.unwrap();
    test_db.db.notes.delete_tx(&mut tx, note.id).await.unwrap();
    let reaped = {
        let mut catalog = PgImageCatalog::new(&mut tx);
        reap_orphans(&mut catalog, user.id, note.id, &[image.id])
            .await
            .unwrap()
    };
    tx.commit().await.unwrap();

    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].id, image.id);
    assert!(test_db.db.images.fetch(image.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_missing_note_is_not_found() {
    let test_db = TestDatabase::new().await;
    let mut tx = test_db.db.begin().await.unwrap();
    let err = test_db.db.notes.delete_tx(&mut tx, i64::MAX).await.unwrap_err();
    assert!(matches!(err, Error::NoteNotFound(_)));
}

/// Time a blocked transaction is given to show it is waiting on a row lock.
const LOCK_WAIT: Duration = Duration::from_millis(300);

async fn reference_count(test_db: &TestDatabase, image_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM note_image WHERE image_id = $1")
        .bind(image_id)
        .fetch_one(test_db.db.pool())
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_detach_reaps_shared_image_once() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let shared = test_db.create_image(user.id).await;
    let a = create_note(&test_db, user.id, content_with(&[shared.id])).await;
    let b = create_note(&test_db, user.id, content_with(&[shared.id])).await;

    // First writer drops its reference and holds the image lock.
    let mut first = test_db.db.begin().await.unwrap();
    let first_reaped = {
        let mut catalog = PgImageCatalog::new(&mut first);
        catalog.replace_references(a.id, &[]).await.unwrap();
        reap_orphans(&mut catalog, user.id, a.id, &[shared.id])
            .await
            .unwrap()
    };
    assert!(first_reaped.is_empty(), "b still references the image");

    let db = test_db.db.clone();
    let (user_id, b_id, image_id) = (user.id, b.id, shared.id);
    let second = tokio::spawn(async move {
        let mut tx = db.begin().await.unwrap();
        let reaped = {
            let mut catalog = PgImageCatalog::new(&mut tx);
            catalog.replace_references(b_id, &[]).await.unwrap();
            reap_orphans(&mut catalog, user_id, b_id, &[image_id])
                .await
                .unwrap()
        };
        tx.commit().await.unwrap();
        reaped.into_iter().map(|r| r.id).collect::<Vec<i64>>()
    });

    tokio::time::sleep(LOCK_WAIT).await;
    assert!(!second.is_finished(), "second reaper must wait for the image lock");
    assert!(test_db.db.images.fetch(shared.id).await.unwrap().is_some());

    first.commit().await.unwrap();
    let second_reaped = tokio::time::timeout(Duration::from_secs(10), second)
        .await
        .expect("second reaper finishes after the lock is released")
        .unwrap();

    assert_eq!(second_reaped, vec![shared.id]);
    assert_eq!(reference_count(&test_db, shared.id).await, 0);
    assert!(test_db.db.images.fetch(shared.id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_attach_waits_for_reaper_and_fails_on_deleted_image() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let image = test_db.create_image(user.id).await;
    let source = create_note(&test_db, user.id, content_with(&[image.id])).await;
    let target = create_note(&test_db, user.id, content_with(&[])).await;

    let mut reaper = test_db.db.begin().await.unwrap();
    let reaped = {
        let mut catalog = PgImageCatalog::new(&mut reaper);
        catalog.replace_references(source.id, &[]).await.unwrap();
        reap_orphans(&mut catalog, user.id, source.id, &[image.id])
            .await
            .unwrap()
    };
    assert_eq!(reaped.len(), 1);

    let db = test_db.db.clone();
    let (user_id, target_id, image_id) = (user.id, target.id, image.id);
    let attach = tokio::spawn(async move {
        let mut tx = db.begin().await.unwrap();
        let mut catalog = PgImageCatalog::new(&mut tx);
        // The delete is uncommitted, so ownership still checks out.
        let ids = validate_content_ownership(&mut catalog, user_id, &content_with(&[image_id]))
            .await
            .unwrap();
        let result = catalog.replace_references(target_id, &ids).await;
        drop(catalog);
        if result.is_ok() {
            tx.commit().await.unwrap();
        }
        result
    });

    tokio::time::sleep(LOCK_WAIT).await;
    assert!(!attach.is_finished(), "attach must wait on the reaper's row lock");

    reaper.commit().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), attach)
        .await
        .expect("attach finishes after the reaper commits")
        .unwrap();

    assert!(matches!(result, Err(Error::Database(_))), "got {:?}", result);
    assert_eq!(reference_count(&test_db, image.id).await, 0);
    assert!(test_db.db.images.fetch(image.id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reaper_waits_for_attach_and_retains_image() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let image = test_db.create_image(user.id).await;
    let source = create_note(&test_db, user.id, content_with(&[image.id])).await;
    let target = create_note(&test_db, user.id, content_with(&[])).await;

    // Attach first and hold the key-share lock open.
    let mut attach = test_db.db.begin().await.unwrap();
    PgImageCatalog::new(&mut attach)
        .replace_references(target.id, &[image.id])
        .await
        .unwrap();

    let db = test_db.db.clone();
    let (user_id, source_id, image_id) = (user.id, source.id, image.id);
    let reaper = tokio::spawn(async move {
        let mut tx = db.begin().await.unwrap();
        let reaped = {
            let mut catalog = PgImageCatalog::new(&mut tx);
            catalog.replace_references(source_id, &[]).await.unwrap();
            reap_orphans(&mut catalog, user_id, source_id, &[image_id])
                .await
                .unwrap()
        };
        tx.commit().await.unwrap();
        reaped.len()
    });

    tokio::time::sleep(LOCK_WAIT).await;
    assert!(!reaper.is_finished(), "reaper must wait on the attach's key-share lock");

    attach.commit().await.unwrap();
    let reaped = tokio::time::timeout(Duration::from_secs(10), reaper)
        .await
        .expect("reaper finishes after the attach commits")
        .unwrap();

    assert_eq!(reaped, 0);
    assert_eq!(reference_count(&test_db, image.id).await, 1);
    assert!(test_db.db.images.fetch(image.id).await.unwrap().is_some());
}
