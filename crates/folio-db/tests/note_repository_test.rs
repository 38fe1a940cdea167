//! Note listing, slugs, and tag sync against PostgreSQL.

use chrono::Utc;
use serde_json::json;

use folio_db::test_fixtures::TestDatabase;
use folio_db::{
    date_slug, Error, ListNotesRequest, NewNote, Note, NoteOrderBy, NoteRepository, TagRepository,
};

async fn insert_note(test_db: &TestDatabase, user_id: i64, title: &str, tags: &[&str]) -> Note {
    let db = &test_db.db;
    let mut tx = db.begin().await.unwrap();
    let slug = db
        .notes
        .unique_slug_tx(&mut tx, &date_slug(title, Utc::now().date_naive()), None)
        .await
        .unwrap();
    let content = json!({"type": "doc", "content": []});
    let note = db
        .notes
        .insert_tx(
            &mut tx,
            NewNote {
                title,
                slug: &slug,
                lead: "A short lead",
                content: &content,
                user_id,
                main_visual_id: None,
            },
        )
        .await
        .unwrap();
    let names: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    db.tags
        .sync_names_for_note_tx(&mut tx, note.id, &names)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    note
}

#[tokio::test]
async fn test_duplicate_titles_get_numbered_slugs() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let title = format!("Same Title {}", TestDatabase::unique_suffix());

    let first = insert_note(&test_db, user.id, &title, &["x"]).await;
    let second = insert_note(&test_db, user.id, &title, &["x"]).await;
    let third = insert_note(&test_db, user.id, &title, &["x"]).await;

    assert_eq!(second.slug, format!("{}-2", first.slug));
    assert_eq!(third.slug, format!("{}-3", first.slug));
}

#[tokio::test]
async fn test_unique_slug_excludes_own_note() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let note = insert_note(&test_db, user.id, &format!("Keep {}", TestDatabase::unique_suffix()), &["k"]).await;

    let mut tx = test_db.db.begin().await.unwrap();
    let slug = test_db
        .db
        .notes
        .unique_slug_tx(&mut tx, &note.slug, Some(note.id))
        .await
        .unwrap();
    assert_eq!(slug, note.slug);
}

#[tokio::test]
async fn test_list_filters_by_owner_and_title() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let marker = TestDatabase::unique_suffix();
    insert_note(&test_db, user.id, &format!("Alpha {}", marker), &["t"]).await;
    insert_note(&test_db, user.id, &format!("Beta {}", marker), &["t"]).await;

    let page = test_db
        .db
        .notes
        .list(ListNotesRequest {
            user_id: Some(user.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let page = test_db
        .db
        .notes
        .list(ListNotesRequest {
            user_id: Some(user.id),
            title: Some("alpha".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.notes[0].note.title.starts_with("Alpha"));
}

#[tokio::test]
async fn test_list_tag_names_require_all_case_insensitive() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let red = format!("red-{}", TestDatabase::unique_suffix());
    let blue = format!("blue-{}", TestDatabase::unique_suffix());
    let both = insert_note(&test_db, user.id, "Both tags", &[&red, &blue]).await;
    insert_note(&test_db, user.id, "Only red", &[&red]).await;

    let page = test_db
        .db
        .notes
        .list(ListNotesRequest {
            tag_names: vec![red.to_uppercase(), blue.clone()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.notes[0].note.id, both.id);
    assert_eq!(page.notes[0].tags.len(), 2);
}

#[tokio::test]
async fn test_list_pagination_and_order() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    for title in ["c note", "a note", "b note"] {
        insert_note(&test_db, user.id, title, &["p"]).await;
    }

    let page = test_db
        .db
        .notes
        .list(ListNotesRequest {
            user_id: Some(user.id),
            order_by: NoteOrderBy::Title,
            descending: true,
            limit: 2,
            page: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    let titles: Vec<&str> = page.notes.iter().map(|n| n.note.title.as_str()).collect();
    assert_eq!(titles, vec!["c note", "b note"]);

    let page = test_db
        .db
        .notes
        .list(ListNotesRequest {
            user_id: Some(user.id),
            order_by: NoteOrderBy::Title,
            descending: true,
            limit: 2,
            page: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.notes.len(), 1);
    assert_eq!(page.notes[0].note.title, "a note");
}

#[tokio::test]
async fn test_list_page_past_offset_range_is_empty() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    insert_note(&test_db, user.id, "only note", &["p"]).await;

    let page = test_db
        .db
        .notes
        .list(ListNotesRequest {
            user_id: Some(user.id),
            limit: 100,
            page: i64::MAX,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.notes.is_empty());
}

#[tokio::test]
async fn test_slug_race_loser_gets_conflict() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let db = &test_db.db;
    let title = format!("Raced {}", TestDatabase::unique_suffix());
    let base = date_slug(&title, Utc::now().date_naive());
    let content = json!({"type": "doc", "content": []});

    // Both transactions see the slug as free before either inserts.
    let mut first = db.begin().await.unwrap();
    let mut second = db.begin().await.unwrap();
    let slug_a = db.notes.unique_slug_tx(&mut first, &base, None).await.unwrap();
    let slug_b = db.notes.unique_slug_tx(&mut second, &base, None).await.unwrap();
    assert_eq!(slug_a, slug_b);

    db.notes
        .insert_tx(
            &mut first,
            NewNote {
                title: &title,
                slug: &slug_a,
                lead: "",
                content: &content,
                user_id: user.id,
                main_visual_id: None,
            },
        )
        .await
        .unwrap();
    first.commit().await.unwrap();

    let err = db
        .notes
        .insert_tx(
            &mut second,
            NewNote {
                title: &title,
                slug: &slug_b,
                lead: "",
                content: &content,
                user_id: user.id,
                main_visual_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_tag_sync_reuses_existing_tags_case_insensitively() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let name = format!("Rust-{}", TestDatabase::unique_suffix());
    let first = insert_note(&test_db, user.id, "first", &[&name]).await;
    let second = insert_note(&test_db, user.id, "second", &[&name.to_lowercase()]).await;

    let a = test_db.db.tags.get_for_note(first.id).await.unwrap();
    let b = test_db.db.tags.get_for_note(second.id).await.unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].id, b[0].id);
    // First spelling wins.
    assert_eq!(b[0].name, name);
}

#[tokio::test]
async fn test_tag_sync_detaches_missing_names() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let keep = format!("keep-{}", TestDatabase::unique_suffix());
    let drop = format!("drop-{}", TestDatabase::unique_suffix());
    let note = insert_note(&test_db, user.id, "sync", &[&keep, &drop]).await;

    let mut tx = test_db.db.begin().await.unwrap();
    let tags = test_db
        .db
        .tags
        .sync_names_for_note_tx(&mut tx, note.id, &[keep.clone()])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, keep);
}

#[tokio::test]
async fn test_missing_tag_ids() {
    let test_db = TestDatabase::new().await;
    let user = test_db.create_user().await;
    let name = format!("exists-{}", TestDatabase::unique_suffix());
    let note = insert_note(&test_db, user.id, "ids", &[&name]).await;
    let existing = test_db.db.tags.get_for_note(note.id).await.unwrap()[0].id;

    let missing = test_db
        .db
        .tags
        .missing_ids(&[existing, i64::MAX])
        .await
        .unwrap();
    assert_eq!(missing, vec![i64::MAX]);
}

#[tokio::test]
async fn test_fetch_missing_note() {
    let test_db = TestDatabase::new().await;
    let err = test_db.db.notes.fetch(i64::MAX).await.unwrap_err();
    assert!(matches!(err, folio_db::Error::NoteNotFound(_)));
    assert!(!test_db.db.notes.exists(i64::MAX).await.unwrap());
}
