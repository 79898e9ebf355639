use library_core::db::open_db_in_memory;
use library_core::{
    Book, DataAccess, FieldFilter, MutableDataAccess, Persistable, SqliteDataAccess, StoreFailure,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Memo {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    text: String,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    priority: i64,
}

impl Memo {
    fn new(text: &str) -> Self {
        Self {
            id: None,
            text: text.to_string(),
            pinned: false,
            priority: 0,
        }
    }
}

impl Persistable for Memo {
    const COLLECTION: &'static str = "memos";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

fn open_repo() -> SqliteDataAccess {
    SqliteDataAccess::try_new(open_db_in_memory().unwrap()).unwrap()
}

#[test]
fn save_assigns_identifier_and_find_returns_equal_entity() {
    let data = open_repo();

    let mut memo = Memo::new("first memo");
    let id = data.save(&mut memo).unwrap();

    assert!(!id.is_empty());
    assert_eq!(memo.id.as_deref(), Some(id.as_str()));
    let loaded = data.find_by_id::<Memo>(&id).unwrap().unwrap();
    assert_eq!(loaded, memo);
    assert!(loaded.same_entity(&memo));
}

#[test]
fn repeated_saves_never_reuse_identifiers() {
    let data = open_repo();

    let mut ids = HashSet::new();
    for index in 0..300 {
        let mut memo = Memo::new(&format!("memo {index}"));
        let id = data.save(&mut memo).unwrap();
        assert!(!id.is_empty());
        assert!(ids.insert(id), "identifier reused at save {index}");
    }
    assert_eq!(data.count::<Memo>().unwrap(), 300);
}

#[test]
fn caller_supplied_identifier_is_kept_and_second_save_updates() {
    let data = open_repo();

    let mut memo = Memo::new("draft");
    memo.id = Some("memo-42".to_string());
    assert_eq!(data.save(&mut memo).unwrap(), "memo-42");

    memo.text = "final".to_string();
    assert_eq!(data.save(&mut memo).unwrap(), "memo-42");

    assert_eq!(data.count::<Memo>().unwrap(), 1);
    let loaded = data.find_by_id::<Memo>("memo-42").unwrap().unwrap();
    assert_eq!(loaded.text, "final");
}

#[test]
fn empty_identifier_is_treated_as_absent() {
    let data = open_repo();

    let mut memo = Memo::new("blank id");
    memo.id = Some(String::new());
    let id = data.save(&mut memo).unwrap();

    assert!(!id.is_empty());
    assert!(data.exists::<Memo>(&id).unwrap());
    assert!(!data.exists::<Memo>("").unwrap());
}

#[test]
fn save_find_delete_lifecycle() {
    let data = open_repo();

    let mut memo = Memo::new("lifecycle");
    let id = data.save(&mut memo).unwrap();
    assert_eq!(data.find_by_id::<Memo>(&id).unwrap(), Some(memo.clone()));

    assert!(data.delete::<Memo>(&id).unwrap());
    assert!(!data.exists::<Memo>(&id).unwrap());
    assert_eq!(data.find_by_id::<Memo>(&id).unwrap(), None);
}

#[test]
fn delete_missing_identifier_is_noop() {
    let data = open_repo();

    let mut memo = Memo::new("survivor");
    data.save(&mut memo).unwrap();

    assert!(!data.delete::<Memo>("does-not-exist").unwrap());
    assert_eq!(data.count::<Memo>().unwrap(), 1);
}

#[test]
fn identifiers_are_scoped_per_collection() {
    let data = open_repo();

    let mut memo = Memo::new("shared id");
    memo.id = Some("same".to_string());
    data.save(&mut memo).unwrap();

    assert!(data.exists::<Memo>("same").unwrap());
    assert!(!data.exists::<Book>("same").unwrap());
    assert!(data.find_by_id::<Book>("same").unwrap().is_none());
    assert!(!data.delete::<Book>("same").unwrap());
    assert!(data.exists::<Memo>("same").unwrap());
}

#[test]
fn list_all_streams_every_entity_across_batches_in_insertion_order() {
    let data = open_repo();

    for index in 0..150 {
        let mut memo = Memo::new(&format!("memo {index:03}"));
        data.save(&mut memo).unwrap();
    }

    let texts = data
        .list_all::<Memo>()
        .unwrap()
        .map(|memo| memo.unwrap().text)
        .collect::<Vec<_>>();
    assert_eq!(texts.len(), 150);
    assert_eq!(texts[0], "memo 000");
    assert_eq!(texts[149], "memo 149");
    assert!(texts.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn list_all_on_empty_collection_yields_nothing() {
    let data = open_repo();
    assert_eq!(data.list_all::<Memo>().unwrap().count(), 0);
}

#[test]
fn list_all_reports_failures_of_later_batches_then_stops() {
    let data = open_repo();
    for index in 0..100 {
        let mut memo = Memo::new(&format!("memo {index}"));
        data.save(&mut memo).unwrap();
    }

    let mut stream = data.list_all::<Memo>().unwrap();
    let mut seen = 0;
    while seen < 64 {
        stream.next().unwrap().unwrap();
        seen += 1;
    }

    data.connection()
        .execute_batch("DROP TABLE documents;")
        .unwrap();

    let err = stream.next().unwrap().unwrap_err();
    assert!(matches!(err.failure(), StoreFailure::Sqlite(_)));
    assert!(stream.next().is_none());
}

#[test]
fn list_page_and_count_follow_insertion_order() {
    let data = open_repo();
    for index in 0..5 {
        let mut memo = Memo::new(&format!("memo {index}"));
        data.save(&mut memo).unwrap();
    }

    let page = data.list_page::<Memo>(2, 2).unwrap();
    let texts = page.into_iter().map(|memo| memo.text).collect::<Vec<_>>();
    assert_eq!(texts, vec!["memo 2", "memo 3"]);
    assert!(data.list_page::<Memo>(10, 2).unwrap().is_empty());
    assert_eq!(data.count::<Memo>().unwrap(), 5);
}

#[test]
fn update_keeps_original_position_in_listing() {
    let data = open_repo();
    let mut first = Memo::new("first");
    let mut second = Memo::new("second");
    data.save(&mut first).unwrap();
    data.save(&mut second).unwrap();

    first.text = "first, edited".to_string();
    data.save(&mut first).unwrap();

    let texts = data
        .list_page::<Memo>(0, 10)
        .unwrap()
        .into_iter()
        .map(|memo| memo.text)
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["first, edited", "second"]);
}

#[test]
fn find_by_fields_matches_strings_booleans_numbers_and_null() {
    let data = open_repo();

    let mut plain = Memo::new("plain");
    let mut pinned = Memo::new("pinned");
    pinned.pinned = true;
    pinned.priority = 3;
    data.save(&mut plain).unwrap();
    data.save(&mut pinned).unwrap();

    let by_text = data
        .find_by_fields::<Memo>(&[FieldFilter::eq("text", "plain")])
        .unwrap();
    assert_eq!(by_text, vec![plain.clone()]);

    let by_flag = data
        .find_by_fields::<Memo>(&[FieldFilter::eq("pinned", true), FieldFilter::eq("priority", 3)])
        .unwrap();
    assert_eq!(by_flag, vec![pinned.clone()]);

    let missing_field = data
        .find_one_by_fields::<Memo>(&[FieldFilter::is_null("archived_at")])
        .unwrap();
    assert_eq!(missing_field, Some(plain));

    assert!(data
        .find_one_by_fields::<Memo>(&[FieldFilter::eq("text", "nope")])
        .unwrap()
        .is_none());
}

#[test]
fn invalid_filter_field_is_an_access_error() {
    let data = open_repo();

    let err = data
        .find_by_fields::<Memo>(&[FieldFilter::eq("text') OR 1=1 --", "x")])
        .unwrap_err();
    assert!(matches!(err.failure(), StoreFailure::InvalidFilter(_)));
    assert!(err.message().contains("memos"));
}

#[test]
fn store_failures_are_wrapped_as_access_errors() {
    let data = open_repo();
    let mut memo = Memo::new("before failure");
    let id = data.save(&mut memo).unwrap();

    data.connection()
        .execute_batch("DROP TABLE documents;")
        .unwrap();

    let exists_err = data.exists::<Memo>(&id).unwrap_err();
    assert!(exists_err.message().contains("existence"));
    assert!(matches!(exists_err.failure(), StoreFailure::Sqlite(_)));

    assert!(data.find_by_id::<Memo>(&id).is_err());
    assert!(data.list_all::<Memo>().is_err());
    assert!(data.count::<Memo>().is_err());

    let save_err = data.save(&mut memo).unwrap_err();
    assert!(!save_err.is_validation());

    let mut fresh = Memo::new("after failure");
    let fresh_err = data.save(&mut fresh).unwrap_err();
    assert!(matches!(fresh_err, library_core::RepoError::Access(_)));

    let delete_err = data.delete::<Memo>(&id).unwrap_err();
    assert!(matches!(delete_err, library_core::RepoError::Access(_)));
}

#[test]
fn undecodable_document_is_an_access_error() {
    let data = open_repo();
    data.connection()
        .execute(
            "INSERT INTO documents (collection, id, body) VALUES ('memos', 'bad', '{\"text\": 5}');",
            [],
        )
        .unwrap();

    let err = data.find_by_id::<Memo>("bad").unwrap_err();
    assert!(matches!(err.failure(), StoreFailure::Decode(_)));
    assert!(err.message().contains("bad"));
    assert!(data.exists::<Memo>("bad").unwrap());
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();

    match SqliteDataAccess::try_new(conn) {
        Err(library_core::db::DbError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert!(expected_version > 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}
