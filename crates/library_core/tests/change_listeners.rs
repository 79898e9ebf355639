use library_core::db::open_db_in_memory;
use library_core::{
    Book, EntityChange, EntityChangeListener, MutableDataAccess, SqliteDataAccess, User,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl EntityChangeListener for RecordingListener {
    fn item_saved(&self, change: &EntityChange<'_>, is_new: bool) {
        let kind = if is_new { "added" } else { "updated" };
        self.events
            .lock()
            .unwrap()
            .push(format!("{kind}:{}:{}", change.collection, change.id));
    }

    fn item_deleted(&self, change: &EntityChange<'_>) {
        self.events
            .lock()
            .unwrap()
            .push(format!("deleted:{}:{}", change.collection, change.id));
    }
}

fn open_repo() -> SqliteDataAccess {
    SqliteDataAccess::try_new(open_db_in_memory().unwrap()).unwrap()
}

#[test]
fn registered_listener_sees_add_update_and_delete() {
    let data = open_repo();
    let listener = Arc::new(RecordingListener::default());
    data.add_listener(listener.clone());
    assert_eq!(data.listener_count(), 1);

    let mut book = Book::new("Dune", "Frank Herbert", "9780441013593");
    let id = data.save(&mut book).unwrap();
    book.available_copies = 0;
    data.save(&mut book).unwrap();
    data.delete::<Book>(&id).unwrap();

    assert_eq!(
        listener.events(),
        vec![
            format!("added:books:{id}"),
            format!("updated:books:{id}"),
            format!("deleted:books:{id}"),
        ]
    );
}

#[test]
fn caller_supplied_identifier_for_new_entity_is_reported_as_new() {
    let data = open_repo();
    let listener = Arc::new(RecordingListener::default());
    data.add_listener(listener.clone());

    let mut user = User::new("ann", "ann@example.com");
    user.id = Some("user-ann".to_string());
    data.save(&mut user).unwrap();

    assert_eq!(listener.events(), vec!["added:users:user-ann".to_string()]);
}

#[test]
fn rejected_mutations_and_noop_deletes_are_not_announced() {
    let data = open_repo();
    let listener = Arc::new(RecordingListener::default());
    data.add_listener(listener.clone());

    let mut invalid = Book::new("", "Nobody", "000");
    assert!(data.save(&mut invalid).is_err());
    assert!(!data.delete::<Book>("missing").unwrap());

    assert!(listener.events().is_empty());
}

#[test]
fn listeners_are_notified_in_registration_order() {
    let data = open_repo();
    let order = Arc::new(Mutex::new(Vec::new()));

    struct Tagged {
        tag: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl EntityChangeListener for Tagged {
        fn item_saved(&self, _change: &EntityChange<'_>, _is_new: bool) {
            self.order.lock().unwrap().push(self.tag);
        }

        fn item_deleted(&self, _change: &EntityChange<'_>) {}
    }

    for tag in ["audit", "search-index", "cache"] {
        data.add_listener(Arc::new(Tagged {
            tag,
            order: order.clone(),
        }));
    }

    let mut book = Book::new("Solaris", "Stanislaw Lem", "9780156027601");
    data.save(&mut book).unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["audit", "search-index", "cache"]);
}

#[test]
fn change_document_decodes_to_saved_entity() {
    let data = open_repo();
    let captured: Arc<Mutex<Option<Book>>> = Arc::new(Mutex::new(None));

    struct Capture(Arc<Mutex<Option<Book>>>);

    impl EntityChangeListener for Capture {
        fn item_saved(&self, change: &EntityChange<'_>, _is_new: bool) {
            *self.0.lock().unwrap() = change.decode::<Book>();
        }

        fn item_deleted(&self, _change: &EntityChange<'_>) {}
    }

    data.add_listener(Arc::new(Capture(captured.clone())));

    let mut book = Book::new("Hyperion", "Dan Simmons", "9780553283686");
    data.save(&mut book).unwrap();

    assert_eq!(captured.lock().unwrap().clone(), Some(book));
}
