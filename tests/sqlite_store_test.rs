//! Tests for the SQLite document store.

use diesel::{Connection, SqliteConnection};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use tempfile::NamedTempFile;

use turnstack::games::tally::{Tally, TallyAction};
use turnstack::store::{
    CachedViewStore, Collection, DocKey, DocumentStore, RevisionStore, StoreExt, Txn, TxnExt,
};
use turnstack::{
    Applied, Dispatcher, EngineConfig, EngineError, EngineErrorKind, Game, GameId, GameService,
    Identity, SqliteStore, Stack, Uid,
};

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready store.
fn setup_test_db() -> (NamedTempFile, SqliteStore) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let store = SqliteStore::new(db_path, 1000);
    let applied = store.migrate().expect("Migrations failed");
    assert_eq!(applied, 1);
    (db_file, store)
}

#[test]
fn test_migrate_is_idempotent() {
    let (_db, store) = setup_test_db();
    assert_eq!(store.migrate().expect("Second migrate failed"), 0);
}

#[test]
fn test_put_get_delete() {
    let (_db, store) = setup_test_db();
    let key = DocKey::elo(Uid(4));

    store
        .transact(|txn| txn.write(&key, &1512.5_f64))
        .expect("Write failed");
    let rating: Option<f64> = store.load(&key).expect("Read failed");
    assert_eq!(rating, Some(1512.5));

    // Writing again replaces the body.
    store.transact(|txn| txn.write(&key, &1490.0_f64)).unwrap();
    assert_eq!(store.load::<f64>(&key).unwrap(), Some(1490.0));

    let removed = store.transact(|txn| txn.delete(&key)).unwrap();
    assert!(removed);
    assert!(store.get(&key).unwrap().is_none());
    assert!(!store.transact(|txn| txn.delete(&key)).unwrap());
}

#[test]
fn test_scan_respects_collection_and_prefix() {
    let (_db, store) = setup_test_db();
    store
        .transact(|txn| {
            txn.put(&DocKey::view(GameId(1), Uid(1)), "a".into())?;
            txn.put(&DocKey::view(GameId(1), Uid(2)), "b".into())?;
            txn.put(&DocKey::view(GameId(11), Uid(1)), "c".into())?;
            txn.put(&DocKey::stack(GameId(1), Uid(1)), "d".into())
        })
        .unwrap();

    let views = store
        .scan(Collection::Views, &DocKey::game_prefix(GameId(1)))
        .unwrap();
    let bodies: Vec<&str> = views.iter().map(|(_, body)| body.as_str()).collect();
    assert_eq!(bodies, vec!["a", "b"]);
    assert_eq!(store.scan(Collection::Views, "").unwrap().len(), 3);
}

#[test]
fn test_failed_transaction_rolls_back() {
    let (_db, store) = setup_test_db();
    let key = DocKey::game(GameId(9));
    let result: Result<(), EngineError> = store.transact(|txn| {
        txn.put(&key, "{}".into())?;
        Err(EngineError::internal("abort"))
    });
    assert!(result.is_err());
    assert!(store.get(&key).unwrap().is_none());
}

#[test]
fn test_game_flow_on_sqlite() {
    let (_db, store) = setup_test_db();
    let service: GameService<SqliteStore, Tally> =
        GameService::new(store, &EngineConfig::default(), Dispatcher::disabled());
    let game = GameId(3);
    let ann = Identity::new(Uid(1), "ann");
    let bob = Identity::new(Uid(2), "bob");

    service
        .create_game(game, &ann, "ann@example.com", "Durable", 2, None)
        .expect("Create failed");
    let mut rng = Pcg64Mcg::seed_from_u64(5);
    let state = service
        .accept_invitation(game, &bob, "bob@example.com", None, &mut rng)
        .expect("Accept failed");
    let player = if state.head().is_current_player(ann.uid()) { &ann } else { &bob };

    service.act(game, player, None, &TallyAction::Add(2)).unwrap();
    service.act(game, player, None, &TallyAction::Add(2)).unwrap();
    service.undo(game, player, None).unwrap();
    assert_eq!(*service.current(game, player, None).unwrap().pending(), 2);
    assert_eq!(CachedViewStore::new(service.store()).count(game).unwrap(), 2);

    let applied = service
        .act(game, player, None, &TallyAction::Bank)
        .expect("Bank failed");
    assert!(matches!(applied, Applied::Committed { .. }));
    assert_eq!(CachedViewStore::new(service.store()).count(game).unwrap(), 0);
    assert_eq!(service.stack(game, player.uid()).unwrap(), Stack::at(2));
    assert_eq!(
        RevisionStore::new(service.store()).list(game).unwrap(),
        vec![0, 1, 2]
    );

    let old: Tally = RevisionStore::new(service.store())
        .get(game, 1)
        .unwrap()
        .expect("Revision 1 missing");
    assert_eq!(old.head().revision(), 1);
}

#[test]
fn test_locked_database_is_transient() {
    let (db, store) = setup_test_db();
    let db_path = db.path().to_str().expect("Invalid path").to_string();
    let key = DocKey::game(GameId(12));

    // Another writer holds the write lock for the whole check.
    let mut holder = SqliteConnection::establish(&db_path).expect("Failed to connect");
    holder
        .immediate_transaction(|_| {
            let blocked = SqliteStore::new(db_path.clone(), 1);
            let err = blocked
                .transact(|txn| txn.put(&key, "{}".into()))
                .unwrap_err();
            assert_eq!(err.kind(), EngineErrorKind::Transient);
            assert!(err.is_retryable());
            Ok::<_, diesel::result::Error>(())
        })
        .expect("Holding transaction failed");

    // Once the lock is released the same write goes through.
    store
        .transact(|txn| txn.put(&key, "{}".into()))
        .expect("Write after release failed");
    assert!(store.get(&key).unwrap().is_some());
}
