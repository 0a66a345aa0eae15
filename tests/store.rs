mod common;

use common::{hours_ago, mem_conn, obs};
use signalpipe::domain::entities::decision::Decision;
use signalpipe::domain::entities::run::{Run, RunReport, RunStatus};
use signalpipe::domain::ports::decision_repository::{DecisionRepository, SaveOutcome};
use signalpipe::domain::ports::observation_repository::{ObservationFilter, ObservationRepository};
use signalpipe::domain::ports::run_repository::RunRepository;
use signalpipe::domain::ports::vector_store::VectorStore;
use signalpipe::domain::values::confidence::Confidence;
use signalpipe::domain::values::signal::Signal;
use signalpipe::infrastructure::sqlite::decision_repo::SqliteDecisionRepo;
use signalpipe::infrastructure::sqlite::observation_repo::SqliteObservationRepo;
use signalpipe::infrastructure::sqlite::run_repo::SqliteRunRepo;
use signalpipe::infrastructure::sqlite::vector_store::SqliteVectorStore;

fn decision(symbol: &str, key: &str, fingerprint: &str) -> Decision {
    Decision::new(
        "run-1".into(),
        symbol.into(),
        Signal::Buy,
        Confidence::new(0.8).unwrap(),
        "momentum building".into(),
        "scripted:v1".into(),
        key.into(),
        fingerprint.into(),
    )
}

#[test]
fn observation_record_is_idempotent() {
    let repo = SqliteObservationRepo::new(mem_conn());
    let o = obs("ABC", "ABC $10.00 (+3.2%)", hours_ago(1));

    assert!(repo.record(&o).unwrap());
    assert!(!repo.record(&o).unwrap());
    assert_eq!(repo.count().unwrap(), 1);

    let fetched = repo.get_by_id(&o.id).unwrap().unwrap();
    assert_eq!(fetched.symbol, "ABC");
    assert_eq!(fetched.raw_text, o.raw_text);
}

#[test]
fn observation_query_filters_by_symbol_and_since() {
    let repo = SqliteObservationRepo::new(mem_conn());
    repo.record(&obs("ABC", "old news", hours_ago(48))).unwrap();
    repo.record(&obs("ABC", "fresh news", hours_ago(1))).unwrap();
    repo.record(&obs("XYZ", "other symbol", hours_ago(1))).unwrap();

    let filter = ObservationFilter {
        symbol: Some("ABC".into()),
        since: Some(hours_ago(24)),
        ..Default::default()
    };
    let rows = repo.query(&filter).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].raw_text, "fresh news");
}

#[test]
fn duplicate_idempotency_key_is_not_redelivered() {
    let repo = SqliteDecisionRepo::new(mem_conn());
    let provenance = vec![obs("ABC", "ABC $10.00 (+3.2%)", hours_ago(1))];

    let first = decision("ABC", "key-1", "fp-1");
    assert!(matches!(
        repo.save(&first, &provenance).unwrap(),
        SaveOutcome::Saved(_)
    ));

    // Different decision id, same key: the store hands back the original.
    let replay = decision("ABC", "key-1", "fp-1");
    match repo.save(&replay, &provenance).unwrap() {
        SaveOutcome::AlreadyDelivered(existing) => assert_eq!(existing.id, first.id),
        SaveOutcome::Saved(_) => panic!("duplicate key must not save"),
    }
    assert_eq!(repo.count().unwrap(), 1);
    assert!(repo.exists("key-1").unwrap());
    assert!(!repo.exists("key-2").unwrap());
}

#[test]
fn find_cached_respects_ttl() {
    let repo = SqliteDecisionRepo::new(mem_conn());
    let provenance = vec![obs("ABC", "ABC $10.00 (+3.2%)", hours_ago(1))];

    let mut stale = decision("ABC", "key-1", "fp-1");
    stale.created_at = hours_ago(2);
    repo.save(&stale, &provenance).unwrap();

    assert!(repo
        .find_cached("fp-1", chrono::Duration::hours(24))
        .unwrap()
        .is_some());
    assert!(repo
        .find_cached("fp-1", chrono::Duration::hours(1))
        .unwrap()
        .is_none());
    assert!(repo
        .find_cached("fp-other", chrono::Duration::hours(24))
        .unwrap()
        .is_none());
}

#[test]
fn run_lifecycle_and_cursor_resumption() {
    let repo = SqliteRunRepo::new(mem_conn());

    let run1 = Run::start();
    repo.create(&run1).unwrap();
    let cursor1 = hours_ago(1);
    repo.finish(&run1.id, RunStatus::Completed, Some(cursor1), &RunReport::default())
        .unwrap();

    let fetched = repo.get(&run1.id).unwrap().unwrap();
    assert_eq!(fetched.status, RunStatus::Completed);
    assert_eq!(repo.last_completed_cursor().unwrap(), Some(cursor1));

    // A terminal run cannot be finished twice.
    assert!(repo
        .finish(&run1.id, RunStatus::Failed, None, &RunReport::default())
        .is_err());

    // A failed run never advances the resumption cursor.
    let run2 = Run::start();
    repo.create(&run2).unwrap();
    repo.finish(&run2.id, RunStatus::Failed, Some(hours_ago(0)), &RunReport::default())
        .unwrap();
    assert_eq!(repo.last_completed_cursor().unwrap(), Some(cursor1));

    assert_eq!(repo.count().unwrap(), 2);
    assert_eq!(repo.list(10).unwrap().len(), 2);
}

#[test]
fn vector_query_returns_self_first_with_near_perfect_score() {
    let store = SqliteVectorStore::new(mem_conn());
    store.upsert("a", &[1.0, 0.0, 0.0, 0.0], "m1").unwrap();
    store.upsert("b", &[0.0, 1.0, 0.0, 0.0], "m1").unwrap();
    store.upsert("c", &[0.9, 0.1, 0.0, 0.0], "m1").unwrap();

    let hits = store.query(&[1.0, 0.0, 0.0, 0.0], 10, 0.5).unwrap();
    assert_eq!(hits[0].0, "a");
    assert!(hits[0].1 > 0.99);
    // "b" is orthogonal and falls under min_score; "c" stays.
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[1].0, "c");

    let truncated = store.query(&[1.0, 0.0, 0.0, 0.0], 1, 0.0).unwrap();
    assert_eq!(truncated.len(), 1);

    assert!(store.has_vector("a").unwrap());
    assert!(!store.has_vector("z").unwrap());
    assert_eq!(store.stored_dimension().unwrap(), Some(4));
}

#[test]
fn vector_upsert_replaces_in_place() {
    let store = SqliteVectorStore::new(mem_conn());
    store.upsert("a", &[1.0, 0.0], "m1").unwrap();
    store.upsert("a", &[0.0, 1.0], "m2").unwrap();

    let hits = store.query(&[0.0, 1.0], 10, 0.9).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "a");
}

#[test]
fn missing_vectors_feeds_reindexing() {
    // Observation repo and vector store share one database in production;
    // replicate that here with a shared in-memory database.
    let uri = format!(
        "file:store_test_{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    let flags = rusqlite::OpenFlags::default() | rusqlite::OpenFlags::SQLITE_OPEN_URI;
    let conn_obs = rusqlite::Connection::open_with_flags(&uri, flags).unwrap();
    signalpipe::infrastructure::sqlite::migrations::run_migrations(&conn_obs).unwrap();
    let conn_vec = rusqlite::Connection::open_with_flags(&uri, flags).unwrap();

    let repo = SqliteObservationRepo::new(conn_obs);
    let store = SqliteVectorStore::new(conn_vec);

    let indexed = obs("ABC", "indexed", hours_ago(2));
    let pending = obs("ABC", "pending", hours_ago(1));
    repo.record(&indexed).unwrap();
    repo.record(&pending).unwrap();
    store.upsert(&indexed.id, &[1.0, 0.0], "m1").unwrap();

    let missing = repo.missing_vectors().unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, pending.id);
}
