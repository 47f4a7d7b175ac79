use tm_wrapped::awards::SeasonSnapshot;
use tm_wrapped::error::{IngestError, ingest_error};
use tm_wrapped::medal::{Medal, Thresholds};
use tm_wrapped::store::{MapRecord, RunRecord, Store};

fn map(uid: &str, month: u32, day: u32, year: i32) -> MapRecord {
    MapRecord {
        uid: uid.to_string(),
        day,
        month,
        year,
        thresholds: Thresholds {
            author: 4000,
            gold: 5000,
            silver: 6000,
            bronze: 7000,
        },
        thumbnail_url: None,
    }
}

fn run(map_uid: &str, user_id: &str, time: i64, medal: Medal, position: u32) -> RunRecord {
    RunRecord {
        map_uid: map_uid.to_string(),
        user_id: user_id.to_string(),
        time,
        medal,
        position,
    }
}

#[test]
fn run_upsert_keeps_one_row_with_latest_values() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_maps(&[map("m1", 1, 1, 2024)]).unwrap();
    store
        .upsert_runs(&[run("m1", "acc-1", 6500, Medal::Bronze, 2)])
        .unwrap();
    store
        .upsert_runs(&[run("m1", "acc-1", 4800, Medal::Gold, 1)])
        .unwrap();

    assert_eq!(store.count_runs(2024).unwrap(), 1);
    let runs = store.load_season_runs(2024).unwrap();
    assert_eq!(runs[0].time, 4800);
    assert_eq!(runs[0].medal, Medal::Gold);
    assert_eq!(runs[0].position, 1);
}

#[test]
fn map_upsert_refreshes_thresholds_without_dropping_runs() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_maps(&[map("m1", 1, 1, 2024)]).unwrap();
    store
        .upsert_runs(&[run("m1", "acc-1", 4500, Medal::Gold, 1)])
        .unwrap();

    let mut updated = map("m1", 1, 1, 2024);
    updated.thresholds.author = 4100;
    updated.thumbnail_url = Some("https://example.invalid/t.jpg".to_string());
    store.upsert_maps(&[updated]).unwrap();

    assert_eq!(store.count_maps(2024).unwrap(), 1);
    assert_eq!(store.count_runs(2024).unwrap(), 1);
    let thresholds = store.map_thresholds("m1").unwrap().unwrap();
    assert_eq!(thresholds.author, 4100);
    assert_eq!(store.map_thresholds("missing").unwrap(), None);
}

#[test]
fn reset_only_clears_the_given_season() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .upsert_maps(&[map("a", 1, 1, 2023), map("b", 1, 1, 2024), map("c", 1, 2, 2024)])
        .unwrap();
    store
        .upsert_runs(&[
            run("a", "acc-1", 5000, Medal::Gold, 1),
            run("b", "acc-1", 5000, Medal::Gold, 1),
            run("c", "acc-1", 5000, Medal::Gold, 1),
            run("c", "acc-2", 8000, Medal::None, 2),
        ])
        .unwrap();

    let cleared = store.reset(2024).unwrap();
    assert_eq!(cleared.maps_removed, 2);
    assert_eq!(cleared.runs_removed, 3);
    assert_eq!(store.count_maps(2024).unwrap(), 0);
    assert_eq!(store.count_maps(2023).unwrap(), 1);
    assert_eq!(store.count_runs(2023).unwrap(), 1);
}

#[test]
fn runs_load_in_calendar_order_with_map_facts() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .upsert_maps(&[map("late", 2, 1, 2024), map("early", 1, 15, 2024)])
        .unwrap();
    store
        .upsert_runs(&[
            run("late", "acc-1", 4000, Medal::Author, 1),
            run("early", "acc-2", 5500, Medal::Silver, 2),
            run("early", "acc-1", 5000, Medal::Gold, 1),
        ])
        .unwrap();

    let runs = store.load_season_runs(2024).unwrap();
    let order = runs
        .iter()
        .map(|r| (r.map_uid.as_str(), r.user_id.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(order, vec![("early", "acc-1"), ("early", "acc-2"), ("late", "acc-1")]);
    assert_eq!(runs[0].day, 15);
    assert_eq!(runs[0].month, 1);
    assert_eq!(runs[2].thresholds.author, 4000);
}

#[test]
fn run_for_unknown_map_is_rejected() {
    let mut store = Store::open_in_memory().unwrap();
    let err = store.upsert_runs(&[run("ghost", "acc-1", 5000, Medal::Gold, 1)]);
    assert!(err.is_err());
    assert_eq!(store.count_runs(2024).unwrap(), 0);
}

#[test]
fn orphaned_run_fails_integrity_check() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_maps(&[map("m1", 1, 1, 2024)]).unwrap();
    store.ensure_integrity().unwrap();

    store.conn().execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    store
        .conn()
        .execute(
            "INSERT INTO runs (map_uid, user_id, time, medal, position) VALUES ('ghost', 'acc-1', 1, 'gold', 1)",
            [],
        )
        .unwrap();

    let err = store.ensure_integrity().unwrap_err();
    assert!(matches!(
        ingest_error(&err),
        Some(IngestError::InvariantViolation(_))
    ));
    assert!(SeasonSnapshot::load(&store, 2024).is_err());
}

#[test]
fn ingest_runs_are_logged() {
    let store = Store::open_in_memory().unwrap();
    assert!(store.latest_ingest_run(2024).unwrap().is_none());

    let run_id = store.begin_ingest_run(2024).unwrap();
    let open = store.latest_ingest_run(2024).unwrap().unwrap();
    assert_eq!(open.run_id, run_id);
    assert!(open.finished_at.is_none());

    store.finish_ingest_run(run_id, 12, 90).unwrap();
    let done = store.latest_ingest_run(2024).unwrap().unwrap();
    assert!(done.finished_at.is_some());
    assert_eq!(done.maps_upserted, 12);
    assert_eq!(done.runs_upserted, 90);
}

#[test]
fn file_store_persists_between_opens() {
    let dir = std::env::temp_dir().join(format!("tm_wrapped_store_{}", std::process::id()));
    let path = dir.join("wrapped.sqlite");
    {
        let mut store = Store::open(&path).unwrap();
        store.upsert_maps(&[map("m1", 3, 4, 2024)]).unwrap();
    }
    let store = Store::open(&path).unwrap();
    assert_eq!(store.count_maps(2024).unwrap(), 1);
    drop(store);
    let _ = std::fs::remove_dir_all(dir);
}
