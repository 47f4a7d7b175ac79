use std::fs;
use std::path::PathBuf;

use tm_wrapped::error::{IngestError, ingest_error};
use tm_wrapped::nadeo::{
    parse_leaderboard_json, parse_map_list_json, parse_month_json, parse_session_json,
    parse_token_json,
};
use tm_wrapped::players::PlayerNames;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_month_fixture() {
    let raw = read_fixture("month.json");
    let month = parse_month_json(&raw).expect("fixture should parse");
    assert_eq!(month.year, Some(2024));
    assert_eq!(month.month, 3);
    assert_eq!(month.days.len(), 4);
    assert_eq!(month.days[0].month_day, 1);
    assert_eq!(month.days[0].map_uid, "uid-mar-1");
    assert!(!month.days[1].is_gap());
    assert!(month.days[2].is_gap());
    assert!(month.days[3].is_gap(), "null mapUid should read as a gap");
}

#[test]
fn empty_month_list_is_a_remote_failure() {
    let err = parse_month_json(r#"{"monthList":[]}"#).unwrap_err();
    assert!(matches!(
        ingest_error(&err),
        Some(IngestError::RemoteFetch { .. })
    ));
}

#[test]
fn parses_map_list_fixture() {
    let raw = read_fixture("maps.json");
    let maps = parse_map_list_json(&raw).expect("fixture should parse");
    assert_eq!(maps.len(), 2);
    assert_eq!(maps[0].uid, "uid-mar-1");
    assert_eq!(maps[0].author_time, 41200);
    assert_eq!(maps[0].gold_time, 44000);
    assert_eq!(maps[0].silver_time, 50000);
    assert_eq!(maps[0].bronze_time, 62000);
    assert!(maps[0].thumbnail_url.is_some());
    assert_eq!(maps[1].thumbnail_url, None);
}

#[test]
fn parses_leaderboard_fixture() {
    let raw = read_fixture("leaderboard.json");
    let entries = parse_leaderboard_json(&raw).expect("fixture should parse");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].account_id, "acc-1");
    assert_eq!(entries[0].score, 41150);
    assert_eq!(entries[0].position, 1);
    assert_eq!(entries[2].position, 3);
}

#[test]
fn leaderboard_without_top_is_empty() {
    let entries = parse_leaderboard_json(r#"{"groupUid":"g","mapUid":"m"}"#).unwrap();
    assert!(entries.is_empty());
    let entries = parse_leaderboard_json(r#"{"top":null}"#).unwrap();
    assert!(entries.is_empty());
}

#[test]
fn session_429_is_rate_limited() {
    let raw = read_fixture("session_rate_limited.json");
    let err = parse_session_json(&raw).unwrap_err();
    let kind = ingest_error(&err).expect("typed error");
    assert!(matches!(kind, IngestError::RateLimited));
    assert!(kind.is_auth_failure());
}

#[test]
fn session_without_ticket_is_auth_failure() {
    let err = parse_session_json(r#"{"httpCode":401,"message":"Invalid credentials"}"#)
        .unwrap_err();
    match ingest_error(&err) {
        Some(IngestError::AuthFailure(msg)) => assert!(msg.contains("Invalid credentials")),
        other => panic!("unexpected error kind: {other:?}"),
    }
}

#[test]
fn session_ticket_and_token_parse() {
    let ticket = parse_session_json(r#"{"ticket":"t-123","platformType":"uplay"}"#).unwrap();
    assert_eq!(ticket, "t-123");
    assert!(parse_token_json(r#"{"accessToken":"a.b.c","refreshToken":"r"}"#).is_ok());

    let err = parse_token_json(r#"{"refreshToken":"r"}"#).unwrap_err();
    assert!(ingest_error(&err).is_some_and(IngestError::is_auth_failure));
}

#[test]
fn player_names_fixture_falls_back_to_ids() {
    let names = PlayerNames::parse(&read_fixture("users.json")).unwrap();
    assert_eq!(names.display("acc-1"), "Speedy");
    assert_eq!(names.display("acc-3"), "acc-3");
    assert_eq!(names.display("acc-9"), "acc-9");
}
