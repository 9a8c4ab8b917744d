//! Unit tests for the account registry

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde_json::json;
use signal_bridge::accounts::{parse_status_update, AccountRegistry, ValidationError};
use signal_bridge::models::{AccountId, AccountStatusUpdate};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn update(value: serde_json::Value) -> AccountStatusUpdate {
    serde_json::from_value(value).expect("valid status update")
}

#[test]
fn upsert_then_list_includes_account() {
    let registry = AccountRegistry::default();
    let id = registry
        .upsert(update(json!({"account_id": 12345, "balance": 1000.0})), t0())
        .expect("valid account");
    assert_eq!(id.key(), "12345");

    let active = registry.list_active(t0());
    assert_eq!(active.accounts.len(), 1);
    assert!(active.evicted.is_empty());
    assert_eq!(active.accounts[0].balance, 1000.0);
    assert_eq!(active.accounts[0].last_update, t0());
}

#[test]
fn stale_account_is_evicted_and_not_resurrected() {
    let registry = AccountRegistry::default();
    registry
        .upsert(update(json!({"account_id": "demo-1"})), t0())
        .expect("valid account");

    let later = t0() + TimeDelta::seconds(301);
    let active = registry.list_active(later);
    assert!(active.accounts.is_empty());
    assert_eq!(active.evicted, vec!["demo-1".to_string()]);
    assert!(registry.is_empty());

    let again = registry.list_active(later + TimeDelta::seconds(1));
    assert!(again.accounts.is_empty());
    assert!(again.evicted.is_empty());
    assert!(registry.list_active(t0()).accounts.is_empty());
}

#[test]
fn sweep_only_removes_stale_entries() {
    let registry = AccountRegistry::default();
    registry
        .upsert(update(json!({"account_id": 1})), t0())
        .expect("valid account");
    registry
        .upsert(update(json!({"account_id": 2})), t0() + TimeDelta::seconds(200))
        .expect("valid account");

    let active = registry.list_active(t0() + TimeDelta::seconds(400));
    assert_eq!(active.accounts.len(), 1);
    assert_eq!(active.accounts[0].account_id.key(), "2");
    assert_eq!(active.evicted, vec!["1".to_string()]);
    assert_eq!(registry.len(), 1);
}

#[test]
fn missing_account_id_is_rejected_without_mutation() {
    let registry = AccountRegistry::default();
    registry
        .upsert(update(json!({"account_id": 7})), t0())
        .expect("valid account");

    for payload in [
        json!({"balance": 10.0}),
        json!({"account_id": null}),
        json!({"account_id": ""}),
        json!({"account_id": 0}),
        json!({"account_id": false}),
    ] {
        let err = registry.upsert(update(payload), t0()).unwrap_err();
        assert_eq!(err, ValidationError::MissingAccountId);
        assert_eq!(err.to_string(), "account_id required");
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn account_number_used_when_account_id_absent() {
    let registry = AccountRegistry::default();
    let id = registry
        .upsert(update(json!({"account_id": 0, "account_number": 5551234})), t0())
        .expect("account_number fallback");
    assert_eq!(id, AccountId::Number(5551234.into()));
    assert!(registry.get("5551234").is_some());
}

#[test]
fn numeric_and_string_ids_share_a_key() {
    let registry = AccountRegistry::default();
    registry
        .upsert(update(json!({"account_id": 42, "account_name": "numeric"})), t0())
        .expect("valid account");
    registry
        .upsert(update(json!({"account_id": "42", "account_name": "text"})), t0())
        .expect("valid account");

    assert_eq!(registry.len(), 1);
    let snapshot = registry.get("42").expect("account present");
    assert_eq!(snapshot.account_name, "text");
    assert_eq!(snapshot.account_id, AccountId::Text("42".to_string()));
}

#[test]
fn upsert_replaces_instead_of_merging() {
    let registry = AccountRegistry::default();
    registry
        .upsert(
            update(json!({
                "account_id": 9,
                "account_name": "Main",
                "server": "Broker-Live",
                "is_running": true,
                "open_trades": [{"symbol": "EURUSD", "type": "BUY", "volume": 0.1}]
            })),
            t0(),
        )
        .expect("valid account");
    registry
        .upsert(update(json!({"account_id": 9})), t0() + TimeDelta::seconds(5))
        .expect("valid account");

    let snapshot = registry.get("9").expect("account present");
    assert_eq!(snapshot.account_name, "Unknown");
    assert_eq!(snapshot.server, "Unknown");
    assert!(!snapshot.is_running);
    assert!(snapshot.open_trades.is_empty());
    assert_eq!(snapshot.last_update, t0() + TimeDelta::seconds(5));
}

#[test]
fn refresh_keeps_account_alive() {
    let registry = AccountRegistry::default();
    registry
        .upsert(update(json!({"account_id": 3})), t0())
        .expect("valid account");
    registry
        .upsert(update(json!({"account_id": 3})), t0() + TimeDelta::seconds(250))
        .expect("valid account");

    let active = registry.list_active(t0() + TimeDelta::seconds(500));
    assert_eq!(active.accounts.len(), 1);
}

#[test]
fn status_body_parsing() {
    assert_eq!(parse_status_update(b""), Err(ValidationError::NoData));
    assert_eq!(parse_status_update(b"not json"), Err(ValidationError::NoData));
    assert_eq!(parse_status_update(b"[]"), Err(ValidationError::NoData));
    assert_eq!(parse_status_update(b"{}"), Err(ValidationError::NoData));
    let mistyped = parse_status_update(br#"{"account_id": 1, "balance": "lots"}"#)
        .expect("mistyped field falls back");
    assert_eq!(mistyped.balance, 0.0);

    let parsed = parse_status_update(br#"{"account_id": 1, "magic_number": 777}"#)
        .expect("valid body");
    assert_eq!(parsed.magic_number, 777);
    assert_eq!(parsed.account_name, "Unknown");
}

#[test]
fn loosely_typed_fields_fall_back_to_defaults() {
    let registry = AccountRegistry::default();
    for body in [
        br#"{"account_id": 1, "account_name": null}"#.as_slice(),
        br#"{"account_id": 2, "is_running": 1}"#.as_slice(),
        br#"{"account_id": 3, "magic_number": 123.0}"#.as_slice(),
        br#"{"account_id": 4, "balance": null}"#.as_slice(),
        br#"{"account_id": 5, "equity": "2500.5", "open_trades": [{"symbol": "EURUSD", "volume": "0.1"}, "junk"]}"#.as_slice(),
        br#"{"account_id": 6, "server": 17, "open_trades": null, "daily_profit": true}"#.as_slice(),
    ] {
        let update = parse_status_update(body).expect("lenient body accepted");
        registry.upsert(update, t0()).expect("valid account");
    }

    assert_eq!(registry.len(), 6);
    assert_eq!(registry.get("1").expect("account 1").account_name, "Unknown");
    assert!(registry.get("2").expect("account 2").is_running);
    assert_eq!(registry.get("3").expect("account 3").magic_number, 123);
    assert_eq!(registry.get("4").expect("account 4").balance, 0.0);

    let five = registry.get("5").expect("account 5");
    assert_eq!(five.equity, 2500.5);
    assert_eq!(five.open_trades.len(), 1);
    assert_eq!(five.open_trades[0].volume, 0.1);

    let six = registry.get("6").expect("account 6");
    assert_eq!(six.server, "17");
    assert!(six.open_trades.is_empty());
    assert_eq!(six.daily_profit, 0.0);
}

#[test]
fn concurrent_upserts_and_listings_neither_lose_nor_duplicate() {
    const THREADS: usize = 6;
    const PUTS: usize = 40;

    let registry = Arc::new(AccountRegistry::default());

    let writers: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..PUTS {
                    let id = format!("{t}-{i}");
                    registry
                        .upsert(update(json!({"account_id": id, "balance": 1.0})), t0())
                        .expect("valid account");
                    registry
                        .upsert(update(json!({"account_id": id, "balance": 2.0})), t0())
                        .expect("valid account");
                }
            })
        })
        .collect();

    let reader = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let mut previous = 0;
            for _ in 0..200 {
                let active = registry.list_active(t0());
                assert!(active.evicted.is_empty());
                let keys: HashSet<String> = active
                    .accounts
                    .iter()
                    .map(|snapshot| snapshot.account_id.key())
                    .collect();
                assert_eq!(keys.len(), active.accounts.len(), "duplicate snapshot");
                assert!(keys.len() >= previous, "snapshot lost between listings");
                previous = keys.len();
            }
        })
    };

    for handle in writers {
        handle.join().expect("writer thread");
    }
    reader.join().expect("reader thread");

    let active = registry.list_active(t0());
    assert!(active.evicted.is_empty());
    assert_eq!(active.accounts.len(), THREADS * PUTS);
    let keys: HashSet<String> = active
        .accounts
        .iter()
        .map(|snapshot| snapshot.account_id.key())
        .collect();
    assert_eq!(keys.len(), THREADS * PUTS);
    assert!(active.accounts.iter().all(|snapshot| snapshot.balance == 2.0));
}
