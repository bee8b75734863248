//! Contract Test: Expiration Sweep
//!
//! Verifies the lifecycle transition applied to stale active records.
//!
//! Constraints verified:
//! - Stale discovered records are deleted
//! - Stale pre-existing records are demoted to reserved and never deleted
//! - Unknown staleness never expires a record
//! - One failed store call does not stop the sweep
//! - A sweep after discovery sees the records discovery refreshed

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::*;
use ipam_sync_core::Reconciler;
use ipam_sync_core::model::Status;

fn days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days)).format("%Y-%m-%d").to_string()
}

#[tokio::test]
async fn stale_discovered_record_is_deleted() {
    let store = store_with_prefixes(&[("10.0.0.0/24", "active")]).await;
    store
        .insert_record(record(1, "10.0.0.5/24", Status::Active, &["discovered"], Some("2024-01-01")))
        .await;

    let reconciler = Reconciler::new(
        Box::new(ScriptedSource::new()),
        Box::new(store.clone()),
        test_config().with_expiration_days(7),
    )
    .unwrap();
    let mut snapshot = reconciler.snapshot().await.unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap();

    let summary = reconciler.expire_at(&mut snapshot, now).await;

    assert_eq!(summary.expired, 1);
    assert_eq!(summary.deleted, 1);
    assert!(store.is_empty().await);
    assert!(snapshot.records.find_record_for("10.0.0.5/24").is_none());
}

#[tokio::test]
async fn stale_manual_record_is_reserved_not_deleted() {
    let store = store_with_prefixes(&[("10.0.0.0/24", "active")]).await;
    let original = record(1, "10.0.0.5/24", Status::Active, &["core"], Some("2024-01-01"));
    store.insert_record(original.clone()).await;

    let reconciler = Reconciler::new(
        Box::new(ScriptedSource::new()),
        Box::new(store.clone()),
        test_config().with_expiration_days(7),
    )
    .unwrap();
    let mut snapshot = reconciler.snapshot().await.unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap();

    let summary = reconciler.expire_at(&mut snapshot, now).await;
    assert_eq!(summary.reserved, 1);
    assert_eq!(summary.deleted, 0);

    let after = store.record_at("10.0.0.5/24").await.expect("record kept");
    assert_eq!(after.status, Status::Reserved);
    assert_eq!(after.tags, original.tags);
    assert_eq!(after.custom_fields, original.custom_fields);
}

#[tokio::test]
async fn unknown_and_fresh_and_inactive_records_are_left_alone() {
    let memory = store_with_prefixes(&[("10.0.0.0/24", "active")]).await;
    memory
        .insert_record(record(1, "10.0.0.1/24", Status::Active, &["discovered"], None))
        .await;
    memory
        .insert_record(record(2, "10.0.0.2/24", Status::Active, &["discovered"], Some("not-a-date")))
        .await;
    memory
        .insert_record(record(3, "10.0.0.3/24", Status::Active, &["discovered"], Some("2024-01-08")))
        .await;
    memory
        .insert_record(record(4, "10.0.0.4/24", Status::Reserved, &[], Some("2020-01-01")))
        .await;
    memory
        .insert_record(record(5, "10.0.0.5/24", Status::from("deprecated"), &["discovered"], Some("2020-01-01")))
        .await;
    let store = FlakyStore::new(memory.clone(), &[]);

    let reconciler = Reconciler::new(
        Box::new(ScriptedSource::new()),
        Box::new(store.clone()),
        test_config().with_expiration_days(7),
    )
    .unwrap();
    let mut snapshot = reconciler.snapshot().await.unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap();

    let summary = reconciler.expire_at(&mut snapshot, now).await;

    assert_eq!(summary.examined, 3);
    assert_eq!(summary.unknown, 2);
    assert_eq!(summary.expired, 0);
    assert_eq!(store.write_count(), 0);
    assert_eq!(memory.len().await, 5);
}

#[tokio::test]
async fn sweep_continues_past_store_failures() {
    let memory = store_with_prefixes(&[]).await;
    memory
        .insert_record(record(1, "10.0.0.1/24", Status::Active, &["discovered"], Some("2024-01-01")))
        .await;
    memory
        .insert_record(record(2, "10.0.0.2/24", Status::Active, &[], Some("2024-01-01")))
        .await;
    memory
        .insert_record(record(3, "10.0.0.3/24", Status::Active, &["discovered"], Some("2024-01-01")))
        .await;
    let store = FlakyStore::new(memory.clone(), &["10.0.0.1/24", "10.0.0.2/24"]);

    let reconciler = Reconciler::new(
        Box::new(ScriptedSource::new()),
        Box::new(store),
        test_config().with_expiration_days(7),
    )
    .unwrap();
    let mut snapshot = reconciler.snapshot().await.unwrap();
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

    let summary = reconciler.expire_at(&mut snapshot, now).await;

    assert_eq!(summary.expired, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.deleted, 1);
    assert!(memory.record_at("10.0.0.1/24").await.is_some());
    assert_eq!(memory.record_at("10.0.0.2/24").await.unwrap().status, Status::Active);
    assert!(memory.record_at("10.0.0.3/24").await.is_none());
}

#[tokio::test]
async fn full_run_does_not_expire_what_discovery_just_saw() {
    let store = store_with_prefixes(&[("10.0.0.0/24", "active")]).await;
    store
        .insert_record(record(1, "10.0.0.5/24", Status::Active, &["discovered"], Some(&days_ago(30))))
        .await;
    store
        .insert_record(record(2, "10.0.0.6/24", Status::Active, &["discovered"], Some(&days_ago(30))))
        .await;

    let seen_now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let source = ScriptedSource::new().with_network(
        "N1",
        &[OPT_IN],
        vec![observation("10.0.0.5", "aa:bb:cc:dd:ee:ff", &seen_now)],
    );

    let reconciler =
        Reconciler::new(Box::new(source), Box::new(store.clone()), test_config()).unwrap();
    let summary = reconciler.run().await.unwrap();

    assert_eq!(summary.discovery.updated, 1);
    assert_eq!(summary.expiration.deleted, 1);
    assert!(store.record_at("10.0.0.5/24").await.is_some());
    assert!(store.record_at("10.0.0.6/24").await.is_none());
}
