use chrono::NaiveDate;
use pricewatch_core::traits::LedgerStore;

use crate::integration::common::setup_test_db;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

#[tokio::test]
async fn first_failure_creates_record() {
    let (db, _container) = setup_test_db().await;
    let repo = db.ledger_repo();

    let rec = repo.record_failure("A", day(1)).await.unwrap();
    assert_eq!(rec.failure_count, 1);
    assert_eq!(rec.consecutive_days, 1);
    assert_eq!(rec.last_failure_date, Some(day(1)));
    assert!(rec.last_success_date.is_none());
}

#[tokio::test]
async fn streak_rules_match_in_memory_model() {
    let (db, _container) = setup_test_db().await;
    let repo = db.ledger_repo();

    assert_eq!(repo.record_failure("A", day(1)).await.unwrap().consecutive_days, 1);
    assert_eq!(repo.record_failure("A", day(2)).await.unwrap().consecutive_days, 2);
    // same day keeps the streak
    let rec = repo.record_failure("A", day(2)).await.unwrap();
    assert_eq!(rec.consecutive_days, 2);
    assert_eq!(rec.failure_count, 3);
    // a gap resets it
    let rec = repo.record_failure("A", day(5)).await.unwrap();
    assert_eq!(rec.consecutive_days, 1);
    assert_eq!(rec.failure_count, 4);
}

#[tokio::test]
async fn success_resets_counters() {
    let (db, _container) = setup_test_db().await;
    let repo = db.ledger_repo();

    for d in 1..=9 {
        repo.record_failure("A", day(d)).await.unwrap();
    }
    repo.record_success("A", day(10)).await.unwrap();

    let rec = repo.get("A").await.unwrap().unwrap();
    assert_eq!(rec.failure_count, 0);
    assert_eq!(rec.consecutive_days, 0);
    assert_eq!(rec.last_success_date, Some(day(10)));

    let rec = repo.record_failure("A", day(11)).await.unwrap();
    assert_eq!(rec.consecutive_days, 1);
}

#[tokio::test]
async fn success_without_record_creates_nothing() {
    let (db, _container) = setup_test_db().await;
    let repo = db.ledger_repo();

    repo.record_success("A", day(1)).await.unwrap();
    assert!(repo.get("A").await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_failures_are_not_lost() {
    let (db, _container) = setup_test_db().await;
    let repo = db.ledger_repo();

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let repo = repo.clone();
        tasks.push(tokio::spawn(async move {
            repo.record_failure("A", day(1)).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let rec = repo.get("A").await.unwrap().unwrap();
    assert_eq!(rec.failure_count, 12);
    assert_eq!(rec.consecutive_days, 1);
}

#[tokio::test]
async fn list_streaks_orders_longest_first() {
    let (db, _container) = setup_test_db().await;
    let repo = db.ledger_repo();

    for d in 1..=3 {
        repo.record_failure("A", day(d)).await.unwrap();
    }
    for d in 2..=3 {
        repo.record_failure("B", day(d)).await.unwrap();
    }
    repo.record_failure("C", day(3)).await.unwrap();

    let streaks = repo.list_streaks(2).await.unwrap();
    let keys: Vec<_> = streaks.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["A", "B"]);
}
