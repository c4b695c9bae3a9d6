use std::time::Duration;

use chrono::NaiveDate;
use pricewatch_core::traits::LedgerStore;

use crate::integration::common::setup_test_db;

#[tokio::test]
async fn terminated_connections_are_reopened_on_checkout() {
    let (db, _container) = setup_test_db().await;
    let repo = db.ledger_repo();

    {
        let mut conn = db.connections().acquire().await.unwrap();
        sqlx::query(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = current_database() AND pid <> pg_backend_pid()",
        )
        .execute(&mut *conn)
        .await
        .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    for i in 0..10 {
        let rec = repo
            .record_failure("A", day)
            .await
            .unwrap_or_else(|e| panic!("write {i} failed on a dead connection: {e}"));
        assert_eq!(rec.failure_count, i + 1);
    }

    assert_eq!(db.connections().pool().live(), 4);
    assert_eq!(db.connections().pool().available(), 4);
}
