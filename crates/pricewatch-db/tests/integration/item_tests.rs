use pricewatch_core::job::{JobFilter, Observation};
use pricewatch_core::traits::{ItemDirectory, JobSource, ObservationStore};

use crate::integration::common::{add_group, insert_item, insert_item_at, price_of, setup_test_db};

#[tokio::test]
async fn eligible_jobs_skip_deleted_and_manual() {
    let (db, _container) = setup_test_db().await;
    insert_item(&db, "A", "Alpha", false, false).await;
    insert_item(&db, "B", "Beta", true, false).await;
    insert_item(&db, "C", "Gamma", false, true).await;
    let repo = db.item_repo();

    let jobs = repo.eligible_jobs(&JobFilter::default()).await.unwrap();
    let keys: Vec<_> = jobs.iter().map(|j| j.key.as_str()).collect();
    assert_eq!(keys, vec!["A"]);
    assert_eq!(jobs[0].locator, "https://example.com/product/A");

    let jobs = repo
        .eligible_jobs(&JobFilter::default().include_manually_priced())
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);
}

#[tokio::test]
async fn eligible_jobs_respect_limit() {
    let (db, _container) = setup_test_db().await;
    for key in ["A", "B", "C"] {
        insert_item(&db, key, key, false, false).await;
    }

    let jobs = db
        .item_repo()
        .eligible_jobs(&JobFilter::default().with_limit(2))
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);
}

#[tokio::test]
async fn priced_observation_overwrites_price() {
    let (db, _container) = setup_test_db().await;
    insert_item(&db, "A", "Alpha", false, false).await;
    let repo = db.item_repo();

    repo.update_observation(&Observation::priced("A", 11.0, 1))
        .await
        .unwrap();
    assert_eq!(price_of(&db, "A").await, (Some(11.0), true));
}

#[tokio::test]
async fn absent_observation_keeps_last_price() {
    let (db, _container) = setup_test_db().await;
    insert_item(&db, "A", "Alpha", false, false).await;
    let repo = db.item_repo();

    repo.update_observation(&Observation::priced("A", 16.5, 1))
        .await
        .unwrap();
    repo.update_observation(&Observation::absent("A", 2))
        .await
        .unwrap();

    assert_eq!(price_of(&db, "A").await, (Some(16.5), true));
}

#[tokio::test]
async fn observation_for_unknown_key_fails() {
    let (db, _container) = setup_test_db().await;
    let result = db
        .item_repo()
        .update_observation(&Observation::priced("missing", 1.0, 1))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn describe_collects_groups() {
    let (db, _container) = setup_test_db().await;
    insert_item(&db, "A", "Pikachu", false, false).await;
    add_group(&db, "A", "Jungle Booster Box").await;
    add_group(&db, "A", "Base Set Booster Box").await;
    insert_item(&db, "B", "Bulbasaur", false, false).await;
    let repo = db.item_repo();

    let ctx = repo.describe("A").await.unwrap().unwrap();
    assert_eq!(ctx.name, "Pikachu");
    assert_eq!(
        ctx.groups,
        vec!["Base Set Booster Box", "Jungle Booster Box"]
    );

    let ctx = repo.describe("B").await.unwrap().unwrap();
    assert!(ctx.groups.is_empty());

    assert!(repo.describe("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn items_sharing_a_locator_become_one_job() {
    let (db, _container) = setup_test_db().await;
    let shared = "https://example.com/product/box";
    insert_item_at(&db, "B", shared, "Booster Box", false, false).await;
    insert_item_at(&db, "A", shared, "Booster Box (prize)", false, false).await;
    insert_item(&db, "C", "Gamma", false, false).await;

    let jobs = db
        .item_repo()
        .eligible_jobs(&JobFilter::default())
        .await
        .unwrap();
    let pairs: Vec<_> = jobs
        .iter()
        .map(|j| (j.key.as_str(), j.locator.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("A", shared), ("C", "https://example.com/product/C")]
    );
}

#[tokio::test]
async fn observation_is_written_to_every_item_sharing_the_locator() {
    let (db, _container) = setup_test_db().await;
    let shared = "https://example.com/product/box";
    insert_item_at(&db, "A", shared, "Booster Box", false, false).await;
    insert_item_at(&db, "B", shared, "Booster Box (prize)", false, false).await;
    insert_item_at(&db, "M", shared, "Hand priced", true, false).await;
    insert_item(&db, "C", "Gamma", false, false).await;
    let repo = db.item_repo();

    repo.update_observation(&Observation::priced("A", 12.0, 1))
        .await
        .unwrap();

    assert_eq!(price_of(&db, "A").await, (Some(12.0), true));
    assert_eq!(price_of(&db, "B").await, (Some(12.0), true));
    assert_eq!(price_of(&db, "M").await, (None, false));
    assert_eq!(price_of(&db, "C").await, (None, false));
}
