use pricewatch_db::{Database, DatabaseConfig};
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Spins up a PostgreSQL container and returns a migrated database.
///
/// The `ContainerAsync` must be kept in scope for the test duration;
/// dropping it will stop the container.
pub async fn setup_test_db() -> (Database, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "pricewatch_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let config = DatabaseConfig::new(format!(
        "postgresql://postgres:postgres@{host}:{port}/pricewatch_test"
    ))
    .with_max_connections(4)
    .expect("valid pool size");

    // Retry connection until container is fully ready
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let db = loop {
        match Database::connect(&config).await {
            Ok(db) => break db,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    db.migrate().await.expect("Failed to run migrations");
    (db, container)
}

/// Insert an item row directly, at its own locator.
pub async fn insert_item(db: &Database, key: &str, name: &str, manual: bool, deleted: bool) {
    let locator = format!("https://example.com/product/{key}");
    insert_item_at(db, key, &locator, name, manual, deleted).await;
}

/// Insert an item row listed under `locator`.
pub async fn insert_item_at(
    db: &Database,
    key: &str,
    locator: &str,
    name: &str,
    manual: bool,
    deleted: bool,
) {
    let mut conn = db.connections().acquire().await.unwrap();
    sqlx::query(
        "INSERT INTO items (key, locator, name, is_manually_priced, is_deleted) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(key)
    .bind(locator)
    .bind(name)
    .bind(manual)
    .bind(deleted)
    .execute(&mut *conn)
    .await
    .unwrap();
}

pub async fn add_group(db: &Database, key: &str, group: &str) {
    let mut conn = db.connections().acquire().await.unwrap();
    sqlx::query("INSERT INTO item_groups (item_key, group_name) VALUES ($1, $2)")
        .bind(key)
        .bind(group)
        .execute(&mut *conn)
        .await
        .unwrap();
}

/// Current `(price, last_attempted_at IS NOT NULL)` for an item.
pub async fn price_of(db: &Database, key: &str) -> (Option<f64>, bool) {
    let mut conn = db.connections().acquire().await.unwrap();
    sqlx::query_as::<_, (Option<f64>, bool)>(
        "SELECT price, last_attempted_at IS NOT NULL FROM items WHERE key = $1",
    )
    .bind(key)
    .fetch_one(&mut *conn)
    .await
    .unwrap()
}
