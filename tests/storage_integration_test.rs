//! Integration tests for the visit store
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests (needs DATABASE_URL)
//! - By default, SQLite always runs and PostgreSQL runs when DATABASE_URL points at it

use chrono::{Duration, Utc};
use std::sync::Arc;
use visitor_tracker::models::{Location, NewVisit};
use visitor_tracker::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<dyn Storage> {
    // One connection: every pooled connection to :memory: is a separate database
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper to create PostgreSQL test storage on a clean table
async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;

    let pool = sqlx::PgPool::connect(&db_url).await.ok()?;
    sqlx::query("TRUNCATE visits RESTART IDENTITY")
        .execute(&pool)
        .await
        .ok()?;

    Some(Arc::new(storage))
}

fn visit(ip: &str, minutes_ago: i64) -> NewVisit {
    let mut visit = NewVisit::new(ip);
    visit.timestamp = visit.timestamp - Duration::minutes(minutes_ago);
    visit
}

async fn check_insert_returns_stored_record(storage: Arc<dyn Storage>) {
    let mut new_visit = NewVisit::new("203.0.113.7");
    new_visit.location = Location::from_parts(Some("Japan"), Some("Tokyo"), Some("Tokyo"));
    new_visit.browser = "Chrome 120".to_string();
    new_visit.os = "Windows 10".to_string();
    new_visit.device = "Windows PC".to_string();

    let stored = storage.insert(&new_visit).await.unwrap();
    assert!(stored.id > 0);
    assert_eq!(stored.ip, "203.0.113.7");
    assert_eq!(stored.location.city, "Tokyo");
    assert_eq!(stored.timestamp, new_visit.timestamp);

    let all = storage.list_all().await.unwrap();
    assert_eq!(all, vec![stored]);
}

async fn check_list_all_newest_first(storage: Arc<dyn Storage>) {
    // Inserted out of chronological order
    for (ip, minutes_ago) in [
        ("198.51.100.1", 30),
        ("198.51.100.2", 5),
        ("198.51.100.3", 60),
        ("198.51.100.4", 0),
        ("198.51.100.5", 15),
    ] {
        storage.insert(&visit(ip, minutes_ago)).await.unwrap();
    }

    let visits = storage.list_all().await.unwrap();
    assert_eq!(visits.len(), 5);
    for pair in visits.windows(2) {
        assert!(
            pair[0].timestamp >= pair[1].timestamp,
            "visits out of order: {} before {}",
            pair[0].timestamp,
            pair[1].timestamp
        );
    }
    let ips: Vec<&str> = visits.iter().map(|v| v.ip.as_str()).collect();
    assert_eq!(
        ips,
        vec!["198.51.100.4", "198.51.100.2", "198.51.100.5", "198.51.100.1", "198.51.100.3"]
    );
}

async fn check_equal_timestamps_newest_insert_first(storage: Arc<dyn Storage>) {
    let first = NewVisit::new("192.0.2.1");
    let mut second = NewVisit::new("192.0.2.2");
    second.timestamp = first.timestamp;

    storage.insert(&first).await.unwrap();
    storage.insert(&second).await.unwrap();

    let visits = storage.list_all().await.unwrap();
    assert_eq!(visits[0].ip, "192.0.2.2");
    assert_eq!(visits[1].ip, "192.0.2.1");
}

async fn check_empty_ip_rejected(storage: Arc<dyn Storage>) {
    let result = storage.insert(&NewVisit::new("  ")).await;
    assert!(matches!(result, Err(StorageError::Invalid(_))));
    assert_eq!(storage.count().await.unwrap(), 0);
}

async fn check_pagination(storage: Arc<dyn Storage>) {
    for i in 0..7 {
        storage
            .insert(&visit(&format!("192.0.2.{}", i), 10 - i))
            .await
            .unwrap();
    }

    assert_eq!(storage.count().await.unwrap(), 7);

    let page1 = storage.list(3, 0).await.unwrap();
    let page2 = storage.list(3, 3).await.unwrap();
    let page3 = storage.list(3, 6).await.unwrap();
    assert_eq!(page1.len(), 3);
    assert_eq!(page2.len(), 3);
    assert_eq!(page3.len(), 1);
    assert_eq!(page1[0].ip, "192.0.2.6");
    assert_eq!(page3[0].ip, "192.0.2.0");

    let all = storage.list_all().await.unwrap();
    let paged: Vec<_> = page1.into_iter().chain(page2).chain(page3).collect();
    assert_eq!(all, paged);
}

async fn check_concurrent_inserts(storage: Arc<dyn Storage>) {
    let mut handles = vec![];
    for i in 0..20 {
        let storage = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            storage
                .insert(&NewVisit::new(format!("203.0.113.{}", i)))
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let visits = storage.list_all().await.unwrap();
    assert_eq!(visits.len(), 20);
    let mut ids: Vec<i64> = visits.iter().map(|v| v.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 20, "ids must be unique");
}

#[tokio::test]
async fn test_insert_returns_stored_record_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_insert_returns_stored_record(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_list_all_newest_first_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_list_all_newest_first(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_equal_timestamps_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_equal_timestamps_newest_insert_first(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_empty_ip_rejected_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_empty_ip_rejected(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_pagination_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_pagination(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_concurrent_inserts_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_concurrent_inserts(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_init_is_idempotent_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    let storage = create_sqlite_storage().await;
    storage.insert(&NewVisit::new("192.0.2.1")).await.unwrap();
    storage.init().await.unwrap();
    assert_eq!(storage.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_sqlite_file_created_if_missing() {
    if !should_test_backend("sqlite") {
        return;
    }
    let path = std::env::temp_dir().join(format!(
        "visitor-tracker-test-{}-{}.db",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let url = format!("sqlite://{}", path.display());

    let storage = SqliteStorage::new(&url, 2).await.unwrap();
    storage.init().await.unwrap();
    storage.insert(&NewVisit::new("192.0.2.1")).await.unwrap();
    assert!(path.exists());

    let _ = std::fs::remove_file(&path);
}

// PostgreSQL runs the same checks sequentially on one table, so they live in
// a single test.
#[tokio::test]
async fn test_visit_store_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        eprintln!("Skipping PostgreSQL tests: DATABASE_URL not set to a PostgreSQL database");
        return;
    };
    check_insert_returns_stored_record(storage).await;

    let storage = create_postgres_storage().await.unwrap();
    check_list_all_newest_first(storage).await;

    let storage = create_postgres_storage().await.unwrap();
    check_equal_timestamps_newest_insert_first(storage).await;

    let storage = create_postgres_storage().await.unwrap();
    check_empty_ip_rejected(storage).await;

    let storage = create_postgres_storage().await.unwrap();
    check_pagination(storage).await;

    let storage = create_postgres_storage().await.unwrap();
    check_concurrent_inserts(storage).await;
}
