//! Retention Tests
//!
//! - The startup purge removes rows older than the horizon
//! - Rows inside the horizon are never touched
//! - Purging twice deletes nothing the second time

mod common;

use std::time::Duration;

use sqlite_log_sink::lock::WriteLock;
use sqlite_log_sink::retention::purge_once;
use sqlite_log_sink::{Database, JournalMode, SqliteSink};

fn seed_mixed_ages(path: &std::path::Path) {
    common::seed_rows(
        path,
        &[
            (chrono::Duration::days(10), "ten days"),
            (chrono::Duration::days(8), "eight days"),
            (chrono::Duration::days(6), "six days"),
            (chrono::Duration::hours(1), "one hour"),
        ],
    );
}

fn messages(path: &std::path::Path) -> Vec<String> {
    common::read_rows(path)
        .into_iter()
        .filter_map(|row| row.message)
        .collect()
}

#[tokio::test]
async fn startup_purge_removes_expired_rows() {
    common::init_tracing();
    let (_dir, path) = common::temp_db_path("startup.db");
    seed_mixed_ages(&path);

    let sink = SqliteSink::open(
        common::test_options(&path).with_retention(Duration::from_secs(7 * 86_400)),
    )
    .unwrap();

    common::eventually(Duration::from_secs(5), Duration::from_millis(20), || {
        (sink.metrics().rows_purged == 2).then_some(())
    })
    .await;
    sink.shutdown();

    assert_eq!(messages(&path), vec!["six days", "one hour"]);
}

#[tokio::test]
async fn periodic_purge_catches_rows_that_age_out() {
    let (_dir, path) = common::temp_db_path("periodic.db");
    common::seed_rows(&path, &[(chrono::Duration::milliseconds(100), "young")]);

    let sink = SqliteSink::open(
        common::test_options(&path)
            .with_retention(Duration::from_millis(500))
            .with_purge_interval(Duration::from_millis(100)),
    )
    .unwrap();

    common::eventually(Duration::from_secs(5), Duration::from_millis(50), || {
        (sink.metrics().rows_purged == 1).then_some(())
    })
    .await;
    sink.shutdown();

    assert_eq!(common::count_rows(&path), 0);
}

#[tokio::test]
async fn purge_once_is_exact_and_idempotent() {
    let (_dir, path) = common::temp_db_path("direct.db");
    seed_mixed_ages(&path);

    let conn = Database::open(&path, JournalMode::Delete)
        .unwrap()
        .into_connection();
    let lock = WriteLock::new(conn);
    let retention = Duration::from_secs(7 * 86_400);

    assert_eq!(purge_once(&lock, retention).await.unwrap(), 2);
    assert_eq!(purge_once(&lock, retention).await.unwrap(), 0);
    drop(lock);

    assert_eq!(messages(&path), vec!["six days", "one hour"]);
}

#[tokio::test]
async fn shutdown_interrupts_purge_sleep() {
    let (_dir, path) = common::temp_db_path("sleep.db");
    let sink = SqliteSink::open(
        common::test_options(&path).with_purge_interval(Duration::from_secs(24 * 3600)),
    )
    .unwrap();

    let start = std::time::Instant::now();
    sink.shutdown();
    assert!(start.elapsed() < Duration::from_secs(5));
}
