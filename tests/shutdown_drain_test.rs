//! Shutdown Drain Tests
//!
//! Records accepted before `shutdown()` are written before it returns, even
//! when they span several batches. That holds for every caller, including
//! one that races another shutdown already in progress.

mod common;

use std::sync::{Arc, Barrier};

use sqlite_log_sink::{SinkState, SqliteSink};

#[tokio::test]
async fn shutdown_writes_every_accepted_record() {
    let (_dir, path) = common::temp_db_path("drain.db");
    let sink = SqliteSink::open(
        common::test_options(&path)
            .with_queue_capacity(10_000)
            .with_batch_max_size(64),
    )
    .unwrap();

    for i in 0..3000 {
        assert!(sink.emit(common::numbered(i)));
    }
    sink.shutdown();

    assert_eq!(sink.queue_len(), 0);
    assert_eq!(common::count_rows(&path), 3000);

    let snap = sink.metrics();
    assert_eq!(snap.written, 3000);
    assert!(snap.batches_committed >= 3000 / 64);
    assert_eq!(snap.in_flight(), 0);
}

#[test]
fn shutdown_from_plain_thread_while_producers_run() {
    let (_dir, path) = common::temp_db_path("race.db");
    let sink = Arc::new(SqliteSink::open(common::test_options(&path)).unwrap());

    let producers: Vec<_> = (0..4)
        .map(|t| {
            let sink = Arc::clone(&sink);
            std::thread::spawn(move || {
                for i in 0..2000 {
                    sink.emit(common::numbered(t * 10_000 + i));
                }
            })
        })
        .collect();

    std::thread::sleep(std::time::Duration::from_millis(5));
    sink.shutdown();

    for producer in producers {
        producer.join().unwrap();
    }

    let snap = sink.metrics();
    assert_eq!(snap.accepted + snap.dropped, 8000);
    assert_eq!(snap.written, snap.accepted);
    assert_eq!(common::count_rows(&path) as u64, snap.accepted);
}

#[test]
fn concurrent_shutdown_callers_both_return_stopped() {
    common::init_tracing();
    let (_dir, path) = common::temp_db_path("double.db");
    let sink = Arc::new(
        SqliteSink::open(
            common::test_options(&path)
                .with_queue_capacity(4096)
                .with_batch_max_size(1),
        )
        .unwrap(),
    );

    for i in 0..2000 {
        assert!(sink.emit(common::numbered(i)));
    }

    let barrier = Arc::new(Barrier::new(2));
    let callers: Vec<_> = (0..2)
        .map(|_| {
            let sink = Arc::clone(&sink);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                sink.shutdown();
                (sink.state(), sink.metrics().written)
            })
        })
        .collect();

    for caller in callers {
        let (state, written) = caller.join().unwrap();
        assert_eq!(state, SinkState::Stopped);
        assert_eq!(written, 2000);
    }

    assert_eq!(common::count_rows(&path), 2000);
}
