//! Integration tests for marshalling work onto an owner thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use horizon_objectlist_core::{Signal, ThreadAffinity, owner_queue};
use parking_lot::Mutex;

fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("horizon_objectlist_core=trace")),
        )
        .with_test_writer()
        .try_init();
}

#[test]
fn test_posts_from_many_threads_run_on_owner() {
    setup();
    let (poster, queue) = owner_queue::<(usize, usize)>();
    let owner = ThreadAffinity::current();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let poster = poster.clone();
            std::thread::spawn(move || {
                for n in 0..25 {
                    poster.post((worker, n)).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut seen: Vec<Vec<usize>> = vec![Vec::new(); 4];
    let processed = queue.process_all(|(worker, n)| {
        assert!(owner.is_same_thread());
        seen[worker].push(n);
    });

    assert_eq!(processed, 100);
    // Each poster's items arrive in the order that poster sent them.
    for items in &seen {
        assert_eq!(*items, (0..25).collect::<Vec<_>>());
    }
}

#[test]
fn test_waiting_poster_sees_owner_side_effects() {
    setup();
    let (poster, queue) = owner_queue::<String>();
    let log = Arc::new(Mutex::new(Vec::new()));

    let remote_log = log.clone();
    let worker = std::thread::spawn(move || {
        let waiter = poster.post_with_completion("refresh".to_string()).unwrap();
        assert!(waiter.wait_timeout(Duration::from_secs(5)));
        remote_log.lock().clone()
    });

    let mut processed = 0;
    while processed == 0 {
        processed = queue.process_all(|item| log.lock().push(item));
        std::thread::yield_now();
    }

    assert_eq!(worker.join().unwrap(), vec!["refresh".to_string()]);
}

#[test]
fn test_discarded_work_releases_waiter() {
    setup();
    let (poster, queue) = owner_queue::<u32>();
    let waiter = poster.post_with_completion(1).unwrap();
    drop(queue);
    assert!(waiter.wait_timeout(Duration::from_secs(5)));
    assert!(poster.post(2).is_err());
}

#[test]
fn test_signal_emitted_while_draining() {
    setup();
    let changed = Signal::<usize>::new();
    let total = Arc::new(AtomicUsize::new(0));
    let sink = total.clone();
    changed.connect(move |&n| {
        sink.fetch_add(n, Ordering::SeqCst);
    });

    let (poster, queue) = owner_queue::<usize>();
    for n in 1..=4 {
        poster.post(n).unwrap();
    }
    queue.process_all(|n| changed.emit(n));

    assert_eq!(total.load(Ordering::SeqCst), 10);
    assert_eq!(changed.emit_count(), 4);
}
