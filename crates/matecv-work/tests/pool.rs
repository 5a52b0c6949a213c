// crates/matecv-work/tests/pool.rs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver};
use matecv_work::thread::{PoolOutcome, WorkPool};
use matecv_work::CancelToken;

fn counting_pool(
    items: usize,
    threads: usize,
    delay: Duration,
    cancel: CancelToken,
) -> (WorkPool, Arc<AtomicUsize>, Receiver<PoolOutcome>) {
    let ran = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = bounded(1);
    let counter = Arc::clone(&ran);
    let pool = WorkPool::start(
        "test",
        threads,
        (0..items).collect::<Vec<_>>(),
        cancel,
        move |_: &usize| {
            thread::sleep(delay);
            counter.fetch_add(1, Ordering::SeqCst);
        },
        move |outcome| {
            let _ = tx.send(outcome);
        },
    )
    .expect("start pool");
    (pool, ran, rx)
}

#[test]
fn runs_every_task_then_finishes() {
    let (pool, ran, rx) = counting_pool(64, 4, Duration::ZERO, CancelToken::new());
    assert_eq!(rx.recv_timeout(Duration::from_secs(10)), Ok(PoolOutcome::Completed));
    pool.wait();
    assert!(pool.is_stopped());
    assert_eq!(ran.load(Ordering::SeqCst), 64);
}

#[test]
fn stop_skips_remaining_tasks() {
    let (pool, ran, rx) = counting_pool(200, 1, Duration::from_millis(5), CancelToken::new());
    thread::sleep(Duration::from_millis(30));
    pool.stop();
    assert_eq!(rx.recv_timeout(Duration::from_secs(10)), Ok(PoolOutcome::Stopped));
    pool.wait();
    let n = ran.load(Ordering::SeqCst);
    assert!(n < 200, "ran {n} tasks after stop");
}

#[test]
fn stop_lets_the_running_task_finish() {
    let gate = Arc::new(Barrier::new(2));
    let first = Arc::new(AtomicBool::new(true));
    let landed = Arc::new(AtomicBool::new(false));
    let ran = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = bounded(1);

    let pool = {
        let (gate, first, landed, ran) = (Arc::clone(&gate), Arc::clone(&first), Arc::clone(&landed), Arc::clone(&ran));
        WorkPool::start(
            "held",
            1,
            (0..10).collect::<Vec<u32>>(),
            CancelToken::new(),
            move |_: &u32| {
                ran.fetch_add(1, Ordering::SeqCst);
                if first.swap(false, Ordering::SeqCst) {
                    gate.wait();
                    gate.wait();
                    landed.store(true, Ordering::SeqCst);
                }
            },
            move |outcome| {
                let _ = tx.send(outcome);
            },
        )
        .expect("start pool")
    };

    // The first task is now parked between the two waits.
    gate.wait();
    pool.stop();
    assert!(!pool.is_stopped());
    assert!(!landed.load(Ordering::SeqCst));
    gate.wait();

    assert_eq!(rx.recv_timeout(Duration::from_secs(10)), Ok(PoolOutcome::Stopped));
    pool.wait();
    assert!(pool.is_stopped());
    assert!(landed.load(Ordering::SeqCst));
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn cancelled_token_runs_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let (pool, ran, rx) = counting_pool(10, 2, Duration::ZERO, cancel);
    assert_eq!(rx.recv_timeout(Duration::from_secs(10)), Ok(PoolOutcome::Stopped));
    pool.wait();
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_task_does_not_take_down_the_pool() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let (tx, rx) = bounded(1);
    let pool = WorkPool::start(
        "panicky",
        2,
        (0..10).collect::<Vec<u32>>(),
        CancelToken::new(),
        move |i: &u32| {
            if *i == 3 {
                panic!("boom");
            }
            counter.fetch_add(1, Ordering::SeqCst);
        },
        move |outcome| {
            let _ = tx.send(outcome);
        },
    )
    .expect("start pool");

    assert_eq!(rx.recv_timeout(Duration::from_secs(10)), Ok(PoolOutcome::Completed));
    pool.wait();
    assert_eq!(ran.load(Ordering::SeqCst), 9);
}

#[test]
fn kill_reports_drain() {
    let (pool, _ran, _rx) = counting_pool(100, 1, Duration::from_millis(2), CancelToken::new());
    assert!(pool.kill(Duration::from_secs(10)));
    assert!(pool.is_stopped());
}
