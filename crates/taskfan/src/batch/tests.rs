use super::*;
use portable_atomic::{AtomicUsize, Ordering};
use std::thread;

fn sleepy(millis: u64, value: u64) -> Task<u64> {
    Task::new(move || {
        thread::sleep(Duration::from_millis(millis));
        Some(value)
    })
}

fn counted(executed: &Arc<AtomicUsize>, millis: u64, value: u64) -> Task<u64> {
    let executed = Arc::clone(executed);
    Task::new(move || {
        executed.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(millis));
        Some(value)
    })
}

#[tokio::test]
async fn empty_batch_returns_immediately() {
    let values = execute_batch::<u64>(Vec::new(), 4).await.unwrap();
    assert!(values.is_empty());

    // No pool is built, so even a zero pool size is accepted.
    let values = execute_batch::<u64>(Vec::new(), 0).await.unwrap();
    assert!(values.is_empty());

    let values = execute_batch_with_timeout::<u64>(Vec::new(), 0, Duration::ZERO)
        .await
        .unwrap();
    assert!(values.is_empty());
}

#[tokio::test]
async fn zero_pool_size_is_rejected_for_non_empty_batches() {
    let err = execute_batch(vec![sleepy(0, 1)], 0).await.unwrap_err();
    assert_eq!(err, Error::InvalidPoolSize { size: 0 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ten_tasks_on_five_workers_finish_in_two_waves() {
    let tasks = (0..10).map(|i| sleepy(1_000, i)).collect();

    let started = Instant::now();
    let mut values = execute_batch(tasks, 5).await.unwrap();
    let elapsed = started.elapsed();

    values.sort_unstable();
    assert_eq!(values, (0..10).collect::<Vec<_>>());
    assert!(elapsed >= Duration::from_millis(1_900), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3_500), "took {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn values_come_back_fastest_first() {
    let tasks = [500, 400, 300, 200, 100]
        .into_iter()
        .enumerate()
        .map(|(value, millis)| sleepy(millis, value as u64))
        .collect();

    let values = execute_batch(tasks, 5).await.unwrap();
    assert_eq!(values, vec![4, 3, 2, 1, 0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn absent_markers_are_filtered_out() {
    let tasks = (0..10_u64)
        .map(|i| Task::new(move || (i % 2 == 0).then_some(i)))
        .collect();

    let mut values = execute_batch(tasks, 3).await.unwrap();
    values.sort_unstable();
    assert_eq!(values, vec![0, 2, 4, 6, 8]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn inner_none_values_surface_in_both_helpers() {
    let make_tasks = || -> Vec<Task<Option<u64>>> {
        vec![
            Task::new(|| Some(None)),
            Task::new(|| Some(Some(1))),
            Task::new(|| None),
        ]
    };

    let mut plain = execute_batch(make_tasks(), 3).await.unwrap();
    let mut timed = execute_batch_with_timeout(make_tasks(), 3, Duration::from_secs(5))
        .await
        .unwrap();
    plain.sort_unstable();
    timed.sort_unstable();

    assert_eq!(plain, vec![None, Some(1)]);
    assert_eq!(timed, plain);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_larger_than_batch_is_fine() {
    let tasks = (0..3).map(|i| sleepy(10, i)).collect();
    let mut values = execute_batch(tasks, 64).await.unwrap();
    values.sort_unstable();
    assert_eq!(values, vec![0, 1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeout_bounds_admission_not_execution() {
    let executed = Arc::new(AtomicUsize::new(0));
    let tasks = (0..10).map(|i| counted(&executed, 1_000, i)).collect();

    let started = Instant::now();
    let values = execute_batch_with_timeout(tasks, 2, Duration::from_millis(1_500))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    let executed = executed.load(Ordering::SeqCst);
    assert!((2..10).contains(&executed), "admitted {executed} tasks");
    // Every admitted task ran to completion and was collected.
    assert_eq!(values.len(), executed);
    // Admitted work outlives the admission deadline.
    assert!(elapsed > Duration::from_millis(1_500), "took {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn generous_timeout_admits_everything() {
    let tasks = (0..8).map(|i| sleepy(20, i)).collect();
    let mut values = execute_batch_with_timeout(tasks, 2, Duration::from_secs(10))
        .await
        .unwrap();
    values.sort_unstable();
    assert_eq!(values, (0..8).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn elapsed_timeout_admits_nothing() {
    let executed = Arc::new(AtomicUsize::new(0));
    let tasks = (0..4).map(|i| counted(&executed, 10, i)).collect();

    let values = execute_batch_with_timeout(tasks, 2, Duration::ZERO)
        .await
        .unwrap();
    assert!(values.is_empty());
    assert_eq!(executed.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancellation_lets_running_tasks_finish_and_drops_the_rest() {
    let executed = Arc::new(AtomicUsize::new(0));
    let tasks = (0..6).map(|i| counted(&executed, 300, i)).collect();
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        })
    };

    let started = Instant::now();
    let values = execute_batch_with_cancellation(tasks, 2, &token)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(executed.load(Ordering::SeqCst), 2);
    assert_eq!(values.len(), 2);
    assert!(started.elapsed() < Duration::from_millis(900));
}

#[tokio::test]
async fn already_cancelled_token_runs_nothing() {
    let executed = Arc::new(AtomicUsize::new(0));
    let tasks = (0..4).map(|i| counted(&executed, 10, i)).collect();
    let token = CancellationToken::new();
    token.cancel();

    let values = execute_batch_with_cancellation(tasks, 2, &token)
        .await
        .unwrap();
    assert!(values.is_empty());
    assert_eq!(executed.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropping_a_batch_midway_releases_its_tasks() {
    let captured = Arc::new(());
    let tasks = (0..100)
        .map(|i| {
            let captured = Arc::clone(&captured);
            Task::new(move || {
                let _held = &captured;
                thread::sleep(Duration::from_millis(20));
                Some(i)
            })
        })
        .collect();

    let outcome =
        tokio::time::timeout(Duration::from_millis(50), execute_batch(tasks, 1)).await;
    assert!(outcome.is_err());

    let deadline = Instant::now() + Duration::from_secs(2);
    while Arc::strong_count(&captured) > 1 {
        assert!(
            Instant::now() < deadline,
            "{} task references still alive",
            Arc::strong_count(&captured) - 1
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
