//! Package iteration strategies
//!
//! Three ways to apply a task function to a package set:
//!
//! - [`for_each`] dispatches every task in input order and returns without
//!   waiting for any of them.
//! - [`parallel`] runs everything at once and collects results in input order.
//! - [`batched`] runs packages tier by tier in dependency order, with at most
//!   [`DEFAULT_CONCURRENCY`] tasks in flight inside a tier.
//!
//! Task futures are spawned onto the tokio runtime, so a failure never cancels
//! siblings that are already running; their results are simply dropped.

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::execution::dependencies::topologically_batch_packages;
use crate::package::Package;

/// Maximum number of tasks in flight within one dependency tier
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Dispatch `task` for every package in input order without awaiting it.
///
/// The task function is called synchronously for each package, in order, and the
/// returned future is spawned. Resolves as soon as the dispatch loop is done;
/// failures of the spawned futures are never observed.
pub async fn for_each<F, Fut, T>(packages: &[Package], task: F)
where
    F: Fn(Package) -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    for package in packages {
        let fut = task(package.clone());
        tokio::spawn(async move {
            let _ = fut.await;
        });
    }
}

/// Run `task` for every package concurrently and collect results in input order.
///
/// Fails with the first failure to complete. Tasks still running at that point
/// keep running in the background.
pub async fn parallel<F, Fut, T>(packages: &[Package], task: F) -> anyhow::Result<Vec<T>>
where
    F: Fn(Package) -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut in_flight: FuturesUnordered<_> = packages
        .iter()
        .enumerate()
        .map(|(index, package)| {
            let handle = spawn_task(&task, package.clone());
            async move { (index, handle.await) }
        })
        .collect();

    let mut results: Vec<Option<T>> = packages.iter().map(|_| None).collect();
    while let Some((index, joined)) = in_flight.next().await {
        results[index] = Some(settle(packages[index].name(), joined)?);
    }

    Ok(results.into_iter().flatten().collect())
}

/// Run `task` in dependency order with [`DEFAULT_CONCURRENCY`] tasks per tier.
pub async fn batched<F, Fut, T>(packages: &[Package], task: F) -> anyhow::Result<()>
where
    F: Fn(Package) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    batched_with_concurrency(packages, task, DEFAULT_CONCURRENCY).await
}

/// Run `task` in dependency order with at most `concurrency` tasks in flight per tier.
///
/// Tiers run strictly one after another. The first failure stops the run: no
/// later tier starts and no queued package of the current tier is dispatched.
/// The result settles with that failure right away, without waiting for
/// in-flight siblings. A dependency cycle fails before any task runs.
pub async fn batched_with_concurrency<F, Fut, T>(
    packages: &[Package],
    task: F,
    concurrency: usize,
) -> anyhow::Result<()>
where
    F: Fn(Package) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let batches = topologically_batch_packages(packages)?;
    let task = Arc::new(task);

    for tier in batches {
        run_tier(tier, Arc::clone(&task), concurrency.max(1)).await?;
    }

    Ok(())
}

/// Worker pool over a single tier.
///
/// `concurrency` workers pull packages from a shared queue until it is empty or
/// a failure was reported. The tier completes when every worker has exited,
/// which is observed as the failure channel closing.
async fn run_tier<F, Fut, T>(
    tier: Vec<Package>,
    task: Arc<F>,
    concurrency: usize,
) -> anyhow::Result<()>
where
    F: Fn(Package) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let workers = concurrency.min(tier.len());
    let queue = Arc::new(Mutex::new(VecDeque::from(tier)));
    let aborted = Arc::new(AtomicBool::new(false));
    let (failure_tx, mut failure_rx) = mpsc::unbounded_channel::<anyhow::Error>();

    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let aborted = Arc::clone(&aborted);
        let task = Arc::clone(&task);
        let failure_tx = failure_tx.clone();

        tokio::spawn(async move {
            while !aborted.load(Ordering::SeqCst) {
                let next = queue
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .pop_front();
                let Some(package) = next else {
                    break;
                };

                let name = package.name().to_string();
                let joined = spawn_task(task.as_ref(), package).await;
                if let Err(err) = settle(&name, joined) {
                    aborted.store(true, Ordering::SeqCst);
                    let _ = failure_tx.send(err);
                    break;
                }
            }
        });
    }
    drop(failure_tx);

    match failure_rx.recv().await {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Call `task` for `package` and spawn the returned future.
///
/// A panic while building the future or while polling it becomes an ordinary
/// failure naming the package.
fn spawn_task<F, Fut, T>(task: &F, package: Package) -> JoinHandle<anyhow::Result<T>>
where
    F: Fn(Package) -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let name = package.name().to_string();
    match panic::catch_unwind(AssertUnwindSafe(|| task(package))) {
        Ok(fut) => tokio::spawn(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(panicked(&name, payload.as_ref())),
            }
        }),
        Err(payload) => {
            let err = panicked(&name, payload.as_ref());
            tokio::spawn(async move { Err(err) })
        }
    }
}

fn settle<T>(package: &str, joined: Result<anyhow::Result<T>, JoinError>) -> anyhow::Result<T> {
    joined.map_err(|e| anyhow!("task for package '{}' did not complete: {}", package, e))?
}

fn panicked(package: &str, payload: &(dyn Any + Send)) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    anyhow!("task for package '{}' panicked: {}", package, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::time::sleep;

    fn pkg(name: &str, deps: &[&str]) -> Package {
        Package::builder(name, format!("/repo/{}", name))
            .dependencies(deps.iter().copied())
            .build()
    }

    fn independent(count: usize) -> Vec<Package> {
        (0..count).map(|i| pkg(&format!("pkg-{}", i), &[])).collect()
    }

    /// Shared event log for ordering assertions
    #[derive(Clone, Default)]
    struct Events(Arc<Mutex<Vec<String>>>);

    impl Events {
        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }

        fn snapshot(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn position(&self, event: &str) -> usize {
            self.snapshot()
                .iter()
                .position(|e| e == event)
                .unwrap_or_else(|| panic!("missing event {event}"))
        }
    }

    #[tokio::test]
    async fn for_each_calls_in_order_without_waiting() {
        let packages = independent(5);
        let calls = Events::default();
        let finished = Arc::new(AtomicUsize::new(0));

        let recorder = calls.clone();
        let done = Arc::clone(&finished);
        for_each(&packages, move |package| {
            recorder.push(package.name().to_string());
            let done = Arc::clone(&done);
            async move {
                sleep(Duration::from_millis(50)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(
            calls.snapshot(),
            vec!["pkg-0", "pkg-1", "pkg-2", "pkg-3", "pkg-4"]
        );
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn for_each_swallows_failures() {
        let packages = independent(3);
        for_each(&packages, |package| async move {
            Err::<(), _>(anyhow!("{} failed", package.name()))
        })
        .await;
    }

    #[tokio::test]
    async fn parallel_preserves_input_order() {
        let packages = independent(6);
        let results = parallel(&packages, |package| async move {
            let index: u64 = package.name().trim_start_matches("pkg-").parse().unwrap();
            // later packages finish first
            sleep(Duration::from_millis(60 - index * 10)).await;
            Ok(package.name().to_uppercase())
        })
        .await
        .unwrap();

        assert_eq!(
            results,
            vec!["PKG-0", "PKG-1", "PKG-2", "PKG-3", "PKG-4", "PKG-5"]
        );
    }

    #[tokio::test]
    async fn parallel_fails_with_the_task_failure() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom in {0}")]
        struct Boom(String);

        let packages = independent(4);
        let err = parallel(&packages, |package| async move {
            if package.name() == "pkg-2" {
                return Err(anyhow::Error::new(Boom(package.name().to_string())));
            }
            sleep(Duration::from_millis(20)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        let boom = err.downcast_ref::<Boom>().expect("original error type");
        assert_eq!(boom.0, "pkg-2");
    }

    #[tokio::test]
    async fn parallel_reports_the_first_failure_to_complete() {
        let packages = independent(2);
        let err = parallel(&packages, |package| async move {
            if package.name() == "pkg-0" {
                sleep(Duration::from_millis(80)).await;
            }
            Err::<(), _>(anyhow!("{} failed", package.name()))
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "pkg-1 failed");
    }

    #[tokio::test]
    async fn batched_runs_a_chain_in_order() {
        let packages = vec![pkg("c", &["b"]), pkg("b", &["a"]), pkg("a", &[])];
        let events = Events::default();

        let recorder = events.clone();
        batched(&packages, move |package| {
            let recorder = recorder.clone();
            async move {
                recorder.push(format!("start {}", package.name()));
                sleep(Duration::from_millis(10)).await;
                recorder.push(format!("end {}", package.name()));
                Ok(())
            }
        })
        .await
        .unwrap();

        assert!(events.position("end a") < events.position("start b"));
        assert!(events.position("end b") < events.position("start c"));
        assert_eq!(events.snapshot().len(), 6);
    }

    #[tokio::test]
    async fn batched_bounds_concurrency_within_a_tier() {
        let packages = independent(10);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let (current, max, done) = (
            Arc::clone(&in_flight),
            Arc::clone(&peak),
            Arc::clone(&completed),
        );
        batched(&packages, move |_package| {
            let (current, max, done) = (Arc::clone(&current), Arc::clone(&max), Arc::clone(&done));
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(15)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 10);
        assert_eq!(peak.load(Ordering::SeqCst), DEFAULT_CONCURRENCY);
    }

    #[tokio::test]
    async fn batched_respects_custom_concurrency() {
        let packages = independent(5);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (current, max) = (Arc::clone(&in_flight), Arc::clone(&peak));
        batched_with_concurrency(
            &packages,
            move |_package| {
                let (current, max) = (Arc::clone(&current), Arc::clone(&max));
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            1,
        )
        .await
        .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn batched_failure_stops_later_tiers() {
        let packages = vec![
            pkg("base", &[]),
            pkg("broken", &[]),
            pkg("app", &["base", "broken"]),
        ];
        let events = Events::default();

        let recorder = events.clone();
        let err = batched(&packages, move |package| {
            let recorder = recorder.clone();
            async move {
                recorder.push(format!("start {}", package.name()));
                if package.name() == "broken" {
                    anyhow::bail!("broken failed to build");
                }
                Ok(())
            }
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "broken failed to build");
        // give any stray dispatch a chance to show up
        sleep(Duration::from_millis(30)).await;
        assert!(!events.snapshot().contains(&"start app".to_string()));
    }

    #[tokio::test]
    async fn batched_failure_stops_queued_siblings() {
        let packages = independent(10);
        let started = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&started);
        let err = batched(&packages, move |package| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if package.name() == "pkg-0" {
                    anyhow::bail!("first package failed");
                }
                sleep(Duration::from_millis(40)).await;
                Ok(())
            }
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "first package failed");
        sleep(Duration::from_millis(100)).await;
        assert!(started.load(Ordering::SeqCst) <= DEFAULT_CONCURRENCY);
    }

    /// One package fails early while the others are still sleeping
    fn fail_first_then_count(
        finished: Arc<AtomicUsize>,
    ) -> impl Fn(Package) -> futures::future::BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static
    {
        move |package| {
            let finished = Arc::clone(&finished);
            Box::pin(async move {
                if package.name() == "pkg-0" {
                    sleep(Duration::from_millis(10)).await;
                    anyhow::bail!("pkg-0 failed");
                }
                sleep(Duration::from_millis(60)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn batched_failure_leaves_running_siblings_alone() {
        let packages = independent(DEFAULT_CONCURRENCY);
        let finished = Arc::new(AtomicUsize::new(0));

        let err = batched(&packages, fail_first_then_count(Arc::clone(&finished)))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "pkg-0 failed");
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(finished.load(Ordering::SeqCst), DEFAULT_CONCURRENCY - 1);
    }

    #[tokio::test]
    async fn parallel_failure_leaves_running_siblings_alone() {
        let packages = independent(5);
        let finished = Arc::new(AtomicUsize::new(0));

        let err = parallel(&packages, fail_first_then_count(Arc::clone(&finished)))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "pkg-0 failed");
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn batched_treats_panics_as_failures() {
        let packages = vec![pkg("a", &[]), pkg("b", &["a"])];
        let reached_b = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&reached_b);
        let err = batched(&packages, move |package| {
            let flag = Arc::clone(&flag);
            if package.name() == "a" {
                panic!("sync explosion");
            }
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("package 'a' panicked: sync explosion"));
        assert!(!reached_b.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn batched_rejects_cycles_before_running() {
        let packages = vec![pkg("a", &["b"]), pkg("b", &["a"])];
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        let err = batched(&packages, move |_package| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("Circular dependency detected"));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn batched_on_empty_input_succeeds() {
        batched(&[], |_package| async move { Ok(()) }).await.unwrap();
    }
}
