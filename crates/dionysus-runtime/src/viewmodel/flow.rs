//! Stream plumbing shared by the view-models.

use std::future::{ready, Future};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

/// A stream of a watch cell's value: the current value first, then every
/// change. Changes made faster than the consumer reads are coalesced.
pub fn watch_stream<T>(rx: watch::Receiver<T>) -> BoxStream<'static, T>
where
    T: Clone + Send + Sync + 'static,
{
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first {
            rx.changed().await.ok()?;
        }
        let value = rx.borrow_and_update().clone();
        Some((value, (rx, false)))
    })
    .boxed()
}

enum Tagged2<A, B> {
    A(A),
    B(B),
}

/// Combine the latest values of two streams. Nothing is emitted until both
/// have produced a value; after that every item from either side emits.
pub fn combine2<A, B, R, F>(
    a: impl Stream<Item = A> + Send + 'static,
    b: impl Stream<Item = B> + Send + 'static,
    f: F,
) -> BoxStream<'static, R>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
    F: Fn(&A, &B) -> R + Send + 'static,
{
    stream::select(a.map(Tagged2::A), b.map(Tagged2::B))
        .scan((None, None), move |(la, lb), item| {
            match item {
                Tagged2::A(v) => *la = Some(v),
                Tagged2::B(v) => *lb = Some(v),
            }
            let out = match (la.as_ref(), lb.as_ref()) {
                (Some(a), Some(b)) => Some(f(a, b)),
                _ => None,
            };
            ready(Some(out))
        })
        .filter_map(ready)
        .boxed()
}

enum Tagged4<A, B, C, D> {
    A(A),
    B(B),
    C(C),
    D(D),
}

type Latest4<A, B, C, D> = (Option<A>, Option<B>, Option<C>, Option<D>);

/// Four-input [`combine2`].
pub fn combine4<A, B, C, D, R, F>(
    a: impl Stream<Item = A> + Send + 'static,
    b: impl Stream<Item = B> + Send + 'static,
    c: impl Stream<Item = C> + Send + 'static,
    d: impl Stream<Item = D> + Send + 'static,
    f: F,
) -> BoxStream<'static, R>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    D: Send + 'static,
    R: Send + 'static,
    F: Fn(&A, &B, &C, &D) -> R + Send + 'static,
{
    let inputs: Vec<BoxStream<'static, Tagged4<A, B, C, D>>> = vec![
        a.map(Tagged4::A).boxed(),
        b.map(Tagged4::B).boxed(),
        c.map(Tagged4::C).boxed(),
        d.map(Tagged4::D).boxed(),
    ];
    let latest: Latest4<A, B, C, D> = (None, None, None, None);

    stream::select_all(inputs)
        .scan(latest, move |latest, item| {
            match item {
                Tagged4::A(v) => latest.0 = Some(v),
                Tagged4::B(v) => latest.1 = Some(v),
                Tagged4::C(v) => latest.2 = Some(v),
                Tagged4::D(v) => latest.3 = Some(v),
            }
            let out = match (
                latest.0.as_ref(),
                latest.1.as_ref(),
                latest.2.as_ref(),
                latest.3.as_ref(),
            ) {
                (Some(a), Some(b), Some(c), Some(d)) => Some(f(a, b, c, d)),
                _ => None,
            };
            ready(Some(out))
        })
        .filter_map(ready)
        .boxed()
}

// ── State holder ────────────────────────────────────────────────

type Upstream<S> = Box<dyn Fn() -> BoxStream<'static, S> + Send + Sync>;

struct Shared<S> {
    tx: Arc<watch::Sender<S>>,
    upstream: Upstream<S>,
    collector: Mutex<Collector>,
}

#[derive(Default)]
struct Collector {
    observers: usize,
    task: Option<AbortHandle>,
}

impl<S> Shared<S> {
    fn collector(&self) -> MutexGuard<'_, Collector> {
        self.collector.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Drop for Shared<S> {
    fn drop(&mut self) {
        if let Some(task) = self.collector().task.take() {
            task.abort();
        }
    }
}

/// Latest-value state that only collects its upstream while someone is
/// subscribed.
///
/// The first [`subscribe`](Self::subscribe) builds a fresh upstream stream and
/// spawns a task republishing it; dropping the last subscription aborts that
/// task. The last published value is kept across restarts.
pub struct StateHolder<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for StateHolder<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> StateHolder<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new<F>(initial: S, upstream: F) -> Self
    where
        F: Fn() -> BoxStream<'static, S> + Send + Sync + 'static,
    {
        let (tx, _) = watch::channel(initial);
        Self {
            shared: Arc::new(Shared {
                tx: Arc::new(tx),
                upstream: Box::new(upstream),
                collector: Mutex::new(Collector::default()),
            }),
        }
    }

    /// The latest snapshot. Stale while nobody is subscribed.
    pub fn value(&self) -> S {
        self.shared.tx.borrow().clone()
    }

    /// Start observing. Must be called from within a Tokio runtime.
    pub fn subscribe(&self) -> StateSubscription<S> {
        let rx = self.shared.tx.subscribe();
        let mut collector = self.shared.collector();
        collector.observers += 1;

        if collector.task.is_none() {
            let mut upstream = (self.shared.upstream)();
            let tx = Arc::clone(&self.shared.tx);
            let task = tokio::spawn(async move {
                while let Some(state) = upstream.next().await {
                    tx.send_replace(state);
                }
            });
            collector.task = Some(task.abort_handle());
            tracing::trace!("State collector started");
        }
        drop(collector);

        StateSubscription {
            rx,
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.shared.collector().observers
    }

    /// Whether an upstream collector task is currently running.
    pub fn is_collecting(&self) -> bool {
        self.shared.collector().task.is_some()
    }
}

/// A live view of a [`StateHolder`]. Dropping it unsubscribes.
pub struct StateSubscription<S> {
    rx: watch::Receiver<S>,
    shared: Arc<Shared<S>>,
}

impl<S: Clone> StateSubscription<S> {
    pub fn current(&self) -> S {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot this subscription has not seen yet.
    pub async fn next(&mut self) -> Option<S> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until a snapshot satisfies `pred`, checking the current one first.
    pub async fn wait_for(&mut self, mut pred: impl FnMut(&S) -> bool) -> Option<S> {
        self.rx
            .wait_for(|s| pred(s))
            .await
            .ok()
            .map(|s| s.clone())
    }
}

impl<S> Drop for StateSubscription<S> {
    fn drop(&mut self) {
        let mut collector = self.shared.collector();
        collector.observers = collector.observers.saturating_sub(1);
        if collector.observers == 0 {
            if let Some(task) = collector.task.take() {
                task.abort();
                tracing::trace!("State collector stopped");
            }
        }
    }
}

// ── Scope ───────────────────────────────────────────────────────

/// Tasks launched on behalf of one screen. Dropping the scope aborts them.
#[derive(Default)]
pub struct Scope {
    tasks: Mutex<Vec<AbortHandle>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` onto the current Tokio runtime, tied to this scope.
    pub fn launch<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle.abort_handle());
        handle
    }

    /// Number of launched tasks that have not finished yet.
    pub fn active(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| !t.is_finished())
            .count()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_watch_stream_starts_with_current() {
        let (tx, rx) = watch::channel(1);
        let mut values = watch_stream(rx);
        assert_eq!(values.next().await, Some(1));

        tx.send_replace(2);
        assert_eq!(values.next().await, Some(2));

        drop(tx);
        assert_eq!(values.next().await, None);
    }

    #[tokio::test]
    async fn test_combine_waits_for_every_input() {
        let a = stream::iter(vec![1, 2]);
        let b = stream::pending::<&str>();
        let combined: Vec<String> = combine2(a, b, |a, b| format!("{a}{b}"))
            .take_until(tokio::time::sleep(Duration::from_millis(20)))
            .collect()
            .await;
        assert!(combined.is_empty());
    }

    #[tokio::test]
    async fn test_combine_emits_on_any_input() {
        let (tx_a, rx_a) = watch::channel(1);
        let (tx_b, rx_b) = watch::channel('x');
        let mut combined = combine2(watch_stream(rx_a), watch_stream(rx_b), |a, b| {
            format!("{a}{b}")
        });

        let first = combined.next().await.unwrap();
        // Either input may be seen first; the first emission needs both.
        assert_eq!(first, "1x");

        tx_a.send_replace(2);
        assert_eq!(combined.next().await.unwrap(), "2x");
        tx_b.send_replace('y');
        assert_eq!(combined.next().await.unwrap(), "2y");
    }

    #[tokio::test]
    async fn test_combine4() {
        let mut combined = combine4(
            stream::iter([1]),
            stream::iter([2]),
            stream::iter([3]),
            stream::iter([4]),
            |a, b, c, d| a + b + c + d,
        );
        assert_eq!(combined.next().await, Some(10));
        assert_eq!(combined.next().await, None);
    }

    #[tokio::test]
    async fn test_state_holder_collects_while_subscribed() {
        let (tx, rx) = watch::channel(0);
        let holder = StateHolder::new(-1, move || watch_stream(rx.clone()));
        assert_eq!(holder.value(), -1);
        assert!(!holder.is_collecting());

        let mut sub = holder.subscribe();
        assert_eq!(sub.wait_for(|v| *v == 0).await, Some(0));
        tx.send_replace(5);
        assert_eq!(sub.wait_for(|v| *v == 5).await, Some(5));
        assert_eq!(holder.value(), 5);

        let second = holder.subscribe();
        assert_eq!(holder.observer_count(), 2);
        drop(sub);
        assert!(holder.is_collecting());
        drop(second);
        assert_eq!(holder.observer_count(), 0);
        assert!(!holder.is_collecting());

        // The last value survives until the next subscriber restarts collection.
        tx.send_replace(9);
        assert_eq!(holder.value(), 5);
        let mut sub = holder.subscribe();
        assert_eq!(sub.wait_for(|v| *v == 9).await, Some(9));
    }

    #[tokio::test]
    async fn test_scope_aborts_on_drop() {
        let scope = Scope::new();
        let handle = scope.launch(std::future::pending());
        assert_eq!(scope.active(), 1);

        drop(scope);
        let err = handle.await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
