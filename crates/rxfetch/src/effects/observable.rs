//! Cold observable streams bridged onto tokio tasks.
//!
//! An [`Observable`] is a recipe: it holds a producer closure and does no
//! work until it is subscribed. Every [`Subscription`] runs the producer
//! once on its own task and receives items through a channel. The producer
//! pushes items through an [`Emitter`], which is cheap to call from
//! synchronous callbacks such as transport progress hooks.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};

use futures_util::{FutureExt, Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Producer<T> = dyn Fn(Emitter<T>) -> BoxFuture<'static, Result<()>> + Send + Sync;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

enum Signal<T> {
    Next(T),
    Error(Error),
    Complete,
}

/// Pushes items into one subscription.
pub struct Emitter<T> {
    tx: mpsc::UnboundedSender<Signal<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> Emitter<T> {
    /// Emit an item. Returns `false` once the subscriber has gone away.
    pub fn next(&self, value: T) -> bool {
        self.tx.send(Signal::Next(value)).is_ok()
    }

    /// Returns `true` if the subscriber was dropped or disposed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Lifecycle of a single subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created but not yet polled; nothing has been started.
    Idle,
    InFlight,
    Completed,
    Failed,
    Cancelled,
}

impl SubscriptionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubscriptionState::Completed | SubscriptionState::Failed | SubscriptionState::Cancelled
        )
    }
}

/// A cold, re-subscribable stream source.
///
/// Cloning shares the producer; each subscription still runs it afresh.
pub struct Observable<T> {
    producer: Arc<Producer<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Build an observable from a producer.
    ///
    /// The producer is called once per subscription. Returning `Ok(())`
    /// completes the stream, returning `Err` fails it.
    ///
    /// # Examples
    ///
    /// ```
    /// use rxfetch::Observable;
    ///
    /// let numbers = Observable::create(|emitter| async move {
    ///     emitter.next(1);
    ///     emitter.next(2);
    ///     Ok(())
    /// });
    /// assert_eq!(numbers.to_blocking().to_vec().unwrap(), vec![1, 2]);
    /// ```
    pub fn create<F, Fut>(producer: F) -> Self
    where
        F: Fn(Emitter<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let producer: Arc<Producer<T>> =
            Arc::new(move |emitter| -> BoxFuture<'static, Result<()>> {
                Box::pin(producer(emitter))
            });
        Self { producer }
    }

    /// An observable that emits a clone of `value` and completes.
    pub fn just(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::create(move |emitter| {
            emitter.next(value.clone());
            async { Ok(()) }
        })
    }

    /// Start a new subscription.
    ///
    /// The producer runs on the current tokio runtime once the returned
    /// stream is first polled.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            id: NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            producer: Some(Arc::clone(&self.producer)),
            rx: None,
            task: None,
            state: SubscriptionState::Idle,
        }
    }

    /// Transform every item.
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |emitter: Emitter<U>| {
            let mut upstream = source.subscribe();
            let f = Arc::clone(&f);
            async move {
                while let Some(item) = upstream.next().await {
                    if !emitter.next(f(item?)) {
                        break;
                    }
                }
                Ok(())
            }
        })
    }

    /// Wait for the first item, then cancel the rest.
    ///
    /// `Ok(None)` if the stream completed without emitting.
    pub async fn first(&self) -> Result<Option<T>> {
        let mut subscription = self.subscribe();
        subscription.next().await.transpose()
    }

    /// Wait for completion and return the last item.
    pub async fn last(&self) -> Result<Option<T>> {
        let mut subscription = self.subscribe();
        let mut last = None;
        while let Some(item) = subscription.next().await {
            last = Some(item?);
        }
        Ok(last)
    }

    /// Wait for completion and collect every item.
    pub async fn to_vec(&self) -> Result<Vec<T>> {
        let mut subscription = self.subscribe();
        let mut items = Vec::new();
        while let Some(item) = subscription.next().await {
            items.push(item?);
        }
        Ok(items)
    }

    /// Synchronous consumption, for tests and non-async callers.
    pub fn to_blocking(&self) -> BlockingObservable<T> {
        BlockingObservable {
            source: self.clone(),
        }
    }
}

/// One activation of an [`Observable`].
///
/// Yields zero or more items and then ends, either after completion or
/// right after a single `Err`. Dropping it cancels the producer.
pub struct Subscription<T> {
    id: u64,
    producer: Option<Arc<Producer<T>>>,
    rx: Option<mpsc::UnboundedReceiver<Signal<T>>>,
    task: Option<JoinHandle<()>>,
    state: SubscriptionState,
}

impl<T> Unpin for Subscription<T> {}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

impl<T: Send + 'static> Subscription<T> {
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Cancel the in-flight operation. No further items are yielded.
    pub fn dispose(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
        self.producer = None;
        if !self.state.is_terminal() {
            if self.state == SubscriptionState::InFlight {
                debug!(subscription = self.id, "subscription cancelled");
            }
            self.state = SubscriptionState::Cancelled;
        }
    }

    fn start(&mut self, producer: Arc<Producer<T>>) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Emitter { tx: tx.clone() };
        let id = self.id;

        let task = handle.spawn(async move {
            let outcome = AssertUnwindSafe(producer(emitter)).catch_unwind().await;
            let signal = match outcome {
                Ok(Ok(())) => {
                    debug!(subscription = id, "subscription completed");
                    Signal::Complete
                }
                Ok(Err(e)) => {
                    warn!(subscription = id, error = %e, "subscription failed");
                    Signal::Error(e)
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "producer panicked".to_string());
                    warn!(subscription = id, %message, "producer panicked");
                    Signal::Error(Error::Task(message))
                }
            };
            let _ = tx.send(signal);
        });

        debug!(subscription = id, "subscription started");
        self.rx = Some(rx);
        self.task = Some(task);
        self.state = SubscriptionState::InFlight;
        Ok(())
    }

    fn finish(&mut self, state: SubscriptionState) {
        self.state = state;
        self.rx = None;
        self.task = None;
    }
}

impl<T: Send + 'static> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.state == SubscriptionState::Idle
            && let Some(producer) = this.producer.take()
            && let Err(e) = this.start(producer)
        {
            this.finish(SubscriptionState::Failed);
            return Poll::Ready(Some(Err(e)));
        }

        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(rx.poll_recv(cx)) {
            Some(Signal::Next(value)) => Poll::Ready(Some(Ok(value))),
            Some(Signal::Error(e)) => {
                this.finish(SubscriptionState::Failed);
                Poll::Ready(Some(Err(e)))
            }
            Some(Signal::Complete) => {
                this.finish(SubscriptionState::Completed);
                Poll::Ready(None)
            }
            None => {
                this.finish(SubscriptionState::Failed);
                Poll::Ready(Some(Err(Error::Task("producer ended without a result".into()))))
            }
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if self.state == SubscriptionState::InFlight {
                debug!(subscription = self.id, "subscription dropped before completion");
            }
            task.abort();
        }
    }
}

/// Blocking view of an [`Observable`].
///
/// Each call runs a private current-thread runtime and must not be made from
/// inside an async context.
#[derive(Debug, Clone)]
pub struct BlockingObservable<T> {
    source: Observable<T>,
}

impl<T: Send + 'static> BlockingObservable<T> {
    pub fn first(&self) -> Result<Option<T>> {
        self.block_on(self.source.first())
    }

    pub fn last(&self) -> Result<Option<T>> {
        self.block_on(self.source.last())
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.block_on(self.source.to_vec())
    }

    fn block_on<R>(&self, fut: impl Future<Output = Result<R>>) -> Result<R> {
        if Handle::try_current().is_ok() {
            return Err(Error::BlockingInRuntime);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(fut)
    }
}
