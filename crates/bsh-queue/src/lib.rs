// SPDX-License-Identifier: MIT OR Apache-2.0
//! Strictly ordered work queue for sequenced command execution.
//!
//! A [`Queue`] runs the units pushed onto it one at a time, in push order.
//! There is no list of entries: the queue owns a single *tail* future (the
//! completion of the most recently pushed unit) and every push links a new
//! unit behind it.
//!
//! When a unit fails, every unit already linked behind it is skipped and
//! settles with the same error. Once the failure reaches the tail, the tail is
//! dropped, so units pushed afterwards start a fresh chain.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A pushed unit was dropped by the runtime before it settled.
///
/// This happens when the runtime shuts down with work still queued, or when
/// a unit panics. Queue error types convert from it via `From<Abandoned>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("queued unit was abandoned before it settled")]
pub struct Abandoned;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Scheduling state of a [`Queue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// No unit is pending or running.
    Idle,
    /// At least one pushed unit has not settled yet.
    Running,
    /// The last chain ended in a failure and was discarded. Behaves exactly
    /// like [`QueueState::Idle`] for scheduling.
    Reset,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Reset => "reset",
        };
        f.write_str(s)
    }
}

type Link<E> = Shared<BoxFuture<'static, Result<(), E>>>;

struct Chain<E> {
    tail: Option<Link<E>>,
    generation: u64,
    pending: usize,
    reset: bool,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// A FIFO lane of asynchronous work.
///
/// Cloning a `Queue` yields another handle to the *same* lane. Use
/// [`Queue::new`] for an independent lane.
pub struct Queue<E> {
    chain: Arc<Mutex<Chain<E>>>,
}

impl<E> Clone for Queue<E> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<E> fmt::Debug for Queue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = self.chain.lock().expect("queue lock poisoned");
        f.debug_struct("Queue")
            .field("generation", &chain.generation)
            .field("pending", &chain.pending)
            .finish()
    }
}

impl<E> Default for Queue<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Queue<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty, idle queue.
    pub fn new() -> Self {
        Self {
            chain: Arc::new(Mutex::new(Chain {
                tail: None,
                generation: 0,
                pending: 0,
                reset: false,
            })),
        }
    }

    /// Link `unit` behind everything already pushed and start driving it.
    ///
    /// Never runs `unit` on the caller's stack: the link is spawned onto the
    /// current tokio runtime. On a current-thread runtime, code following
    /// `push` therefore executes before any of the unit's side effects up to
    /// the caller's next `.await`. A multi-thread runtime may start the unit
    /// on another worker immediately, so that guarantee needs the
    /// `current_thread` flavor.
    ///
    /// The returned [`Pending`] settles with the unit's result, or with the
    /// error of an earlier failed unit. A unit that panics settles with
    /// [`Abandoned`] and fails the chain like any other error.
    ///
    /// Dropping the [`Pending`] does not cancel the unit.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn push<T, F, Fut>(&self, unit: F) -> Pending<T, E>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: From<Abandoned>,
    {
        let (tx, rx) = oneshot::channel();
        let weak = Arc::downgrade(&self.chain);

        let mut chain = self.chain.lock().expect("queue lock poisoned");
        let prev = chain.tail.take();
        chain.generation += 1;
        chain.pending += 1;
        chain.reset = false;
        let generation = chain.generation;

        let link: Link<E> = async move {
            let outcome = match prev {
                Some(prev) => match prev.await {
                    Ok(()) => contain(generation, unit).await,
                    Err(err) => {
                        debug!(target: "bsh.queue", generation, "skipping unit behind failed link");
                        Err(err)
                    }
                },
                None => contain(generation, unit).await,
            };
            let failed = outcome.is_err();
            settle(&weak, generation, failed);
            match outcome {
                Ok(value) => {
                    let _ = tx.send(Ok(value));
                    Ok(())
                }
                Err(err) => {
                    let _ = tx.send(Err(err.clone()));
                    Err(err)
                }
            }
        }
        .boxed()
        .shared();

        chain.tail = Some(link.clone());
        drop(chain);

        debug!(target: "bsh.queue", generation, "unit appended");
        tokio::spawn(link);
        Pending { rx }
    }

    /// Wait for the unit that is the tail *right now* to settle.
    ///
    /// The tail is captured when this method is called, not when the
    /// returned future is first polled; units pushed later are not awaited.
    /// Resolves immediately on an idle queue, and resolves (rather than
    /// failing) when the awaited chain ended in an error.
    pub fn wait_all(&self) -> impl Future<Output = ()> + Send + 'static {
        let tail = self.chain.lock().expect("queue lock poisoned").tail.clone();
        async move {
            if let Some(tail) = tail {
                let _ = tail.await;
            }
        }
    }

    /// Current scheduling state.
    pub fn state(&self) -> QueueState {
        let chain = self.chain.lock().expect("queue lock poisoned");
        if chain.pending > 0 {
            QueueState::Running
        } else if chain.reset {
            QueueState::Reset
        } else {
            QueueState::Idle
        }
    }

    /// `true` when nothing is pending or running.
    pub fn is_idle(&self) -> bool {
        self.state() != QueueState::Running
    }

    /// Number of pushed units that have not settled yet.
    pub fn pending(&self) -> usize {
        self.chain.lock().expect("queue lock poisoned").pending
    }

    /// `true` if `self` and `other` are handles to the same lane.
    pub fn same_lane(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.chain, &other.chain)
    }
}

/// Run `unit`, turning a panic into [`Abandoned`] so the link still settles.
async fn contain<T, E, F, Fut>(generation: u64, unit: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<Abandoned>,
{
    match AssertUnwindSafe(async move { unit().await })
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(target: "bsh.queue", generation, "unit panicked");
            Err(E::from(Abandoned))
        }
    }
}

/// Record that the link with `generation` settled, dropping the tail if the
/// link failed and nothing was pushed behind it.
fn settle<E>(chain: &Weak<Mutex<Chain<E>>>, generation: u64, failed: bool) {
    let Some(chain) = chain.upgrade() else {
        return;
    };
    let mut chain = chain.lock().expect("queue lock poisoned");
    chain.pending = chain.pending.saturating_sub(1);
    if failed && chain.generation == generation {
        chain.tail = None;
        chain.reset = true;
        debug!(target: "bsh.queue", generation, "chain failed at tail; queue reset");
    }
}

// ---------------------------------------------------------------------------
// Pending
// ---------------------------------------------------------------------------

/// Completion of a unit pushed with [`Queue::push`].
#[must_use = "the unit runs regardless, but its result is only observable through `Pending`"]
pub struct Pending<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> fmt::Debug for Pending<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

impl<T, E> Future for Pending<T, E>
where
    E: From<Abandoned>,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(_) => Err(E::from(Abandoned)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Failed(&'static str),
        Abandoned,
    }

    impl From<Abandoned> for TestError {
        fn from(_: Abandoned) -> Self {
            TestError::Abandoned
        }
    }

    #[tokio::test]
    async fn new_queue_is_idle() {
        let q: Queue<TestError> = Queue::new();
        assert_eq!(q.state(), QueueState::Idle);
        assert_eq!(q.pending(), 0);
    }

    #[tokio::test]
    async fn push_returns_unit_value() {
        let q: Queue<TestError> = Queue::new();
        let v = q.push(|| async { Ok::<_, TestError>(41 + 1) }).await;
        assert_eq!(v, Ok(42));
    }

    #[tokio::test]
    async fn failure_resets_to_reset_state() {
        let q: Queue<TestError> = Queue::new();
        let r = q
            .push(|| async { Err::<(), _>(TestError::Failed("boom")) })
            .await;
        assert_eq!(r, Err(TestError::Failed("boom")));
        assert_eq!(q.state(), QueueState::Reset);
        assert!(q.is_idle());
    }

    #[tokio::test]
    async fn clones_share_a_lane() {
        let q: Queue<TestError> = Queue::new();
        let other: Queue<TestError> = Queue::new();
        assert!(q.same_lane(&q.clone()));
        assert!(!q.same_lane(&other));
    }

    #[test]
    fn state_display() {
        assert_eq!(QueueState::Idle.to_string(), "idle");
        assert_eq!(QueueState::Running.to_string(), "running");
        assert_eq!(QueueState::Reset.to_string(), "reset");
    }
}
