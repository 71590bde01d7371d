//! One-shot completion bridge
//!
//! Converts a push-style broker callback, which may fire on any thread, into a value the
//! HTTP layer can await. [`completion`] returns a read-only [`CompletionHandle`] and a
//! write-only [`Completer`]. The first of `succeed`, `fail` or `cancel` wins; every later
//! resolution attempt is ignored. All observers, whether they attached before or after the
//! transition, see the same terminal [`Outcome`].

use crate::error::{BrokerError, GatewayError, Result};
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tracing::debug;

/// Terminal state of a completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Succeeded(T),
    Failed(BrokerError),
    /// Resolved by the gateway before the broker answered (request timeout).
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }
}

impl<T: Clone> Outcome<T> {
    pub fn to_result(&self) -> Result<T> {
        match self {
            Outcome::Succeeded(value) => Ok(value.clone()),
            Outcome::Failed(error) => Err(GatewayError::Broker(error.clone())),
            Outcome::Cancelled => Err(GatewayError::RequestTimeout),
        }
    }
}

type Continuation<T> = Box<dyn FnOnce(&Outcome<T>) + Send + 'static>;

enum State<T> {
    Pending {
        continuations: Vec<Continuation<T>>,
        wakers: Vec<Waker>,
    },
    Resolved(Arc<Outcome<T>>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    resolved: Condvar,
}

impl<T> Shared<T> {
    fn resolve(&self, outcome: Outcome<T>) -> bool {
        let outcome = Arc::new(outcome);
        let (continuations, wakers) = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Resolved(_) => return false,
                State::Pending {
                    continuations,
                    wakers,
                } => {
                    let taken = (std::mem::take(continuations), std::mem::take(wakers));
                    *state = State::Resolved(outcome.clone());
                    taken
                }
            }
        };
        self.resolved.notify_all();

        for continuation in continuations {
            continuation(&outcome);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    fn outcome(&self) -> Option<Arc<Outcome<T>>> {
        match &*self.state.lock() {
            State::Resolved(outcome) => Some(outcome.clone()),
            State::Pending { .. } => None,
        }
    }
}

/// Creates a pending completion.
pub fn completion<T>() -> (CompletionHandle<T>, Completer<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending {
            continuations: Vec::new(),
            wakers: Vec::new(),
        }),
        resolved: Condvar::new(),
    });
    (
        CompletionHandle {
            shared: shared.clone(),
        },
        Completer { shared },
    )
}

/// Write side of a completion. Clones share the same underlying cell, so a broker callback
/// and a timeout timer can race to resolve it; only the first one has any effect.
pub struct Completer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Completer<T> {
    /// Returns `true` if this call performed the transition.
    pub fn succeed(&self, value: T) -> bool {
        self.resolve(Outcome::Succeeded(value))
    }

    pub fn fail(&self, error: BrokerError) -> bool {
        self.resolve(Outcome::Failed(error))
    }

    pub fn cancel(&self) -> bool {
        self.resolve(Outcome::Cancelled)
    }

    pub fn complete(&self, result: std::result::Result<T, BrokerError>) -> bool {
        match result {
            Ok(value) => self.succeed(value),
            Err(error) => self.fail(error),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.outcome().is_some()
    }

    fn resolve(&self, outcome: Outcome<T>) -> bool {
        let applied = self.shared.resolve(outcome);
        if !applied {
            debug!("Ignoring resolution of an already completed operation");
        }
        applied
    }
}

/// Read side of a completion: await it, block on it, or attach continuations.
pub struct CompletionHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CompletionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> std::fmt::Debug for CompletionHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T> CompletionHandle<T> {
    /// A handle that is already resolved with `value`.
    pub fn succeeded(value: T) -> Self {
        let (handle, completer) = completion();
        completer.succeed(value);
        handle
    }

    pub fn failed(error: BrokerError) -> Self {
        let (handle, completer) = completion();
        completer.fail(error);
        handle
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.outcome().is_some()
    }

    pub fn outcome(&self) -> Option<Arc<Outcome<T>>> {
        self.shared.outcome()
    }

    /// Runs `continuation` once the completion resolves. If it already has, the
    /// continuation runs immediately on the calling thread.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let resolved = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Pending { continuations, .. } => {
                    continuations.push(Box::new(continuation));
                    return;
                }
                State::Resolved(outcome) => outcome.clone(),
            }
        };
        continuation(&resolved);
    }
}

impl<T: Clone> CompletionHandle<T> {
    /// Blocks the current thread until the completion resolves.
    pub fn wait(&self) -> Result<T> {
        let mut state = self.shared.state.lock();
        loop {
            if let State::Resolved(outcome) = &*state {
                return outcome.to_result();
            }
            self.shared.resolved.wait(&mut state);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let mut state = self.shared.state.lock();
        if let State::Resolved(outcome) = &*state {
            return Some(outcome.to_result());
        }
        let _ = self.shared.resolved.wait_for(&mut state, timeout);
        match &*state {
            State::Resolved(outcome) => Some(outcome.to_result()),
            State::Pending { .. } => None,
        }
    }
}

impl<T: Clone> Future for CompletionHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match &mut *state {
            State::Resolved(outcome) => Poll::Ready(outcome.to_result()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

/// Joins many completions into one that resolves, successfully, once every input has
/// settled. The outcomes are reported in input order.
pub fn join_settled<T>(handles: Vec<CompletionHandle<T>>) -> CompletionHandle<Vec<Outcome<T>>>
where
    T: Clone + Send + Sync + 'static,
{
    let (joined, completer) = completion();
    if handles.is_empty() {
        completer.succeed(Vec::new());
        return joined;
    }

    let slots: Arc<Mutex<Vec<Option<Outcome<T>>>>> =
        Arc::new(Mutex::new(vec![None; handles.len()]));
    let remaining = Arc::new(AtomicUsize::new(handles.len()));

    for (index, handle) in handles.into_iter().enumerate() {
        let slots = slots.clone();
        let remaining = remaining.clone();
        let completer = completer.clone();
        handle.on_complete(move |outcome| {
            slots.lock()[index] = Some(outcome.clone());
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                let settled = slots
                    .lock()
                    .drain(..)
                    .map(|slot| slot.unwrap_or(Outcome::Cancelled))
                    .collect();
                completer.succeed(settled);
            }
        });
    }

    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::thread;

    #[test]
    fn test_first_resolution_wins() {
        let (handle, completer) = completion::<u32>();

        assert!(completer.succeed(1));
        assert!(!completer.succeed(2));
        assert!(!completer.fail(BrokerError::Unknown("late".to_string())));
        assert!(!completer.cancel());

        assert_eq!(handle.wait().unwrap(), 1);
        assert_eq!(*handle.outcome().unwrap(), Outcome::Succeeded(1));
    }

    #[test]
    fn test_failure_then_success_keeps_failure() {
        let (handle, completer) = completion::<u32>();
        let error = BrokerError::Timeout { timeout_ms: 100 };

        completer.fail(error.clone());
        completer.succeed(7);

        match handle.wait() {
            Err(GatewayError::Broker(e)) => assert_eq!(e, error),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_continuations_before_and_after_see_same_value() {
        let (handle, completer) = completion::<String>();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let early = seen.clone();
        handle.on_complete(move |outcome| early.lock().push(outcome.clone()));

        completer.succeed("first".to_string());
        completer.succeed("second".to_string());

        let late = seen.clone();
        handle.on_complete(move |outcome| late.lock().push(outcome.clone()));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen
            .iter()
            .all(|o| *o == Outcome::Succeeded("first".to_string())));
    }

    #[test]
    fn test_continuation_runs_exactly_once() {
        let (handle, completer) = completion::<()>();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        handle.on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        completer.succeed(());
        completer.succeed(());
        completer.cancel();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_racing_resolvers_on_many_threads() {
        for _ in 0..50 {
            let (handle, completer) = completion::<usize>();
            let winners = Arc::new(AtomicU32::new(0));

            let threads: Vec<_> = (0..8)
                .map(|i| {
                    let completer = completer.clone();
                    let winners = winners.clone();
                    thread::spawn(move || {
                        let applied = if i % 2 == 0 {
                            completer.succeed(i)
                        } else {
                            completer.fail(BrokerError::Unknown(i.to_string()))
                        };
                        if applied {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for t in threads {
                t.join().unwrap();
            }

            assert_eq!(winners.load(Ordering::SeqCst), 1);
            let first = handle.outcome().unwrap();
            let again = handle.outcome().unwrap();
            assert_eq!(*first, *again);
        }
    }

    #[test]
    fn test_cancel_maps_to_request_timeout() {
        let (handle, completer) = completion::<u32>();
        completer.cancel();
        assert!(!completer.succeed(5));
        assert!(matches!(handle.wait(), Err(GatewayError::RequestTimeout)));
    }

    #[test]
    fn test_wait_timeout_on_pending() {
        let (handle, _completer) = completion::<u32>();
        assert!(handle.wait_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_wait_blocks_until_other_thread_resolves() {
        let (handle, completer) = completion::<u32>();
        let resolver = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            completer.succeed(42);
        });
        assert_eq!(handle.wait().unwrap(), 42);
        resolver.join().unwrap();
    }

    #[tokio::test]
    async fn test_await_resolved_from_foreign_thread() {
        let (handle, completer) = completion::<u32>();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            completer.succeed(9);
        });

        let observer = handle.clone();
        assert_eq!(handle.await.unwrap(), 9);
        assert_eq!(observer.await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_join_settled_preserves_order() {
        let (a, ca) = completion::<u32>();
        let (b, cb) = completion::<u32>();
        let (c, cc) = completion::<u32>();

        let joined = join_settled(vec![a, b, c]);
        assert!(!joined.is_resolved());

        cc.succeed(3);
        ca.succeed(1);
        assert!(!joined.is_resolved());
        cb.fail(BrokerError::Unknown("boom".to_string()));

        let outcomes = joined.await.unwrap();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Succeeded(1),
                Outcome::Failed(BrokerError::Unknown("boom".to_string())),
                Outcome::Succeeded(3),
            ]
        );
    }

    #[test]
    fn test_join_settled_empty() {
        let joined = join_settled::<u32>(Vec::new());
        assert_eq!(joined.wait().unwrap(), Vec::new());
    }

    #[test]
    fn test_join_settled_resolved_from_other_threads() {
        let pairs: Vec<_> = (0..4).map(|_| completion::<String>()).collect();
        let (handles, completers): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        let joined = join_settled(handles);

        let workers: Vec<_> = completers
            .into_iter()
            .enumerate()
            .map(|(i, completer)| thread::spawn(move || completer.succeed(format!("r{}", i))))
            .collect();
        for worker in workers {
            assert!(worker.join().unwrap());
        }

        // the joined handle itself can be waited on from yet another thread
        let waiter = thread::spawn(move || joined.wait().unwrap());
        let outcomes = waiter.join().unwrap();
        assert_eq!(
            outcomes,
            (0..4)
                .map(|i| Outcome::Succeeded(format!("r{}", i)))
                .collect::<Vec<_>>()
        );
    }
}
