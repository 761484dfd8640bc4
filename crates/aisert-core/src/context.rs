//! Per-call deadline and cancellation.
//!
//! Counting and embedding backends are the only blocking boundary. The
//! model-backed validators run each backend call through
//! [`ValidationContext::run_bounded`], and backends receive the context so
//! they can stop early themselves (the HTTP providers clamp request timeouts
//! and stop retrying).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{ErrorClass, ValidationError};
use crate::types::ValidatorKind;

/// Shared cancellation switch. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation handed to every `validate` call.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    deadline: Option<Instant>,
    cancellation: Option<CancellationFlag>,
}

impl ValidationContext {
    /// A context with no deadline that can never be cancelled.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// True when a deadline or a cancellation flag is attached.
    pub fn is_bounded(&self) -> bool {
        self.deadline.is_some() || self.cancellation.is_some()
    }

    /// Why the call must stop, if it must.
    pub fn interruption(&self) -> Option<&'static str> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationFlag::is_cancelled)
        {
            return Some(CANCELLED);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DEADLINE_EXCEEDED),
            _ => None,
        }
    }

    /// Fail with an `Interrupted` error for `kind` if cancelled or out of time.
    pub fn check(&self, kind: ValidatorKind) -> Result<(), ValidationError> {
        match self.interruption() {
            Some(reason) => Err(ValidationError::for_kind(
                kind,
                ErrorClass::Interrupted,
                reason,
            )),
            None => Ok(()),
        }
    }

    /// Run a blocking backend call without waiting past the deadline or
    /// after cancellation.
    ///
    /// Unbounded contexts run `task` inline. Otherwise `task` runs on a
    /// worker thread; when the context interrupts first, the caller gets an
    /// `Interrupted` error and the worker is left to finish on its own. The
    /// worker receives a clone of the context so the backend can stop early.
    pub fn run_bounded<T, F>(&self, kind: ValidatorKind, task: F) -> Result<T, ValidationError>
    where
        T: Send + 'static,
        F: FnOnce(ValidationContext) -> T + Send + 'static,
    {
        self.check(kind)?;
        if !self.is_bounded() {
            return Ok(task(self.clone()));
        }

        let (sender, receiver) = mpsc::channel();
        let ctx = self.clone();
        thread::Builder::new()
            .name(format!("aisert-{}", kind.name()))
            .spawn(move || {
                // The receiver is gone when the caller already gave up.
                let _ = sender.send(task(ctx));
            })
            .map_err(|e| {
                ValidationError::for_kind(
                    kind,
                    ErrorClass::Backend,
                    format!("failed to start backend worker: {e}"),
                )
            })?;

        loop {
            let wait = self
                .remaining()
                .map_or(CANCELLATION_POLL, |left| left.min(CANCELLATION_POLL));
            match receiver.recv_timeout(wait) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(interrupted) = self.check(kind) {
                        tracing::debug!(
                            validator = %kind,
                            reason = interrupted.message(),
                            "abandoned backend call"
                        );
                        return Err(interrupted);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ValidationError::for_kind(
                        kind,
                        ErrorClass::Backend,
                        "backend worker stopped without a result",
                    ))
                }
            }
        }
    }
}

const CANCELLED: &str = "validation cancelled";
const DEADLINE_EXCEEDED: &str = "validation deadline exceeded";

/// How often a bounded call re-checks the cancellation flag.
const CANCELLATION_POLL: Duration = Duration::from_millis(10);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_always_passes() {
        let ctx = ValidationContext::unbounded();
        assert!(ctx.check(ValidatorKind::Token).is_ok());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_expired_deadline_interrupts() {
        let ctx = ValidationContext::unbounded().with_deadline(Instant::now());
        let err = ctx.check(ValidatorKind::Semantic).unwrap_err();
        assert_eq!(err.kind(), ValidatorKind::Semantic);
        assert_eq!(err.class(), ErrorClass::Interrupted);
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let ctx = ValidationContext::unbounded().with_cancellation(flag.clone());
        assert!(ctx.check(ValidatorKind::Token).is_ok());

        flag.cancel();
        let err = ctx.check(ValidatorKind::Token).unwrap_err();
        assert_eq!(err.message(), "validation cancelled");
        assert_eq!(ctx.interruption(), Some("validation cancelled"));
    }

    #[test]
    fn test_run_bounded_inline_when_unbounded() {
        let caller = thread::current().id();
        let ran_on = ValidationContext::unbounded()
            .run_bounded(ValidatorKind::Token, |_| thread::current().id())
            .unwrap();
        assert_eq!(ran_on, caller);
    }

    #[test]
    fn test_run_bounded_returns_fast_results() {
        let ctx = ValidationContext::unbounded().with_timeout(Duration::from_secs(5));
        let value = ctx.run_bounded(ValidatorKind::Token, |_| 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_run_bounded_stops_waiting_at_deadline() {
        let ctx = ValidationContext::unbounded().with_timeout(Duration::from_millis(50));
        let started = Instant::now();

        let err = ctx
            .run_bounded(ValidatorKind::Token, |_| {
                thread::sleep(Duration::from_millis(800));
                1
            })
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(err.class(), ErrorClass::Interrupted);
        assert_eq!(err.message(), "validation deadline exceeded");
    }

    #[test]
    fn test_run_bounded_stops_waiting_on_cancel() {
        let flag = CancellationFlag::new();
        let ctx = ValidationContext::unbounded().with_cancellation(flag.clone());
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            flag.cancel();
        });
        let started = Instant::now();

        let err = ctx
            .run_bounded(ValidatorKind::Semantic, |_| {
                thread::sleep(Duration::from_millis(800));
            })
            .unwrap_err();

        canceller.join().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(err.message(), "validation cancelled");
    }

    #[test]
    fn test_worker_sees_the_context() {
        let flag = CancellationFlag::new();
        let ctx = ValidationContext::unbounded().with_cancellation(flag.clone());
        let seen = ctx
            .run_bounded(ValidatorKind::Token, move |worker_ctx| {
                flag.cancel();
                worker_ctx.interruption()
            })
            .unwrap();
        assert_eq!(seen, Some("validation cancelled"));
    }

    #[test]
    fn test_panicking_worker_is_a_backend_error() {
        let ctx = ValidationContext::unbounded().with_timeout(Duration::from_secs(5));
        let err = ctx
            .run_bounded(ValidatorKind::Token, |_| -> usize { panic!("tokenizer crashed") })
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Backend);
    }
}
