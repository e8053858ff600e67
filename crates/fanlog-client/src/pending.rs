//! Dispatch state machine for one sealed record set.
//!
//! A [`PendingWrite`] races the same framed payload across the roster:
//!
//! ```text
//! dispatch ──▶ attempt on roster[start]
//!                │
//!                ├─ ack ───────────▶ settle Success, fan out positions
//!                ├─ failure ───────▶ immediately attempt next stream
//!                └─ (still quiet) ─▶ ladder tick attempts next stream
//!
//! attempts stop when: every stream was tried, or the hard deadline
//! elapsed ──▶ settle Failure, fan out the timeout
//! ```
//!
//! Settlement is one-shot: a CAS on `settled` picks the winner, the sealed
//! set is taken from its slot exactly once, and late acknowledgements or
//! failures from slower attempts are discarded. The dispatch lock covers
//! only the roster walk bookkeeping; no lock is ever held across the wire
//! call, and attempt continuations take only this pending write's own locks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use fanlog_core::LogPosition;
use tracing::{debug, trace};

use crate::buffer::SealedRecordSet;
use crate::clock::Clock;
use crate::error::ClientError;
use crate::roster::StreamRoster;
use crate::service::LogService;
use crate::speculative::SpeculativePolicy;

struct DispatchState {
    /// Next roster index to attempt.
    next_stream: usize,
    /// Attempts issued so far. Never exceeds the roster size.
    tried: usize,
}

/// Cheaply clonable handle; attempt tasks and the ladder task each hold one.
#[derive(Clone)]
pub(crate) struct PendingWrite {
    inner: Arc<Inner>,
}

struct Inner {
    payload: Bytes,
    record_set: Mutex<Option<SealedRecordSet>>,
    dispatch: Mutex<DispatchState>,
    settled: AtomicBool,
    started_at: Instant,
    clock: Arc<dyn Clock>,
    roster: Arc<StreamRoster>,
    client: Arc<dyn LogService>,
    request_timeout: Duration,
}

impl PendingWrite {
    pub(crate) fn new(
        record_set: SealedRecordSet,
        roster: Arc<StreamRoster>,
        client: Arc<dyn LogService>,
        clock: Arc<dyn Clock>,
        request_timeout: Duration,
    ) -> Self {
        let started_at = clock.now();
        let payload = record_set.payload();
        Self {
            inner: Arc::new(Inner {
                payload,
                record_set: Mutex::new(Some(record_set)),
                dispatch: Mutex::new(DispatchState {
                    next_stream: roster.next_start(),
                    tried: 0,
                }),
                settled: AtomicBool::new(false),
                started_at,
                clock,
                roster,
                client,
                request_timeout,
            }),
        }
    }

    /// Issue the first attempt and arm the speculative tick ladder.
    pub(crate) fn dispatch(&self, policy: SpeculativePolicy) {
        self.send_next_attempt();
        self.arm_ladder(policy);
    }

    fn arm_ladder(&self, policy: SpeculativePolicy) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut delay = policy.first;
            loop {
                tokio::time::sleep(delay).await;
                if !this.issue_speculative() {
                    break;
                }
                delay = policy.next_delay(delay);
            }
        });
    }

    /// Try to issue one more attempt.
    ///
    /// Returns the chosen stream name, or `None` when no attempt was issued
    /// because the set is settled, out of streams, or past its deadline (the
    /// latter two settle it as failed here).
    fn send_next_attempt(&self) -> Option<String> {
        if self.inner.settled.load(Ordering::Acquire) {
            return None;
        }

        let stream;
        {
            let mut state = self
                .inner
                .dispatch
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            let elapsed = self.inner.clock.now().duration_since(self.inner.started_at);
            if elapsed > self.inner.request_timeout || state.tried >= self.inner.roster.len() {
                let attempts = state.tried;
                drop(state);
                self.fail(ClientError::Timeout { elapsed, attempts });
                return None;
            }

            let idx = state.next_stream;
            state.next_stream = (idx + 1) % self.inner.roster.len();
            state.tried += 1;
            stream = self.inner.roster.get(idx).to_string();
        }

        self.spawn_attempt(stream.clone());
        Some(stream)
    }

    fn spawn_attempt(&self, stream: String) {
        let this = self.clone();
        tokio::spawn(async move {
            trace!(stream = %stream, bytes = this.inner.payload.len(), "issuing record set write");
            let reply = this
                .inner
                .client
                .write_record_set(&stream, this.inner.payload.clone())
                .await;
            match reply {
                Ok(position) => this.on_success(&stream, position),
                Err(cause) => this.on_failure(&stream, cause),
            }
        });
    }

    fn on_success(&self, stream: &str, position: LogPosition) {
        if self
            .inner
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!(stream = %stream, "late acknowledgement ignored");
            return;
        }
        if let Some(set) = self.take_record_set() {
            debug!(stream = %stream, position = %position, records = set.num_records(),
                "record set acknowledged");
            set.complete(position);
        }
    }

    fn on_failure(&self, stream: &str, cause: ClientError) {
        // a failed attempt is a free speculative tick
        debug!(stream = %stream, error = %cause, "stream attempt failed, trying next stream");
        self.send_next_attempt();
    }

    fn fail(&self, cause: ClientError) {
        if self
            .inner
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if let Some(set) = self.take_record_set() {
            debug!(error = %cause, records = set.num_records(), "record set failed");
            set.abort(cause);
        }
    }

    fn take_record_set(&self) -> Option<SealedRecordSet> {
        self.inner
            .record_set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Ladder tick entry point. Reports whether the ladder should keep
    /// ticking: an attempt was actually issued and the set is still open.
    fn issue_speculative(&self) -> bool {
        if self.inner.settled.load(Ordering::Acquire) {
            return false;
        }
        let issued = self.send_next_attempt().is_some();
        issued && !self.inner.settled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{RecordSetBuffer, WriteAck};
    use crate::clock::{ManualClock, SystemClock};
    use async_trait::async_trait;
    use fanlog_core::Compression;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Scripted wire client: behaviors are consumed per attempt, in order,
    /// which keeps tests independent of the roster shuffle.
    enum Step {
        Ack(LogPosition),
        Fail,
        Hang,
    }

    struct ScriptedService {
        steps: StdMutex<VecDeque<Step>>,
        attempts: StdMutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: StdMutex::new(steps.into()),
                attempts: StdMutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogService for ScriptedService {
        async fn write_record_set(
            &self,
            stream: &str,
            _record_set: Bytes,
        ) -> crate::error::Result<LogPosition> {
            self.attempts.lock().unwrap().push(stream.to_string());
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Ack(position)) => Ok(position),
                Some(Step::Fail) => Err(ClientError::Stream("injected failure".to_string())),
                Some(Step::Hang) | None => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn sealed_single_record() -> (SealedRecordSet, WriteAck) {
        let mut buffer = RecordSetBuffer::new(Compression::None);
        let ack = buffer.append(b"payload").unwrap();
        (buffer.seal().unwrap(), ack)
    }

    fn roster(n: usize) -> Arc<StreamRoster> {
        Arc::new(StreamRoster::new(
            (0..n).map(|i| format!("stream-{i}")).collect(),
        ))
    }

    #[tokio::test]
    async fn test_first_attempt_success_settles_set() {
        let service = ScriptedService::new(vec![Step::Ack(LogPosition::new(7, 42, 0))]);
        let (set, ack) = sealed_single_record();
        let pending = PendingWrite::new(
            set,
            roster(3),
            service.clone(),
            Arc::new(SystemClock),
            Duration::from_millis(500),
        );

        assert!(pending.send_next_attempt().is_some());
        assert_eq!(ack.wait().await.unwrap(), LogPosition::new(7, 42, 0));
        assert_eq!(service.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_attempt_failure_tries_next_stream() {
        let service =
            ScriptedService::new(vec![Step::Fail, Step::Ack(LogPosition::new(3, 9, 0))]);
        let (set, ack) = sealed_single_record();
        let pending = PendingWrite::new(
            set,
            roster(3),
            service.clone(),
            Arc::new(SystemClock),
            Duration::from_millis(500),
        );

        pending.send_next_attempt();
        assert_eq!(ack.wait().await.unwrap(), LogPosition::new(3, 9, 0));

        let attempts = service.attempts();
        assert_eq!(attempts.len(), 2);
        assert_ne!(attempts[0], attempts[1]);
    }

    #[tokio::test]
    async fn test_exhausting_roster_settles_with_timeout() {
        let service = ScriptedService::new(vec![Step::Fail, Step::Fail]);
        let (set, ack) = sealed_single_record();
        let pending = PendingWrite::new(
            set,
            roster(2),
            service.clone(),
            Arc::new(SystemClock),
            Duration::from_millis(500),
        );

        pending.send_next_attempt();
        match ack.wait().await {
            Err(ClientError::Timeout { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(service.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_deadline_settles_without_issuing() {
        let clock = Arc::new(ManualClock::new());
        let service = ScriptedService::new(vec![Step::Hang]);
        let (set, ack) = sealed_single_record();
        let pending = PendingWrite::new(
            set,
            roster(3),
            service.clone(),
            clock.clone(),
            Duration::from_millis(500),
        );

        pending.send_next_attempt();
        clock.advance(Duration::from_millis(600));
        assert!(!pending.issue_speculative());

        match ack.wait().await {
            Err(ClientError::Timeout { elapsed, attempts }) => {
                assert_eq!(elapsed, Duration::from_millis(600));
                assert_eq!(attempts, 1);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        // the deadline check fired before another stream was contacted
        assert_eq!(service.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_settled_set_issues_nothing_further() {
        let service = ScriptedService::new(vec![Step::Ack(LogPosition::new(1, 1, 0))]);
        let (set, ack) = sealed_single_record();
        let pending = PendingWrite::new(
            set,
            roster(3),
            service.clone(),
            Arc::new(SystemClock),
            Duration::from_millis(500),
        );

        pending.send_next_attempt();
        ack.wait().await.unwrap();

        assert!(!pending.issue_speculative());
        assert!(pending.send_next_attempt().is_none());
        assert_eq!(service.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ladder_speculates_past_quiet_stream() {
        let service =
            ScriptedService::new(vec![Step::Hang, Step::Ack(LogPosition::new(3, 9, 0))]);
        let (set, ack) = sealed_single_record();
        let pending = PendingWrite::new(
            set,
            roster(3),
            service.clone(),
            Arc::new(SystemClock),
            Duration::from_millis(500),
        );

        pending.dispatch(SpeculativePolicy::default());
        assert_eq!(ack.wait().await.unwrap(), LogPosition::new(3, 9, 0));

        let attempts = service.attempts();
        assert_eq!(attempts.len(), 2);
        assert_ne!(attempts[0], attempts[1]);
    }
}
