use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::oracle::{Oracle, OracleError, Symbol};

/// Consecutive interactive jobs served before a waiting background job gets
/// its turn.
pub const FAIRNESS_BUDGET: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    /// Line evaluations the user is waiting on.
    Interactive,
    /// Housekeeping such as exchange-rate refreshes.
    Background,
}

/// What the worker reports back for an evaluation job.
#[derive(Debug)]
pub enum JobOutcome {
    Finished(Result<String, OracleError>),
    /// An abort aimed at another job hit this one; the caller may retry.
    Interrupted,
    /// The job's token was cancelled before it reached the oracle.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
#[error("oracle worker thread has stopped")]
pub struct WorkerGone;

enum Job {
    Evaluate {
        id: u64,
        expression: String,
        cancel: CancellationToken,
        reply: oneshot::Sender<JobOutcome>,
    },
    RefreshRates {
        reply: oneshot::Sender<bool>,
    },
    Symbols {
        reply: oneshot::Sender<(Vec<Symbol>, Vec<Symbol>)>,
    },
}

enum WorkerRequest {
    Run { lane: Lane, job: Job },
    Shutdown,
}

/// Which job is on the oracle right now, and how many aborts have been
/// issued. Both fields only change together under the lock.
#[derive(Default)]
struct RunState {
    running: u64,
    epoch: u64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── OracleWorker ──

/// Exclusive owner of the oracle. Every call runs on one dedicated OS thread,
/// one at a time; callers talk to it through a channel and receive replies on
/// oneshot channels they can await.
pub struct OracleWorker {
    request_tx: std_mpsc::Sender<WorkerRequest>,
    oracle: Arc<dyn Oracle>,
    state: Arc<Mutex<RunState>>,
    next_id: AtomicU64,
    thread: Option<JoinHandle<()>>,
}

impl OracleWorker {
    pub fn start(oracle: Arc<dyn Oracle>) -> Result<Self, std::io::Error> {
        let (request_tx, request_rx) = std_mpsc::channel::<WorkerRequest>();
        let state = Arc::new(Mutex::new(RunState::default()));

        let thread = {
            let oracle = Arc::clone(&oracle);
            let state = Arc::clone(&state);
            std::thread::Builder::new()
                .name("tally-oracle".into())
                .spawn(move || worker_thread_main(oracle, state, request_rx))?
        };

        Ok(Self {
            request_tx,
            oracle,
            state,
            next_id: AtomicU64::new(1),
            thread: Some(thread),
        })
    }

    fn send(&self, lane: Lane, job: Job) -> Result<(), WorkerGone> {
        self.request_tx
            .send(WorkerRequest::Run { lane, job })
            .map_err(|_| WorkerGone)
    }

    /// Queue an evaluation. Returns the job id (for [`abort_job`](Self::abort_job))
    /// and the receiver for its outcome.
    pub fn submit(
        &self,
        lane: Lane,
        expression: String,
        cancel: CancellationToken,
    ) -> Result<(u64, oneshot::Receiver<JobOutcome>), WorkerGone> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        self.send(
            lane,
            Job::Evaluate {
                id,
                expression,
                cancel,
                reply,
            },
        )?;
        Ok((id, rx))
    }

    pub fn refresh_rates(&self) -> Result<oneshot::Receiver<bool>, WorkerGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Lane::Background, Job::RefreshRates { reply })?;
        Ok(rx)
    }

    /// Fetch `(functions, variables)` from the oracle.
    pub fn symbols(
        &self,
    ) -> Result<oneshot::Receiver<(Vec<Symbol>, Vec<Symbol>)>, WorkerGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Lane::Interactive, Job::Symbols { reply })?;
        Ok(rx)
    }

    /// Abort the oracle call if job `id` is the one running. Returns whether
    /// an abort was issued.
    pub fn abort_job(&self, id: u64) -> bool {
        let mut state = lock(&self.state);
        if state.running != id || id == 0 {
            return false;
        }
        self.oracle.abort();
        state.epoch += 1;
        true
    }

    /// Abort whatever evaluation is running. The victim reports
    /// [`JobOutcome::Interrupted`] unless its own token was cancelled.
    pub fn abort_current(&self) {
        let mut state = lock(&self.state);
        if state.running != 0 {
            self.oracle.abort();
            state.epoch += 1;
        }
    }
}

impl Drop for OracleWorker {
    fn drop(&mut self) {
        self.abort_current();
        let _ = self.request_tx.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

// ── Lanes ──

/// Two FIFO queues with a fairness budget: interactive jobs go first, but a
/// waiting background job is served after [`FAIRNESS_BUDGET`] interactive
/// jobs in a row.
struct Lanes<T> {
    interactive: VecDeque<T>,
    background: VecDeque<T>,
    streak: usize,
}

impl<T> Default for Lanes<T> {
    fn default() -> Self {
        Self {
            interactive: VecDeque::new(),
            background: VecDeque::new(),
            streak: 0,
        }
    }
}

impl<T> Lanes<T> {
    fn push(&mut self, lane: Lane, job: T) {
        match lane {
            Lane::Interactive => self.interactive.push_back(job),
            Lane::Background => self.background.push_back(job),
        }
    }

    fn next(&mut self) -> Option<T> {
        let background_turn = !self.background.is_empty()
            && (self.interactive.is_empty() || self.streak >= FAIRNESS_BUDGET);
        if background_turn {
            self.streak = 0;
            return self.background.pop_front();
        }
        let job = self.interactive.pop_front()?;
        self.streak += 1;
        Some(job)
    }

    fn is_empty(&self) -> bool {
        self.interactive.is_empty() && self.background.is_empty()
    }
}

// ── Worker thread ──

fn worker_thread_main(
    oracle: Arc<dyn Oracle>,
    state: Arc<Mutex<RunState>>,
    request_rx: std_mpsc::Receiver<WorkerRequest>,
) {
    let mut lanes = Lanes::default();
    loop {
        if lanes.is_empty() {
            match request_rx.recv() {
                Ok(WorkerRequest::Run { lane, job }) => lanes.push(lane, job),
                Ok(WorkerRequest::Shutdown) | Err(_) => break,
            }
        }
        // Pull in everything already queued so lane priority sees it.
        loop {
            match request_rx.try_recv() {
                Ok(WorkerRequest::Run { lane, job }) => lanes.push(lane, job),
                Ok(WorkerRequest::Shutdown) | Err(std_mpsc::TryRecvError::Disconnected) => {
                    return;
                }
                Err(std_mpsc::TryRecvError::Empty) => break,
            }
        }
        if let Some(job) = lanes.next() {
            run_job(oracle.as_ref(), &state, job);
        }
    }
    tracing::debug!("oracle worker stopped");
}

fn run_job(oracle: &dyn Oracle, state: &Mutex<RunState>, job: Job) {
    match job {
        Job::Evaluate {
            id,
            expression,
            cancel,
            reply,
        } => {
            if cancel.is_cancelled() {
                tracing::trace!(job = id, "skipping cancelled job");
                let _ = reply.send(JobOutcome::Skipped);
                return;
            }
            let start_epoch = {
                let mut s = lock(state);
                // Aborts are only issued under this lock while `running` is
                // set, so nothing can race the reset.
                oracle.reset_abort();
                s.running = id;
                s.epoch
            };
            let result = oracle.evaluate(&expression);
            let interrupted = {
                let mut s = lock(state);
                s.running = 0;
                s.epoch != start_epoch
            };
            let outcome = if interrupted && !cancel.is_cancelled() {
                JobOutcome::Interrupted
            } else {
                JobOutcome::Finished(result)
            };
            let _ = reply.send(outcome);
        }
        Job::RefreshRates { reply } => {
            let _ = reply.send(oracle.refresh_rates());
        }
        Job::Symbols { reply } => {
            let _ = reply.send((oracle.list_functions(), oracle.list_variables()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeOracle;
    use std::time::Duration;

    // ── Lanes ──

    #[test]
    fn interactive_preferred_when_no_background() {
        let mut lanes = Lanes::default();
        lanes.push(Lane::Interactive, 1);
        lanes.push(Lane::Interactive, 2);
        assert_eq!(lanes.next(), Some(1));
        assert_eq!(lanes.next(), Some(2));
        assert_eq!(lanes.next(), None);
    }

    #[test]
    fn background_served_alone() {
        let mut lanes = Lanes::default();
        lanes.push(Lane::Background, 7);
        assert_eq!(lanes.next(), Some(7));
        assert!(lanes.is_empty());
    }

    #[test]
    fn background_not_starved_by_interactive_flood() {
        let mut lanes = Lanes::default();
        lanes.push(Lane::Background, 100);
        for i in 0..10 {
            lanes.push(Lane::Interactive, i);
        }
        let order: Vec<i32> = std::iter::from_fn(|| lanes.next()).collect();
        assert_eq!(order[..FAIRNESS_BUDGET], [0, 1, 2, 3]);
        assert_eq!(order[FAIRNESS_BUDGET], 100);
        assert_eq!(order.len(), 11);
    }

    #[test]
    fn interactive_resumes_after_background_turn() {
        let mut lanes = Lanes::default();
        for i in 0..FAIRNESS_BUDGET as i32 {
            lanes.push(Lane::Interactive, i);
        }
        for _ in 0..FAIRNESS_BUDGET {
            lanes.next();
        }
        lanes.push(Lane::Background, 50);
        lanes.push(Lane::Background, 51);
        lanes.push(Lane::Interactive, 9);
        assert_eq!(lanes.next(), Some(50));
        assert_eq!(lanes.next(), Some(9));
        assert_eq!(lanes.next(), Some(51));
    }

    // ── OracleWorker ──

    #[tokio::test]
    async fn evaluates_on_worker_thread() {
        let worker = OracleWorker::start(FakeOracle::new()).unwrap();
        let (_, rx) = worker
            .submit(Lane::Interactive, "2+2".into(), CancellationToken::new())
            .unwrap();
        match rx.await.unwrap() {
            JobOutcome::Finished(Ok(text)) => assert_eq!(text, "4"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_job_is_skipped() {
        let oracle = FakeOracle::new();
        oracle.delay("9", Duration::from_millis(50));
        let worker = OracleWorker::start(oracle.clone()).unwrap();

        let (_, slow) = worker
            .submit(Lane::Interactive, "9".into(), CancellationToken::new())
            .unwrap();
        let token = CancellationToken::new();
        let (_, skipped) = worker
            .submit(Lane::Interactive, "1+1".into(), token.clone())
            .unwrap();
        token.cancel();

        assert!(matches!(slow.await.unwrap(), JobOutcome::Finished(Ok(_))));
        assert!(matches!(skipped.await.unwrap(), JobOutcome::Skipped));
        assert_eq!(oracle.calls(), ["9"]);
    }

    #[tokio::test]
    async fn abort_current_interrupts_uncancelled_job() {
        let oracle = FakeOracle::new();
        oracle.delay("5", Duration::from_secs(10));
        let worker = OracleWorker::start(oracle.clone()).unwrap();

        let (_, rx) = worker
            .submit(Lane::Interactive, "5".into(), CancellationToken::new())
            .unwrap();
        oracle.wait_for_calls(1).await;
        worker.abort_current();

        let outcome = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Interrupted));
        assert_eq!(oracle.aborts(), 1);
    }

    #[tokio::test]
    async fn abort_job_ignores_other_ids() {
        let oracle = FakeOracle::new();
        oracle.delay("5", Duration::from_secs(10));
        let worker = OracleWorker::start(oracle.clone()).unwrap();

        let token = CancellationToken::new();
        let (id, rx) = worker
            .submit(Lane::Interactive, "5".into(), token.clone())
            .unwrap();
        oracle.wait_for_calls(1).await;

        assert!(!worker.abort_job(id + 1000));
        token.cancel();
        assert!(worker.abort_job(id));

        // Cancelled before the abort, so it does not claim to be interrupted.
        assert!(matches!(rx.await.unwrap(), JobOutcome::Finished(Err(_))));
    }

    #[tokio::test]
    async fn stale_aborts_reset_before_each_evaluation() {
        let oracle = FakeOracle::new();
        let worker = OracleWorker::start(oracle.clone()).unwrap();
        for expr in ["1+1", "2+2"] {
            let (_, rx) = worker
                .submit(Lane::Interactive, expr.into(), CancellationToken::new())
                .unwrap();
            rx.await.unwrap();
        }
        assert_eq!(oracle.resets(), 2);

        // Skipped jobs never reach the oracle, so they reset nothing.
        let token = CancellationToken::new();
        token.cancel();
        let (_, rx) = worker
            .submit(Lane::Interactive, "3+3".into(), token)
            .unwrap();
        assert!(matches!(rx.await.unwrap(), JobOutcome::Skipped));
        assert_eq!(oracle.resets(), 2);
    }

    #[tokio::test]
    async fn refresh_and_symbols_round_trip() {
        let oracle = FakeOracle::new();
        let worker = OracleWorker::start(oracle.clone()).unwrap();
        assert!(worker.refresh_rates().unwrap().await.unwrap());
        let (functions, variables) = worker.symbols().unwrap().await.unwrap();
        assert!(functions.iter().any(|s| s.name == "sin"));
        assert!(variables.iter().any(|s| s.name == "pi"));
        assert_eq!(oracle.rate_refreshes(), 1);
    }
}
