//! Concurrency-bounded task queue for outbound calls
//!
//! This module provides a reusable rate limiter that:
//! - Starts at most `max_requests` tasks per `window_ms`, spaced at least
//!   `window_ms / max_requests` apart, with at most `max_requests` in flight
//! - Bounds memory with `max_queue_size` and rejects (never drops) overflow
//! - Orders by arrival, or by priority when configured
//! - Supports per-task timeouts and abort signals for cancellation while queued
//! - Keeps counters and rolling wait/execution samples for observability

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Notify, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::domain::config::{QueueMode, RateLimiterConfig};
use crate::domain::errors::RateLimitError;

/// Number of wait/execution samples kept for averages.
const SAMPLE_WINDOW: usize = 100;

/// Per-task options for [`RateLimiter::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub task_id: Option<String>,
    /// Higher runs first in priority mode. Ignored in FIFO mode.
    pub priority: i32,
    /// Measured from the moment the task starts executing.
    pub timeout: Option<Duration>,
    /// Flipping the signal to `true` cancels the task while it is still queued.
    pub cancel_signal: Option<watch::Receiver<bool>>,
}

impl EnqueueOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.task_id = Some(id.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_signal(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel_signal = Some(signal);
        self
    }
}

/// Snapshot of limiter bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimiterStats {
    pub processed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub rejected: u64,
    pub queued: usize,
    pub in_flight: usize,
    pub running: bool,
    pub avg_wait: Duration,
    pub avg_execution: Duration,
}

enum Outcome {
    Succeeded,
    Failed,
    TimedOut,
}

type Job = Box<dyn FnOnce(Option<Duration>) -> BoxFuture<'static, Outcome> + Send>;
type Reject = Box<dyn FnOnce(RateLimitError) + Send>;

/// Single-use result channel shared by the job and its rejection path.
type ResultSlot<T> = Arc<Mutex<Option<oneshot::Sender<Result<T, RateLimitError>>>>>;

fn deliver<T>(slot: &ResultSlot<T>, result: Result<T, RateLimitError>) {
    if let Some(tx) = slot.lock().take() {
        let _ = tx.send(result);
    }
}

struct QueuedTask {
    id: String,
    priority: i32,
    enqueued_at: Instant,
    timeout: Option<Duration>,
    cancel_signal: Option<watch::Receiver<bool>>,
    watcher: Option<JoinHandle<()>>,
    job: Job,
    reject: Reject,
}

impl QueuedTask {
    fn is_cancelled(&self) -> bool {
        self.cancel_signal.as_ref().is_some_and(|signal| *signal.borrow())
    }

    fn stop_watching(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }

    fn reject_cancelled(mut self) {
        self.stop_watching();
        tracing::debug!(task_id = %self.id, "Cancelled queued task");
        (self.reject)(RateLimitError::Cancelled { task_id: self.id });
    }
}

/// Removes the task from the queue as soon as its signal flips, whether or not
/// anyone is awaiting the handle.
fn watch_cancel(inner: Weak<Inner>, id: String, mut signal: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let cancelled = *signal.borrow_and_update();
            if cancelled {
                break;
            }
            if signal.changed().await.is_err() {
                return;
            }
        }
        if let Some(inner) = inner.upgrade() {
            inner.cancel_queued(&id);
        }
    })
}

struct LimiterState {
    queue: VecDeque<QueuedTask>,
    in_flight: usize,
    last_start: Option<Instant>,
    running: bool,
    timer_armed: bool,
    processed: u64,
    failed: u64,
    timed_out: u64,
    cancelled: u64,
    rejected: u64,
    wait_times: VecDeque<Duration>,
    execution_times: VecDeque<Duration>,
}

impl LimiterState {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }
}

fn push_sample(samples: &mut VecDeque<Duration>, sample: Duration) {
    if samples.len() == SAMPLE_WINDOW {
        samples.pop_front();
    }
    samples.push_back(sample);
}

fn average(samples: &VecDeque<Duration>) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    samples.iter().sum::<Duration>() / samples.len() as u32
}

struct Inner {
    config: RateLimiterConfig,
    min_interval: Duration,
    state: Mutex<LimiterState>,
    idle: Notify,
}

impl Inner {
    /// Start every task that may start right now; arm a timer for the next one otherwise.
    fn dispatch(self: &Arc<Self>) {
        let mut state = self.state.lock();
        let mut cancelled = Vec::new();
        loop {
            if state.queue.is_empty() || state.in_flight >= self.config.max_requests {
                break;
            }

            let now = Instant::now();
            if let Some(last) = state.last_start {
                let next = last + self.min_interval;
                if now < next {
                    if !state.timer_armed {
                        state.timer_armed = true;
                        let inner = Arc::clone(self);
                        tokio::spawn(async move {
                            tokio::time::sleep_until(next).await;
                            inner.state.lock().timer_armed = false;
                            inner.dispatch();
                        });
                    }
                    break;
                }
            }

            let Some(mut task) = state.queue.pop_front() else {
                break;
            };
            if task.is_cancelled() {
                state.cancelled += 1;
                cancelled.push(task);
                continue;
            }
            task.stop_watching();
            state.in_flight += 1;
            state.last_start = Some(now);
            push_sample(&mut state.wait_times, now.duration_since(task.enqueued_at));

            tracing::trace!(task_id = %task.id, priority = task.priority, "Starting rate-limited task");
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let started = Instant::now();
                let outcome = (task.job)(task.timeout).await;
                inner.finish(outcome, started.elapsed());
            });
        }

        let idle = state.is_idle();
        drop(state);
        for task in cancelled {
            task.reject_cancelled();
        }
        if idle {
            self.idle.notify_waiters();
        }
    }

    fn finish(self: &Arc<Self>, outcome: Outcome, elapsed: Duration) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            match outcome {
                Outcome::Succeeded => state.processed += 1,
                Outcome::Failed => state.failed += 1,
                Outcome::TimedOut => state.timed_out += 1,
            }
            push_sample(&mut state.execution_times, elapsed);
        }
        self.dispatch();
    }

    /// Remove a task that has not started yet.
    fn cancel_queued(&self, id: &str) -> bool {
        let (task, idle) = {
            let mut state = self.state.lock();
            let Some(task) = state
                .queue
                .iter()
                .position(|t| t.id == id)
                .and_then(|pos| state.queue.remove(pos))
            else {
                return false;
            };
            state.cancelled += 1;
            (task, state.is_idle())
        };
        task.reject_cancelled();
        if idle {
            self.idle.notify_waiters();
        }
        true
    }
}

/// Generic rate limiter with queueing, pacing and cancellation support
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let config = RateLimiterConfig {
            max_requests: config.max_requests.max(1),
            window_ms: config.window_ms.max(1),
            ..config
        };
        let min_interval = config.min_interval();
        Self {
            inner: Arc::new(Inner {
                config,
                min_interval,
                state: Mutex::new(LimiterState {
                    queue: VecDeque::new(),
                    in_flight: 0,
                    last_start: None,
                    running: true,
                    timer_armed: false,
                    processed: 0,
                    failed: 0,
                    timed_out: 0,
                    cancelled: 0,
                    rejected: 0,
                    wait_times: VecDeque::with_capacity(SAMPLE_WINDOW),
                    execution_times: VecDeque::with_capacity(SAMPLE_WINDOW),
                }),
                idle: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.inner.config
    }

    /// Queue a task and wait for its result.
    ///
    /// # Example
    /// ```ignore
    /// let body = limiter
    ///     .enqueue(|| async { send_reply(channel, text).await }, EnqueueOptions::default())
    ///     .await?;
    /// ```
    pub async fn enqueue<T, F, Fut>(&self, task: F, options: EnqueueOptions) -> Result<T, RateLimitError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(task, options)?.wait().await
    }

    /// Admit a task without waiting for it. Admission errors are returned immediately.
    pub fn submit<T, F, Fut>(&self, task: F, options: EnqueueOptions) -> Result<TaskHandle<T>, RateLimitError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let id = options
            .task_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if let Some(signal) = &options.cancel_signal
            && *signal.borrow()
        {
            self.inner.state.lock().cancelled += 1;
            return Err(RateLimitError::Cancelled { task_id: id });
        }

        let (tx, rx) = oneshot::channel::<Result<T, RateLimitError>>();
        let slot: ResultSlot<T> = Arc::new(Mutex::new(Some(tx)));
        let reject_slot = Arc::clone(&slot);
        let reject: Reject = Box::new(move |error| deliver(&reject_slot, Err(error)));
        let job_id = id.clone();
        let job: Job = Box::new(move |timeout: Option<Duration>| -> BoxFuture<'static, Outcome> {
            Box::pin(async move {
                // Runs on its own task: a timeout abandons the work, it is never aborted.
                let work = tokio::spawn(task());
                let joined = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, work).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            deliver(
                                &slot,
                                Err(RateLimitError::Timeout {
                                    task_id: job_id,
                                    timeout: limit,
                                }),
                            );
                            return Outcome::TimedOut;
                        }
                    },
                    None => work.await,
                };
                match joined {
                    Ok(Ok(value)) => {
                        deliver(&slot, Ok(value));
                        Outcome::Succeeded
                    }
                    Ok(Err(e)) => {
                        deliver(
                            &slot,
                            Err(RateLimitError::Failed {
                                task_id: job_id,
                                message: format!("{e:#}"),
                            }),
                        );
                        Outcome::Failed
                    }
                    Err(_) => {
                        deliver(&slot, Err(RateLimitError::Dropped { task_id: job_id }));
                        Outcome::Failed
                    }
                }
            })
        });

        {
            let mut state = self.inner.state.lock();
            if !state.running {
                state.rejected += 1;
                return Err(RateLimitError::Stopped);
            }
            let capacity = self.inner.config.max_queue_size;
            if capacity > 0 && state.queue.len() >= capacity {
                state.rejected += 1;
                return Err(RateLimitError::QueueFull { capacity });
            }

            // Spawned under the lock so the watcher cannot look for the task before it is queued.
            let watcher = options
                .cancel_signal
                .clone()
                .map(|signal| watch_cancel(Arc::downgrade(&self.inner), id.clone(), signal));
            let queued = QueuedTask {
                id: id.clone(),
                priority: options.priority,
                enqueued_at: Instant::now(),
                timeout: options.timeout,
                cancel_signal: options.cancel_signal,
                watcher,
                job,
                reject,
            };
            match self.inner.config.mode {
                QueueMode::Fifo => state.queue.push_back(queued),
                QueueMode::Priority => {
                    let pos = state
                        .queue
                        .iter()
                        .position(|t| t.priority < queued.priority)
                        .unwrap_or(state.queue.len());
                    state.queue.insert(pos, queued);
                }
            }
        }

        self.inner.dispatch();

        Ok(TaskHandle { id, rx })
    }

    /// Stop admitting tasks and wait until queued and in-flight work has settled.
    pub async fn stop(&self) {
        self.inner.state.lock().running = false;
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.state.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Resume admitting tasks.
    pub fn start(&self) {
        self.inner.state.lock().running = true;
        self.inner.dispatch();
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    pub fn stats(&self) -> RateLimiterStats {
        let state = self.inner.state.lock();
        RateLimiterStats {
            processed: state.processed,
            failed: state.failed,
            timed_out: state.timed_out,
            cancelled: state.cancelled,
            rejected: state.rejected,
            queued: state.queue.len(),
            in_flight: state.in_flight,
            running: state.running,
            avg_wait: average(&state.wait_times),
            avg_execution: average(&state.execution_times),
        }
    }
}

/// Pending result of a submitted task.
///
/// Dropping the handle does not cancel the task; use a cancel signal for that.
pub struct TaskHandle<T> {
    id: String,
    rx: oneshot::Receiver<Result<T, RateLimitError>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the task to settle.
    ///
    /// A task cancelled while queued settles with `Cancelled`. Once it has started
    /// the signal is ignored and only the timeout can cut the wait short.
    pub async fn wait(self) -> Result<T, RateLimitError> {
        self.rx.await.unwrap_or_else(|_| Err(RateLimitError::Dropped { task_id: self.id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn limiter(max_requests: usize, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig::new(max_requests, window_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_waits_a_full_window() {
        let limiter = limiter(1, 1000);
        let starts = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let starts = starts.clone();
            handles.push(
                limiter
                    .submit(
                        move || async move {
                            starts.lock().push(Instant::now());
                            Ok(())
                        },
                        EnqueueOptions::default(),
                    )
                    .unwrap(),
            );
        }
        for handle in handles {
            handle.wait().await.unwrap();
        }

        let starts = starts.lock();
        assert_eq!(starts.len(), 2);
        assert!(starts[1].duration_since(starts[0]) >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_spreads_starts_evenly() {
        let limiter = limiter(4, 1000);
        let starts = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let starts = starts.clone();
                limiter
                    .submit(
                        move || async move {
                            starts.lock().push(Instant::now());
                            Ok(())
                        },
                        EnqueueOptions::default(),
                    )
                    .unwrap()
            })
            .collect();
        for handle in handles {
            handle.wait().await.unwrap();
        }

        let starts = starts.lock();
        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_cap() {
        let limiter = limiter(2, 10);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                limiter
                    .submit(
                        move || async move {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        },
                        EnqueueOptions::default(),
                    )
                    .unwrap()
            })
            .collect();
        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.stats().processed, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_full_rejects_immediately() {
        let limiter = RateLimiter::new(RateLimiterConfig::new(1, 60_000).with_queue_size(1));

        let first = limiter.submit(|| async { Ok(1) }, EnqueueOptions::default()).unwrap();
        let second = limiter.submit(|| async { Ok(2) }, EnqueueOptions::default()).unwrap();
        let third = limiter.submit(|| async { Ok(3) }, EnqueueOptions::default());

        assert!(matches!(third, Err(RateLimitError::QueueFull { capacity: 1 })));
        let stats = limiter.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.rejected, 1);

        assert_eq!(first.wait().await.unwrap(), 1);
        assert_eq!(second.wait().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_mode_orders_queue() {
        let limiter = RateLimiter::new(RateLimiterConfig::new(1, 100).with_mode(QueueMode::Priority));
        let order = Arc::new(Mutex::new(Vec::new()));

        let submit = |label: &'static str, priority: i32| {
            let order = order.clone();
            limiter
                .submit(
                    move || async move {
                        order.lock().push(label);
                        Ok(())
                    },
                    EnqueueOptions::default().priority(priority),
                )
                .unwrap()
        };

        let handles = vec![
            submit("blocker", 0),
            submit("low", 0),
            submit("high", 5),
            submit("mid", 1),
            submit("high-2", 5),
        ];
        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert_eq!(*order.lock(), vec!["blocker", "high", "high-2", "mid", "low"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_mode_ignores_priority() {
        let limiter = limiter(1, 100);
        let order = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = [("a", 0), ("b", 9), ("c", 5)]
            .into_iter()
            .map(|(label, priority)| {
                let order = order.clone();
                limiter
                    .submit(
                        move || async move {
                            order.lock().push(label);
                            Ok(())
                        },
                        EnqueueOptions::default().priority(priority),
                    )
                    .unwrap()
            })
            .collect();
        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abandons_task() {
        let limiter = limiter(1, 10);
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = finished.clone();

        let result = limiter
            .enqueue(
                move || async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    flag.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                EnqueueOptions::default()
                    .with_id("slow")
                    .timeout(Duration::from_millis(100)),
            )
            .await;

        assert_eq!(
            result,
            Err(RateLimitError::Timeout {
                task_id: "slow".into(),
                timeout: Duration::from_millis(100),
            })
        );
        assert_eq!(limiter.stats().timed_out, 1);

        // The abandoned work still runs to completion.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_queued() {
        let limiter = limiter(1, 10_000);
        let ran = Arc::new(AtomicUsize::new(0));

        let first = limiter.submit(|| async { Ok(()) }, EnqueueOptions::default()).unwrap();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let counter = ran.clone();
        let second = limiter
            .submit(
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                EnqueueOptions::default().with_id("second").cancel_signal(cancel_rx),
            )
            .unwrap();

        cancel_tx.send(true).unwrap();
        assert_eq!(
            second.wait().await,
            Err(RateLimitError::Cancelled {
                task_id: "second".into()
            })
        );
        first.wait().await.unwrap();

        let stats = limiter.stats();
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.queued, 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_takes_effect_without_awaiting_the_handle() {
        let limiter = limiter(1, 10_000);
        let ran = Arc::new(AtomicUsize::new(0));

        let blocker = limiter.submit(|| async { Ok(()) }, EnqueueOptions::default()).unwrap();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let counter = ran.clone();
        let second = limiter
            .submit(
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                EnqueueOptions::default().with_id("second").cancel_signal(cancel_rx),
            )
            .unwrap();

        cancel_tx.send(true).unwrap();
        blocker.wait().await.unwrap();
        // Well past the slot the second task would have started in.
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(
            second.wait().await,
            Err(RateLimitError::Cancelled {
                task_id: "second".into()
            })
        );
        let stats = limiter.stats();
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_after_start_does_not_cancel() {
        let limiter = limiter(1, 10);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = limiter
            .submit(
                || async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok("done")
                },
                EnqueueOptions::default().cancel_signal(cancel_rx),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel_tx.send(true).unwrap();

        assert_eq!(handle.wait().await, Ok("done"));
        assert_eq!(limiter.stats().cancelled, 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_signal_is_rejected() {
        let limiter = limiter(1, 10);
        let (_tx, rx) = watch::channel(true);
        let result = limiter.submit(|| async { Ok(()) }, EnqueueOptions::default().cancel_signal(rx));
        assert!(matches!(result, Err(RateLimitError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_task_failure_is_typed() {
        let limiter = limiter(1, 10);
        let result: Result<(), _> = limiter
            .enqueue(
                || async { Err(anyhow::anyhow!("upstream 503")) },
                EnqueueOptions::default().with_id("call"),
            )
            .await;

        assert_eq!(
            result,
            Err(RateLimitError::Failed {
                task_id: "call".into(),
                message: "upstream 503".into(),
            })
        );
        assert_eq!(limiter.stats().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_drains_then_rejects() {
        let limiter = limiter(1, 500);
        let done = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let done = done.clone();
                limiter
                    .submit(
                        move || async move {
                            done.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        },
                        EnqueueOptions::default(),
                    )
                    .unwrap()
            })
            .collect();

        limiter.stop().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert!(!limiter.is_running());
        assert!(matches!(
            limiter.submit(|| async { Ok(()) }, EnqueueOptions::default()),
            Err(RateLimitError::Stopped)
        ));
        for handle in handles {
            handle.wait().await.unwrap();
        }

        limiter.start();
        assert_eq!(limiter.enqueue(|| async { Ok(7) }, EnqueueOptions::default()).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_samples_are_recorded() {
        let limiter = limiter(1, 1000);
        let a = limiter.submit(|| async { Ok(()) }, EnqueueOptions::default()).unwrap();
        let b = limiter.submit(|| async { Ok(()) }, EnqueueOptions::default()).unwrap();
        a.wait().await.unwrap();
        b.wait().await.unwrap();

        // One task waited zero, the other a full window.
        assert!(limiter.stats().avg_wait >= Duration::from_millis(500));
    }
}
