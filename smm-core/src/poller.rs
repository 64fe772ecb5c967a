//! Payment confirmation poller.
//!
//! After a charge is created the checkout polls the order status until the
//! payment is confirmed or a deadline passes:
//!
//! ```text
//! Idle -> Polling -> Success    (on_approved fired once)
//!                 -> TimedOut   (on_timeout fired once)
//!                 -> Cancelled  (neither fired)
//! ```
//!
//! Each poller is a tokio task owning its timer. A failing status check is
//! logged and the loop keeps going, so a checker that never succeeds ends
//! in `TimedOut`. A timeout too large to represent as an instant means the
//! poller only stops on approval or cancellation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use smm_sdk::objects::OrderStatusReport;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Asks whether an order's payment has been confirmed.
#[async_trait]
pub trait StatusChecker: Send + Sync {
    type Error: std::fmt::Display + Send;

    async fn check_status(&self, order_id: Uuid) -> Result<OrderStatusReport, Self::Error>;
}

/// Shortest delay between two checks. Shorter intervals are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two status checks. The first check happens one
    /// interval after start.
    pub interval: Duration,
    /// Total polling budget.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollState {
    Idle,
    Polling,
    Success,
    TimedOut,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollState::Success | PollState::TimedOut | PollState::Cancelled
        )
    }
}

/// Spawns pollers with a fixed [`PollConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentPoller {
    config: PollConfig,
}

/// Handle to a running poller.
///
/// Dropping the handle detaches the poller; use [`cancel`](Self::cancel)
/// to stop it without firing any callback.
#[derive(Debug)]
pub struct PollHandle {
    order_id: Uuid,
    cancel_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<PollState>,
    task: JoinHandle<()>,
}

enum Finish {
    Approved(OrderStatusReport),
    TimedOut,
    Cancelled,
}

impl PaymentPoller {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config: PollConfig {
                interval: config.interval.max(MIN_INTERVAL),
                ..config
            },
        }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Start polling `order_id`.
    ///
    /// `on_approved` fires when a check reports `payment_approved` or a
    /// `processing`/`completed` status; `on_timeout` fires when the timeout
    /// elapses first. At most one of them is ever called.
    pub fn spawn<C, A, T>(
        &self,
        order_id: Uuid,
        checker: Arc<C>,
        on_approved: A,
        on_timeout: T,
    ) -> PollHandle
    where
        C: StatusChecker + ?Sized + 'static,
        A: FnOnce(OrderStatusReport) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(PollState::Idle);
        let config = self.config;
        let cancel_flag = cancel_rx.clone();

        let task = tokio::spawn(async move {
            state_tx.send_replace(PollState::Polling);
            info!(%order_id, interval = ?config.interval, timeout = ?config.timeout, "Payment polling started");

            let mut finish = poll_loop(order_id, checker.as_ref(), config, cancel_rx).await;
            // A cancel that raced the last check still wins.
            if *cancel_flag.borrow() {
                finish = Finish::Cancelled;
            }
            match finish {
                Finish::Approved(report) => {
                    state_tx.send_replace(PollState::Success);
                    info!(%order_id, status = %report.status, "Payment confirmed");
                    on_approved(report);
                }
                Finish::TimedOut => {
                    state_tx.send_replace(PollState::TimedOut);
                    info!(%order_id, "Payment polling timed out");
                    on_timeout();
                }
                Finish::Cancelled => {
                    state_tx.send_replace(PollState::Cancelled);
                    debug!(%order_id, "Payment polling cancelled");
                }
            }
        });

        PollHandle {
            order_id,
            cancel_tx,
            state_rx,
            task,
        }
    }
}

async fn poll_loop<C>(
    order_id: Uuid,
    checker: &C,
    config: PollConfig,
    mut cancel_rx: watch::Receiver<bool>,
) -> Finish
where
    C: StatusChecker + ?Sized,
{
    let start = Instant::now();
    let deadline = until_deadline(start.checked_add(config.timeout));
    tokio::pin!(deadline);

    let interval = config.interval.max(MIN_INTERVAL);
    let mut ticker = start.checked_add(interval).map(|first| {
        let mut ticker = tokio::time::interval_at(first, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => return Finish::Cancelled,
            _ = &mut deadline => return Finish::TimedOut,
            _ = tick(&mut ticker) => {}
        }

        // The check itself races the deadline and cancellation so a slow
        // request can neither outlive the budget nor fire after cancel.
        let result = tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => return Finish::Cancelled,
            _ = &mut deadline => return Finish::TimedOut,
            result = checker.check_status(order_id) => result,
        };

        match result {
            Ok(report) if report.is_approved() => return Finish::Approved(report),
            Ok(report) => {
                debug!(%order_id, status = %report.status, "Payment not confirmed yet");
            }
            Err(e) => {
                warn!(%order_id, error = %e, "Order status check failed, will retry");
            }
        }
    }
}

/// Sleeps until `deadline`, or forever when there is none.
async fn until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Resolves once cancellation is requested. Pends forever if the handle was
/// dropped without cancelling.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl PollHandle {
    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn state(&self) -> PollState {
        *self.state_rx.borrow()
    }

    /// Stop polling.
    ///
    /// Neither callback fires after this returns unless the poller had
    /// already committed to one. A check in flight is abandoned, and an
    /// approval it reports once cancel was requested is discarded.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the poller to reach a terminal state.
    pub async fn join(self) -> PollState {
        let mut state_rx = self.state_rx;
        if let Err(e) = self.task.await {
            warn!(order_id = %self.order_id, error = %e, "Poller task failed");
        }
        let state = *state_rx.borrow_and_update();
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smm_sdk::objects::OrderStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, OnceLock};
    use tokio::sync::oneshot;

    /// Approves on the n-th call, fails every call before it.
    struct ScriptedChecker {
        calls: AtomicUsize,
        approve_on: Option<usize>,
        failing: bool,
    }

    impl ScriptedChecker {
        fn approving_on(n: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                approve_on: Some(n),
                failing: false,
            })
        }

        fn never_approving() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                approve_on: None,
                failing: false,
            })
        }

        fn always_failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                approve_on: None,
                failing: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusChecker for ScriptedChecker {
        type Error = String;

        async fn check_status(&self, _order_id: Uuid) -> Result<OrderStatusReport, String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing {
                return Err("connection refused".to_string());
            }
            Ok(OrderStatusReport {
                payment_approved: Some(call) == self.approve_on,
                status: OrderStatus::PendingPayment,
            })
        }
    }

    fn poller() -> PaymentPoller {
        PaymentPoller::new(PollConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_approval_on_third_tick() {
        let checker = ScriptedChecker::approving_on(3);
        let (tx, rx) = oneshot::channel();
        let timeouts = Arc::new(AtomicUsize::new(0));
        let timeouts_cb = timeouts.clone();
        let start = Instant::now();

        let handle = poller().spawn(
            Uuid::nil(),
            checker.clone(),
            move |report| {
                let _ = tx.send((Instant::now(), report));
            },
            move || {
                timeouts_cb.fetch_add(1, Ordering::SeqCst);
            },
        );

        let (fired_at, report) = rx.await.unwrap();
        assert!(report.payment_approved);
        assert_eq!(fired_at - start, Duration::from_secs(9));
        assert_eq!(handle.join().await, PollState::Success);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(checker.calls(), 3);
        assert_eq!(timeouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_status_counts_as_approved() {
        struct Processing;

        #[async_trait]
        impl StatusChecker for Processing {
            type Error = String;

            async fn check_status(&self, _: Uuid) -> Result<OrderStatusReport, String> {
                Ok(OrderStatusReport {
                    payment_approved: false,
                    status: OrderStatus::Processing,
                })
            }
        }

        let (tx, rx) = oneshot::channel();
        let handle = poller().spawn(
            Uuid::nil(),
            Arc::new(Processing),
            move |report| {
                let _ = tx.send(report.status);
            },
            || {},
        );
        assert_eq!(rx.await.unwrap(), OrderStatus::Processing);
        assert_eq!(handle.join().await, PollState::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_checker_times_out() {
        let checker = ScriptedChecker::always_failing();
        let approvals = Arc::new(AtomicUsize::new(0));
        let approvals_cb = approvals.clone();
        let (tx, rx) = oneshot::channel();
        let start = Instant::now();

        let handle = poller().spawn(
            Uuid::nil(),
            checker.clone(),
            move |_| {
                approvals_cb.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                let _ = tx.send(Instant::now());
            },
        );

        let fired_at = rx.await.unwrap();
        assert_eq!(fired_at - start, Duration::from_secs(600));
        assert_eq!(handle.join().await, PollState::TimedOut);
        assert_eq!(approvals.load(Ordering::SeqCst), 0);
        // Every tick before the deadline was attempted.
        assert_eq!(checker.calls(), 199);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_fires_no_callback() {
        let checker = ScriptedChecker::approving_on(5);
        let fired = Arc::new(Mutex::new(Vec::new()));
        let on_ok = fired.clone();
        let on_timeout = fired.clone();

        let handle = poller().spawn(
            Uuid::nil(),
            checker.clone(),
            move |_| on_ok.lock().unwrap().push("approved"),
            move || on_timeout.lock().unwrap().push("timeout"),
        );

        tokio::time::sleep(Duration::from_millis(7_500)).await;
        handle.cancel();
        assert_eq!(handle.join().await, PollState::Cancelled);

        tokio::time::sleep(Duration::from_secs(700)).await;
        assert!(fired.lock().unwrap().is_empty());
        assert_eq!(checker.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let poller = PaymentPoller::new(PollConfig {
            interval: Duration::ZERO,
            timeout: Duration::from_millis(10),
        });
        assert_eq!(poller.config().interval, MIN_INTERVAL);

        let checker = ScriptedChecker::always_failing();
        let timeouts = Arc::new(AtomicUsize::new(0));
        let timeouts_cb = timeouts.clone();
        let handle = poller.spawn(
            Uuid::nil(),
            checker.clone(),
            |_| {},
            move || {
                timeouts_cb.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(handle.join().await, PollState::TimedOut);
        assert_eq!(timeouts.load(Ordering::SeqCst), 1);
        assert!(checker.calls() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_polls_until_cancelled() {
        let poller = PaymentPoller::new(PollConfig {
            interval: Duration::from_secs(3),
            timeout: Duration::MAX,
        });
        let checker = ScriptedChecker::never_approving();
        let timeouts = Arc::new(AtomicUsize::new(0));
        let timeouts_cb = timeouts.clone();
        let handle = poller.spawn(
            Uuid::nil(),
            checker.clone(),
            |_| {},
            move || {
                timeouts_cb.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(handle.state(), PollState::Polling);
        assert_eq!(checker.calls(), 10);

        handle.cancel();
        assert_eq!(handle.join().await, PollState::Cancelled);
        assert_eq!(timeouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_approval_racing_cancel_is_discarded() {
        /// Requests cancellation from inside the check, then approves.
        struct CancelThenApprove {
            cancel_tx: OnceLock<watch::Sender<bool>>,
        }

        #[async_trait]
        impl StatusChecker for CancelThenApprove {
            type Error = String;

            async fn check_status(&self, _: Uuid) -> Result<OrderStatusReport, String> {
                if let Some(cancel_tx) = self.cancel_tx.get() {
                    cancel_tx.send_replace(true);
                }
                Ok(OrderStatusReport {
                    payment_approved: true,
                    status: OrderStatus::Processing,
                })
            }
        }

        let checker = Arc::new(CancelThenApprove {
            cancel_tx: OnceLock::new(),
        });
        let approvals = Arc::new(AtomicUsize::new(0));
        let approvals_cb = approvals.clone();
        let handle = poller().spawn(
            Uuid::nil(),
            checker.clone(),
            move |_| {
                approvals_cb.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        );
        checker.cancel_tx.set(handle.cancel_tx.clone()).unwrap();

        assert_eq!(handle.join().await, PollState::Cancelled);
        assert_eq!(approvals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_keeps_polling() {
        let checker = ScriptedChecker::approving_on(2);
        let (tx, rx) = oneshot::channel();

        drop(poller().spawn(
            Uuid::nil(),
            checker.clone(),
            move |_| {
                let _ = tx.send(());
            },
            || {},
        ));

        rx.await.unwrap();
        assert_eq!(checker.calls(), 2);
    }
}
