//! Convergence waits and run cancellation.
//!
//! `poll_until` probes a condition, sleeping with exponential backoff
//! between probes (base interval, doubling up to a ceiling), and gives
//! up after a bounded number of probes. The run's `CancelSignal` is
//! observed before each probe and while sleeping.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use fleetdown_core::WaitConfig;

use crate::error::{PlaneError, PlaneResult};

/// Bounded polling policy for convergence waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay after the first unsuccessful probe.
    pub interval: Duration,
    /// Backoff ceiling.
    pub max_interval: Duration,
    /// Total probes before giving up.
    pub max_attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::from(&WaitConfig::default())
    }
}

impl From<&WaitConfig> for WaitPolicy {
    fn from(cfg: &WaitConfig) -> Self {
        Self {
            interval: Duration::from_secs(cfg.interval_secs),
            max_interval: Duration::from_secs(cfg.max_interval_secs.max(cfg.interval_secs)),
            max_attempts: cfg.max_attempts.max(1),
        }
    }
}

/// Exponential backoff: doubles on every call up to the ceiling.
#[derive(Debug)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { current: base, max }
    }

    /// Delay to sleep now; advances the backoff for the next call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

/// Sending side of a run's cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving side of a run's cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    // Keeps the channel open for signals that can never fire.
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

impl CancelSignal {
    pub fn new() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx: Arc::new(tx) },
            CancelSignal {
                rx,
                _keepalive: None,
            },
        )
    }

    /// A signal that is never cancelled.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(Arc::new(tx)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(Cancelled)` once the run has been cancelled.
    pub fn check(&self) -> PlaneResult<()> {
        if self.is_cancelled() {
            Err(PlaneError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when the run is cancelled. Pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        let closed = self.rx.wait_for(|c| *c).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

/// Probe `condition` until it reports true.
///
/// The first probe is immediate. A probe error aborts the wait. After
/// `policy.max_attempts` unsuccessful probes the wait fails with
/// `WaitExhausted`.
pub async fn poll_until<F, Fut>(
    policy: &WaitPolicy,
    cancel: &CancelSignal,
    what: &str,
    mut condition: F,
) -> PlaneResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PlaneResult<bool>>,
{
    let mut backoff = Backoff::new(policy.interval, policy.max_interval);

    for attempt in 1..=policy.max_attempts {
        cancel.check()?;
        if condition().await? {
            debug!(what, attempt, "converged");
            return Ok(());
        }
        if attempt == policy.max_attempts {
            break;
        }

        let delay = backoff.next_delay();
        debug!(
            what,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "not converged yet"
        );

        let mut cancel = cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return Err(PlaneError::Cancelled),
        }
    }

    Err(PlaneError::WaitExhausted {
        what: what.to_string(),
        attempts: policy.max_attempts,
    })
}
