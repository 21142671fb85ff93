//! Scheduler
//!
//! Drives the [`Reconciler`] at a fixed interval until shutdown.
//!
//! ## Timing
//!
//! Intervals are measured with tokio's monotonic timer, so wall-clock
//! adjustments neither skip nor double cycles. The first cycle runs
//! immediately. If a cycle overruns the interval, the next one starts right
//! after it and the schedule shifts (no burst of catch-up cycles).
//!
//! ## Shutdown
//!
//! The shutdown signal is only observed while idle between cycles. A cycle
//! that has started, including its remote write, always runs to completion.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::reconciler::Reconciler;

/// Events emitted by the Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Scheduler started
    Started { interval: Duration },

    /// One reconciliation cycle finished
    CycleCompleted { success: bool },

    /// Scheduler stopped
    Stopped { reason: String },
}

/// Fixed-interval driver for the reconciler
///
/// ## Lifecycle
///
/// 1. Create with [`Scheduler::new()`]
/// 2. Run with [`Scheduler::run()`] or [`Scheduler::run_until()`]
/// 3. Returns once shutdown is requested
///
/// ## Threading
///
/// Cycles run one at a time on the calling task; no two cycles ever overlap.
pub struct Scheduler {
    /// The reconciler being driven
    reconciler: Reconciler,

    /// Time between cycle starts
    interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Parameters
    ///
    /// - `reconciler`: The reconciler to drive
    /// - `interval`: Time between cycles (must be non-zero)
    /// - `event_capacity`: Capacity of the event channel
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver)
    pub fn new(
        reconciler: Reconciler,
        interval: Duration,
        event_capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        if interval.is_zero() {
            return Err(Error::config("scheduler interval must be > 0"));
        }

        let (tx, rx) = mpsc::channel(event_capacity.max(1));

        let scheduler = Self {
            reconciler,
            interval,
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// The driven reconciler
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Run until Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes
    ///
    /// Cycle failures never end the loop.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!("Starting IP monitor, interval {:?}", self.interval);
        self.emit_event(SchedulerEvent::Started {
            interval: self.interval,
        });

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(SchedulerEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                _ = ticker.tick() => {}
            }

            // Not inside select!: a running cycle is never cancelled
            let success = self.reconciler.run_cycle().await;
            debug!("Cycle finished (success: {})", success);
            self.emit_event(SchedulerEvent::CycleCompleted { success });
        }

        info!("IP monitor stopped");
        Ok(())
    }

    /// Emit a scheduler event, dropping it if the channel is full
    fn emit_event(&self, event: SchedulerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
