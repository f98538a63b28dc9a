use std::{future::Future, time::Duration};

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// The single tick source of a simulation run.
///
/// Distance and elapsed time advance together on every tick, so they can
/// never drift apart.
pub trait Clock: Send {
    /// Wait for the next tick and return the step length in seconds.
    fn tick(&mut self) -> impl Future<Output = f64> + Send;

    /// Restart the cadence; the next tick is one full period away.
    fn restart(&mut self) {}
}

/// Wall-clock ticks from a tokio interval.
pub struct IntervalClock {
    interval: Interval,
    period: Duration,
}

impl IntervalClock {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }
}

impl Clock for IntervalClock {
    async fn tick(&mut self) -> f64 {
        self.interval.tick().await;
        self.period.as_secs_f64()
    }

    fn restart(&mut self) {
        self.interval.reset();
    }
}

/// Ticks only when told to through its [`TickSender`]. Used to step a
/// simulation deterministically.
pub struct ManualClock {
    ticks: mpsc::UnboundedReceiver<()>,
    period: Duration,
}

#[derive(Clone)]
pub struct TickSender {
    ticks: mpsc::UnboundedSender<()>,
}

impl ManualClock {
    pub fn new(period: Duration) -> (Self, TickSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { ticks: rx, period }, TickSender { ticks: tx })
    }
}

impl Clock for ManualClock {
    async fn tick(&mut self) -> f64 {
        if self.ticks.recv().await.is_none() {
            // every sender is gone: no tick will ever come
            std::future::pending::<()>().await;
        }
        self.period.as_secs_f64()
    }

    /// Drop ticks queued before the restart.
    fn restart(&mut self) {
        while self.ticks.try_recv().is_ok() {}
    }
}

impl TickSender {
    /// Queue `count` ticks. Returns false once the clock is dropped.
    pub fn advance(&self, count: usize) -> bool {
        (0..count).all(|_| self.ticks.send(()).is_ok())
    }
}
