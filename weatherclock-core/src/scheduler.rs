//! Timers for the refresh and retry cycles.
//!
//! Every timer is a spawned tokio task that only sends a message back into the
//! event loop. The task is owned by a [`ScheduledTask`], which aborts it on
//! drop, so replacing or clearing a slot is all it takes to cancel.

use std::future::Future;
use std::time::Duration;

use chrono::{NaiveDateTime, Timelike};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Refresh,
    Retry,
}

/// A spawned task that is aborted when this handle is dropped.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    /// Send `message` once after `delay`.
    pub fn once<T>(delay: Duration, tx: UnboundedSender<T>, message: T) -> Self
    where
        T: Send + 'static,
    {
        Self::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message);
        })
    }

    /// Send `message` after `first`, then every `period`, until dropped or the
    /// receiver goes away.
    pub fn every<T>(first: Duration, period: Duration, tx: UnboundedSender<T>, message: T) -> Self
    where
        T: Clone + Send + 'static,
    {
        Self::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + first, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if tx.send(message.clone()).is_err() {
                    break;
                }
            }
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Phase of the refresh timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Stopped,
    /// One-shot timer waiting for the next top of the hour.
    Aligning,
    /// Fixed one-hour interval.
    Hourly,
}

/// Owns the refresh timer and the retry timer; at most one of each is armed.
#[derive(Debug)]
pub struct RefreshScheduler<T> {
    tx: UnboundedSender<T>,
    refresh: Option<ScheduledTask>,
    phase: RefreshPhase,
    retry: Option<ScheduledTask>,
}

impl<T> RefreshScheduler<T>
where
    T: From<Timer> + Clone + Send + 'static,
{
    pub fn new(tx: UnboundedSender<T>) -> Self {
        Self {
            tx,
            refresh: None,
            phase: RefreshPhase::Stopped,
            retry: None,
        }
    }

    /// Arm the one-shot timer for the next top of the hour after `local_now`.
    pub fn start(&mut self, local_now: NaiveDateTime) {
        let delay = until_next_hour(local_now);
        tracing::info!(delay_secs = delay.as_secs(), "Next forecast refresh aligned to the hour");

        self.refresh = Some(ScheduledTask::once(delay, self.tx.clone(), Timer::Refresh.into()));
        self.phase = RefreshPhase::Aligning;
    }

    /// Called when the refresh timer fires. The first firing switches to the
    /// fixed hourly interval.
    pub fn on_refresh_fired(&mut self) {
        if self.phase == RefreshPhase::Aligning {
            self.refresh = Some(ScheduledTask::every(
                REFRESH_INTERVAL,
                REFRESH_INTERVAL,
                self.tx.clone(),
                Timer::Refresh.into(),
            ));
            self.phase = RefreshPhase::Hourly;
        }
    }

    /// Arm the retry timer, replacing any armed one.
    pub fn arm_retry(&mut self, delay: Duration) {
        if self.retry.take().is_some() {
            tracing::debug!("Replacing armed retry timer");
        }
        self.retry = Some(ScheduledTask::once(delay, self.tx.clone(), Timer::Retry.into()));
    }

    /// Disarm the retry timer. Returns `true` if one was armed.
    pub fn cancel_retry(&mut self) -> bool {
        self.retry.take().is_some()
    }

    /// Called when the retry timer fires.
    pub fn on_retry_fired(&mut self) {
        self.retry = None;
    }

    pub fn retry_armed(&self) -> bool {
        self.retry.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn phase(&self) -> RefreshPhase {
        self.phase
    }

    /// Disarm everything.
    pub fn stop(&mut self) {
        self.retry = None;
        self.refresh = None;
        self.phase = RefreshPhase::Stopped;
    }
}

/// Time left until the next wall-clock hour; a full hour when exactly on it.
pub fn until_next_hour(local_now: NaiveDateTime) -> Duration {
    let into_hour = Duration::from_secs(u64::from(local_now.minute() * 60 + local_now.second()))
        + Duration::from_nanos(u64::from(local_now.nanosecond().min(999_999_999)));

    REFRESH_INTERVAL.saturating_sub(into_hour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tokio::sync::mpsc::{self, error::TryRecvError};

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn next_hour_delay() {
        assert_eq!(until_next_hour(at(9, 0, 0)), Duration::from_secs(3600));
        assert_eq!(until_next_hour(at(9, 59, 59)), Duration::from_secs(1));
        assert_eq!(until_next_hour(at(9, 45, 0)), Duration::from_secs(900));
        assert_eq!(until_next_hour(at(23, 30, 30)), Duration::from_secs(1770));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_task_cancels_it() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = ScheduledTask::once(Duration::from_secs(5), tx, 1u8);
        drop(task);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_aligns_then_repeats_hourly() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Timer>();
        let mut scheduler = RefreshScheduler::new(tx);
        let started = Instant::now();

        scheduler.start(at(10, 45, 0));
        assert_eq!(scheduler.phase(), RefreshPhase::Aligning);

        assert_eq!(rx.recv().await, Some(Timer::Refresh));
        assert_eq!(started.elapsed(), Duration::from_secs(900));

        scheduler.on_refresh_fired();
        assert_eq!(scheduler.phase(), RefreshPhase::Hourly);

        assert_eq!(rx.recv().await, Some(Timer::Refresh));
        assert_eq!(started.elapsed(), Duration::from_secs(900 + 3600));

        scheduler.on_refresh_fired();
        assert_eq!(rx.recv().await, Some(Timer::Refresh));
        assert_eq!(started.elapsed(), Duration::from_secs(900 + 7200));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_retry_replaces_previous_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Timer>();
        let mut scheduler = RefreshScheduler::new(tx);
        let started = Instant::now();

        scheduler.arm_retry(Duration::from_secs(30));
        scheduler.arm_retry(Duration::from_secs(60));
        assert!(scheduler.retry_armed());

        assert_eq!(rx.recv().await, Some(Timer::Retry));
        assert_eq!(started.elapsed(), Duration::from_secs(60));

        scheduler.on_retry_fired();
        assert!(!scheduler.retry_armed());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_retry_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Timer>();
        let mut scheduler = RefreshScheduler::new(tx);

        scheduler.arm_retry(Duration::from_secs(30));
        assert!(scheduler.cancel_retry());
        assert!(!scheduler.cancel_retry());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_disarms_everything() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Timer>();
        let mut scheduler = RefreshScheduler::new(tx);

        scheduler.start(at(10, 59, 0));
        scheduler.arm_retry(Duration::from_secs(30));
        scheduler.stop();

        assert_eq!(scheduler.phase(), RefreshPhase::Stopped);
        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }
}
