//! The event loop that ties the pipeline together.
//!
//! [`WeatherClock`] owns every piece of mutable state: the location store, the
//! retry state, the pending request and the timers. Spawned tasks (timers and
//! HTTP fetches) never touch that state; they send an [`Event`] back and the
//! loop handles it between iterations, so rendering always happens on the
//! loop task.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::clock::{ClockReading, TimeSource};
use crate::config::LocationStore;
use crate::model::Location;
use crate::parser;
use crate::provider::{FetchOutcome, ForecastSource};
use crate::render::Renderer;
use crate::retry::{RetryDecision, RetryPolicy, RetryState};
use crate::scheduler::{RefreshScheduler, ScheduledTask, Timer};

pub const CLOCK_TICK: Duration = Duration::from_secs(1);

pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch weather";

/// Messages processed by the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Tick,
    Timer(Timer),
    FetchRequested,
    LocationChanged { latitude: String, longitude: String },
    FetchCompleted { generation: u64, outcome: FetchOutcome },
    Shutdown,
}

impl From<Timer> for Event {
    fn from(timer: Timer) -> Self {
        Self::Timer(timer)
    }
}

/// Why a fetch was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    Startup,
    Manual,
    LocationChanged,
    Refresh,
    Retry,
}

impl FetchTrigger {
    /// Everything but a retry starts a clean retry cycle.
    fn is_explicit(self) -> bool {
        self != Self::Retry
    }
}

/// Cloneable entry point for the UI.
#[derive(Debug, Clone)]
pub struct WeatherClockHandle {
    tx: UnboundedSender<Event>,
}

impl WeatherClockHandle {
    /// Fetch now, starting a fresh retry cycle.
    pub fn trigger_fetch(&self) -> bool {
        self.send(Event::FetchRequested)
    }

    /// Store new coordinates and fetch for them. Blank values keep the
    /// current ones.
    pub fn on_location_changed(&self, latitude: impl Into<String>, longitude: impl Into<String>) -> bool {
        self.send(Event::LocationChanged {
            latitude: latitude.into(),
            longitude: longitude.into(),
        })
    }

    pub fn shutdown(&self) -> bool {
        self.send(Event::Shutdown)
    }

    /// `false` once the loop has gone away.
    fn send(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }
}

pub struct WeatherClock<R> {
    source: Arc<dyn ForecastSource>,
    store: LocationStore,
    renderer: R,
    policy: RetryPolicy,
    retry: RetryState,
    scheduler: RefreshScheduler<Event>,
    pending: Option<ScheduledTask>,
    generation: u64,
    ticker: Option<ScheduledTask>,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
}

impl<R: Renderer> WeatherClock<R> {
    pub fn new(source: Arc<dyn ForecastSource>, store: LocationStore, renderer: R) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            source,
            store,
            renderer,
            policy: RetryPolicy::default(),
            retry: RetryState::default(),
            scheduler: RefreshScheduler::new(tx.clone()),
            pending: None,
            generation: 0,
            ticker: None,
            tx,
            rx,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn handle(&self) -> WeatherClockHandle {
        WeatherClockHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn location(&self) -> &Location {
        self.store.location()
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    pub fn retry_armed(&self) -> bool {
        self.scheduler.retry_armed()
    }

    pub fn fetch_in_flight(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Start the timers and the first fetch, then process events until
    /// [`Event::Shutdown`]. Everything is disarmed before returning.
    pub async fn run(mut self) {
        self.start();

        while let Some(event) = self.next_event().await {
            if self.handle_event(event).is_break() {
                break;
            }
        }

        self.stop();
    }

    /// Render the clock, arm the clock ticker and the aligned refresh timer,
    /// and issue the first fetch.
    pub fn start(&mut self) {
        tracing::info!(
            latitude = %self.location().latitude,
            longitude = %self.location().longitude,
            "Starting weather clock"
        );

        self.tick();
        self.ticker = Some(ScheduledTask::every(
            CLOCK_TICK,
            CLOCK_TICK,
            self.tx.clone(),
            Event::Tick,
        ));
        self.scheduler.start(self.time_source().now());
        self.fetch(FetchTrigger::Startup);
    }

    /// Cancel the pending request and disarm every timer.
    pub fn stop(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("Cancelling pending forecast request");
        }
        self.ticker = None;
        self.scheduler.stop();
        tracing::info!("Weather clock stopped");
    }

    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn handle_event(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::Tick => self.tick(),
            Event::Timer(Timer::Refresh) => {
                self.scheduler.on_refresh_fired();
                self.fetch(FetchTrigger::Refresh);
            }
            Event::Timer(Timer::Retry) => {
                self.scheduler.on_retry_fired();
                self.fetch(FetchTrigger::Retry);
            }
            Event::FetchRequested => self.fetch(FetchTrigger::Manual),
            Event::LocationChanged {
                latitude,
                longitude,
            } => {
                self.store.set_coordinates(&latitude, &longitude);
                self.fetch(FetchTrigger::LocationChanged);
            }
            Event::FetchCompleted {
                generation,
                outcome,
            } => self.on_fetch_completed(generation, outcome),
            Event::Shutdown => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }

    fn time_source(&self) -> TimeSource {
        TimeSource::for_location(self.store.location())
    }

    fn tick(&mut self) {
        let reading = ClockReading::at(self.time_source().now());
        self.renderer.render_clock(&reading.time, &reading.date);
    }

    fn fetch(&mut self, trigger: FetchTrigger) {
        if trigger.is_explicit() {
            if self.scheduler.cancel_retry() {
                tracing::debug!(?trigger, "Cancelled armed retry timer");
            }
            self.retry.reset();
        }

        self.generation += 1;
        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let location = self.store.location().clone();
        let tx = self.tx.clone();

        tracing::info!(
            ?trigger,
            generation,
            attempt = self.retry.attempt_count,
            "Fetching forecast"
        );

        // Replacing the handle aborts the previous request.
        let previous = self.pending.replace(ScheduledTask::spawn(async move {
            let outcome = source.fetch(&location).await;
            let _ = tx.send(Event::FetchCompleted {
                generation,
                outcome,
            });
        }));
        if previous.is_some_and(|task| !task.is_finished()) {
            tracing::debug!("Superseded pending forecast request");
        }
    }

    fn on_fetch_completed(&mut self, generation: u64, outcome: FetchOutcome) {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "Ignoring stale fetch result");
            return;
        }
        self.pending = None;

        match outcome {
            FetchOutcome::Success(body) => self.on_payload(&body),
            failure => self.on_fetch_failed(&failure),
        }
    }

    fn on_payload(&mut self, body: &str) {
        // The server answered; whatever it said, backoff will not help.
        self.scheduler.cancel_retry();
        self.retry.reset();

        match parser::decode(body) {
            Ok(decoded) => {
                let timezone = decoded.timezone.clone();
                self.store.apply_timezone(timezone, decoded.utc_offset_seconds);

                let window = decoded.window_at(self.time_source().now());
                tracing::info!(hours = window.len(), "Forecast updated");
                self.renderer.render_forecast(&window);
            }
            Err(err) => {
                tracing::warn!("Forecast payload rejected: {err}");
                self.renderer.render_error(&err.to_string(), None);
            }
        }
    }

    fn on_fetch_failed(&mut self, outcome: &FetchOutcome) {
        let reason = outcome.failure_reason().unwrap_or_default();

        match self.retry.on_failure(&self.policy) {
            RetryDecision::Retry(info) => {
                tracing::warn!(
                    %reason,
                    attempt = info.attempt,
                    max_attempts = info.max_attempts,
                    delay_secs = info.delay.as_secs(),
                    "Forecast fetch failed, retry scheduled"
                );
                self.scheduler.arm_retry(info.delay);
                self.renderer.render_error(FETCH_FAILED_MESSAGE, Some(&info));
            }
            RetryDecision::Exhausted { attempts } => {
                tracing::warn!(%reason, attempts, "Forecast retries exhausted");
                let message = format!(
                    "{FETCH_FAILED_MESSAGE} after {attempts} retries; will retry at next scheduled update"
                );
                self.renderer.render_error(&message, None);
            }
        }
    }
}
