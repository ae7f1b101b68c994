//! Core library for the weather clock.
//!
//! This crate defines:
//! - The persisted forecast location
//! - Fetching and decoding of Open-Meteo hourly forecasts
//! - Exponential-backoff retries and the hour-aligned refresh timer
//! - The event loop that drives a [`Renderer`]
//!
//! It is used by `weatherclock-cli`, but any front end that implements
//! [`Renderer`] can drive it.

pub mod app;
pub mod clock;
pub mod config;
pub mod model;
pub mod parser;
pub mod provider;
pub mod render;
pub mod retry;
pub mod scheduler;

pub use app::{Event, WeatherClock, WeatherClockHandle};
pub use clock::{ClockReading, TimeSource};
pub use config::LocationStore;
pub use model::{ForecastPoint, ForecastWindow, Location};
pub use parser::ParseError;
pub use provider::{FetchOutcome, ForecastSource, OpenMeteoProvider};
pub use render::Renderer;
pub use retry::{RetryInfo, RetryPolicy, RetryState};
