//! Decoding of Open-Meteo forecast payloads.
//!
//! The payload is first read into [`serde_json::Value`] and then decoded field
//! by field, so every structural problem maps onto a [`ParseError`] variant
//! that can be shown to the user as-is.

use chrono::{NaiveDateTime, Timelike};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{ForecastPoint, ForecastWindow, WINDOW_HOURS};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const PREVIEW_CHARS: usize = 500;

/// Why a payload could not be turned into a forecast window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty weather data received")]
    Empty,

    #[error("Parse error: {0}")]
    InvalidJson(String),

    #[error("Invalid weather data format: expected an object, got {0}")]
    NotAnObject(&'static str),

    #[error("API Error: {reason} (Keys: {keys})")]
    ApiReported { reason: String, keys: String },

    #[error("No hourly data. Keys: {keys}")]
    MissingHourly { keys: String },

    #[error("No hourly data available: 'hourly' is {0}, not an object")]
    HourlyNotObject(&'static str),

    #[error("Incomplete weather data: missing '{series}'. Keys: {keys}")]
    MissingSeries { series: &'static str, keys: String },
}

impl ParseError {
    /// `true` when the API itself said the request failed.
    pub fn is_api_reported(&self) -> bool {
        matches!(self, Self::ApiReported { .. })
    }
}

const SERIES: [&str; 3] = ["time", "temperature_2m", "weathercode"];

/// A validated payload whose hourly series have not been windowed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedForecast {
    pub timezone: Option<String>,
    pub utc_offset_seconds: Option<i32>,
    times: Vec<Value>,
    temperatures: Vec<Value>,
    codes: Vec<Value>,
}

impl DecodedForecast {
    /// Number of raw hourly entries.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Window starting at `now`, local wall time of the forecast location.
    pub fn window_at(&self, now: NaiveDateTime) -> ForecastWindow {
        select_window(&self.times, &self.temperatures, &self.codes, now)
    }
}

/// Timezone data plus the selected window.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedForecast {
    pub timezone: Option<String>,
    pub utc_offset_seconds: Option<i32>,
    pub window: ForecastWindow,
}

/// Decode `raw` and select the window starting at `now`.
pub fn parse(raw: &str, now: NaiveDateTime) -> Result<ParsedForecast, ParseError> {
    let decoded = decode(raw)?;
    let window = decoded.window_at(now);

    Ok(ParsedForecast {
        timezone: decoded.timezone,
        utc_offset_seconds: decoded.utc_offset_seconds,
        window,
    })
}

/// Validate `raw` and pull out the timezone data and hourly series.
pub fn decode(raw: &str) -> Result<DecodedForecast, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    tracing::debug!(len = raw.len(), preview = %preview(raw), "Decoding forecast payload");

    let root: Value =
        serde_json::from_str(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let mut root = match root {
        Value::Object(map) => map,
        other => return Err(ParseError::NotAnObject(kind_name(&other))),
    };

    if let Some(error) = root.get("error") {
        return Err(ParseError::ApiReported {
            reason: api_error_reason(error, &root),
            keys: key_list(&root),
        });
    }

    let mut hourly = match root.remove("hourly") {
        Some(Value::Object(hourly)) => hourly,
        Some(other) => return Err(ParseError::HourlyNotObject(kind_name(&other))),
        None => {
            let keys = key_list(&root);
            tracing::warn!(%keys, "No 'hourly' key in forecast payload");
            return Err(ParseError::MissingHourly { keys });
        }
    };

    if let Some(series) = SERIES
        .into_iter()
        .find(|name| !matches!(hourly.get(*name), Some(Value::Array(_))))
    {
        return Err(ParseError::MissingSeries {
            series,
            keys: key_list(&hourly),
        });
    }

    let mut take = |name: &str| match hourly.remove(name) {
        Some(Value::Array(values)) => values,
        _ => Vec::new(),
    };
    let times = take("time");
    let temperatures = take("temperature_2m");
    let codes = take("weathercode");

    let timezone = root
        .get("timezone")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let utc_offset_seconds = root.get("utc_offset_seconds").and_then(as_offset);

    Ok(DecodedForecast {
        timezone,
        utc_offset_seconds,
        times,
        temperatures,
        codes,
    })
}

/// Pick the first entry whose (date, hour) is not before `now`, plus the five
/// after it.
///
/// Only an entry with an unreadable time is dropped, and the next one moves up
/// into its slot. A missing or non-numeric temperature reads as 0.0 and a
/// missing or non-numeric code as 0.
pub fn select_window(
    times: &[Value],
    temperatures: &[Value],
    codes: &[Value],
    now: NaiveDateTime,
) -> ForecastWindow {
    let current = (now.date(), now.hour());

    let start = times.iter().position(|t| {
        decode_time(t).is_some_and(|ts| (ts.date(), ts.hour()) >= current)
    });

    let Some(start) = start else {
        tracing::debug!(entries = times.len(), "No upcoming hours in forecast");
        return ForecastWindow::default();
    };

    let points = (start..times.len())
        .filter_map(|idx| {
            let point = decode_point(&times[idx], temperatures.get(idx), codes.get(idx));
            if point.is_none() {
                tracing::debug!(idx, "Skipping forecast entry with unreadable time");
            }
            point
        })
        .take(WINDOW_HOURS)
        .collect();

    ForecastWindow::new(points)
}

fn decode_point(time: &Value, temperature: Option<&Value>, code: Option<&Value>) -> Option<ForecastPoint> {
    Some(ForecastPoint {
        timestamp: decode_time(time)?,
        temperature_celsius: temperature.and_then(Value::as_f64).unwrap_or(0.0),
        weather_code: code.and_then(decode_code).unwrap_or(0),
    })
}

fn decode_time(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_str()?;
    // Open-Meteo omits seconds; accept them anyway.
    NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

fn decode_code(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
}

fn as_offset(value: &Value) -> Option<i32> {
    let seconds = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))?;
    i32::try_from(seconds).ok()
}

fn api_error_reason(error: &Value, root: &Map<String, Value>) -> String {
    match error {
        Value::Bool(true) => match root.get("reason") {
            Some(Value::String(reason)) => reason.clone(),
            Some(other) => other.to_string(),
            None => "API returned error=true but no reason field".to_string(),
        },
        Value::Bool(false) => "API returned error=false".to_string(),
        Value::String(reason) => reason.clone(),
        other => format!("Error type: {}", kind_name(other)),
    }
}

fn key_list(object: &Map<String, Value>) -> String {
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys.join(", ")
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
