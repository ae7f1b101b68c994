use std::io::{self, Write};

use weatherclock_core::{ForecastPoint, ForecastWindow, Renderer, RetryInfo};

/// Writes the clock and forecast to stdout.
///
/// The clock line is redrawn in place; forecasts and errors are printed as
/// whole blocks below it.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    clock_on_line: bool,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn end_clock_line(&mut self) {
        if self.clock_on_line {
            println!();
            self.clock_on_line = false;
        }
    }
}

impl Renderer for TerminalRenderer {
    fn render_clock(&mut self, time: &str, date: &str) {
        print!("\r{time}  {date}");
        let _ = io::stdout().flush();
        self.clock_on_line = true;
    }

    fn render_forecast(&mut self, window: &ForecastWindow) {
        self.end_clock_line();

        if window.is_empty() {
            println!("No upcoming hours in forecast");
            return;
        }

        println!("Hourly Weather Forecast");
        for point in window {
            println!("{}", forecast_row(point));
        }
    }

    fn render_error(&mut self, message: &str, retry: Option<&RetryInfo>) {
        self.end_clock_line();

        match retry {
            Some(info) => println!("{message} ({info})"),
            None => println!("{message}"),
        }
    }
}

fn forecast_row(point: &ForecastPoint) -> String {
    format!(
        "  {}  {}  {:>7}  {}",
        point.hour_label(),
        point.icon(),
        point.temperature_label(),
        point.description()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn row_layout() {
        let point = ForecastPoint {
            timestamp: NaiveDate::from_ymd_opt(2026, 10, 18)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            temperature_celsius: 7.3,
            weather_code: 95,
        };

        assert_eq!(forecast_row(&point), "  09:00  ⛈️    7.3°C  Thunderstorm");
    }
}
