use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Latitude used when nothing else is configured.
pub const DEFAULT_LATITUDE: &str = "43.640";
/// Longitude used when nothing else is configured.
pub const DEFAULT_LONGITUDE: &str = "-79.565";

/// Longest coordinate string that will be embedded in a request URL.
pub const MAX_COORDINATE_LEN: usize = 20;

/// Number of hourly entries shown at once.
pub const WINDOW_HOURS: usize = 6;

/// The forecast location and the timezone data learned from the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: String,
    pub longitude: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    pub utc_offset_seconds: i32,
}

impl Default for Location {
    fn default() -> Self {
        Self::new(DEFAULT_LATITUDE, DEFAULT_LONGITUDE)
    }
}

impl Location {
    pub fn new(latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
            timezone: None,
            utc_offset_seconds: 0,
        }
    }

    /// Coordinates safe to put into a request URL.
    ///
    /// A malformed pair (empty, too long, or not a plain decimal number) is
    /// replaced as a whole by the built-in default.
    pub fn request_coordinates(&self) -> (&str, &str) {
        if is_decimal_coordinate(&self.latitude) && is_decimal_coordinate(&self.longitude) {
            (self.latitude.as_str(), self.longitude.as_str())
        } else {
            tracing::warn!(
                latitude = %self.latitude,
                longitude = %self.longitude,
                "Malformed coordinates, using defaults"
            );
            (DEFAULT_LATITUDE, DEFAULT_LONGITUDE)
        }
    }

    /// Apply user-entered coordinates. Blank input keeps the previous value.
    /// Moving clears the timezone data, which belonged to the old place.
    ///
    /// Returns `true` if anything changed.
    pub fn set_coordinates(&mut self, latitude: &str, longitude: &str) -> bool {
        let mut changed = false;

        let latitude = latitude.trim();
        if !latitude.is_empty() && latitude != self.latitude {
            self.latitude = latitude.to_string();
            changed = true;
        }

        let longitude = longitude.trim();
        if !longitude.is_empty() && longitude != self.longitude {
            self.longitude = longitude.to_string();
            changed = true;
        }

        if changed {
            self.timezone = None;
            self.utc_offset_seconds = 0;
        }

        changed
    }

    /// Apply timezone information reported by the API.
    ///
    /// Returns `true` if anything changed.
    pub fn apply_timezone(&mut self, timezone: Option<String>, utc_offset_seconds: Option<i32>) -> bool {
        let mut changed = false;

        if let Some(tz) = timezone.filter(|tz| !tz.is_empty()) {
            if self.timezone.as_deref() != Some(tz.as_str()) {
                self.timezone = Some(tz);
                changed = true;
            }
        }

        if let Some(offset) = utc_offset_seconds {
            if offset != self.utc_offset_seconds {
                self.utc_offset_seconds = offset;
                changed = true;
            }
        }

        changed
    }
}

fn is_decimal_coordinate(value: &str) -> bool {
    if value.is_empty() || value.len() > MAX_COORDINATE_LEN {
        return false;
    }

    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    let mut seen_digit = false;
    let mut seen_dot = false;

    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }

    seen_digit
}

/// Condition category derived from a WMO weather code.
///
/// The ranges are coarse on purpose; they decide both the label and the icon
/// and must stay exactly as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherKind {
    Clear,
    Cloudy,
    Foggy,
    Drizzle,
    Rain,
    Snow,
    RainShower,
    SnowShower,
    Thunderstorm,
    Unknown,
}

impl WeatherKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Clear,
            1..=3 => Self::Cloudy,
            4..=49 => Self::Foggy,
            50..=59 => Self::Drizzle,
            60..=69 => Self::Rain,
            70..=79 => Self::Snow,
            80..=84 => Self::RainShower,
            85..=86 => Self::SnowShower,
            87..=99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Cloudy => "Cloudy",
            Self::Foggy => "Foggy",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::RainShower => "Rain Shower",
            Self::SnowShower => "Snow Shower",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Clear => "☀️",
            Self::Cloudy => "⛅",
            Self::Foggy => "🌫️",
            Self::Drizzle | Self::RainShower => "🌦️",
            Self::Rain => "🌧️",
            Self::Snow | Self::SnowShower => "❄️",
            Self::Thunderstorm => "⛈️",
            Self::Unknown => "❓",
        }
    }
}

/// Label for a weather code.
pub fn describe(code: i64) -> &'static str {
    WeatherKind::from_code(code).description()
}

/// Icon for a weather code.
pub fn icon(code: i64) -> &'static str {
    WeatherKind::from_code(code).icon()
}

/// One hourly forecast entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub timestamp: NaiveDateTime,
    pub temperature_celsius: f64,
    pub weather_code: i64,
}

impl ForecastPoint {
    pub fn kind(&self) -> WeatherKind {
        WeatherKind::from_code(self.weather_code)
    }

    pub fn description(&self) -> &'static str {
        self.kind().description()
    }

    pub fn icon(&self) -> &'static str {
        self.kind().icon()
    }

    /// `"14:00"`
    pub fn hour_label(&self) -> String {
        format!("{:02}:00", self.timestamp.hour())
    }

    /// `"21.5°C"`
    pub fn temperature_label(&self) -> String {
        format!("{:.1}°C", self.temperature_celsius)
    }
}

/// Up to [`WINDOW_HOURS`] consecutive forecast entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastWindow {
    points: Vec<ForecastPoint>,
}

impl ForecastWindow {
    pub fn new(mut points: Vec<ForecastPoint>) -> Self {
        points.truncate(WINDOW_HOURS);
        Self { points }
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ForecastPoint> {
        self.points.iter()
    }
}

impl<'a> IntoIterator for &'a ForecastWindow {
    type Item = &'a ForecastPoint;
    type IntoIter = std::slice::Iter<'a, ForecastPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn weather_code_boundaries() {
        assert_eq!(describe(0), "Clear");
        assert_eq!(describe(1), "Cloudy");
        assert_eq!(describe(3), "Cloudy");
        assert_eq!(describe(4), "Foggy");
        assert_eq!(describe(49), "Foggy");
        assert_eq!(describe(50), "Drizzle");
        assert_eq!(describe(59), "Drizzle");
        assert_eq!(describe(60), "Rain");
        assert_eq!(describe(69), "Rain");
        assert_eq!(describe(70), "Snow");
        assert_eq!(describe(79), "Snow");
        assert_eq!(describe(80), "Rain Shower");
        assert_eq!(describe(84), "Rain Shower");
        assert_eq!(describe(85), "Snow Shower");
        assert_eq!(describe(86), "Snow Shower");
        assert_eq!(describe(87), "Thunderstorm");
        assert_eq!(describe(99), "Thunderstorm");
        assert_eq!(describe(100), "Unknown");
        assert_eq!(describe(-1), "Unknown");
    }

    #[test]
    fn weather_code_table_covers_every_code() {
        let table: [(i64, i64, &str, &str); 9] = [
            (0, 0, "Clear", "☀️"),
            (1, 3, "Cloudy", "⛅"),
            (4, 49, "Foggy", "🌫️"),
            (50, 59, "Drizzle", "🌦️"),
            (60, 69, "Rain", "🌧️"),
            (70, 79, "Snow", "❄️"),
            (80, 84, "Rain Shower", "🌦️"),
            (85, 86, "Snow Shower", "❄️"),
            (87, 99, "Thunderstorm", "⛈️"),
        ];

        for (lo, hi, desc, ic) in table {
            for code in lo..=hi {
                assert_eq!(describe(code), desc, "description for {code}");
                assert_eq!(icon(code), ic, "icon for {code}");
            }
        }
        assert_eq!(icon(100), "❓");
    }

    #[test]
    fn request_coordinates_accepts_plain_decimals() {
        let loc = Location::new("-33.87", "+151.2");
        assert_eq!(loc.request_coordinates(), ("-33.87", "+151.2"));

        let loc = Location::new("52", "13.");
        assert_eq!(loc.request_coordinates(), ("52", "13."));
    }

    #[test]
    fn request_coordinates_falls_back_on_malformed_input() {
        let cases = [
            ("", "13.41"),
            ("52.52", "1.2.3"),
            ("52.52&hourly=x", "13.41"),
            ("1e5", "13.41"),
            ("-", "13.41"),
            ("52.520000000000000001", "13.41"),
        ];

        for (lat, lon) in cases {
            let loc = Location::new(lat, lon);
            assert_eq!(
                loc.request_coordinates(),
                (DEFAULT_LATITUDE, DEFAULT_LONGITUDE),
                "{lat:?}/{lon:?}"
            );
        }
    }

    #[test]
    fn blank_user_input_keeps_previous_value() {
        let mut loc = Location::new("1.0", "2.0");
        assert!(loc.set_coordinates("  ", "3.0"));
        assert_eq!(loc.latitude, "1.0");
        assert_eq!(loc.longitude, "3.0");
        assert!(!loc.set_coordinates("", ""));
    }

    #[test]
    fn moving_clears_timezone() {
        let mut loc = Location::new("52.52", "13.41");
        loc.timezone = Some("Europe/Berlin".into());
        loc.utc_offset_seconds = 7200;

        assert!(!loc.set_coordinates("52.52", ""));
        assert_eq!(loc.timezone.as_deref(), Some("Europe/Berlin"));

        assert!(loc.set_coordinates("35.68", "139.69"));
        assert_eq!(loc.timezone, None);
        assert_eq!(loc.utc_offset_seconds, 0);
    }

    #[test]
    fn apply_timezone_overrides_previous_values() {
        let mut loc = Location::default();
        loc.timezone = Some("Europe/Berlin".into());
        loc.utc_offset_seconds = 3600;

        assert!(loc.apply_timezone(Some("America/Toronto".into()), Some(-14400)));
        assert_eq!(loc.timezone.as_deref(), Some("America/Toronto"));
        assert_eq!(loc.utc_offset_seconds, -14400);

        assert!(!loc.apply_timezone(Some("America/Toronto".into()), Some(-14400)));
        assert!(!loc.apply_timezone(None, None));
    }

    #[test]
    fn point_labels() {
        let point = ForecastPoint {
            timestamp: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(7, 0, 0)
                .unwrap(),
            temperature_celsius: -2.04,
            weather_code: 71,
        };

        assert_eq!(point.hour_label(), "07:00");
        assert_eq!(point.temperature_label(), "-2.0°C");
        assert_eq!(point.description(), "Snow");
    }

    #[test]
    fn window_never_exceeds_six_points() {
        let base = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let points = (0..10)
            .map(|h| ForecastPoint {
                timestamp: base.and_hms_opt(h, 0, 0).unwrap(),
                temperature_celsius: 0.0,
                weather_code: 0,
            })
            .collect();

        assert_eq!(ForecastWindow::new(points).len(), WINDOW_HOURS);
    }
}
