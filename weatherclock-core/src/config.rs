use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::model::Location;

pub const CONFIG_FILE_NAME: &str = "weatherclock.conf";

/// On-disk layout.
///
/// Example:
/// [Location]
/// latitude = "43.640"
/// longitude = "-79.565"
/// timezone = "America/Toronto"
/// utc_offset_seconds = -14400
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(rename = "Location", default)]
    location: LocationSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latitude: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    longitude: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timezone: Option<String>,
    #[serde(default)]
    utc_offset_seconds: i32,
}

/// A coordinate as written in the file: quoted, or a bare TOML number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Coordinate {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
        }
    }
}

impl From<&Location> for ConfigFile {
    fn from(location: &Location) -> Self {
        Self {
            location: LocationSection {
                latitude: Some(Coordinate::Text(location.latitude.clone())),
                longitude: Some(Coordinate::Text(location.longitude.clone())),
                timezone: location.timezone.clone(),
                utc_offset_seconds: location.utc_offset_seconds,
            },
        }
    }
}

impl LocationSection {
    /// Overlay the stored values on `base`. Blank entries are ignored.
    fn merge_into(self, mut base: Location) -> Location {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let Some(lat) = non_empty(self.latitude.map(Coordinate::into_text)) {
            base.latitude = lat;
        }
        if let Some(lon) = non_empty(self.longitude.map(Coordinate::into_text)) {
            base.longitude = lon;
        }
        if let Some(tz) = non_empty(self.timezone) {
            base.timezone = Some(tz);
        }
        base.utc_offset_seconds = self.utc_offset_seconds;
        base
    }
}

/// The persisted forecast location.
///
/// Every mutation that changes something is written straight back to disk.
/// Write failures are logged and otherwise ignored: the in-memory value stays
/// authoritative for the running process.
#[derive(Debug, Clone)]
pub struct LocationStore {
    path: PathBuf,
    location: Location,
}

impl LocationStore {
    /// Open the store at `path`, falling back to the default location if the
    /// file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let location = match Self::load(&path) {
            Ok(Some(location)) => {
                tracing::info!(
                    path = %path.display(),
                    latitude = %location.latitude,
                    longitude = %location.longitude,
                    "Loaded location from config"
                );
                location
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "No config file, using default location");
                Location::default()
            }
            Err(err) => {
                tracing::warn!("{err:#}; using default location");
                Location::default()
            }
        };

        Self { path, location }
    }

    /// Open the store at [`LocationStore::default_path`].
    pub fn open_default() -> Self {
        Self::open(Self::default_path())
    }

    /// `~/weatherclock.conf`, or the bare file name if there is no home
    /// directory.
    pub fn default_path() -> PathBuf {
        match BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(CONFIG_FILE_NAME),
            None => PathBuf::from(CONFIG_FILE_NAME),
        }
    }

    /// Read a location from `path`. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Location>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let file: ConfigFile = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(Some(file.location.merge_into(Location::default())))
    }

    /// Write `location` to `path`, creating parent directories as needed.
    pub fn save_to(path: &Path, location: &Location) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(&ConfigFile::from(location))
            .context("Failed to serialize location to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        Self::save_to(&self.path, &self.location)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Apply user-entered coordinates and persist them.
    pub fn set_coordinates(&mut self, latitude: &str, longitude: &str) -> bool {
        let changed = self.location.set_coordinates(latitude, longitude);
        if changed {
            tracing::info!(
                latitude = %self.location.latitude,
                longitude = %self.location.longitude,
                "Location updated"
            );
            self.persist();
        }
        changed
    }

    /// Apply API-reported timezone data and persist it.
    pub fn apply_timezone(&mut self, timezone: Option<String>, utc_offset_seconds: Option<i32>) -> bool {
        let changed = self.location.apply_timezone(timezone, utc_offset_seconds);
        if changed {
            tracing::info!(
                timezone = ?self.location.timezone,
                utc_offset_seconds = self.location.utc_offset_seconds,
                "Timezone updated from forecast"
            );
            self.persist();
        }
        changed
    }

    fn persist(&self) {
        if let Err(err) = self.save() {
            tracing::warn!("{err:#}");
        }
    }
}
