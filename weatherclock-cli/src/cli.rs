use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use weatherclock_core::{LocationStore, OpenMeteoProvider, WeatherClock, WeatherClockHandle};

use crate::render::TerminalRenderer;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weatherclock",
    version,
    about = "Clock with a rolling six-hour forecast",
    allow_negative_numbers = true
)]
pub struct Cli {
    /// Latitude in decimal degrees; overrides the config file and is saved.
    #[arg(requires = "longitude")]
    pub latitude: Option<String>,

    /// Longitude in decimal degrees.
    pub longitude: Option<String>,

    /// Config file to use instead of ~/weatherclock.conf.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let path = self.config.unwrap_or_else(LocationStore::default_path);
        let mut store = LocationStore::open(path);

        if let (Some(latitude), Some(longitude)) = (&self.latitude, &self.longitude) {
            // Command-line coordinates are always written back, even if unchanged.
            if !store.set_coordinates(latitude, longitude) {
                if let Err(err) = store.save() {
                    tracing::warn!("{err:#}");
                }
            }
        }

        let provider = OpenMeteoProvider::new().context("Failed to build HTTP client")?;
        let app = WeatherClock::new(Arc::new(provider), store, TerminalRenderer::new());
        let handle = app.handle();

        tokio::spawn(watch_ctrl_c(handle.clone()));
        tokio::spawn(read_commands(handle));

        app.run().await;
        Ok(())
    }
}

async fn watch_ctrl_c(handle: WeatherClockHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Interrupted, shutting down");
        handle.shutdown();
    }
}

/// A command typed on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Location { latitude: String, longitude: String },
    Quit,
}

impl Command {
    /// `refresh` (or an empty line), `quit`, or `<latitude> <longitude>`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();

        match (words.next(), words.next(), words.next()) {
            (None, _, _) | (Some("refresh" | "r"), None, _) => Some(Self::Refresh),
            (Some("quit" | "q" | "exit"), None, _) => Some(Self::Quit),
            (Some(latitude), Some(longitude), None) => Some(Self::Location {
                latitude: latitude.to_string(),
                longitude: longitude.to_string(),
            }),
            _ => None,
        }
    }
}

async fn read_commands(handle: WeatherClockHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let sent = match Command::parse(&line) {
            Some(Command::Refresh) => handle.trigger_fetch(),
            Some(Command::Location {
                latitude,
                longitude,
            }) => handle.on_location_changed(latitude, longitude),
            Some(Command::Quit) => handle.shutdown(),
            None => {
                eprintln!("Commands: <latitude> <longitude> | refresh | quit");
                true
            }
        };

        if !sent {
            break;
        }
    }
}
