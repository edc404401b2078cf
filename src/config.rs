//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! statusboard.toml file. It provides a centralized way to configure panel
//! rotation, display geometry, and the weather/transit data sources.
//!
//! Every timing constant of the refresh loop lives here rather than in
//! code: dwell time, forced-full-redraw cadence, and each source's fetch
//! interval are operational tuning knobs, not architecture.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Application configuration loaded from statusboard.toml
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Panel rotation and refresh cadence
    pub panels: PanelsConfig,
    /// Display geometry and hardware pins
    pub display: DisplayConfig,
    /// Weather source configuration
    pub weather: WeatherConfig,
    /// Transit source configuration
    pub transit: TransitConfig,
}

/// Panel rotation and redraw cadence
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PanelsConfig {
    /// Rotation order; the first entry is active at startup.
    /// Valid names: "weather", "transit".
    pub order: Vec<String>,
    /// How long each panel stays on screen before rotating
    pub dwell_seconds: u64,
    /// Forced full-redraw cadence, clearing ghosting left by partial pushes
    pub full_redraw_seconds: u64,
    /// Number of heartbeat phases before the indicator wraps around
    pub heartbeat_slots: u32,
}

/// Display geometry and (optional) hardware wiring
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// GPIO/SPI wiring, used only with --features hardware
    pub hardware: HardwareConfig,
}

/// GPIO pin and SPI bus assignment for the Waveshare HAT
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// SPI bus number (0 = /dev/spidev0.x)
    pub spi_bus: u8,
    /// SPI slave select (0 = CE0)
    pub spi_slave: u8,
    /// Data/command select pin (BCM numbering)
    pub dc_pin: u8,
    /// Reset pin (BCM numbering)
    pub rst_pin: u8,
    /// Busy input pin (BCM numbering)
    pub busy_pin: u8,
}

/// Weather source (Open-Meteo DWD-ICON)
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Forecast coordinates
    pub latitude: f64,
    /// Forecast coordinates
    pub longitude: f64,
    /// IANA timezone passed to the API (e.g. "Europe/Berlin")
    pub timezone: String,
    /// Fetch interval; weather decays slowly
    pub refresh_seconds: u64,
    /// HTTP timeout per request
    pub timeout_seconds: u64,
}

/// Transit departure monitor (headless-browser scrape)
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TransitConfig {
    /// Embeddable departure-monitor HTML snippet. Leave empty to run the
    /// board without a transit panel configured; the panel then shows a
    /// placeholder instead of departures.
    pub monitor_html: String,
    /// CSS selector matching one departure row each
    pub row_selector: String,
    /// Headless browser binary used to render the snippet
    pub browser: String,
    /// Fetch interval; departures decay fast
    pub refresh_seconds: u64,
    /// Kill the browser after this long
    pub timeout_seconds: u64,
    /// At most this many departure rows on the panel
    pub max_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            panels: PanelsConfig::default(),
            display: DisplayConfig::default(),
            weather: WeatherConfig::default(),
            transit: TransitConfig::default(),
        }
    }
}

impl Default for PanelsConfig {
    fn default() -> Self {
        PanelsConfig {
            order: vec!["weather".to_string(), "transit".to_string()],
            dwell_seconds: 60,
            full_redraw_seconds: 3600,
            heartbeat_slots: 60,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 800,  // Waveshare 7.5" V2
            height: 480, // Waveshare 7.5" V2
            hardware: HardwareConfig::default(),
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        // Stock Waveshare e-paper HAT wiring
        HardwareConfig {
            spi_bus: 0,
            spi_slave: 0,
            dc_pin: 25,
            rst_pin: 17,
            busy_pin: 24,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            latitude: 48.0,
            longitude: 11.0,
            timezone: "Europe/Berlin".to_string(),
            refresh_seconds: 900,
            timeout_seconds: 10,
        }
    }
}

impl Default for TransitConfig {
    fn default() -> Self {
        TransitConfig {
            monitor_html: String::new(),
            row_selector: ".departure-monitor tr".to_string(),
            browser: "chromium".to_string(),
            refresh_seconds: 120,
            timeout_seconds: 60,
            max_rows: 10,
        }
    }
}

impl PanelsConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.dwell_seconds)
    }

    pub fn full_redraw_interval(&self) -> Duration {
        Duration::from_secs(self.full_redraw_seconds)
    }
}

impl Config {
    /// Load configuration from statusboard.toml in the working directory.
    /// Falls back to default configuration if the file is missing or invalid.
    pub fn load() -> Self {
        Self::load_from_path("statusboard.toml")
    }

    /// Load configuration from the specified path.
    /// Falls back to default configuration if the file is missing or invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    log::info!(
                        "loaded configuration ({} panel(s): {})",
                        config.panels.order.len(),
                        config.panels.order.join(", ")
                    );
                    config
                }
                Err(e) => {
                    log::warn!("invalid config file format: {e}");
                    log::warn!("using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("no config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Save current configuration to statusboard.toml
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write("statusboard.toml", contents)?;
        Ok(())
    }
}
