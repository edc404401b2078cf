//! # Statusboard Application Entry Point
//!
//! This binary wires the library together into the long-running board
//! process: configuration, display surface selection, the 1 Hz tick loop,
//! and the shutdown path that puts the panel to sleep before exiting.
//! It supports both production mode (e-paper hardware) and development
//! mode (`--stdout`, frames rendered as ASCII in the terminal).

// Test modules
#[cfg(test)]
mod tests;

#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hw_rppal;

use statusboard_lib::{
    config::Config,
    display::{AsciiSurface, DisplaySurface},
    renderer::PanelRenderer,
    scheduler::{RefreshScheduler, SchedulerSettings},
    source::DataSource,
    ticker::Ticker,
    transit::TransitFetcher,
    weather::WeatherFetcher,
};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Build the round-robin source list from the configured panel order.
fn build_sources(config: &Config) -> anyhow::Result<Vec<DataSource>> {
    let mut sources = Vec::new();
    for name in &config.panels.order {
        match name.as_str() {
            "weather" => sources.push(DataSource::new(
                Box::new(WeatherFetcher::new(&config.weather)?),
                Duration::from_secs(config.weather.refresh_seconds),
            )),
            "transit" => sources.push(DataSource::new(
                Box::new(TransitFetcher::new(&config.transit)?),
                Duration::from_secs(config.transit.refresh_seconds),
            )),
            other => anyhow::bail!("unknown panel {other:?} in configuration"),
        }
    }
    anyhow::ensure!(!sources.is_empty(), "panel order must not be empty");
    Ok(sources)
}

/// Open the e-paper surface.
#[cfg(all(target_os = "linux", feature = "hardware"))]
fn open_surface(config: &Config) -> anyhow::Result<Box<dyn DisplaySurface>> {
    let hw = &config.display.hardware;
    log::info!(
        "opening e-paper on SPI{}.{} (DC {}, RST {}, BUSY {})",
        hw.spi_bus,
        hw.spi_slave,
        hw.dc_pin,
        hw.rst_pin,
        hw.busy_pin
    );
    Ok(Box::new(hw_rppal::open(hw)?))
}

/// Without the hardware feature the board still runs, on the terminal.
#[cfg(not(all(target_os = "linux", feature = "hardware")))]
fn open_surface(config: &Config) -> anyhow::Result<Box<dyn DisplaySurface>> {
    log::warn!(
        "e-paper support not compiled in (rebuild with --features hardware); using terminal output"
    );
    Ok(Box::new(AsciiSurface::new(
        config.display.width,
        config.display.height,
    )))
}

/// Resolve on SIGINT or, on unix, SIGTERM (systemd stop).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Run the signal listener on a side runtime and expose it as a flag the
/// synchronous tick loop can poll between ticks.
fn spawn_signal_listener() -> anyhow::Result<(tokio::runtime::Runtime, Arc<AtomicBool>)> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let rt = tokio::runtime::Runtime::new()?;
    let flag = Arc::clone(&shutdown);
    rt.spawn(async move {
        shutdown_signal().await;
        log::info!("termination signal received");
        flag.store(true, Ordering::SeqCst);
    });
    Ok((rt, shutdown))
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Development mode: render to stdout for testing without hardware
    let development_mode = env::args().any(|arg| arg == "--stdout");

    let config = Config::load();
    let sources = build_sources(&config)?;
    let renderer = PanelRenderer::new(
        config.display.width,
        config.display.height,
        config.panels.heartbeat_slots,
    )?;

    let mut surface: Box<dyn DisplaySurface> = if development_mode {
        Box::new(AsciiSurface::new(config.display.width, config.display.height))
    } else {
        open_surface(&config)?
    };

    if let Err(err) = surface.wake() {
        anyhow::bail!("failed to initialise display: {err}");
    }

    let (_signal_rt, shutdown) = spawn_signal_listener()?;

    let settings = SchedulerSettings {
        dwell: config.panels.dwell(),
        full_redraw_interval: config.panels.full_redraw_interval(),
    };
    let mut scheduler = RefreshScheduler::new(settings, sources, renderer, Instant::now());
    let mut ticker = Ticker::new(Duration::from_secs(1), Instant::now());

    log::info!(
        "statusboard running; starting panel: {}",
        scheduler.active_panel()
    );

    while !shutdown.load(Ordering::SeqCst) {
        ticker.wait();
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        scheduler.tick(Instant::now(), surface.as_mut());
    }

    // Leave the panel parked rather than half-drawn and drawing power
    if let Err(err) = scheduler.quiesce(surface.as_mut()) {
        log::warn!("failed to sleep display on exit: {err}");
    }
    log::info!("statusboard stopped");
    Ok(())
}
