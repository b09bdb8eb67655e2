#![forbid(unsafe_code)]

mod commands;
mod config;
mod constants;
mod error;
mod font;
mod frame;
mod image_source;
mod lifecycle;
mod overlay_window;
mod scheduler;
mod tray;
mod types;
mod x11_utils;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use commands::Command;
use config::ConfigStore;
use constants::event_loop;
use font::FontRenderer;
use image_source::FsImageSelector;
use overlay_window::X11Backend;
use scheduler::{DisplayBackend, ReminderContext, Scheduler};

/// Periodic full-screen eye-rest reminder
#[derive(Parser, Debug)]
#[command(name = "tttreminder", version, about)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show the reminder once right after startup
    #[arg(long)]
    show_now: bool,

    /// Log level (trace, debug, info, warn, error); overrides LOG_LEVEL
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn parse_log_level(value: &str) -> TraceLevel {
    match value.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

/// How long the loop may sleep before the scheduler needs another look
fn wait_timeout(next_wakeup: Option<Instant>, animating: bool, now: Instant) -> Duration {
    let cap = if animating {
        event_loop::ANIMATION_FRAME
    } else {
        event_loop::IDLE_WAIT
    };
    next_wakeup
        .map(|at| at.saturating_duration_since(now))
        .unwrap_or(cap)
        .min(cap)
}

/// Apply one command; returns false on `Quit`
fn handle_command<B: DisplayBackend>(scheduler: &mut Scheduler<B>, command: Command) -> bool {
    let now = Instant::now();
    match command {
        Command::ShowNow => {
            let shown = scheduler.fire_now(now);
            info!(overlays = shown, "Manual reminder shown");
        }
        Command::Reload => scheduler.reload_configuration(now),
        Command::Quit => return false,
    }
    true
}

fn run_event_loop<B: DisplayBackend>(
    conn: &RustConnection,
    scheduler: &mut Scheduler<B>,
    commands: &Receiver<Command>,
) -> Result<()> {
    loop {
        while let Some(event) = conn.poll_for_event()
            .context("Failed to poll X11 events")?
        {
            match event {
                Event::Expose(expose) if expose.count == 0 => {
                    debug!(window = expose.window, "Overlay exposed");
                    scheduler.invalidate_surfaces();
                }
                Event::Error(e) => error!("X11 error: {:?}", e),
                _ => {}
            }
        }

        scheduler.tick(Instant::now());
        conn.flush()
            .context("Failed to flush X11 connection")?;

        let timeout = wait_timeout(scheduler.next_wakeup(), scheduler.is_animating(), Instant::now());
        match commands.recv_timeout(timeout) {
            Ok(command) => {
                info!(?command, "Received command");
                if !handle_command(scheduler, command) {
                    return Ok(());
                }
                while let Ok(command) = commands.try_recv() {
                    info!(?command, "Received command");
                    if !handle_command(scheduler, command) {
                        return Ok(());
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => anyhow::bail!("Command channel closed unexpectedly"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // --log-level wins over LOG_LEVEL
    let log_level = parse_log_level(
        &cli.log_level
            .clone()
            .or_else(|| std::env::var("LOG_LEVEL").ok())
            .unwrap_or_else(|| "info".to_string()),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.clone().unwrap_or_else(ConfigStore::default_path);
    let store = ConfigStore::new(std::path::absolute(&config_path).unwrap_or(config_path));
    info!(path = %store.path().display(), exists = store.path().exists(), "Using settings file");

    let (conn, screen_num) = x11rb::connect(None)
        .context("Failed to connect to the X server")?;
    let screen = &conn.setup().roots[screen_num];
    info!("successfully connected to x11: screen={screen_num}, dimensions={}x{}",
          screen.width_in_pixels, screen.height_in_pixels);

    let font = match FontRenderer::from_system_font() {
        Ok(font) => Some(font),
        Err(e) => {
            error!(error = ?e, "No usable font, the clock will not be drawn");
            None
        }
    };

    let backend = X11Backend::new(&conn, screen, font.as_ref())?;
    let mut scheduler = Scheduler::new(ReminderContext {
        config: Box::new(store),
        images: Box::new(FsImageSelector),
        backend,
    });

    // Main keeps a sender so the channel never disconnects
    let (command_tx, command_rx) = mpsc::channel();

    let _tray_handle = tray::spawn_tray(command_tx.clone())
        .inspect_err(|e| warn!(error = ?e, "Failed to start tray thread"))
        .ok();

    #[cfg(unix)]
    let _signal_handle = commands::spawn_signal_listener(command_tx.clone())
        .inspect_err(|e| warn!(error = ?e, "Failed to install signal handlers"))
        .ok();

    let started = Instant::now();
    scheduler.start(started);
    if let Some(at) = scheduler.next_fire_at() {
        info!(
            in_secs = at.saturating_duration_since(started).as_secs(),
            image_source = %scheduler.snapshot().image_source,
            "First reminder scheduled"
        );
    }
    if cli.show_now {
        command_tx.send(Command::ShowNow)?;
    }

    run_event_loop(&conn, &mut scheduler, &command_rx)?;

    info!(open_overlays = scheduler.active_overlay_count(), "Shutting down");
    for overlay in scheduler.overlays() {
        debug!(display = %overlay.display().name, state = ?overlay.state(), "Closing overlay");
    }
    // Overlay windows are destroyed here, while the connection is still open
    drop(scheduler);
    conn.flush()?;
    Ok(())
}
