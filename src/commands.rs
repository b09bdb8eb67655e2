//! User commands delivered to the event loop from other threads

use std::sync::mpsc::Sender;
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run one display cycle immediately
    ShowNow,
    /// Re-read the settings store and restart the countdown
    Reload,
    /// Close every overlay and exit
    Quit,
}

/// Turn SIGINT/SIGTERM into `Command::Quit`
#[cfg(unix)]
pub fn spawn_signal_listener(sender: Sender<Command>) -> Result<thread::JoinHandle<()>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .context("Failed to register SIGINT/SIGTERM handlers")?;

    let handle = thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            debug!("Signal listener started");
            for signal in signals.forever() {
                info!(signal, "Termination signal received, shutting down");
                if sender.send(Command::Quit).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn signal listener thread")?;

    Ok(handle)
}
