//! StatusNotifier tray icon
//!
//! ksni needs an async runtime, so the tray gets its own thread with a current-thread
//! tokio runtime. Menu actions are forwarded to the event loop as [`Command`]s.

use std::sync::mpsc::Sender;
use std::thread;

use anyhow::{Context, Result};
use ksni::menu::StandardItem;
use ksni::{MenuItem, TrayMethods};
use tracing::{info, warn};

use crate::commands::Command;
use crate::constants::tray;

#[derive(Debug)]
pub struct ReminderTray {
    sender: Sender<Command>,
}

impl ReminderTray {
    pub fn new(sender: Sender<Command>) -> Self {
        Self { sender }
    }

    fn send(&self, command: Command) {
        if self.sender.send(command).is_err() {
            warn!(?command, "Event loop is gone, dropping tray command");
        }
    }
}

impl ksni::Tray for ReminderTray {
    fn id(&self) -> String {
        tray::ID.into()
    }

    fn title(&self) -> String {
        tray::TITLE.into()
    }

    fn icon_name(&self) -> String {
        tray::ICON_NAME.into()
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        vec![
            StandardItem {
                label: "Show now (test)".into(),
                activate: Box::new(|t: &mut Self| t.send(Command::ShowNow)),
                ..Default::default()
            }
            .into(),
            StandardItem {
                label: "Reload configuration".into(),
                activate: Box::new(|t: &mut Self| t.send(Command::Reload)),
                ..Default::default()
            }
            .into(),
            MenuItem::Separator,
            StandardItem {
                label: "Quit".into(),
                activate: Box::new(|t: &mut Self| t.send(Command::Quit)),
                ..Default::default()
            }
            .into(),
        ]
    }
}

/// Start the tray on a background thread; a missing tray host only logs a warning
pub fn spawn_tray(sender: Sender<Command>) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("tray".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!(error = %e, "Failed to start tray runtime, continuing without tray");
                    return;
                }
            };
            runtime.block_on(async move {
                match ReminderTray::new(sender).spawn().await {
                    Ok(_handle) => {
                        info!("Tray icon registered");
                        // The handle must outlive the service
                        std::future::pending::<()>().await;
                    }
                    Err(e) => warn!(error = %e, "No system tray available, continuing without tray"),
                }
            });
        })
        .context("Failed to spawn tray thread")
}
