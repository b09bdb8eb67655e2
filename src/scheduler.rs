//! Reminder scheduler
//!
//! Owns the single recurring deadline, runs display cycles (one overlay per display,
//! all sharing one snapshot and one image), and steps every active overlay. Like the
//! lifecycle it takes the current time as an argument; the event loop in `main`
//! supplies `Instant::now()` and sleeps until [`Scheduler::next_wakeup`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigSnapshot, ConfigSource};
use crate::error::ReminderError;
use crate::image_source::ImageSelector;
use crate::lifecycle::{LifecycleState, OverlayLifecycle};
use crate::types::DisplayInfo;

/// Drawing surface bound to one display for the life of one overlay.
///
/// Dropping the surface removes it from the screen.
pub trait OverlaySurface {
    /// Re-render time-dependent content (the clock)
    fn redraw(&mut self) -> Result<()>;

    /// Show the current frame with its alpha multiplied by `opacity`
    fn present(&mut self, opacity: f64) -> Result<()>;
}

/// Window-system side of the engine: which displays exist and how to draw on one
pub trait DisplayBackend {
    type Surface: OverlaySurface;

    fn displays(&self) -> Result<Vec<DisplayInfo>>;

    fn create_surface(&self, overlay: &OverlayLifecycle) -> Result<Self::Surface>;
}

/// Collaborators handed to the scheduler at construction
pub struct ReminderContext<B> {
    pub config: Box<dyn ConfigSource>,
    pub images: Box<dyn ImageSelector>,
    pub backend: B,
}

struct ActiveOverlay<S> {
    lifecycle: OverlayLifecycle,
    surface: S,
    presented: Option<f64>,
}

pub struct Scheduler<B: DisplayBackend> {
    ctx: ReminderContext<B>,
    snapshot: Arc<ConfigSnapshot>,
    next_fire: Option<Instant>,
    overlays: Vec<ActiveOverlay<B::Surface>>,
}

impl<B: DisplayBackend> Scheduler<B> {
    pub fn new(ctx: ReminderContext<B>) -> Self {
        Self {
            ctx,
            snapshot: Arc::new(ConfigSnapshot::default()),
            next_fire: None,
            overlays: Vec::new(),
        }
    }

    /// Load the initial configuration and arm the timer
    pub fn start(&mut self, now: Instant) {
        if let Err(e) = self.refresh_snapshot() {
            warn!(error = %e, "Failed to load configuration at startup, using defaults");
        }
        info!(
            interval_minutes = self.snapshot.interval_minutes,
            display_seconds = self.snapshot.display_seconds,
            fade_ms = self.snapshot.fade_ms,
            "Scheduler started"
        );
        self.arm(now);
    }

    /// Re-read configuration and restart the countdown from `now`
    pub fn reload_configuration(&mut self, now: Instant) {
        match self.refresh_snapshot() {
            Ok(()) => info!(interval_minutes = self.snapshot.interval_minutes, "Configuration reloaded"),
            Err(e) => warn!(error = %e, "Configuration reload failed, keeping previous settings"),
        }
        self.arm(now);
    }

    /// Run a display cycle immediately without touching the countdown
    pub fn fire_now(&mut self, now: Instant) -> usize {
        info!("Manual reminder requested");
        self.display_cycle(now)
    }

    /// Fire if the deadline has passed, then step every active overlay
    pub fn tick(&mut self, now: Instant) {
        if let Some(deadline) = self.next_fire
            && now >= deadline
        {
            self.next_fire = None;
            // A manual cycle may have reloaded a zero interval since arming
            if !self.current_interval().is_zero() {
                self.display_cycle(now);
            }

            let period = self.current_interval();
            if period.is_zero() {
                info!("Automatic reminders disabled");
            } else {
                let mut next = deadline + period;
                if next <= now {
                    debug!(behind_ms = (now - deadline).as_millis() as u64, "Missed reminder periods, re-arming from now");
                    next = now + period;
                }
                self.next_fire = Some(next);
            }
        }
        self.step_overlays(now);
    }

    /// Force every overlay to present again on the next tick (window exposed)
    pub fn invalidate_surfaces(&mut self) {
        for overlay in &mut self.overlays {
            overlay.presented = None;
        }
    }

    /// Earliest pending deadline: next firing or next overlay step
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.overlays
            .iter()
            .filter_map(|overlay| overlay.lifecycle.next_deadline())
            .chain(self.next_fire)
            .min()
    }

    /// True while any overlay is fading
    pub fn is_animating(&self) -> bool {
        self.overlays.iter().any(|overlay| overlay.lifecycle.is_animating())
    }

    pub fn next_fire_at(&self) -> Option<Instant> {
        self.next_fire
    }

    pub fn active_overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn snapshot(&self) -> &Arc<ConfigSnapshot> {
        &self.snapshot
    }

    pub fn current_interval(&self) -> Duration {
        self.snapshot.interval()
    }

    pub fn overlays(&self) -> impl Iterator<Item = &OverlayLifecycle> {
        self.overlays.iter().map(|overlay| &overlay.lifecycle)
    }

    fn refresh_snapshot(&mut self) -> Result<(), ReminderError> {
        let snapshot = self.ctx.config.load()?;
        self.snapshot = Arc::new(snapshot);
        Ok(())
    }

    fn arm(&mut self, now: Instant) {
        let interval = self.current_interval();
        if interval.is_zero() {
            self.next_fire = None;
            info!("Automatic reminders disabled (interval_minutes = 0)");
        } else {
            self.next_fire = Some(now + interval);
            info!(minutes = self.snapshot.interval_minutes, "Next reminder armed");
        }
    }

    fn active_displays(&self) -> Result<Vec<DisplayInfo>, ReminderError> {
        match self.ctx.backend.displays() {
            Ok(displays) if !displays.is_empty() => Ok(displays),
            Ok(_) => Err(ReminderError::NoDisplays),
            Err(e) => {
                error!(error = ?e, "Display enumeration failed");
                Err(ReminderError::NoDisplays)
            }
        }
    }

    /// One reminder: reload, enumerate, pick one image, spawn one overlay per display
    fn display_cycle(&mut self, now: Instant) -> usize {
        if let Err(e) = self.refresh_snapshot() {
            warn!(error = %e, "Configuration reload failed, showing with previous settings");
        }

        let displays = match self.active_displays() {
            Ok(displays) => displays,
            Err(e) => {
                info!(reason = %e, "Skipping reminder cycle");
                return 0;
            }
        };

        let snapshot = Arc::clone(&self.snapshot);
        let image = match self.ctx.images.select(&snapshot.image_source) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(error = %e, "Showing diagnostic background instead of an image");
                None
            }
        };

        let mut spawned = 0;
        for display in displays {
            let lifecycle = OverlayLifecycle::new(display, Arc::clone(&snapshot), image.clone(), now);
            match self.ctx.backend.create_surface(&lifecycle) {
                Ok(surface) => {
                    debug!(
                        display = %lifecycle.display().name,
                        width = lifecycle.display().width,
                        height = lifecycle.display().height,
                        primary = lifecycle.display().primary,
                        "Overlay created"
                    );
                    self.overlays.push(ActiveOverlay {
                        lifecycle,
                        surface,
                        presented: None,
                    });
                    spawned += 1;
                }
                Err(e) => {
                    error!(display = %lifecycle.display().name, error = ?e, "Failed to create overlay surface");
                }
            }
        }

        info!(
            overlays = spawned,
            image = ?image.as_ref().map(|image| image.path.display().to_string()),
            "Reminder shown"
        );
        spawned
    }

    fn step_overlays(&mut self, now: Instant) {
        self.overlays.retain_mut(|overlay| {
            if overlay.lifecycle.advance(now) == LifecycleState::Closed {
                debug!(display = %overlay.lifecycle.display().name, "Overlay closed");
                return false;
            }

            if overlay.lifecycle.take_clock_tick(now) {
                match overlay.surface.redraw() {
                    Ok(()) => overlay.presented = None,
                    Err(e) => error!(display = %overlay.lifecycle.display().name, error = ?e, "Failed to redraw overlay"),
                }
            }

            let opacity = overlay.lifecycle.opacity();
            if overlay.presented != Some(opacity) {
                match overlay.surface.present(opacity) {
                    Ok(()) => overlay.presented = Some(opacity),
                    Err(e) => error!(display = %overlay.lifecycle.display().name, error = ?e, "Failed to present overlay"),
                }
            }
            true
        });
    }
}
