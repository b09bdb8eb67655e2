//! Per-display overlay lifecycle
//!
//! Explicit state machine `FadingIn -> Holding -> FadingOut -> Closed` driven by a
//! single [`OverlayLifecycle::advance`] entry point. Time is passed in, so the whole
//! transition table runs without a window system or a real clock.
//!
//! Phase boundaries are computed from the logical end of the previous phase, not from
//! the tick that observed it, so a late tick never stretches the overlay's lifetime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ConfigSnapshot;
use crate::constants::overlay::CLOCK_TICK;
use crate::image_source::SourceImage;
use crate::types::DisplayInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    FadingIn,
    Holding,
    FadingOut,
    Closed,
}

/// One linear opacity animation with its own endpoints
#[derive(Debug, Clone, Copy)]
pub struct FadeRun {
    from: f64,
    to: f64,
    started: Instant,
    duration: Duration,
}

impl FadeRun {
    pub fn new(from: f64, to: f64, started: Instant, duration: Duration) -> Self {
        Self { from, to, started, duration }
    }

    pub fn ends_at(&self) -> Instant {
        self.started + self.duration
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now >= self.ends_at()
    }

    /// Interpolated value at `now`, clamped to the run's endpoints
    pub fn value_at(&self, now: Instant) -> f64 {
        if self.duration.is_zero() || self.is_finished(now) {
            return self.to;
        }
        let elapsed = now.saturating_duration_since(self.started);
        let t = (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }
}

/// State of one overlay bound to one display for one reminder cycle
#[derive(Debug)]
pub struct OverlayLifecycle {
    state: LifecycleState,
    opacity: f64,
    fade: FadeRun,
    hold_until: Instant,
    next_clock_tick: Instant,
    display: DisplayInfo,
    snapshot: Arc<ConfigSnapshot>,
    image: Option<Arc<SourceImage>>,
}

impl OverlayLifecycle {
    /// Start a new overlay in `FadingIn` at opacity 0.0
    pub fn new(
        display: DisplayInfo,
        snapshot: Arc<ConfigSnapshot>,
        image: Option<Arc<SourceImage>>,
        now: Instant,
    ) -> Self {
        Self {
            state: LifecycleState::FadingIn,
            opacity: 0.0,
            fade: FadeRun::new(0.0, 1.0, now, snapshot.fade()),
            hold_until: now,
            next_clock_tick: now + CLOCK_TICK,
            display,
            snapshot,
            image,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn display(&self) -> &DisplayInfo {
        &self.display
    }

    /// Configuration frozen at creation
    pub fn snapshot(&self) -> &Arc<ConfigSnapshot> {
        &self.snapshot
    }

    pub fn image(&self) -> Option<&Arc<SourceImage>> {
        self.image.as_ref()
    }

    /// True while an opacity animation is running
    pub fn is_animating(&self) -> bool {
        matches!(self.state, LifecycleState::FadingIn | LifecycleState::FadingOut)
    }

    /// Move the state machine up to `now` and return the resulting state.
    ///
    /// Several transitions may happen in one call (zero-length fades or holds).
    pub fn advance(&mut self, now: Instant) -> LifecycleState {
        loop {
            match self.state {
                LifecycleState::FadingIn => {
                    self.opacity = self.opacity.max(self.fade.value_at(now));
                    if !self.fade.is_finished(now) {
                        break;
                    }
                    self.opacity = 1.0;
                    self.hold_until = self.fade.ends_at() + self.snapshot.hold();
                    self.state = LifecycleState::Holding;
                }
                LifecycleState::Holding => {
                    if now < self.hold_until {
                        break;
                    }
                    self.fade = FadeRun::new(1.0, 0.0, self.hold_until, self.snapshot.fade());
                    self.state = LifecycleState::FadingOut;
                }
                LifecycleState::FadingOut => {
                    self.opacity = self.opacity.min(self.fade.value_at(now));
                    if !self.fade.is_finished(now) {
                        break;
                    }
                    self.opacity = 0.0;
                    self.state = LifecycleState::Closed;
                }
                LifecycleState::Closed => break,
            }
        }
        self.state
    }

    /// Consume a due clock repaint tick. Never fires once closed.
    pub fn take_clock_tick(&mut self, now: Instant) -> bool {
        if self.state == LifecycleState::Closed || now < self.next_clock_tick {
            return false;
        }
        while self.next_clock_tick <= now {
            self.next_clock_tick += CLOCK_TICK;
        }
        true
    }

    /// Earliest instant at which this overlay has something to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let phase_end = match self.state {
            LifecycleState::FadingIn | LifecycleState::FadingOut => self.fade.ends_at(),
            LifecycleState::Holding => self.hold_until,
            LifecycleState::Closed => return None,
        };
        Some(phase_end.min(self.next_clock_tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(display_seconds: u64, fade_ms: u64) -> Arc<ConfigSnapshot> {
        Arc::new(ConfigSnapshot {
            display_seconds,
            fade_ms,
            ..ConfigSnapshot::default()
        })
    }

    fn lifecycle(display_seconds: u64, fade_ms: u64, now: Instant) -> OverlayLifecycle {
        OverlayLifecycle::new(
            DisplayInfo::new("TEST-1", 0, 0, 1920, 1080),
            snapshot(display_seconds, fade_ms),
            None,
            now,
        )
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_fade_run_interpolates_and_clamps() {
        let t0 = Instant::now();
        let run = FadeRun::new(0.0, 1.0, t0, ms(200));
        assert_eq!(run.value_at(t0), 0.0);
        assert!((run.value_at(t0 + ms(50)) - 0.25).abs() < 1e-9);
        assert_eq!(run.value_at(t0 + ms(200)), 1.0);
        assert_eq!(run.value_at(t0 + ms(5000)), 1.0);

        let down = FadeRun::new(1.0, 0.0, t0, ms(100));
        assert!((down.value_at(t0 + ms(50)) - 0.5).abs() < 1e-9);
        assert_eq!(down.value_at(t0 + ms(100)), 0.0);
    }

    #[test]
    fn test_zero_length_fade_run_is_immediately_finished() {
        let t0 = Instant::now();
        let run = FadeRun::new(0.0, 1.0, t0, Duration::ZERO);
        assert!(run.is_finished(t0));
        assert_eq!(run.value_at(t0), 1.0);
    }

    #[test]
    fn test_huge_hold_stays_holding_without_overflow() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(u64::MAX, 100, t0);
        assert_eq!(overlay.advance(t0 + ms(200)), LifecycleState::Holding);
        assert_eq!(overlay.opacity(), 1.0);
        assert!(overlay.next_deadline().is_some());

        let mut slow = lifecycle(0, u64::MAX, t0);
        assert_eq!(slow.advance(t0 + ms(200)), LifecycleState::FadingIn);
        assert!(slow.opacity() < 0.01);
    }

    #[test]
    fn test_starts_fading_in_at_zero() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(2, 100, t0);
        assert_eq!(overlay.state(), LifecycleState::FadingIn);
        assert_eq!(overlay.opacity(), 0.0);
        assert_eq!(overlay.advance(t0), LifecycleState::FadingIn);
        assert_eq!(overlay.opacity(), 0.0);
        assert!(overlay.is_animating());
    }

    #[test]
    fn test_full_timeline() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(2, 100, t0);

        assert_eq!(overlay.advance(t0 + ms(50)), LifecycleState::FadingIn);
        assert!((overlay.opacity() - 0.5).abs() < 1e-9);

        assert_eq!(overlay.advance(t0 + ms(100)), LifecycleState::Holding);
        assert_eq!(overlay.opacity(), 1.0);
        assert!(!overlay.is_animating());

        assert_eq!(overlay.advance(t0 + ms(2099)), LifecycleState::Holding);
        assert_eq!(overlay.opacity(), 1.0);

        assert_eq!(overlay.advance(t0 + ms(2150)), LifecycleState::FadingOut);
        assert!((overlay.opacity() - 0.5).abs() < 1e-9);

        assert_eq!(overlay.advance(t0 + ms(2199)), LifecycleState::FadingOut);
        assert!(overlay.opacity() > 0.0);

        assert_eq!(overlay.advance(t0 + ms(2200)), LifecycleState::Closed);
        assert_eq!(overlay.opacity(), 0.0);
        assert_eq!(overlay.next_deadline(), None);
    }

    #[test]
    fn test_opacity_monotonic_in_each_phase() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(1, 300, t0);
        let mut last_state = LifecycleState::FadingIn;
        let mut last_opacity = 0.0;

        for step in 0..=200 {
            let now = t0 + ms(step * 10);
            let state = overlay.advance(now);
            let opacity = overlay.opacity();
            assert!((0.0..=1.0).contains(&opacity));
            match state {
                LifecycleState::FadingIn => assert!(opacity >= last_opacity),
                LifecycleState::Holding => assert_eq!(opacity, 1.0),
                LifecycleState::FadingOut if last_state == LifecycleState::FadingOut => {
                    assert!(opacity <= last_opacity)
                }
                LifecycleState::FadingOut => {}
                LifecycleState::Closed => {
                    assert_eq!(opacity, 0.0);
                    assert!(matches!(last_state, LifecycleState::FadingOut | LifecycleState::Closed));
                }
            }
            last_state = state;
            last_opacity = opacity;
        }
        assert_eq!(last_state, LifecycleState::Closed);
    }

    #[test]
    fn test_zero_hold_leaves_holding_immediately() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(0, 100, t0);
        assert_eq!(overlay.advance(t0 + ms(100)), LifecycleState::FadingOut);
        assert_eq!(overlay.opacity(), 1.0);
        assert_eq!(overlay.advance(t0 + ms(200)), LifecycleState::Closed);
    }

    #[test]
    fn test_late_tick_skips_through_all_phases() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(2, 100, t0);
        assert_eq!(overlay.advance(t0 + Duration::from_secs(60)), LifecycleState::Closed);
        assert_eq!(overlay.opacity(), 0.0);
    }

    #[test]
    fn test_zero_fades_and_hold_close_on_first_advance() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(0, 0, t0);
        assert_eq!(overlay.advance(t0), LifecycleState::Closed);
    }

    #[test]
    fn test_hold_measured_from_logical_fade_end() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(2, 100, t0);
        // First observation long after the fade-in ended
        assert_eq!(overlay.advance(t0 + ms(1500)), LifecycleState::Holding);
        assert_eq!(overlay.advance(t0 + ms(2099)), LifecycleState::Holding);
        assert_eq!(overlay.advance(t0 + ms(2100)), LifecycleState::FadingOut);
    }

    #[test]
    fn test_clock_tick_every_second_until_closed() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(3, 100, t0);
        assert!(!overlay.take_clock_tick(t0 + ms(999)));
        assert!(overlay.take_clock_tick(t0 + ms(1000)));
        assert!(!overlay.take_clock_tick(t0 + ms(1500)));
        // Missed ticks collapse into one
        assert!(overlay.take_clock_tick(t0 + ms(2900)));
        assert!(!overlay.take_clock_tick(t0 + ms(2950)));

        // The tick never touches the state machine
        assert_eq!(overlay.state(), LifecycleState::FadingIn);

        overlay.advance(t0 + Duration::from_secs(10));
        assert!(!overlay.take_clock_tick(t0 + Duration::from_secs(11)));
    }

    #[test]
    fn test_next_deadline_tracks_phase_and_tick() {
        let t0 = Instant::now();
        let mut overlay = lifecycle(5, 400, t0);
        assert_eq!(overlay.next_deadline(), Some(t0 + ms(400)));
        overlay.advance(t0 + ms(400));
        assert_eq!(overlay.next_deadline(), Some(t0 + ms(1000)));
    }
}
