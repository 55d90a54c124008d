//! Fade-in transition tracking for a single tile.
//!
//! # State Machine
//!
//! ```text
//! Off --[set_enabled(true)]--> Fading
//! Fading --[opacity reaches 1.0]--> Settled { reported: false }
//! Settled { reported: false } --[is_dirty]--> Settled { reported: true }
//! ```
//!
//! `Settled` is terminal: a tile fades in at most once.

use std::time::{Duration, Instant};

/// Default fade-in duration.
pub const DEFAULT_TRANSITION_DURATION: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Off,
    Fading,
    Settled { reported: bool },
}

/// Opacity ramp driven by a render timestamp.
#[derive(Debug, Clone)]
pub struct Transition {
    phase: Phase,
    duration: Duration,
    stamped_at: Option<Instant>,
}

impl Transition {
    pub fn new() -> Self {
        Self {
            phase: Phase::Off,
            duration: DEFAULT_TRANSITION_DURATION,
            stamped_at: None,
        }
    }

    /// Turn the fade on or off. Has no effect once the fade has completed.
    pub fn set_enabled(&mut self, enabled: bool) {
        if let Phase::Settled { .. } = self.phase {
            return;
        }
        self.phase = if enabled { Phase::Fading } else { Phase::Off };
    }

    pub fn is_enabled(&self) -> bool {
        self.phase == Phase::Fading
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Record the moment the fade starts.
    pub fn stamp(&mut self, now: Instant) {
        self.stamped_at = Some(now);
    }

    /// Opacity in `[0, 1]` at `now`.
    ///
    /// Reaching full opacity ends the fade permanently. An unstamped fade is
    /// treated as already complete.
    pub fn opacity_at(&mut self, now: Instant) -> f32 {
        if self.phase != Phase::Fading {
            return 1.0;
        }

        let progress = match self.stamped_at {
            Some(started) if !self.duration.is_zero() => {
                let elapsed = now.saturating_duration_since(started);
                (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0) as f32
            }
            _ => 1.0,
        };

        if progress >= 1.0 {
            self.phase = Phase::Settled { reported: false };
        }
        progress
    }

    /// True while fading, and exactly once more after full opacity.
    pub fn is_dirty_at(&mut self, now: Instant) -> bool {
        match self.phase {
            Phase::Off => false,
            Phase::Fading => {
                if self.opacity_at(now) < 1.0 {
                    return true;
                }
                self.phase = Phase::Settled { reported: true };
                true
            }
            Phase::Settled { reported: false } => {
                self.phase = Phase::Settled { reported: true };
                true
            }
            Phase::Settled { reported: true } => false,
        }
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fading(duration_ms: u64) -> (Transition, Instant) {
        let mut transition = Transition::new();
        transition.set_enabled(true);
        transition.set_duration(Duration::from_millis(duration_ms));
        let start = Instant::now();
        transition.stamp(start);
        (transition, start)
    }

    #[test]
    fn test_disabled_is_fully_opaque_and_clean() {
        let mut transition = Transition::new();
        let now = Instant::now();
        assert_eq!(transition.opacity_at(now), 1.0);
        assert!(!transition.is_dirty_at(now));
    }

    #[test]
    fn test_opacity_ramps_linearly() {
        let (mut transition, start) = fading(200);
        let opacity = transition.opacity_at(start + Duration::from_millis(50));
        assert!((opacity - 0.25).abs() < 1e-4);

        let opacity = transition.opacity_at(start + Duration::from_millis(100));
        assert!((opacity - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_opacity_clamps_and_completes() {
        let (mut transition, start) = fading(200);
        assert_eq!(transition.opacity_at(start + Duration::from_millis(500)), 1.0);
        assert!(!transition.is_enabled());

        // Completed fades never restart
        transition.set_enabled(true);
        assert!(!transition.is_enabled());
        assert_eq!(transition.opacity_at(start), 1.0);
    }

    #[test]
    fn test_dirty_reported_once_after_full_opacity() {
        let (mut transition, start) = fading(200);

        assert!(transition.is_dirty_at(start + Duration::from_millis(10)));
        assert!(transition.is_dirty_at(start + Duration::from_millis(150)));
        assert!(transition.is_dirty_at(start + Duration::from_millis(200)));
        assert!(!transition.is_dirty_at(start + Duration::from_millis(210)));
        assert!(!transition.is_dirty_at(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_dirty_reported_once_when_opacity_completed_first() {
        let (mut transition, start) = fading(100);
        let later = start + Duration::from_millis(150);

        assert_eq!(transition.opacity_at(later), 1.0);
        assert!(transition.is_dirty_at(later));
        assert!(!transition.is_dirty_at(later));
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let (mut transition, start) = fading(0);
        assert_eq!(transition.opacity_at(start), 1.0);
    }

    #[test]
    fn test_unstamped_fade_is_complete() {
        let mut transition = Transition::new();
        transition.set_enabled(true);
        assert_eq!(transition.opacity_at(Instant::now()), 1.0);
    }
}
