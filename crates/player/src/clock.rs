//! Wall-anchored playback pacing.
//!
//! The first displayed frame anchors the stream timeline to a wall-clock
//! instant; every later frame has a target instant derived purely from its
//! PTS delta to that anchor, so pacing drift cannot accumulate. Decisions
//! compare `now` against the target with two tunable windows: a frame may
//! display up to `display_tolerance` early, and once `now` is more than
//! `late_threshold` past the target the consumer starts dropping to catch
//! up.
//!
//! All methods take `now` as a parameter; nothing here reads the clock.

use std::time::{Duration, Instant};

use kino_common::PlaybackTuning;

/// What the consumer should do with a frame at a given instant.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameDecision {
    /// Target is still more than the display tolerance away; hold it.
    NotYet,
    /// Inside the display window; show it.
    Due,
    /// More than the late threshold past target; catch up by dropping.
    Late,
}

struct Anchor {
    first_pts: f64,
    start_wall: Instant,
    /// Display position reported when the anchor was taken; keeps reported
    /// time continuous across re-anchors (seek, resume).
    base_display: f64,
}

/// Maps frame PTS values to wall-clock display targets.
pub struct PlaybackClock {
    tuning: PlaybackTuning,
    anchor: Option<Anchor>,
}

impl PlaybackClock {
    pub fn new(tuning: PlaybackTuning) -> Self {
        Self { tuning, anchor: None }
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    /// Anchor the timeline: `pts` displays at `now`, and reported display
    /// time continues from `base_display`.
    pub fn set_anchor(&mut self, pts: f64, now: Instant, base_display: f64) {
        self.anchor = Some(Anchor {
            first_pts: pts,
            start_wall: now,
            base_display,
        });
    }

    /// Forget the anchor; the next displayed frame re-anchors.
    pub fn reset(&mut self) {
        self.anchor = None;
    }

    /// Wall-clock instant at which `pts` should display. `None` before the
    /// first anchor.
    pub fn target_instant(&self, pts: f64) -> Option<Instant> {
        self.anchor.as_ref().map(|a| {
            a.start_wall + Duration::from_secs_f64((pts - a.first_pts).max(0.0))
        })
    }

    /// Pacing decision for a frame at `now`. Unanchored clocks report
    /// `Due`: the first frame always displays immediately.
    pub fn decision(&self, pts: f64, now: Instant) -> FrameDecision {
        let Some(target) = self.target_instant(pts) else {
            return FrameDecision::Due;
        };
        if now > target + self.tuning.late_threshold {
            FrameDecision::Late
        } else if now + self.tuning.display_tolerance >= target {
            FrameDecision::Due
        } else {
            FrameDecision::NotYet
        }
    }

    /// True once `pts`'s display window has opened (within tolerance).
    pub fn target_passed(&self, pts: f64, now: Instant) -> bool {
        match self.target_instant(pts) {
            Some(target) => now + self.tuning.display_tolerance >= target,
            None => true,
        }
    }

    /// Display time to report for a frame, continuous across re-anchors
    /// and never negative.
    pub fn display_seconds(&self, pts: f64) -> f64 {
        match &self.anchor {
            Some(a) => (a.base_display + (pts - a.first_pts)).max(0.0),
            None => 0.0,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
