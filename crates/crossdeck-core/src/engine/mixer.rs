//! Mixer - crossfade law, volume faders, and the timed transition
//!
//! The crossfade scalar maps to per-deck gains through a quarter-cycle
//! cosine/sine pair, so `gain_a^2 + gain_b^2 = 1` at every position and
//! perceived loudness stays constant through the sweep. Each deck's
//! independent volume fader multiplies its side of the law.
//!
//! `run_transition` animates the scalar linearly over a fixed window,
//! alternating direction on each invocation. The mixer owns at most one
//! transition: starting a new one supersedes the previous animation, so the
//! scalar always has a single writer.

use crate::types::{DeckId, NUM_DECKS};

/// Timed transition window in seconds
pub const TRANSITION_SECONDS: f64 = 1.2;

/// Direction of the next timed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDirection {
    AToB,
    BToA,
}

impl TransitionDirection {
    fn flipped(self) -> Self {
        match self {
            TransitionDirection::AToB => TransitionDirection::BToA,
            TransitionDirection::BToA => TransitionDirection::AToB,
        }
    }
}

/// An in-flight crossfade animation
#[derive(Debug, Clone, Copy)]
struct Transition {
    from: f32,
    to: f32,
    elapsed: f64,
}

/// Equal-power gain pair for a crossfade position in [0, 1]
///
/// x=0 is full deck A, x=1 is full deck B.
pub fn crossfade_gains(x: f32) -> (f32, f32) {
    let x = x.clamp(0.0, 1.0);
    let theta = x * std::f32::consts::FRAC_PI_2;
    (theta.cos(), theta.sin())
}

/// Two-deck mixer state
pub struct Mixer {
    /// Crossfade position: 0.0 = full A, 1.0 = full B
    crossfade: f32,
    /// Per-deck volume faders, multiplied into the law
    volumes: [f32; NUM_DECKS],
    transition: Option<Transition>,
    next_direction: TransitionDirection,
}

impl Mixer {
    /// Create a mixer centered between the decks, faders at full
    pub fn new() -> Self {
        Self {
            crossfade: 0.5,
            volumes: [1.0; NUM_DECKS],
            transition: None,
            next_direction: TransitionDirection::AToB,
        }
    }

    /// Current crossfade position
    pub fn crossfade(&self) -> f32 {
        self.crossfade
    }

    /// Set the crossfade position, returning the resulting deck gains
    pub fn set_crossfade(&mut self, x: f32) -> (f32, f32) {
        self.crossfade = x.clamp(0.0, 1.0);
        self.gains()
    }

    /// Set a deck's volume fader (clamped to [0, 1]), returning the gains
    pub fn set_volume(&mut self, deck: DeckId, volume: f32) -> (f32, f32) {
        self.volumes[deck.index()] = volume.clamp(0.0, 1.0);
        self.gains()
    }

    /// A deck's volume fader value
    pub fn volume(&self, deck: DeckId) -> f32 {
        self.volumes[deck.index()]
    }

    /// Current deck gains: the equal-power law scaled by each fader
    pub fn gains(&self) -> (f32, f32) {
        let (a, b) = crossfade_gains(self.crossfade);
        (a * self.volumes[0], b * self.volumes[1])
    }

    /// Whether a timed transition is animating
    pub fn transition_active(&self) -> bool {
        self.transition.is_some()
    }

    /// Direction the next `run_transition` call will take
    pub fn next_direction(&self) -> TransitionDirection {
        self.next_direction
    }

    /// Start a timed crossfade sweep
    ///
    /// Directions alternate per invocation (A->B, then B->A, ...). Any
    /// transition already animating is superseded.
    pub fn run_transition(&mut self) {
        let (from, to) = match self.next_direction {
            TransitionDirection::AToB => (0.0, 1.0),
            TransitionDirection::BToA => (1.0, 0.0),
        };
        self.next_direction = self.next_direction.flipped();
        self.transition = Some(Transition {
            from,
            to,
            elapsed: 0.0,
        });
    }

    /// Advance an active transition by `dt` seconds
    ///
    /// Returns the new deck gains when the scalar moved, None when idle.
    /// The transition clears itself on completion.
    pub fn tick(&mut self, dt: f64) -> Option<(f32, f32)> {
        let tr = self.transition.as_mut()?;
        tr.elapsed += dt.max(0.0);
        let t = (tr.elapsed / TRANSITION_SECONDS).clamp(0.0, 1.0) as f32;
        self.crossfade = tr.from + (tr.to - tr.from) * t;
        if t >= 1.0 {
            self.transition = None;
        }
        Some(self.gains())
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_power_identity() {
        for i in 0..=100 {
            let x = i as f32 / 100.0;
            let (a, b) = crossfade_gains(x);
            assert!((a * a + b * b - 1.0).abs() < 1e-5, "at x={}", x);
        }
    }

    #[test]
    fn test_law_endpoints() {
        let (a, b) = crossfade_gains(0.0);
        assert!((a - 1.0).abs() < 1e-6 && b.abs() < 1e-6);

        let (a, b) = crossfade_gains(1.0);
        assert!(a.abs() < 1e-6 && (b - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_clamped() {
        assert_eq!(crossfade_gains(-0.3), crossfade_gains(0.0));
        assert_eq!(crossfade_gains(1.7), crossfade_gains(1.0));

        let mut mixer = Mixer::new();
        mixer.set_crossfade(2.0);
        assert_eq!(mixer.crossfade(), 1.0);
    }

    #[test]
    fn test_volumes_multiply_law() {
        let mut mixer = Mixer::new();
        mixer.set_volume(DeckId::A, 0.5);
        let (a, b) = mixer.set_crossfade(0.0);
        assert!((a - 0.5).abs() < 1e-6);
        assert!(b.abs() < 1e-6);

        mixer.set_volume(DeckId::B, 0.25);
        let (_, b) = mixer.set_crossfade(1.0);
        assert!((b - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_transition_traces_law() {
        let mut mixer = Mixer::new();
        mixer.set_crossfade(0.0);
        mixer.run_transition();
        assert!(mixer.transition_active());

        // Sample every 0.1 s; the scalar must move linearly and the gains
        // must sit exactly on the cosine/sine law at every point
        let mut elapsed = 0.0;
        while elapsed < TRANSITION_SECONDS {
            let (a, b) = mixer.tick(0.1).expect("transition active");
            elapsed += 0.1;
            let expected_x = (elapsed / TRANSITION_SECONDS).min(1.0) as f32;
            assert!((mixer.crossfade() - expected_x).abs() < 1e-5);
            let (ea, eb) = crossfade_gains(expected_x);
            assert!((a - ea).abs() < 1e-5 && (b - eb).abs() < 1e-5);
        }

        assert!(!mixer.transition_active());
        let (a, b) = mixer.gains();
        assert!(a.abs() < 1e-5 && (b - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_transition_alternates_direction() {
        let mut mixer = Mixer::new();
        assert_eq!(mixer.next_direction(), TransitionDirection::AToB);

        mixer.run_transition();
        assert_eq!(mixer.next_direction(), TransitionDirection::BToA);
        mixer.tick(TRANSITION_SECONDS + 0.1);
        assert_eq!(mixer.crossfade(), 1.0);

        mixer.run_transition();
        mixer.tick(TRANSITION_SECONDS + 0.1);
        assert_eq!(mixer.crossfade(), 0.0);
    }

    #[test]
    fn test_new_transition_supersedes_old() {
        let mut mixer = Mixer::new();
        mixer.run_transition(); // A -> B
        mixer.tick(0.3);
        let mid = mixer.crossfade();
        assert!(mid > 0.0 && mid < 1.0);

        mixer.run_transition(); // B -> A supersedes
        assert_eq!(mixer.crossfade(), mid); // scalar untouched until next tick
        mixer.tick(TRANSITION_SECONDS);
        assert_eq!(mixer.crossfade(), 0.0);
    }

    #[test]
    fn test_tick_idle_returns_none() {
        let mut mixer = Mixer::new();
        assert!(mixer.tick(0.1).is_none());
    }
}
