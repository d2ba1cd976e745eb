//! Random sources for checks.
//!
//! The session never touches a global generator: every roll comes from a
//! `RollSource` handed in by the caller, so tests and replays can script
//! exact outcomes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sides on the die used for checks.
pub const D20_SIDES: u32 = 20;

/// Something that can roll a die.
pub trait RollSource {
    /// Roll one die with `sides` faces, returning a value in `1..=sides`.
    fn roll(&mut self, sides: u32) -> u32;
}

/// Uniform rolls backed by a `rand` generator.
#[derive(Debug, Clone)]
pub struct RngRolls<R> {
    rng: R,
}

impl<R: Rng> RngRolls<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngRolls<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Same seed, same rolls.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RollSource for RngRolls<R> {
    fn roll(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides.max(1))
    }
}

/// Replays a predetermined sequence of rolls.
///
/// Once the script runs out the last value repeats; an empty script always
/// rolls the maximum.
#[derive(Debug, Clone, Default)]
pub struct FixedRolls {
    values: Vec<u32>,
    index: usize,
}

impl FixedRolls {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }

    /// Rolls not yet consumed.
    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.index)
    }
}

impl RollSource for FixedRolls {
    fn roll(&mut self, sides: u32) -> u32 {
        let value = match self.values.get(self.index) {
            Some(value) => {
                self.index += 1;
                *value
            }
            None => self.values.last().copied().unwrap_or(sides),
        };
        value.clamp(1, sides.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_rolls_stay_on_the_die() {
        let mut dice = RngRolls::seeded(7);
        for _ in 0..1000 {
            let roll = dice.roll(D20_SIDES);
            assert!((1..=20).contains(&roll), "rolled {roll}");
        }
    }

    #[test]
    fn test_seeded_rolls_repeat() {
        let mut a = RngRolls::seeded(42);
        let mut b = RngRolls::seeded(42);
        let first: Vec<u32> = (0..10).map(|_| a.roll(D20_SIDES)).collect();
        let second: Vec<u32> = (0..10).map(|_| b.roll(D20_SIDES)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rng_rolls_cover_both_faces_of_the_range() {
        let mut dice = RngRolls::seeded(1);
        let rolls: Vec<u32> = (0..2000).map(|_| dice.roll(D20_SIDES)).collect();
        assert!(rolls.contains(&1));
        assert!(rolls.contains(&20));
    }

    #[test]
    fn test_fixed_rolls_play_script_then_repeat_last() {
        let mut dice = FixedRolls::new(vec![10, 9]);
        assert_eq!(dice.remaining(), 2);
        assert_eq!(dice.roll(D20_SIDES), 10);
        assert_eq!(dice.roll(D20_SIDES), 9);
        assert_eq!(dice.remaining(), 0);
        assert_eq!(dice.roll(D20_SIDES), 9);
    }

    #[test]
    fn test_fixed_rolls_clamp_to_the_die() {
        let mut dice = FixedRolls::new(vec![0, 35]);
        assert_eq!(dice.roll(D20_SIDES), 1);
        assert_eq!(dice.roll(D20_SIDES), 20);
        assert_eq!(FixedRolls::default().roll(D20_SIDES), 20);
    }
}
