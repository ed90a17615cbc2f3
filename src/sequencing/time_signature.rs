#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bar meter: `numerator` beats of `1/denominator` notes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const FOUR_FOUR: TimeSignature = TimeSignature::new(4, 4);
    pub const THREE_FOUR: TimeSignature = TimeSignature::new(3, 4);
    pub const TWO_FOUR: TimeSignature = TimeSignature::new(2, 4);
    pub const TWO_TWO: TimeSignature = TimeSignature::new(2, 2);
    pub const SIX_EIGHT: TimeSignature = TimeSignature::new(6, 8);
    pub const TWELVE_EIGHT: TimeSignature = TimeSignature::new(12, 8);

    pub const fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Length of one bar in ticks: `numerator · 4 · ppq / denominator`.
    pub fn bar_ticks(&self, ppq: u32) -> u32 {
        (self.numerator as u32 * 4 * ppq) / self.denominator.max(1) as u32
    }

    /// Length of one bar in quarter notes.
    pub fn quarters(&self) -> f64 {
        4.0 * self.numerator as f64 / self.denominator.max(1) as f64
    }

    /// Length of one beat (`1/denominator`) in ticks.
    pub fn beat_ticks(&self, ppq: u32) -> u32 {
        4 * ppq / self.denominator.max(1) as u32
    }

    /// 6/8, 9/8, 12/8: beats group in threes.
    pub fn is_compound(&self) -> bool {
        self.denominator == 8 && self.numerator > 3 && self.numerator % 3 == 0
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::FOUR_FOUR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PPQ: u32 = 480;

    #[test]
    fn simple_meters() {
        assert_eq!(TimeSignature::FOUR_FOUR.bar_ticks(PPQ), 1920);
        assert_eq!(TimeSignature::THREE_FOUR.bar_ticks(PPQ), 1440);
        assert_eq!(TimeSignature::TWO_TWO.bar_ticks(PPQ), 1920);
        assert_eq!(TimeSignature::TWO_TWO.beat_ticks(PPQ), 960);
        assert!(!TimeSignature::THREE_FOUR.is_compound());
    }

    #[test]
    fn compound_meters() {
        let six_eight = TimeSignature::SIX_EIGHT;
        assert_eq!(six_eight.bar_ticks(PPQ), 1440);
        assert_eq!(six_eight.quarters(), 3.0);
        assert_eq!(six_eight.beat_ticks(PPQ), 240);
        assert!(six_eight.is_compound());
        assert!(TimeSignature::TWELVE_EIGHT.is_compound());
    }
}
