#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Note value as an exact fraction of a whole note.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub numerator: u32,
    pub denominator: u32,
}

impl Duration {
    pub const WHOLE: Duration = Duration::new(1, 1);
    pub const HALF: Duration = Duration::new(1, 2);
    pub const QUARTER: Duration = Duration::new(1, 4);
    pub const EIGHTH: Duration = Duration::new(1, 8);
    pub const SIXTEENTH: Duration = Duration::new(1, 16);
    pub const THIRTY_SECOND: Duration = Duration::new(1, 32);

    pub const DOTTED_HALF: Duration = Duration::HALF.dotted();
    pub const DOTTED_QUARTER: Duration = Duration::QUARTER.dotted();
    pub const DOTTED_EIGHTH: Duration = Duration::EIGHTH.dotted();

    pub const QUARTER_TRIPLET: Duration = Duration::QUARTER.triplet();
    pub const EIGHTH_TRIPLET: Duration = Duration::EIGHTH.triplet();

    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// ×3/2
    pub const fn dotted(self) -> Self {
        Duration::new(self.numerator * 3, self.denominator * 2)
    }

    /// Three in the time of two.
    pub const fn triplet(self) -> Self {
        self.tuplet(2, 3)
    }

    /// `played` notes in the time of `in_time_of`.
    pub const fn tuplet(self, in_time_of: u32, played: u32) -> Self {
        Duration::new(self.numerator * in_time_of, self.denominator * played)
    }

    pub const fn reduce(self) -> Self {
        let gcd = gcd(self.numerator, self.denominator);
        if gcd == 0 {
            return self;
        }
        Duration::new(self.numerator / gcd, self.denominator / gcd)
    }

    pub const fn add(self, other: Self) -> Self {
        Duration::new(
            self.numerator * other.denominator + other.numerator * self.denominator,
            self.denominator * other.denominator,
        )
        .reduce()
    }

    /// `numerator · 4 · ppq / denominator`, truncated.
    pub fn to_ticks(&self, ppq: u32) -> u32 {
        (self.numerator * 4 * ppq) / self.denominator.max(1)
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::QUARTER
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let rem = a % b;
        a = b;
        b = rem;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    const PPQ: u32 = 480;

    #[test]
    fn note_values() {
        assert_eq!(Duration::WHOLE.to_ticks(PPQ), 1920);
        assert_eq!(Duration::QUARTER.to_ticks(PPQ), 480);
        assert_eq!(Duration::SIXTEENTH.to_ticks(PPQ), 120);
        assert_eq!(Duration::DOTTED_QUARTER.to_ticks(PPQ), 720);
        assert_eq!(Duration::EIGHTH_TRIPLET.to_ticks(PPQ), 160);
        assert_eq!(Duration::EIGHTH.tuplet(4, 5).to_ticks(PPQ), 192);
    }

    #[test]
    fn arithmetic_stays_exact() {
        const BACK_TO_EIGHTH: Duration = Duration::EIGHTH.dotted().triplet().reduce();
        assert_eq!(BACK_TO_EIGHTH, Duration::EIGHTH);
        assert_eq!(Duration::QUARTER.add(Duration::EIGHTH), Duration::new(3, 8));
    }
}
