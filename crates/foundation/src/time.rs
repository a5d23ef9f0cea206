use std::ops::Add;

use serde::{Deserialize, Serialize};

/// A point on the engine's virtual clock, in whole milliseconds since mount.
///
/// The clock is advanced explicitly by the host, so every timing decision in
/// the engine is replayable.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(self, earlier: Millis) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<u64> for Millis {
    type Output = Millis;

    fn add(self, ms: u64) -> Millis {
        Millis(self.0.saturating_add(ms))
    }
}

impl std::fmt::Display for Millis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Millis;

    #[test]
    fn add_saturates() {
        assert_eq!(Millis(200) + 200, Millis(400));
        assert_eq!(Millis(u64::MAX) + 1, Millis(u64::MAX));
    }

    #[test]
    fn since_never_underflows() {
        assert_eq!(Millis(1000).saturating_since(Millis(400)), 600);
        assert_eq!(Millis(400).saturating_since(Millis(1000)), 0);
    }
}
