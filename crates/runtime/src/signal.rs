use foundation::time::Millis;

/// One-shot completion signal.
///
/// Fires at most once for its lifetime; later calls to [`OnceSignal::fire`]
/// are ignored and report `false`, so the first observer is the only one that
/// reacts.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct OnceSignal {
    fired_at: Option<Millis>,
}

impl OnceSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that actually fired the signal.
    pub fn fire(&mut self, at: Millis) -> bool {
        if self.fired_at.is_some() {
            return false;
        }
        self.fired_at = Some(at);
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired_at.is_some()
    }

    pub fn fired_at(&self) -> Option<Millis> {
        self.fired_at
    }
}
