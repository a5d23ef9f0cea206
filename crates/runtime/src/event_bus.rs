use foundation::time::Millis;

/// Deterministic trace of engine decisions.
///
/// Events carry the virtual-clock instant they happened at, so a recorded
/// session can be compared line by line against a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub at: Millis,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, at: Millis, kind: &'static str, message: impl Into<String>) {
        self.events.push(Event {
            at,
            kind,
            message: message.into(),
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn last(&self, kind: &str) -> Option<&Event> {
        self.events.iter().rev().find(|e| e.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use foundation::time::Millis;

    #[test]
    fn records_events_with_instant() {
        let mut bus = EventBus::new();
        bus.emit(Millis(200), "focus.retry", "attempt 1/20");
        assert_eq!(bus.events().len(), 1);
        assert_eq!(bus.events()[0].at, Millis(200));
        assert_eq!(bus.count("focus.retry"), 1);
        assert_eq!(bus.count("focus.applied"), 0);
    }

    #[test]
    fn last_finds_most_recent_of_kind() {
        let mut bus = EventBus::new();
        bus.emit(Millis(0), "k", "first");
        bus.emit(Millis(5), "other", "x");
        bus.emit(Millis(9), "k", "second");
        assert_eq!(bus.last("k").map(|e| e.message.as_str()), Some("second"));
    }
}
