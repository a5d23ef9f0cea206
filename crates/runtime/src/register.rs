/// Single-slot, last-write-wins register.
///
/// Writers never queue: `replace` exchanges the stored value and hands back
/// whatever it superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRegister<T> {
    value: Option<T>,
}

impl<T> Default for LatestRegister<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> LatestRegister<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the value it superseded (if any).
    pub fn replace(&mut self, value: T) -> Option<T> {
        self.value.replace(value)
    }

    /// Removes and returns the current value.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::LatestRegister;

    #[test]
    fn newest_write_wins() {
        let mut r = LatestRegister::new();
        assert_eq!(r.replace("a"), None);
        assert_eq!(r.replace("b"), Some("a"));
        assert_eq!(r.get(), Some(&"b"));
        assert_eq!(r.take(), Some("b"));
        assert!(r.is_empty());
    }

    #[test]
    fn in_place_edits_survive_until_replaced() {
        let mut r = LatestRegister::new();
        r.replace(1);
        if let Some(v) = r.get_mut() {
            *v += 1;
        }
        assert_eq!(r.get(), Some(&2));
        assert_eq!(r.replace(10), Some(2));
        assert_eq!(r.take(), Some(10));
        assert_eq!(r.take(), None);
    }
}
