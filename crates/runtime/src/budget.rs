/// Bounded retry budget for polling work.
///
/// Attempts are counted, not timed: the caller owns the timer that spaces
/// them, so the total wait is bounded by `max_attempts` times its period
/// without consulting a wall clock.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    attempts: u32,
    max_attempts: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Records one attempt.
    ///
    /// Returns `false` (and records nothing) if the budget was already spent.
    pub fn try_consume(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.attempts += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::RetryBudget;

    #[test]
    fn consumes_attempts_until_exhausted() {
        let mut b = RetryBudget::new(3);
        assert!(b.try_consume());
        assert!(b.try_consume());
        assert!(!b.is_exhausted());
        assert!(b.try_consume());
        assert!(b.is_exhausted());
        assert!(!b.try_consume());
        assert_eq!(b.attempts(), 3);
        assert_eq!(b.max_attempts(), 3);
    }

    #[test]
    fn zero_budget_is_born_exhausted() {
        let mut b = RetryBudget::new(0);
        assert!(b.is_exhausted());
        assert!(!b.try_consume());
    }
}
