//! Entry-enumeration budget.
//!
//! A pathological archive can declare millions of entries or decompress
//! forever. Every entry listing charges against an explicit budget object
//! instead of relying on magic-number guards scattered through callers.

use std::time::{Duration, Instant};

use crate::error::{ErrorKind, Result};

/// Default cap on entries enumerated from a single container.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
/// Default wall-clock cap on enumerating a single container's entry list.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A (count, elapsed-time) budget threaded through entry enumeration.
#[derive(Debug)]
pub struct EnumerationBudget {
    max_entries: usize,
    deadline: Instant,
    seen: usize,
}

impl EnumerationBudget {
    pub fn new(max_entries: usize, timeout: Duration) -> Self {
        Self { max_entries, deadline: Instant::now() + timeout, seen: 0 }
    }

    /// Charge one enumerated entry against the budget.
    pub fn charge(&mut self) -> Result<()> {
        self.seen += 1;
        if self.seen > self.max_entries || Instant::now() > self.deadline {
            exn::bail!(ErrorKind::BudgetExhausted(self.seen));
        }
        Ok(())
    }

    /// Number of entries charged so far.
    pub fn seen(&self) -> usize {
        self.seen
    }
}

impl Default for EnumerationBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charges_until_entry_cap() {
        let mut budget = EnumerationBudget::new(3, Duration::from_secs(60));
        assert!(budget.charge().is_ok());
        assert!(budget.charge().is_ok());
        assert!(budget.charge().is_ok());
        assert!(budget.charge().is_err());
        assert_eq!(budget.seen(), 4);
    }

    #[test]
    fn expired_deadline_fails_first_charge() {
        let mut budget = EnumerationBudget::new(100, Duration::ZERO);
        assert!(budget.charge().is_err());
    }
}
