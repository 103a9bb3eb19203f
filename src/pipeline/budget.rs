//! Run budgets.
//!
//! Bounds a pagination run so it always terminates:
//!
//! > Stop once the target item count is collected, once the consecutive
//! > page-level error budget is spent, or once the hard page cap is passed,
//! > whichever comes first.

use crate::models::{AbortReason, ProbeConfig, StopReason};

/// Result of a budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCheck {
    /// Keep going
    Proceed,
    /// End the run
    Stop(StopReason),
}

/// Numeric caps a run must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub target_count: usize,
    pub max_pages: usize,
    pub max_consecutive_errors: usize,
}

impl Budget {
    pub fn from_config(probe: &ProbeConfig) -> Self {
        Self {
            target_count: probe.target_count,
            max_pages: probe.max_pages,
            max_consecutive_errors: probe.max_consecutive_errors,
        }
    }

    /// Guard evaluated before every page iteration.
    pub fn check(&self, collected: usize, consecutive_errors: usize, page: usize) -> BudgetCheck {
        if collected >= self.target_count {
            return BudgetCheck::Stop(StopReason::TargetReached);
        }
        if consecutive_errors >= self.max_consecutive_errors {
            return BudgetCheck::Stop(StopReason::Aborted(AbortReason::ErrorBudget));
        }
        if page > self.max_pages {
            return BudgetCheck::Stop(StopReason::Aborted(AbortReason::PageLimit));
        }
        BudgetCheck::Proceed
    }

    /// Whether a finished page may be followed by the next one.
    pub fn may_advance(&self, collected: usize, page: usize) -> BudgetCheck {
        if collected >= self.target_count {
            return BudgetCheck::Stop(StopReason::TargetReached);
        }
        if page >= self.max_pages {
            return BudgetCheck::Stop(StopReason::Aborted(AbortReason::PageLimit));
        }
        BudgetCheck::Proceed
    }

    /// Items still needed to hit the target.
    pub fn remaining(&self, collected: usize) -> usize {
        self.target_count.saturating_sub(collected)
    }
}
