//! Latency budgets for ptg.
//!
//! ptg runs before every Bash command, so the common case must stay cheap.
//! The budgets below back the criterion benchmarks and the hook's
//! fail-open deadline.
//!
//! | Tier | Path                         | Target  | Warning | Fail-open |
//! |------|------------------------------|---------|---------|-----------|
//! | 0    | Classifier fast path         | < 2μs   | < 10μs  | > 100μs   |
//! | 1    | Project scan (marker reads)  | < 200μs | < 1ms   | > 10ms    |
//! | 2    | Full hook pipeline           | < 5ms   | < 50ms  | > 1s      |
//!
//! Anything slower than [`HOOK_EVALUATION_BUDGET`] is allowed without a
//! verdict.

use std::time::{Duration, Instant};

/// Thresholds for one tier.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub target: Duration,
    pub warning: Duration,
    pub fail_open: Duration,
}

impl Budget {
    #[must_use]
    pub const fn from_micros(target: u64, warning: u64, fail_open: u64) -> Self {
        Self {
            target: Duration::from_micros(target),
            warning: Duration::from_micros(warning),
            fail_open: Duration::from_micros(fail_open),
        }
    }

    #[must_use]
    pub fn status(&self, elapsed: Duration) -> BudgetStatus {
        if elapsed > self.fail_open {
            BudgetStatus::FailOpen
        } else if elapsed > self.warning {
            BudgetStatus::Warning
        } else if elapsed > self.target {
            BudgetStatus::Elevated
        } else {
            BudgetStatus::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    Ok,
    Elevated,
    Warning,
    FailOpen,
}

/// Tier 0: classification without touching the filesystem.
pub const CLASSIFIER_FAST_PATH: Budget = Budget::from_micros(2, 10, 100);

/// Tier 1: reading the marker files of one directory.
pub const PROJECT_SCAN: Budget = Budget::from_micros(200, 1_000, 10_000);

/// Tier 2: stdin to exit code.
pub const FULL_PIPELINE: Budget = Budget::from_micros(5_000, 50_000, 1_000_000);

/// Wall-clock budget for one hook evaluation.
pub const HOOK_EVALUATION_BUDGET: Duration = Duration::from_secs(1);

/// A started clock with a fixed budget.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    #[must_use]
    pub fn is_exceeded(&self) -> bool {
        self.elapsed() > self.budget
    }
}
