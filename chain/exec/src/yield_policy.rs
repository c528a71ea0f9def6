use std::time::{Duration, Instant};

use db_common::Status;
use db_store::RecoveryUnit;

use crate::interrupt::OperationContext;
use crate::stage::{restore_tree, save_tree, Stage};
use crate::working_set::WorkingSet;

/// When a running plan is allowed to give up its snapshot and let other
/// operations make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldPolicy {
    /// Never yields; used for plans that must observe one consistent
    /// snapshot start-to-finish (e.g. most commands run inside a single
    /// write-unit-of-work).
    NoYield,
    /// Yields only when the caller explicitly asks (`getMore` between
    /// batches).
    YieldManual,
    /// Yields automatically every `period` elapsed or `work_cycles` calls to
    /// `work()`, whichever comes first — the default for user-initiated
    /// reads and writes so a long-running scan doesn't hold its snapshot (and
    /// any locks) indefinitely.
    YieldAuto,
}

/// Drives a plan tree to completion (or a single batch of results),
/// performing the four-step yield protocol whenever the policy calls for
/// it: save state, release the recovery unit's snapshot, let other work run,
/// re-acquire a snapshot and restore state.
pub struct PlanExecutor {
    policy: YieldPolicy,
    work_cycles_per_yield: u32,
    period: Duration,
    calls_since_yield: u32,
    last_yield: Instant,
}

impl PlanExecutor {
    pub fn new(policy: YieldPolicy) -> Self {
        PlanExecutor {
            policy,
            work_cycles_per_yield: 128,
            period: Duration::from_millis(10),
            calls_since_yield: 0,
            last_yield: Instant::now(),
        }
    }

    fn should_yield(&self) -> bool {
        match self.policy {
            YieldPolicy::NoYield => false,
            YieldPolicy::YieldManual => false,
            YieldPolicy::YieldAuto => {
                self.calls_since_yield >= self.work_cycles_per_yield || self.last_yield.elapsed() >= self.period
            }
        }
    }

    /// Performs one `work()` call on `root`, yielding first if the policy and
    /// elapsed budget call for it. Returns `Ok(None)` to mean "call again",
    /// `Ok(Some(slot))` for a produced result passed through as
    /// `StageState::Advanced`, and propagates interruption/restore failures
    /// as an error that the caller should surface to the client.
    pub fn step(
        &mut self,
        root: &mut dyn Stage,
        ws: &mut WorkingSet,
        ru: &mut dyn RecoveryUnit,
        ctx: &OperationContext,
    ) -> Result<crate::stage::StageState, Status> {
        ctx.check_for_interrupt()?;

        if self.should_yield() {
            self.yield_now(root, ws, ru, ctx)?;
        }

        self.calls_since_yield += 1;
        Ok(root.work(ws))
    }

    /// Explicit yield, e.g. between `getMore` batches under `YieldManual`.
    pub fn yield_now(
        &mut self,
        root: &mut dyn Stage,
        ws: &mut WorkingSet,
        ru: &mut dyn RecoveryUnit,
        ctx: &OperationContext,
    ) -> Result<(), Status> {
        save_tree(root);
        ru.establish_snapshot();
        ctx.check_for_interrupt()?;
        restore_tree(root, ws)?;
        self.calls_since_yield = 0;
        self.last_yield = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_yield_policy_never_yields() {
        let exec = PlanExecutor::new(YieldPolicy::NoYield);
        assert!(!exec.should_yield());
    }

    #[test]
    fn auto_yield_triggers_after_the_work_cycle_budget() {
        let mut exec = PlanExecutor::new(YieldPolicy::YieldAuto);
        exec.calls_since_yield = exec.work_cycles_per_yield;
        assert!(exec.should_yield());
    }

    #[test]
    fn manual_yield_policy_never_yields_implicitly() {
        let exec = PlanExecutor::new(YieldPolicy::YieldManual);
        assert!(!exec.should_yield());
    }
}
