//! Lifecycle-managed agent contract.
//!
//! Every agent carries a shelf life: a bounded number of supervised runs
//! before the instance disables itself. The bound is a safety valve against
//! runaway unattended execution; it trips on call count, not on time.

use famulus_types::{RunOutcome, TaskContext, TaskRequest};
use tracing::{error, info, warn};

use crate::{CoreError, Result};

/// Run-count lifecycle counter for a single agent instance.
#[derive(Debug, Clone)]
pub struct ShelfLife {
    max_runs: u32,
    run_count: u32,
    expired: bool,
}

impl ShelfLife {
    /// `max_runs` must be positive; zero is a fatal misconfiguration.
    pub fn new(max_runs: u32) -> Result<Self> {
        if max_runs == 0 {
            return Err(CoreError::Config(
                "max_runs must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_runs,
            run_count: 0,
            expired: false,
        })
    }

    pub fn max_runs(&self) -> u32 {
        self.max_runs
    }

    pub fn run_count(&self) -> u32 {
        self.run_count
    }

    pub fn remaining_runs(&self) -> u32 {
        self.max_runs.saturating_sub(self.run_count)
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Clear the counter and expiry; optionally update the allowed run
    /// count, subject to the same positivity constraint.
    pub fn reset(&mut self, new_max: Option<u32>) -> Result<()> {
        if let Some(max) = new_max {
            if max == 0 {
                return Err(CoreError::Config(
                    "max_runs must be greater than zero".to_string(),
                ));
            }
            self.max_runs = max;
        }
        self.run_count = 0;
        self.expired = false;
        Ok(())
    }

    /// Record one completed invocation. Returns true when this increment
    /// crossed the limit (the one-time expiry transition).
    fn record_run(&mut self) -> bool {
        self.run_count += 1;
        if !self.expired && self.run_count >= self.max_runs {
            self.expired = true;
            return true;
        }
        false
    }
}

/// The polymorphic agent execution contract.
///
/// Implementors provide `run`; callers invoke `safe_run`, which wraps every
/// invocation with the expiry check, entry/exit logging, error containment,
/// and run-count bookkeeping.
pub trait Agent {
    fn name(&self) -> &str;

    fn shelf_life(&self) -> &ShelfLife;

    fn shelf_life_mut(&mut self) -> &mut ShelfLife;

    /// Execute one task. Errors are contained by `safe_run`; they never
    /// mark the agent expired.
    fn run(&mut self, task: &TaskRequest, ctx: &TaskContext) -> Result<String>;

    /// Supervised execution: expiry check, logging, containment, counting.
    fn safe_run(&mut self, task: &TaskRequest, ctx: &TaskContext) -> RunOutcome {
        if self.shelf_life().is_expired() {
            let runs = self.shelf_life().run_count();
            warn!(
                target: "famulus::agent",
                agent = self.name(),
                runs,
                "shelf life exhausted; refusing run"
            );
            return RunOutcome::Expired { runs };
        }

        let run_number = self.shelf_life().run_count() + 1;
        info!(
            target: "famulus::agent",
            agent = self.name(),
            run = run_number,
            task = %task.describe(),
            "starting run"
        );

        let result = self.run(task, ctx);

        // Counted on every outcome, success or failure.
        if self.shelf_life_mut().record_run() {
            info!(
                target: "famulus::agent",
                agent = self.name(),
                runs = self.shelf_life().run_count(),
                "shelf life reached; future runs will be blocked"
            );
        }

        match result {
            Ok(response) => {
                info!(
                    target: "famulus::agent",
                    agent = self.name(),
                    run = run_number,
                    "run completed"
                );
                RunOutcome::Completed { response }
            }
            Err(e) => {
                error!(
                    target: "famulus::agent",
                    agent = self.name(),
                    run = run_number,
                    error = %e,
                    "run failed"
                );
                RunOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Agent whose runs follow a script of pass/fail outcomes.
    struct ScriptedAgent {
        shelf: ShelfLife,
        script: Vec<bool>,
        executed: usize,
    }

    impl ScriptedAgent {
        fn new(max_runs: u32, script: Vec<bool>) -> Self {
            Self {
                shelf: ShelfLife::new(max_runs).unwrap(),
                script,
                executed: 0,
            }
        }
    }

    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            "scripted"
        }

        fn shelf_life(&self) -> &ShelfLife {
            &self.shelf
        }

        fn shelf_life_mut(&mut self) -> &mut ShelfLife {
            &mut self.shelf
        }

        fn run(&mut self, _task: &TaskRequest, _ctx: &TaskContext) -> Result<String> {
            let ok = self.script.get(self.executed).copied().unwrap_or(true);
            self.executed += 1;
            if ok {
                Ok("done".to_string())
            } else {
                Err(CoreError::Config("scripted failure".to_string()))
            }
        }
    }

    fn task() -> TaskRequest {
        TaskRequest::Text("do the thing".to_string())
    }

    #[test]
    fn test_zero_max_runs_rejected_at_construction() {
        assert!(ShelfLife::new(0).is_err());
        assert!(ShelfLife::new(1).is_ok());
    }

    #[test]
    fn test_expires_after_exactly_max_runs() {
        let mut agent = ScriptedAgent::new(3, vec![true, true, true]);
        let ctx = TaskContext::default();

        for _ in 0..3 {
            assert!(matches!(
                agent.safe_run(&task(), &ctx),
                RunOutcome::Completed { .. }
            ));
        }
        assert_eq!(agent.shelf_life().remaining_runs(), 0);
        assert!(agent.shelf_life().is_expired());

        // The fourth call is rejected without executing the work.
        let executed_before = agent.executed;
        assert_eq!(agent.safe_run(&task(), &ctx), RunOutcome::Expired { runs: 3 });
        assert_eq!(agent.executed, executed_before);
    }

    #[test]
    fn test_failures_count_against_shelf_life() {
        let mut agent = ScriptedAgent::new(2, vec![false, false]);
        let ctx = TaskContext::default();

        assert!(matches!(
            agent.safe_run(&task(), &ctx),
            RunOutcome::Failed { .. }
        ));
        assert_eq!(agent.shelf_life().run_count(), 1);
        assert!(!agent.shelf_life().is_expired());

        assert!(matches!(
            agent.safe_run(&task(), &ctx),
            RunOutcome::Failed { .. }
        ));
        assert!(agent.shelf_life().is_expired());
    }

    #[test]
    fn test_error_containment_returns_failed_not_err() {
        let mut agent = ScriptedAgent::new(5, vec![false, true]);
        let ctx = TaskContext::default();

        match agent.safe_run(&task(), &ctx) {
            RunOutcome::Failed { message } => assert!(message.contains("scripted failure")),
            other => panic!("expected failure, got {other:?}"),
        }
        // The instance stays usable after a failure.
        assert!(matches!(
            agent.safe_run(&task(), &ctx),
            RunOutcome::Completed { .. }
        ));
    }

    #[test]
    fn test_reset_restores_full_shelf_life() {
        let mut agent = ScriptedAgent::new(1, vec![true, true]);
        let ctx = TaskContext::default();

        agent.safe_run(&task(), &ctx);
        assert!(agent.shelf_life().is_expired());

        agent.shelf_life_mut().reset(None).unwrap();
        assert!(!agent.shelf_life().is_expired());
        assert_eq!(agent.shelf_life().remaining_runs(), 1);
        assert!(matches!(
            agent.safe_run(&task(), &ctx),
            RunOutcome::Completed { .. }
        ));
    }

    #[test]
    fn test_reset_with_new_max() {
        let mut shelf = ShelfLife::new(2).unwrap();
        shelf.reset(Some(5)).unwrap();
        assert_eq!(shelf.max_runs(), 5);
        assert!(shelf.reset(Some(0)).is_err());
    }

    proptest! {
        /// Regardless of which runs succeed or fail, after max_runs
        /// invocations the agent is expired and executes nothing further.
        #[test]
        fn prop_shelf_life_bounds_executions(
            max_runs in 1u32..8,
            script in proptest::collection::vec(any::<bool>(), 0..16),
        ) {
            let mut agent = ScriptedAgent::new(max_runs, script);
            let ctx = TaskContext::default();

            for _ in 0..12 {
                agent.safe_run(&task(), &ctx);
            }

            prop_assert!(agent.shelf_life().is_expired());
            prop_assert_eq!(agent.executed as u32, max_runs);
            prop_assert_eq!(agent.shelf_life().remaining_runs(), 0);
        }
    }
}
