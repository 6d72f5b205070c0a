//! Multi-step orchestration: sequential shell pipelines with progress
//! reporting.

use famulus_types::{OpOutcome, ProgressSink};
use serde_json::json;
use tracing::info;

use super::{ProgressReporter, SystemOps};

/// Per-step timeout for pipeline commands.
const STEP_TIMEOUT_SECS: u64 = 300;

#[derive(Default)]
pub struct WorkflowOps {
    system: SystemOps,
    progress: ProgressReporter,
}

impl WorkflowOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback receiving `(message, percent)` updates while a
    /// pipeline runs.
    pub fn set_progress_sink(&mut self, sink: ProgressSink) {
        self.progress.set_sink(sink);
    }

    /// Run shell steps in order. The first failing step aborts the
    /// pipeline; completed steps are reported in the envelope's progress
    /// list either way.
    pub fn run_pipeline(&self, name: &str, steps: &[String]) -> OpOutcome {
        if steps.is_empty() {
            return OpOutcome::fail(format!("Pipeline '{name}' has no steps"));
        }
        info!(target: "famulus::ops", pipeline = name, steps = steps.len(), "pipeline started");

        let total = steps.len();
        let mut outcome = OpOutcome::ok(String::new());

        for (index, step) in steps.iter().enumerate() {
            let percent = (index as f32 / total as f32) * 100.0;
            let note = format!("step {}/{total}: {step}", index + 1);
            self.progress.report(&note, Some(percent));
            outcome.push_progress(&note, Some(percent));

            let result = self.system.run_command(step, STEP_TIMEOUT_SECS);
            if !result.success {
                let message = format!(
                    "Pipeline '{name}' failed at step {}/{total} ({step}): {}",
                    index + 1,
                    result.message
                );
                self.progress.report(&message, Some(percent));
                let mut failed = OpOutcome::fail(message);
                failed.progress = outcome.progress;
                failed.data = Some(json!({"failed_step": index + 1, "total_steps": total}));
                return failed;
            }
        }

        self.progress.report("pipeline complete", Some(100.0));
        outcome.push_progress("pipeline complete", Some(100.0));
        outcome.message = format!("Pipeline '{name}' completed {total} steps");
        outcome.data = Some(json!({"total_steps": total}));
        outcome
    }
}
