//! The uniform result envelope returned by every capability operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A single incremental status update from a long-running operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNote {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f32>,
}

/// Caller-supplied progress callback. Invoked fire-and-forget; operations
/// never depend on the sink having run.
pub type ProgressSink = Arc<dyn Fn(&str, Option<f32>) + Send + Sync>;

/// Uniform success/message/data container for capability operations.
///
/// Expected failures are converted into a `success = false` envelope at the
/// operation boundary; only genuinely unexpected conditions propagate as
/// errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpOutcome {
    pub success: bool,
    pub message: String,
    /// Structured payload for programmatic consumers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Ordered progress updates accumulated while the operation ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub progress: Vec<ProgressNote>,
}

impl OpOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            progress: Vec::new(),
        }
    }

    pub fn ok_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            progress: Vec::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            progress: Vec::new(),
        }
    }

    /// Append a progress note to the envelope.
    pub fn push_progress(&mut self, message: impl Into<String>, percent: Option<f32>) {
        self.progress.push(ProgressNote {
            message: message.into(),
            percent,
        });
    }
}

impl std::fmt::Display for OpOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_constructors() {
        let ok = OpOutcome::ok("done");
        assert!(ok.success);
        assert!(ok.data.is_none());

        let fail = OpOutcome::fail("nope");
        assert!(!fail.success);
        assert_eq!(fail.message, "nope");
    }

    #[test]
    fn test_progress_accumulates_in_order() {
        let mut outcome = OpOutcome::ok("working");
        outcome.push_progress("step 1", Some(25.0));
        outcome.push_progress("step 2", None);

        assert_eq!(outcome.progress.len(), 2);
        assert_eq!(outcome.progress[0].message, "step 1");
        assert_eq!(outcome.progress[1].percent, None);
    }
}
