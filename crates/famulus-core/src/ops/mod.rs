//! Capability modules: envelope-returning wrappers around OS and network
//! effects. Each operation converts expected failures into a
//! `success = false` envelope at its own boundary.

mod console;
mod dir;
mod external;
mod file;
mod network;
mod system;
mod workflow;

pub use console::ConsoleOps;
pub use dir::DirOps;
pub use external::ExternalOps;
pub use file::FileOps;
pub use network::NetOps;
pub use system::SystemOps;
pub use workflow::WorkflowOps;

use famulus_types::ProgressSink;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Resolve a path argument against the current directory.
pub(crate) fn absolute(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    }
}

/// Optional progress forwarding shared by long-running operations.
#[derive(Clone, Default)]
pub(crate) struct ProgressReporter {
    sink: Option<ProgressSink>,
}

impl ProgressReporter {
    pub(crate) fn set_sink(&mut self, sink: ProgressSink) {
        self.sink = Some(sink);
    }

    /// Fire-and-forget: a panicking sink is contained and logged, never
    /// aborts the operation.
    pub(crate) fn report(&self, message: &str, percent: Option<f32>) {
        tracing::debug!(target: "famulus::ops", progress = message, ?percent);
        if let Some(sink) = &self.sink {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (sink.as_ref())(message, percent)
            }));
            if outcome.is_err() {
                warn!(target: "famulus::ops", "progress sink panicked; continuing");
            }
        }
    }
}
