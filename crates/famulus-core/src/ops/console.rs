//! Optional interactive-console subsystem.
//!
//! Absence is a first-class constructed state: on a headless host `new`
//! fails with a descriptive cause, the router records it, and the cause is
//! surfaced only when a caller actually requests the console.

use famulus_types::OpOutcome;
use std::io::IsTerminal;

use crate::{CoreError, Result};

pub struct ConsoleOps {
    _private: (),
}

impl ConsoleOps {
    /// Fails when stdin is not attached to a terminal.
    pub fn new() -> Result<Self> {
        if !std::io::stdin().is_terminal() {
            return Err(CoreError::SubsystemUnavailable(
                "interactive console requires a terminal (stdin is not a TTY)".to_string(),
            ));
        }
        Ok(Self { _private: () })
    }

    /// Announce console availability to the caller.
    pub fn launch(&self) -> OpOutcome {
        OpOutcome::ok(format!(
            "Interactive console ready on {} terminal",
            std::env::consts::OS
        ))
    }
}
