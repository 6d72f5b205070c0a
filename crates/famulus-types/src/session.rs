//! Session records grouping interactions.

use serde::{Deserialize, Serialize};

/// A bounded grouping of interactions bracketed by explicit start/end calls.
///
/// `interaction_count` is recomputed when the session is closed; it stays 0
/// while the session is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Time-and-random derived token, e.g. `session_20250101_120000_a1b2c3d4`.
    pub id: String,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub interaction_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl SessionRecord {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}
