//! Remote relationship graph: cached edges and the read models derived
//! from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A directed, typed relationship mirrored from the remote authority.
///
/// Uniqueness is on `(source, target, type)`; re-syncing an identical edge
/// replaces the row and refreshes `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub updated_at: String,
}

/// A resource a project uses, with the purpose the edge carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceUse {
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// Aggregated context for a project, computed from the edge snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub related_projects: Vec<String>,
    pub configurations: Vec<String>,
    pub resources: Vec<ResourceUse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// Projects and configurations grouped under one workspace node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceGroup {
    pub projects: Vec<String>,
    pub configurations: Vec<String>,
}

/// Result of a single remote fetch. Network and parse failures are
/// captured in `error`, never raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFetch {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RemoteFetch {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Result of a graph sync attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub synced_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    pub fn synced(count: usize) -> Self {
        Self {
            success: true,
            synced_count: count,
            message: Some(format!("Synced {count} edges")),
            error: None,
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: true,
            synced_count: 0,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            synced_count: 0,
            message: None,
            error: Some(error.into()),
        }
    }
}
