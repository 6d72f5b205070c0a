//! Task requests, structured directives, and agent run outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::InteractionChannel;

/// Optional side-channel accompanying a task (originating caller, channel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub channel: InteractionChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Default for TaskContext {
    fn default() -> Self {
        Self {
            channel: InteractionChannel::Api,
            origin: None,
        }
    }
}

/// Parameters for a self-diagnosis sweep. All fields are optional; the
/// router resolves every one of them before the first check runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnoseParams {
    /// URL reachable only through the local anonymizing proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_memory_url: Option<String>,
}

/// A structured directive recognized by value: the trusted fast-path that
/// bypasses free-text interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    ShowConsole,
    SelfDiagnose(DiagnoseParams),
    SyncGraph { url: Option<String>, force: bool },
    QueryGraph {
        source: Option<String>,
        target: Option<String>,
        edge_type: Option<String>,
    },
    ProjectContext { project: String },
    WorkspaceOverview,
    TrainFromHistory { days_back: i64 },
    MemoryStats,
    EndSession,
}

/// A task handed to the router: either a recognized structured directive or
/// free text to be interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    Directive(Directive),
    Text(String),
}

impl TaskRequest {
    /// Parse a task from raw text. Text that is a JSON object with a
    /// recognized `task` field becomes a directive; everything else is
    /// treated as free text.
    pub fn parse(raw: &str) -> Self {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            if value.is_object() {
                return Self::from_value(&value);
            }
        }
        Self::Text(raw.to_string())
    }

    /// Parse a task from a JSON value of the shape
    /// `{"task": "...", "parameters": {...}}`.
    pub fn from_value(value: &Value) -> Self {
        let Some(name) = value.get("task").and_then(Value::as_str) else {
            return Self::Text(value.to_string());
        };
        let params = value.get("parameters").cloned().unwrap_or(Value::Null);

        let directive = match name {
            "show_console" => Directive::ShowConsole,
            "self_diagnose" => Directive::SelfDiagnose(DiagnoseParams {
                proxied_url: str_param(&params, "proxied_url"),
                proxy_host: str_param(&params, "proxy_host"),
                proxy_port: params
                    .get("proxy_port")
                    .and_then(Value::as_u64)
                    .map(|p| p as u16),
                remote_memory_url: str_param(&params, "remote_memory_url"),
            }),
            "sync_graph" => Directive::SyncGraph {
                url: str_param(&params, "url"),
                force: params
                    .get("force")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
            "query_graph" => Directive::QueryGraph {
                source: str_param(&params, "source"),
                target: str_param(&params, "target"),
                edge_type: str_param(&params, "type"),
            },
            "project_context" => match str_param(&params, "project") {
                Some(project) => Directive::ProjectContext { project },
                None => return Self::Text(value.to_string()),
            },
            "workspace_overview" => Directive::WorkspaceOverview,
            "train_from_history" => Directive::TrainFromHistory {
                days_back: params
                    .get("days_back")
                    .and_then(Value::as_i64)
                    .unwrap_or(30),
            },
            "memory_stats" => Directive::MemoryStats,
            "end_session" => Directive::EndSession,
            _ => return Self::Text(value.to_string()),
        };
        Self::Directive(directive)
    }

    /// The text to record as `user_input` when logging the dispatch.
    pub fn describe(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Directive(d) => format!("{d:?}"),
        }
    }
}

fn str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Outcome of one supervised agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { response: String },
    /// Shelf life exhausted; the task was not executed.
    Expired { runs: u32 },
    /// The underlying run failed; the agent remains usable.
    Failed { message: String },
}

impl RunOutcome {
    /// Human-readable rendering for string-returning callers.
    pub fn into_text(self) -> String {
        match self {
            Self::Completed { response } => response,
            Self::Expired { runs } => {
                format!("Agent shelf life exhausted after {runs} runs; reset required")
            }
            Self::Failed { message } => format!("Agent error: {message}"),
        }
    }
}

/// Point-in-time counters over the memory store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_interactions: i64,
    pub active_sessions: i64,
    pub knowledge_entries: i64,
    /// Interactions logged since local midnight.
    pub recent_interactions: i64,
}

/// Result of replaying history through the learning heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub interactions_processed: usize,
    pub patterns_learned: usize,
    pub training_period_days: i64,
}

/// Combined learning statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStats {
    #[serde(flatten)]
    pub stats: MemoryStats,
    /// successful / total, 0 when the log is empty.
    pub success_rate: f64,
    pub user_preferences: usize,
    pub pattern_categories: BTreeMap<String, i64>,
    pub learning_active: bool,
}
