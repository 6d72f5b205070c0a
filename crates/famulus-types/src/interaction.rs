//! Interaction records: one logged request/response exchange.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel an interaction originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionChannel {
    Gui,
    Cli,
    Api,
    Internal,
}

impl InteractionChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gui => "gui",
            Self::Cli => "cli",
            Self::Api => "api",
            Self::Internal => "internal",
        }
    }
}

impl std::str::FromStr for InteractionChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gui" => Ok(Self::Gui),
            "cli" => Ok(Self::Cli),
            "api" => Ok(Self::Api),
            "internal" => Ok(Self::Internal),
            other => Err(format!("unknown interaction channel: {other}")),
        }
    }
}

/// A logged request/response exchange. Immutable once written; the
/// interactions table is an append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    /// Local naive ISO-8601 timestamp, as stored.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub channel: InteractionChannel,
    /// Dispatch method ("chat", "action", "self_diagnose", ...).
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_response: Option<String>,
    /// Ordered action descriptors executed during the exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions_executed: Option<Vec<Value>>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Borrowed view of an interaction about to be inserted.
#[derive(Debug, Clone, Copy)]
pub struct NewInteraction<'a> {
    pub channel: InteractionChannel,
    pub method: &'a str,
    pub user_input: Option<&'a str>,
    pub agent_response: Option<&'a str>,
    pub actions_executed: Option<&'a [Value]>,
    pub success: bool,
    pub error_message: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub metadata: Option<&'a Value>,
}

impl<'a> NewInteraction<'a> {
    /// A successful interaction with no payload yet.
    pub fn new(channel: InteractionChannel, method: &'a str) -> Self {
        Self {
            channel,
            method,
            user_input: None,
            agent_response: None,
            actions_executed: None,
            success: true,
            error_message: None,
            session_id: None,
            metadata: None,
        }
    }

    pub fn input(mut self, input: &'a str) -> Self {
        self.user_input = Some(input);
        self
    }

    pub fn response(mut self, response: &'a str) -> Self {
        self.agent_response = Some(response);
        self
    }

    pub fn session(mut self, session_id: &'a str) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn actions(mut self, actions: &'a [Value]) -> Self {
        self.actions_executed = Some(actions);
        self
    }

    pub fn failed(mut self, error: &'a str) -> Self {
        self.success = false;
        self.error_message = Some(error);
        self
    }

    pub fn metadata(mut self, metadata: &'a Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
