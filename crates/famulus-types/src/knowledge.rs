//! Learned knowledge entries.

use serde::{Deserialize, Serialize};

/// Where a knowledge entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    /// Stored directly while handling an interaction.
    Interaction,
    /// Derived by the learning heuristics.
    Learned,
    /// Stored explicitly by an operator.
    Manual,
}

impl KnowledgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interaction => "interaction",
            Self::Learned => "learned",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for KnowledgeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interaction" => Ok(Self::Interaction),
            "learned" => Ok(Self::Learned),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown knowledge source: {other}")),
        }
    }
}

/// A fact or preference keyed by a derived hash or semantic name.
///
/// Entries are upserted by key with insert-or-replace semantics: the most
/// recent store wins on every column, including `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Advisory confidence in [0, 1]; not enforced.
    pub confidence: f64,
    pub created_at: String,
    pub updated_at: String,
    pub source: KnowledgeSource,
}
