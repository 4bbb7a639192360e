//! Change events — the causal containers that make mutations visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LatticeId;

/// What kind of atomic mutation the event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEventType {
    Import,
    ManualEdit,
    ManualResolve,
    ScenarioDelta,
}

impl ChangeEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeEventType::Import => "import",
            ChangeEventType::ManualEdit => "manual_edit",
            ChangeEventType::ManualResolve => "manual_resolve",
            ChangeEventType::ScenarioDelta => "scenario_delta",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(ChangeEventType::Import),
            "manual_edit" => Some(ChangeEventType::ManualEdit),
            "manual_resolve" => Some(ChangeEventType::ManualResolve),
            "scenario_delta" => Some(ChangeEventType::ScenarioDelta),
            _ => None,
        }
    }
}

/// Who caused a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    User(String),
    System(String),
}

impl Actor {
    pub fn type_str(&self) -> &'static str {
        match self {
            Actor::User(_) => "user",
            Actor::System(_) => "system",
        }
    }

    pub fn id_str(&self) -> &str {
        match self {
            Actor::User(s) | Actor::System(s) => s,
        }
    }

    pub fn from_parts(actor_type: &str, actor_id: &str) -> Self {
        match actor_type {
            "user" => Actor::User(actor_id.to_string()),
            _ => Actor::System(actor_id.to_string()),
        }
    }
}

/// Counters summarizing the mutation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    pub created: u64,
    pub closed: u64,
    pub unchanged: u64,
}

/// Exactly one per ingestion run; exactly one per other atomic mutation.
/// Immutable after completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: LatticeId,
    pub workspace_id: String,
    pub event_type: ChangeEventType,
    pub ts: DateTime<Utc>,
    pub actor: Actor,
    pub stats: EventStats,
    /// Human-readable summary of the batch.
    pub descr: String,
}
