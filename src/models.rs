use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Backend-assigned lead identifier.
pub type LeadId = i64;

// ============ Lead ============

/// A prospective customer record as delivered by the backend.
///
/// The client treats `name`, `company`, `industry`, `needs` and `budget` as
/// read-only. `score`, `stage` and `last_message` change through the lifecycle
/// controller's targeted patches. Fields the client does not know about are kept
/// in `extra` so a round-tripped record keeps the server's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Unique identifier for the lead.
    pub id: LeadId,
    /// Contact name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Company the contact works for.
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    /// Industry sector.
    #[serde(default, deserialize_with = "null_as_default")]
    pub industry: String,
    /// Budget as delivered: a JSON number or a text value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Value>,
    /// Free-text description of what the lead needs.
    #[serde(default, deserialize_with = "null_as_default")]
    pub needs: String,
    /// Qualification score, absent until first computed.
    #[serde(default)]
    pub score: Option<f64>,
    /// Pipeline stage, absent means the lead has not been staged yet.
    #[serde(default)]
    pub stage: Option<Stage>,
    /// Most recent generated outreach message.
    #[serde(default)]
    pub last_message: Option<String>,
    /// Free-text interaction history.
    #[serde(default)]
    pub interaction_log: Option<String>,
    /// Fields the backend sent that this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Lead {
    /// Creates a lead with only descriptive fields set. Mostly useful in tests.
    pub fn new(id: LeadId, name: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            company: company.into(),
            industry: String::new(),
            budget: None,
            needs: String::new(),
            score: None,
            stage: None,
            last_message: None,
            interaction_log: None,
            extra: Map::new(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============ Stage ============

/// Pipeline position of a lead.
///
/// Unknown stage names coming from the backend are carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stage {
    PotentialLead,
    ReachedOut,
    ResponseReceived,
    Other(String),
}

impl Stage {
    pub fn as_str(&self) -> &str {
        match self {
            Stage::PotentialLead => "potential_lead",
            Stage::ReachedOut => "reached_out",
            Stage::ResponseReceived => "response_received",
            Stage::Other(raw) => raw,
        }
    }

    /// Human-readable label. Unknown stages are shown as-is.
    pub fn label(&self) -> &str {
        match self {
            Stage::PotentialLead => "Potential Lead",
            Stage::ReachedOut => "Reached Out",
            Stage::ResponseReceived => "Response Received",
            Stage::Other(raw) => raw,
        }
    }
}

impl From<String> for Stage {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "potential_lead" => Stage::PotentialLead,
            "reached_out" => Stage::ReachedOut,
            "response_received" => Stage::ResponseReceived,
            _ => Stage::Other(raw),
        }
    }
}

impl From<&str> for Stage {
    fn from(raw: &str) -> Self {
        Stage::from(raw.to_string())
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Interactions ============

/// Direction of a recorded communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// Stage a lead moves to once an interaction in this direction is recorded.
    ///
    /// Applies regardless of the lead's current stage.
    pub fn resulting_stage(self) -> Stage {
        match self {
            Direction::Outbound => Stage::ReachedOut,
            Direction::Inbound => Stage::ResponseReceived,
        }
    }
}

/// Pending interaction input for one lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionDraft {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub direction: Option<Direction>,
}

impl InteractionDraft {
    /// Returns the message and direction when both are present.
    pub fn ready(&self) -> Option<(&str, Direction)> {
        match self.direction {
            Some(direction) if !self.message.is_empty() => Some((self.message.as_str(), direction)),
            _ => None,
        }
    }
}

/// Body of `POST /add_interaction/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub message: String,
    pub direction: Direction,
    /// Submit time, RFC 3339 UTC with millisecond precision.
    pub timestamp: String,
}

// ============ Scoring ============

/// Weighting hints for a rescore. Values are meant to lie in `[0, 1]` but are
/// not range-checked or normalized here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs: Option<f64>,
}

impl Weights {
    /// True when at least one weight was supplied with a usable value. Zero and
    /// NaN count as not supplied.
    pub fn has_any(&self) -> bool {
        [self.budget, self.industry, self.needs]
            .iter()
            .any(|weight| matches!(weight, Some(w) if *w != 0.0 && !w.is_nan()))
    }
}

/// Body of `POST /leads/{id}/score`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRequest {
    pub weights: Weights,
}

/// Response of `POST /leads/{id}/score`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreResponse {
    #[serde(default)]
    pub score: Option<f64>,
}

// ============ Messages ============

/// Quality evaluation the backend attaches to a generated message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEvaluation {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub checks: HashMap<String, bool>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Response of `POST /leads/{id}/message`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub evaluation: Option<MessageEvaluation>,
}

// ============ Lead creation ============

/// Body of `POST /leads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub company: String,
    pub industry: String,
    pub budget: f64,
    pub needs: String,
}

/// Response of `POST /leads`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatedLead {
    pub id: LeadId,
    #[serde(default)]
    pub score: Option<f64>,
}
