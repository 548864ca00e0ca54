use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// A student taking part in a matching run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Candidate {
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(default)]
    pub interests: Vec<String>,
    pub grade: u8,
    #[validate(length(min = 1))]
    #[serde(rename = "organizationId")]
    pub organization_id: String,
}

impl Candidate {
    pub fn new(id: &str, grade: u8, interests: &[&str], organization_id: &str) -> Self {
        Self {
            id: id.to_string(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            grade,
            organization_id: organization_id.to_string(),
        }
    }
}

/// A computed one-to-one candidate pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    #[serde(rename = "candidateA")]
    pub candidate_a: String,
    #[serde(rename = "candidateB")]
    pub candidate_b: String,
    #[serde(rename = "sharedInterests")]
    pub shared_interests: Vec<String>,
    pub score: u32,
}

impl Match {
    /// Whether the match involves the given candidate on either side
    pub fn involves(&self, candidate_id: &str) -> bool {
        self.candidate_a == candidate_id || self.candidate_b == candidate_id
    }
}

/// Organization lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "organization_status", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Collecting,
    Ready,
    Matched,
    Corresponding,
    Done,
}

impl Default for Status {
    fn default() -> Self {
        Status::Collecting
    }
}

/// Storage tag for the kind of entity a counterpart column points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "counterpart_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CounterpartKind {
    Organization,
    Group,
}

/// Address of a pairable entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    Organization(String),
    Group(String),
}

impl EntityRef {
    pub fn organization(id: impl Into<String>) -> Self {
        EntityRef::Organization(id.into())
    }

    pub fn group(id: impl Into<String>) -> Self {
        EntityRef::Group(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            EntityRef::Organization(id) | EntityRef::Group(id) => id,
        }
    }

    pub fn kind(&self) -> CounterpartKind {
        match self {
            EntityRef::Organization(_) => CounterpartKind::Organization,
            EntityRef::Group(_) => CounterpartKind::Group,
        }
    }

    /// The counterpart reference that points at this entity
    pub fn as_counterpart(&self) -> CounterpartRef {
        match self {
            EntityRef::Organization(id) => CounterpartRef::Organization(id.clone()),
            EntityRef::Group(id) => CounterpartRef::Group(id.clone()),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Organization(id) => write!(f, "organization:{}", id),
            EntityRef::Group(id) => write!(f, "group:{}", id),
        }
    }
}

/// Who an organization or group is paired with
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CounterpartRef {
    #[default]
    None,
    Organization(String),
    Group(String),
}

impl CounterpartRef {
    pub fn is_none(&self) -> bool {
        matches!(self, CounterpartRef::None)
    }

    /// The entity this reference points at, if any
    pub fn entity(&self) -> Option<EntityRef> {
        match self {
            CounterpartRef::None => None,
            CounterpartRef::Organization(id) => Some(EntityRef::Organization(id.clone())),
            CounterpartRef::Group(id) => Some(EntityRef::Group(id.clone())),
        }
    }

    /// Rebuild a reference from its two storage columns.
    ///
    /// A kind without an id (or the reverse) is rejected; the schema's CHECK
    /// constraint should make that unreachable.
    pub fn from_columns(kind: Option<CounterpartKind>, id: Option<String>) -> Option<Self> {
        match (kind, id) {
            (None, None) => Some(CounterpartRef::None),
            (Some(CounterpartKind::Organization), Some(id)) => Some(CounterpartRef::Organization(id)),
            (Some(CounterpartKind::Group), Some(id)) => Some(CounterpartRef::Group(id)),
            _ => None,
        }
    }

    /// Split into the two storage columns
    pub fn to_columns(&self) -> (Option<CounterpartKind>, Option<&str>) {
        match self {
            CounterpartRef::None => (None, None),
            CounterpartRef::Organization(id) => (Some(CounterpartKind::Organization), Some(id)),
            CounterpartRef::Group(id) => (Some(CounterpartKind::Group), Some(id)),
        }
    }
}

impl fmt::Display for CounterpartRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity() {
            Some(entity) => entity.fmt(f),
            None => f.write_str("none"),
        }
    }
}

/// A school (or similar) whose students are matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub status: Status,
    #[serde(rename = "groupId", default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub counterpart: CounterpartRef,
}

impl Organization {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: Status::default(),
            group_id: None,
            counterpart: CounterpartRef::None,
        }
    }
}

/// A cluster of organizations paired as a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub counterpart: CounterpartRef,
}

impl Group {
    pub fn new(id: &str, members: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            members: members.iter().map(|s| s.to_string()).collect(),
            counterpart: CounterpartRef::None,
        }
    }
}

/// Proof that two candidates have received each other's contact details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    #[serde(rename = "candidateA")]
    pub candidate_a: String,
    #[serde(rename = "candidateB")]
    pub candidate_b: String,
    #[serde(rename = "assignedAt")]
    pub assigned_at: chrono::DateTime<chrono::Utc>,
}

/// Where an organization or group sits in the pairing lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "counterpart", rename_all = "lowercase")]
pub enum PairingState {
    Unpaired,
    Paired(CounterpartRef),
    /// Correspondence has begun; the pairing can no longer be undone
    Locked(CounterpartRef),
}

/// Points awarded by the compatibility scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    pub shared_interest: u32,
    pub same_grade: u32,
    pub adjacent_grade: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            shared_interest: 10,
            same_grade: 5,
            adjacent_grade: 2,
        }
    }
}
