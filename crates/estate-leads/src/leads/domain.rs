use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier wrapper for leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// Identifier wrapper for agents (users who can be assigned leads).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

/// Identifier wrapper for the owning tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgencyId(pub String);

/// Identifier wrapper for any authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for agency-scoped status options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusId(pub String);

/// Status pipeline position for a lead.
///
/// Any status may transition to any other; side effects differ by target.
/// Agencies can extend the built-in set, so unknown keys round-trip through
/// the `Custom` variant instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeadStatus {
    New,
    Contacted,
    AppointmentScheduled,
    Negotiation,
    Won,
    Lost,
    Custom(String),
}

impl LeadStatus {
    pub fn key(&self) -> &str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::AppointmentScheduled => "appointment_scheduled",
            LeadStatus::Negotiation => "negotiation",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
            LeadStatus::Custom(key) => key,
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key {
            "new" => LeadStatus::New,
            "contacted" => LeadStatus::Contacted,
            "appointment_scheduled" => LeadStatus::AppointmentScheduled,
            "negotiation" => LeadStatus::Negotiation,
            "won" => LeadStatus::Won,
            "lost" => LeadStatus::Lost,
            other => LeadStatus::Custom(other.to_string()),
        }
    }
}

impl From<String> for LeadStatus {
    fn from(value: String) -> Self {
        LeadStatus::from_key(&value)
    }
}

impl From<LeadStatus> for String {
    fn from(value: LeadStatus) -> Self {
        value.key().to_string()
    }
}

/// A sales prospect tracked through the status pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub agency_id: AgencyId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: LeadStatus,
    pub assigned_to: Option<AgentId>,
    pub is_urgent: bool,
    /// Stamped on the first transition away from `New` (or an explicit
    /// contact action) and never overwritten afterwards; feeds response-time
    /// reporting.
    pub first_contacted_at: Option<DateTime<Utc>>,
    /// Only meaningful while `status` is `AppointmentScheduled`.
    pub appointment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Kind discriminator for audit-log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    StatusChange,
    NoteAdded,
}

/// Immutable audit-log entry attached to a lead. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub lead_id: LeadId,
    pub kind: ActivityKind,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// Free-text entry authored by a user; always paired with a `NoteAdded`
/// activity for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub lead_id: LeadId,
    pub author: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Poll-delivered notification row. Mutated only by mark-all-read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub message: String,
    pub link: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Agency-scoped status display metadata.
///
/// Invariant: at most one option per agency carries `is_last_step = true`;
/// flipping it on one option atomically clears the siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusOption {
    pub id: StatusId,
    pub agency_id: AgencyId,
    pub name: String,
    pub translation: String,
    pub color: String,
    pub order: u32,
    pub is_last_step: bool,
}

/// Countable plan-limited resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Users,
    Prospects,
    Properties,
}

impl Resource {
    pub const fn noun(self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Prospects => "prospects",
            Resource::Properties => "properties",
        }
    }
}

/// Plan limits and trial window for an agency. At most one active per agency.
/// A limit of `-1` means unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub agency_id: AgencyId,
    pub users_limit: i64,
    pub prospects_limit: i64,
    pub properties_limit: i64,
    pub trial_start: DateTime<Utc>,
    pub trial_end: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn limit_for(&self, resource: Resource) -> i64 {
        match resource {
            Resource::Users => self.users_limit,
            Resource::Prospects => self.prospects_limit,
            Resource::Properties => self.properties_limit,
        }
    }
}

/// Caller role resolved by the upstream session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Manager,
    Member,
}

impl Role {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(Role::Owner),
            "manager" => Some(Role::Manager),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    /// The most restricted role cannot hard-delete leads.
    pub const fn can_delete(self) -> bool {
        !matches!(self, Role::Member)
    }
}

/// Pre-resolved identity attached to every request. The engine never performs
/// authentication itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: UserId,
    pub role: Role,
    pub agency_id: AgencyId,
}

/// Wall-clock seam so trial expiry and audit timestamps are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Three-state field patch distinguishing "leave untouched" from "clear".
///
/// Serde mapping: an absent field deserializes to `Keep` (via
/// `#[serde(default)]` on the containing struct), an explicit `null` to
/// `Clear`, and a value to `Set`.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    /// Resolve against the current value of a nullable field.
    pub fn resolve(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Keep => current,
            Patch::Clear => None,
            Patch::Set(value) => Some(value),
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

/// Partial update for a lead: absent fields are untouched, explicit `null`
/// clears a nullable field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeadPatch {
    pub name: Option<String>,
    pub email: Patch<String>,
    pub phone: Patch<String>,
    pub status: Option<LeadStatus>,
    pub assigned_to: Patch<AgentId>,
    pub is_urgent: Option<bool>,
    pub appointment_date: Patch<DateTime<Utc>>,
}

/// Intake payload for a new lead.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLead {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<AgentId>,
    #[serde(default)]
    pub is_urgent: bool,
}
