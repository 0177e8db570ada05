use serde::Serialize;

use super::domain::{
    Activity, AgencyId, AgentId, Lead, LeadId, Note, Notification, Resource, StatusId,
    StatusOption, Subscription, UserId,
};

/// Audit rows riding the same unit of work as a lead mutation. A status
/// change is never persisted without its activity entry, and vice versa.
#[derive(Debug, Default)]
pub struct AuditTrail {
    pub activities: Vec<Activity>,
    pub notes: Vec<Note>,
    pub notifications: Vec<Notification>,
}

/// Storage abstraction for leads. Every read and write is agency-scoped;
/// an id owned by another tenant behaves exactly like an absent one.
pub trait LeadRepository: Send + Sync {
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError>;
    fn fetch(&self, agency: &AgencyId, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    /// Resolves the requested ids within the agency; foreign or unknown ids
    /// are silently dropped from the result.
    fn fetch_many(&self, agency: &AgencyId, ids: &[LeadId]) -> Result<Vec<Lead>, RepositoryError>;
    /// Persists the updated lead together with its audit trail as one atomic
    /// unit of work.
    fn commit(&self, lead: Lead, trail: AuditTrail) -> Result<Lead, RepositoryError>;
    /// All-or-nothing hard delete: if any id does not resolve to a lead owned
    /// by the agency, nothing is deleted and `NotFound` is returned.
    fn delete_all(&self, agency: &AgencyId, ids: &[LeadId]) -> Result<usize, RepositoryError>;
}

/// Append-only audit log reads.
pub trait ActivityRepository: Send + Sync {
    /// Activities for a lead in reverse-chronological order.
    fn for_lead(&self, agency: &AgencyId, lead: &LeadId) -> Result<Vec<Activity>, RepositoryError>;
}

/// Snapshot of a user's notification feed: the most recent rows plus the
/// unread total, read under one consistent view so polling never observes a
/// count that disagrees with the list.
#[derive(Debug, Serialize)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

pub trait NotificationRepository: Send + Sync {
    fn push(&self, notification: Notification) -> Result<(), RepositoryError>;
    fn feed(&self, user: &UserId, limit: usize) -> Result<NotificationFeed, RepositoryError>;
    /// Atomically flips every unread row for the user to read.
    fn mark_all_read(&self, user: &UserId) -> Result<(), RepositoryError>;
}

pub trait StatusOptionRepository: Send + Sync {
    /// Agency-defined options ordered by their `order` field.
    fn list(&self, agency: &AgencyId) -> Result<Vec<StatusOption>, RepositoryError>;
    /// `Conflict` when the agency already has an option with the same name.
    fn insert_option(&self, option: StatusOption) -> Result<StatusOption, RepositoryError>;
    /// Single conditional write: clears `is_last_step` on every sibling and
    /// sets it on the target. Concurrent calls can never leave two options
    /// marked as the last step.
    fn set_last_step(&self, agency: &AgencyId, id: &StatusId) -> Result<(), RepositoryError>;
}

pub trait SubscriptionRepository: Send + Sync {
    fn active(&self, agency: &AgencyId) -> Result<Option<Subscription>, RepositoryError>;
}

/// Current per-resource counts feeding plan-limit checks.
pub trait TenantUsage: Send + Sync {
    fn usage(&self, agency: &AgencyId, resource: Resource) -> Result<usize, RepositoryError>;
}

/// Everything the engine needs from one backing store.
pub trait CrmStore:
    LeadRepository
    + ActivityRepository
    + NotificationRepository
    + StatusOptionRepository
    + SubscriptionRepository
    + TenantUsage
{
}

impl<T> CrmStore for T where
    T: LeadRepository
        + ActivityRepository
        + NotificationRepository
        + StatusOptionRepository
        + SubscriptionRepository
        + TenantUsage
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound SMS/webhook collaborator notified when a lead changes hands.
/// Strictly best-effort: callers log failures and never propagate them.
pub trait AlertTransport: Send + Sync {
    fn send(&self, lead: &Lead, assignee: Option<&AgentId>) -> Result<(), AlertError>;
}

/// Alert delivery error.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert transport unavailable: {0}")]
    Transport(String),
}
