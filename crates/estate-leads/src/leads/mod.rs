//! Lead lifecycle and notification engine.
//!
//! `service` holds the transition engine, `bulk` its multi-lead coordinator,
//! `status` the agency status registry, `notifications` the polling feed,
//! and `entitlement` the trial/plan-limit gate every creating mutation must
//! pass. Persistence sits behind the traits in `repository`; `memory`
//! provides the single-process implementation used by the demo binary and
//! the tests.

mod bulk;
pub mod domain;
pub mod entitlement;
pub mod memory;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod service;
pub mod status;

#[cfg(test)]
mod tests;

pub use domain::{
    Activity, ActivityKind, AgencyId, AgentId, Clock, Lead, LeadId, LeadPatch, LeadStatus,
    NewLead, Note, Notification, Patch, RequestContext, Resource, Role, StatusId, StatusOption,
    Subscription, SystemClock, UserId,
};
pub use entitlement::EntitlementGate;
pub use memory::{InMemoryCrmStore, RecordingAlertTransport};
pub use notifications::{NotificationDispatcher, RECENT_LIMIT};
pub use repository::{
    AlertError, AlertTransport, AuditTrail, CrmStore, NotificationFeed, RepositoryError,
};
pub use router::{lead_router, EngineState};
pub use service::LeadService;
pub use status::{NewStatusOption, StatusRegistry};
