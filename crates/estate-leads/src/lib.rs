//! Lead lifecycle and notification engine for a multi-tenant real-estate CRM.
//!
//! The crate is organized around small services composed over repository
//! traits: the transition engine that moves a prospect through its status
//! pipeline, the append-only activity log it produces, bulk operations, the
//! polling notification feed, and the trial/entitlement gate consulted before
//! every creating mutation. Persistence and the outbound SMS/webhook transport
//! are trait seams so the engine can be exercised without real infrastructure.

pub mod config;
pub mod error;
pub mod leads;
pub mod telemetry;
