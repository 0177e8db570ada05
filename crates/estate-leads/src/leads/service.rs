use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::domain::{
    Activity, ActivityKind, AgentId, Clock, Lead, LeadId, LeadPatch, LeadStatus, NewLead, Note,
    Notification, Patch, RequestContext, Resource, SystemClock, UserId,
};
use super::entitlement::EntitlementGate;
use super::repository::{AlertTransport, AuditTrail, CrmStore};
use super::status::StatusRegistry;
use crate::error::CoreError;

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

/// Whether a mutation came from a single-lead edit or a bulk operation.
/// Bulk edits tag their audit entries and leave per-lead notifications to the
/// coordinator, which aggregates one per newly-assigned agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EditOrigin {
    Single,
    Bulk,
}

impl EditOrigin {
    pub(super) const fn suffix(self) -> &'static str {
        match self {
            EditOrigin::Single => "",
            EditOrigin::Bulk => " (bulk action)",
        }
    }
}

/// Result of validating a patch against a lead: the updated lead, the audit
/// rows that must ride the same commit, and the new assignee when the lead
/// changed hands (the trigger for the external alert).
pub(super) struct TransitionOutcome {
    pub(super) lead: Lead,
    pub(super) trail: AuditTrail,
    pub(super) reassignment: Option<Option<AgentId>>,
}

/// The state machine governing a lead's status and assignment, plus the audit
/// trail every transition must produce.
pub struct LeadService<R, A> {
    pub(super) store: Arc<R>,
    pub(super) alerts: Arc<A>,
    pub(super) registry: StatusRegistry<R>,
    pub(super) gate: EntitlementGate<R>,
    pub(super) clock: Arc<dyn Clock>,
}

impl<R, A> LeadService<R, A>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    pub fn new(store: Arc<R>, alerts: Arc<A>) -> Self {
        Self::with_clock(store, alerts, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<R>, alerts: Arc<A>, clock: Arc<dyn Clock>) -> Self {
        let registry = StatusRegistry::new(Arc::clone(&store));
        let gate = EntitlementGate::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            alerts,
            registry,
            gate,
            clock,
        }
    }

    pub fn statuses(&self) -> &StatusRegistry<R> {
        &self.registry
    }

    pub fn entitlements(&self) -> &EntitlementGate<R> {
        &self.gate
    }

    /// Intake a new lead. The entitlement gate runs before anything is
    /// persisted; an initial assignee is treated as an assignment change, so
    /// it notifies and alerts like any other handover.
    pub fn create_lead(&self, ctx: &RequestContext, draft: NewLead) -> Result<Lead, CoreError> {
        self.gate.ensure_can_create(ctx, Resource::Prospects)?;

        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::Validation(
                "lead name must not be empty".to_string(),
            ));
        }

        let lead = Lead {
            id: next_lead_id(),
            agency_id: ctx.agency_id.clone(),
            name,
            email: draft.email,
            phone: draft.phone,
            status: LeadStatus::New,
            assigned_to: None,
            is_urgent: draft.is_urgent,
            first_contacted_at: None,
            appointment_date: None,
            created_at: self.clock.now(),
        };

        let mut stored = self.store.insert(lead)?;

        if let Some(agent) = draft.assigned_to {
            let patch = LeadPatch {
                assigned_to: Patch::Set(agent),
                ..LeadPatch::default()
            };
            let outcome = self.apply_patch(ctx, stored, patch, EditOrigin::Single)?;
            let reassignment = outcome.reassignment;
            stored = self.store.commit(outcome.lead, outcome.trail)?;
            if let Some(assignee) = reassignment {
                dispatch_alert(self.alerts.as_ref(), &stored, assignee.as_ref());
            }
        }

        Ok(stored)
    }

    /// Apply a partial update. Absent fields are untouched; explicit `null`
    /// clears a nullable field. The update, its activities, and any
    /// notification land in one commit; the external alert fires after.
    pub fn update_lead(
        &self,
        ctx: &RequestContext,
        id: &LeadId,
        patch: LeadPatch,
    ) -> Result<Lead, CoreError> {
        let current = self
            .store
            .fetch(&ctx.agency_id, id)?
            .ok_or(CoreError::NotFound)?;

        let outcome = self.apply_patch(ctx, current, patch, EditOrigin::Single)?;
        let reassignment = outcome.reassignment;
        let stored = self.store.commit(outcome.lead, outcome.trail)?;

        if let Some(assignee) = reassignment {
            dispatch_alert(self.alerts.as_ref(), &stored, assignee.as_ref());
        }

        Ok(stored)
    }

    /// Manual first-contact stamp. Set-once: a lead that was already
    /// contacted is returned unchanged.
    pub fn mark_contacted(&self, ctx: &RequestContext, id: &LeadId) -> Result<Lead, CoreError> {
        let mut lead = self
            .store
            .fetch(&ctx.agency_id, id)?
            .ok_or(CoreError::NotFound)?;

        if lead.first_contacted_at.is_some() {
            return Ok(lead);
        }

        lead.first_contacted_at = Some(self.clock.now());
        Ok(self.store.commit(lead, AuditTrail::default())?)
    }

    /// Attach a free-text note, paired with its `NoteAdded` audit entry in
    /// the same commit.
    pub fn add_note(
        &self,
        ctx: &RequestContext,
        id: &LeadId,
        body: String,
    ) -> Result<Note, CoreError> {
        let body = body.trim().to_string();
        if body.is_empty() {
            return Err(CoreError::Validation(
                "note body must not be empty".to_string(),
            ));
        }

        let lead = self
            .store
            .fetch(&ctx.agency_id, id)?
            .ok_or(CoreError::NotFound)?;

        let now = self.clock.now();
        let note = Note {
            lead_id: lead.id.clone(),
            author: ctx.user_id.clone(),
            body: body.clone(),
            created_at: now,
        };
        let trail = AuditTrail {
            activities: vec![Activity {
                lead_id: lead.id.clone(),
                kind: ActivityKind::NoteAdded,
                details: format!("Note added: {body}"),
                created_at: now,
            }],
            notes: vec![note.clone()],
            notifications: Vec::new(),
        };

        self.store.commit(lead, trail)?;
        Ok(note)
    }

    /// Fetch one lead for API responses. Foreign-agency ids read as absent.
    pub fn get(&self, ctx: &RequestContext, id: &LeadId) -> Result<Lead, CoreError> {
        self.store
            .fetch(&ctx.agency_id, id)?
            .ok_or(CoreError::NotFound)
    }

    /// Audit trail for one lead, newest first.
    pub fn activities(&self, ctx: &RequestContext, id: &LeadId) -> Result<Vec<Activity>, CoreError> {
        self.store
            .fetch(&ctx.agency_id, id)?
            .ok_or(CoreError::NotFound)?;
        self.store.for_lead(&ctx.agency_id, id).map_err(Into::into)
    }

    /// Hard delete. Forbidden for the most restricted role.
    pub fn delete_lead(&self, ctx: &RequestContext, id: &LeadId) -> Result<(), CoreError> {
        if !ctx.role.can_delete() {
            return Err(CoreError::Forbidden(
                "members cannot delete leads".to_string(),
            ));
        }
        self.store
            .delete_all(&ctx.agency_id, std::slice::from_ref(id))?;
        Ok(())
    }

    /// Validate and stage a patch against a lead. Does not persist anything;
    /// callers commit the outcome so side effects stay transactional.
    pub(super) fn apply_patch(
        &self,
        ctx: &RequestContext,
        mut lead: Lead,
        patch: LeadPatch,
        origin: EditOrigin,
    ) -> Result<TransitionOutcome, CoreError> {
        let now = self.clock.now();
        let mut trail = AuditTrail::default();
        let mut reassignment = None;

        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CoreError::Validation(
                    "lead name must not be empty".to_string(),
                ));
            }
            lead.name = name;
        }
        lead.email = patch.email.resolve(lead.email.take());
        lead.phone = patch.phone.resolve(lead.phone.take());
        if let Some(urgent) = patch.is_urgent {
            lead.is_urgent = urgent;
        }

        let target = patch.status.unwrap_or_else(|| lead.status.clone());

        match patch.appointment_date {
            Patch::Set(date) => lead.appointment_date = Some(date),
            Patch::Clear => {
                if target == LeadStatus::AppointmentScheduled {
                    return Err(CoreError::Validation(
                        "appointment date can only be cleared when leaving the scheduled status"
                            .to_string(),
                    ));
                }
                lead.appointment_date = None;
            }
            Patch::Keep => {}
        }

        if target != lead.status {
            if target == LeadStatus::AppointmentScheduled && lead.appointment_date.is_none() {
                return Err(CoreError::Validation(
                    "appointment_date is required when scheduling an appointment".to_string(),
                ));
            }

            // Response-time stamp: first transition away from New, set once.
            if lead.status == LeadStatus::New && lead.first_contacted_at.is_none() {
                lead.first_contacted_at = Some(now);
            }

            let from = self.registry.label_for(&ctx.agency_id, &lead.status)?;
            let to = self.registry.label_for(&ctx.agency_id, &target)?;
            trail.activities.push(Activity {
                lead_id: lead.id.clone(),
                kind: ActivityKind::StatusChange,
                details: format!("Status changed from {from} to {to}{}", origin.suffix()),
                created_at: now,
            });
            lead.status = target;
        }

        if !patch.assigned_to.is_keep() {
            let next = patch.assigned_to.resolve(lead.assigned_to.clone());
            if next != lead.assigned_to {
                let description = match &next {
                    Some(agent) => format!("Lead assigned to agent {}", agent.0),
                    None => "Lead unassigned".to_string(),
                };
                trail.activities.push(Activity {
                    lead_id: lead.id.clone(),
                    kind: ActivityKind::NoteAdded,
                    details: format!("{description}{}", origin.suffix()),
                    created_at: now,
                });

                if origin == EditOrigin::Single {
                    if let Some(agent) = &next {
                        trail.notifications.push(Notification {
                            recipient: UserId(agent.0.clone()),
                            message: format!("Lead '{}' was assigned to you", lead.name),
                            link: format!("/leads/{}", lead.id.0),
                            read: false,
                            created_at: now,
                        });
                    }
                }

                reassignment = Some(next.clone());
                lead.assigned_to = next;
            }
        }

        Ok(TransitionOutcome {
            lead,
            trail,
            reassignment,
        })
    }
}

/// Fire-and-forget delivery to the SMS/webhook collaborator. Failures are
/// logged and never surface to the caller.
pub(super) fn dispatch_alert<A: AlertTransport>(
    alerts: &A,
    lead: &Lead,
    assignee: Option<&AgentId>,
) {
    if let Err(err) = alerts.send(lead, assignee) {
        tracing::warn!(lead = %lead.id.0, error = %err, "external alert delivery failed");
    }
}
