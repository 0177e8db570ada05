//! Bulk operations: one request applying a mutation to many lead ids.
//!
//! Ids that do not resolve to leads owned by the caller's agency are silently
//! excluded for status and assignment updates; bulk delete is all-or-nothing.
//! Returned counts reflect leads actually changed, not leads requested.

use chrono::{DateTime, Utc};

use super::domain::{
    AgentId, Lead, LeadId, LeadPatch, LeadStatus, Notification, Patch, RequestContext, UserId,
};
use super::repository::{AlertTransport, CrmStore};
use super::service::{dispatch_alert, EditOrigin, LeadService};
use crate::error::CoreError;

impl<R, A> LeadService<R, A>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    /// Move every resolvable lead to `status`. Leads already there are
    /// skipped (no activity, not counted). Scheduling appointments in bulk
    /// requires the shared date up front.
    pub fn bulk_update_status(
        &self,
        ctx: &RequestContext,
        ids: &[LeadId],
        status: LeadStatus,
        appointment_date: Option<DateTime<Utc>>,
    ) -> Result<usize, CoreError> {
        if status == LeadStatus::AppointmentScheduled && appointment_date.is_none() {
            return Err(CoreError::Validation(
                "appointment_date is required when bulk-scheduling appointments".to_string(),
            ));
        }

        let leads = self.store.fetch_many(&ctx.agency_id, ids)?;
        let mut affected = 0;

        for lead in leads {
            if lead.status == status {
                continue;
            }
            let patch = LeadPatch {
                status: Some(status.clone()),
                appointment_date: match appointment_date {
                    Some(date) => Patch::Set(date),
                    None => Patch::Keep,
                },
                ..LeadPatch::default()
            };
            let outcome = self.apply_patch(ctx, lead, patch, EditOrigin::Bulk)?;
            self.store.commit(outcome.lead, outcome.trail)?;
            affected += 1;
        }

        Ok(affected)
    }

    /// Hand every resolvable lead to `agent`. Exactly one aggregated
    /// notification is created for the agent, covering only the leads whose
    /// assignee actually changed; those leads also get their individual audit
    /// entry and external alert. Alert failures never abort the batch.
    pub fn bulk_assign(
        &self,
        ctx: &RequestContext,
        ids: &[LeadId],
        agent: &AgentId,
    ) -> Result<usize, CoreError> {
        let leads = self.store.fetch_many(&ctx.agency_id, ids)?;

        // The set of leads changing hands is fixed before the loop, so the
        // aggregated notification is computed once rather than accumulated
        // per iteration.
        let changing: Vec<Lead> = leads
            .into_iter()
            .filter(|lead| lead.assigned_to.as_ref() != Some(agent))
            .collect();
        let affected = changing.len();
        if affected == 0 {
            return Ok(0);
        }

        let message = if affected == 1 {
            "1 lead was assigned to you".to_string()
        } else {
            format!("{affected} leads were assigned to you")
        };
        let mut pending_notification = Some(Notification {
            recipient: UserId(agent.0.clone()),
            message,
            link: "/leads".to_string(),
            read: false,
            created_at: self.clock.now(),
        });

        for lead in changing {
            let patch = LeadPatch {
                assigned_to: Patch::Set(agent.clone()),
                ..LeadPatch::default()
            };
            let mut outcome = self.apply_patch(ctx, lead, patch, EditOrigin::Bulk)?;
            // The aggregate rides the first per-lead commit so it is still
            // written transactionally.
            if let Some(notification) = pending_notification.take() {
                outcome.trail.notifications.push(notification);
            }
            let stored = self.store.commit(outcome.lead, outcome.trail)?;
            dispatch_alert(self.alerts.as_ref(), &stored, Some(agent));
        }

        Ok(affected)
    }

    /// All-or-nothing hard delete: any id that does not resolve to an owned
    /// lead fails the whole call with `NotFound` and deletes nothing.
    pub fn bulk_delete(&self, ctx: &RequestContext, ids: &[LeadId]) -> Result<usize, CoreError> {
        if !ctx.role.can_delete() {
            return Err(CoreError::Forbidden(
                "members cannot delete leads".to_string(),
            ));
        }
        if ids.is_empty() {
            return Ok(0);
        }
        self.store
            .delete_all(&ctx.agency_id, ids)
            .map_err(Into::into)
    }
}
