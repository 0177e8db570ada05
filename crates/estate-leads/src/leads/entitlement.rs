use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{AgencyId, Clock, RequestContext, Resource, Subscription};
use super::repository::{SubscriptionRepository, TenantUsage};
use crate::error::CoreError;

/// Computes whether an agency may still create leads, users, or properties.
/// Consulted by every creating mutation before anything is persisted.
pub struct EntitlementGate<R> {
    store: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> Clone for EntitlementGate<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R> EntitlementGate<R>
where
    R: SubscriptionRepository + TenantUsage,
{
    pub fn new(store: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// True iff the agency has an active subscription whose trial end is set
    /// and still in the future. No subscription or an open-ended trial window
    /// both read as inactive.
    pub fn is_trial_active(&self, agency: &AgencyId) -> Result<bool, CoreError> {
        let subscription = self.store.active(agency)?;
        Ok(subscription
            .as_ref()
            .map(|subscription| trial_active(subscription, self.clock.now()))
            .unwrap_or(false))
    }

    /// `Forbidden` when the trial is over, and independently `Forbidden` when
    /// the plan's numeric limit for the resource is already reached
    /// (`-1` means unlimited).
    pub fn ensure_can_create(
        &self,
        ctx: &RequestContext,
        resource: Resource,
    ) -> Result<(), CoreError> {
        let Some(subscription) = self.store.active(&ctx.agency_id)? else {
            return Err(trial_forbidden());
        };
        if !trial_active(&subscription, self.clock.now()) {
            return Err(trial_forbidden());
        }

        let limit = subscription.limit_for(resource);
        if limit >= 0 {
            let current = self.store.usage(&ctx.agency_id, resource)?;
            if current as i64 >= limit {
                return Err(CoreError::Forbidden(format!(
                    "plan limit reached: {} {} allowed",
                    limit,
                    resource.noun()
                )));
            }
        }

        Ok(())
    }
}

fn trial_active(subscription: &Subscription, now: DateTime<Utc>) -> bool {
    matches!(subscription.trial_end, Some(end) if end > now)
}

fn trial_forbidden() -> CoreError {
    CoreError::Forbidden("trial expired or no active subscription".to_string())
}
