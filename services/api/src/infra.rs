use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{Duration, Utc};
use estate_leads::leads::{
    AgencyId, AgentId, AlertError, AlertTransport, InMemoryCrmStore, Lead, Subscription,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stand-in for the real SMS/webhook integration: logs the delivery instead
/// of calling out. The engine treats failures as best-effort either way.
#[derive(Default, Clone)]
pub(crate) struct LoggingAlertTransport;

impl AlertTransport for LoggingAlertTransport {
    fn send(&self, lead: &Lead, assignee: Option<&AgentId>) -> Result<(), AlertError> {
        match assignee {
            Some(agent) => tracing::info!(lead = %lead.id.0, agent = %agent.0, "lead handover alert"),
            None => tracing::info!(lead = %lead.id.0, "lead unassignment alert"),
        }
        Ok(())
    }
}

/// Development tenant installed at startup so the API is usable out of the
/// box; a real deployment would load subscriptions from billing.
pub(crate) fn seed_development_tenant(store: &InMemoryCrmStore, tenant: &str) -> AgencyId {
    let agency = AgencyId(tenant.to_string());
    let now = Utc::now();
    store.put_subscription(Subscription {
        agency_id: agency.clone(),
        users_limit: -1,
        prospects_limit: -1,
        properties_limit: -1,
        trial_start: now,
        trial_end: Some(now + Duration::days(30)),
    });
    agency
}
