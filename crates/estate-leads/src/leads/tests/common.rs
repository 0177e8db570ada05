use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::leads::domain::{
    AgencyId, Clock, Lead, NewLead, RequestContext, Role, Subscription, UserId,
};
use crate::leads::memory::{InMemoryCrmStore, RecordingAlertTransport};
use crate::leads::service::LeadService;

/// Pinned clock so timestamps and trial windows are deterministic.
pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub(super) fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid datetime")
}

pub(super) fn agency() -> AgencyId {
    AgencyId("agency-coastal".to_string())
}

pub(super) fn other_agency() -> AgencyId {
    AgencyId("agency-uptown".to_string())
}

pub(super) fn manager_ctx() -> RequestContext {
    RequestContext {
        user_id: UserId("user-manager".to_string()),
        role: Role::Manager,
        agency_id: agency(),
    }
}

pub(super) fn member_ctx() -> RequestContext {
    RequestContext {
        user_id: UserId("user-member".to_string()),
        role: Role::Member,
        agency_id: agency(),
    }
}

pub(super) fn foreign_ctx() -> RequestContext {
    RequestContext {
        user_id: UserId("user-foreign".to_string()),
        role: Role::Manager,
        agency_id: other_agency(),
    }
}

pub(super) fn trial_subscription(agency: AgencyId, end: Option<DateTime<Utc>>) -> Subscription {
    Subscription {
        agency_id: agency,
        users_limit: -1,
        prospects_limit: -1,
        properties_limit: -1,
        trial_start: epoch() - Duration::days(7),
        trial_end: end,
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryCrmStore>,
    pub(super) alerts: Arc<RecordingAlertTransport>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) service: Arc<LeadService<InMemoryCrmStore, RecordingAlertTransport>>,
}

/// Store with active trials for both test agencies and a pinned clock.
pub(super) fn harness() -> Harness {
    let store = Arc::new(InMemoryCrmStore::new());
    let alerts = Arc::new(RecordingAlertTransport::default());
    let clock = FixedClock::at(epoch());

    store.put_subscription(trial_subscription(agency(), Some(epoch() + Duration::days(14))));
    store.put_subscription(trial_subscription(
        other_agency(),
        Some(epoch() + Duration::days(14)),
    ));

    let service = Arc::new(LeadService::with_clock(
        Arc::clone(&store),
        Arc::clone(&alerts),
        clock.clone(),
    ));

    Harness {
        store,
        alerts,
        clock,
        service,
    }
}

pub(super) fn new_lead(name: &str) -> NewLead {
    NewLead {
        name: name.to_string(),
        email: None,
        phone: None,
        assigned_to: None,
        is_urgent: false,
    }
}

pub(super) fn create_lead(harness: &Harness, name: &str) -> Lead {
    harness
        .service
        .create_lead(&manager_ctx(), new_lead(name))
        .expect("lead created")
}
