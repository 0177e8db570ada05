//! In-memory adapters backing the demo binary and the test suites.
//!
//! One mutex guards the whole store, so the compound operations the engine
//! relies on (`commit`, `set_last_step`, `delete_all`, `feed`) are genuinely
//! atomic here, matching the transactional contract a relational backend
//! would provide.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Activity, AgencyId, AgentId, Lead, LeadId, Note, Notification, Resource, StatusId,
    StatusOption, Subscription, UserId,
};
use super::repository::{
    ActivityRepository, AlertError, AlertTransport, AuditTrail, LeadRepository, NotificationFeed,
    NotificationRepository, RepositoryError, StatusOptionRepository, SubscriptionRepository,
    TenantUsage,
};

#[derive(Default)]
struct StoreInner {
    leads: HashMap<LeadId, Lead>,
    activities: Vec<Activity>,
    notes: Vec<Note>,
    notifications: Vec<Notification>,
    statuses: Vec<StatusOption>,
    subscriptions: HashMap<AgencyId, Subscription>,
    usage_overrides: HashMap<(AgencyId, Resource), usize>,
}

/// In-memory store implementing every repository trait the engine needs.
#[derive(Default, Clone)]
pub struct InMemoryCrmStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryCrmStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    /// Install the agency's subscription, replacing any previous one. Keying
    /// on the agency enforces "at most one active subscription".
    pub fn put_subscription(&self, subscription: Subscription) {
        let mut guard = self.lock();
        guard
            .subscriptions
            .insert(subscription.agency_id.clone(), subscription);
    }

    /// Seed a resource count for plan-limit checks. Prospects fall back to
    /// the live lead count when no override is set.
    pub fn set_usage(&self, agency: &AgencyId, resource: Resource, count: usize) {
        let mut guard = self.lock();
        guard
            .usage_overrides
            .insert((agency.clone(), resource), count);
    }

    /// Notes attached to a lead, newest first.
    pub fn notes_for(&self, agency: &AgencyId, lead: &LeadId) -> Vec<Note> {
        let guard = self.lock();
        if !owns_lead(&guard, agency, lead) {
            return Vec::new();
        }
        let mut notes: Vec<Note> = guard
            .notes
            .iter()
            .filter(|note| &note.lead_id == lead)
            .cloned()
            .collect();
        notes.reverse();
        notes
    }
}

fn owns_lead(guard: &StoreInner, agency: &AgencyId, id: &LeadId) -> bool {
    guard
        .leads
        .get(id)
        .map_or(false, |lead| &lead.agency_id == agency)
}

impl LeadRepository for InMemoryCrmStore {
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.lock();
        if guard.leads.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.leads.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    fn fetch(&self, agency: &AgencyId, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let guard = self.lock();
        Ok(guard
            .leads
            .get(id)
            .filter(|lead| &lead.agency_id == agency)
            .cloned())
    }

    fn fetch_many(&self, agency: &AgencyId, ids: &[LeadId]) -> Result<Vec<Lead>, RepositoryError> {
        let guard = self.lock();
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .filter_map(|id| {
                guard
                    .leads
                    .get(id)
                    .filter(|lead| &lead.agency_id == agency)
                    .cloned()
            })
            .collect())
    }

    fn commit(&self, lead: Lead, trail: AuditTrail) -> Result<Lead, RepositoryError> {
        let mut guard = self.lock();
        match guard.leads.get(&lead.id) {
            Some(existing) if existing.agency_id == lead.agency_id => {}
            _ => return Err(RepositoryError::NotFound),
        }
        guard.leads.insert(lead.id.clone(), lead.clone());
        guard.activities.extend(trail.activities);
        guard.notes.extend(trail.notes);
        guard.notifications.extend(trail.notifications);
        Ok(lead)
    }

    fn delete_all(&self, agency: &AgencyId, ids: &[LeadId]) -> Result<usize, RepositoryError> {
        let mut guard = self.lock();

        let targets: HashSet<LeadId> = ids.iter().cloned().collect();
        if !targets.iter().all(|id| owns_lead(&guard, agency, id)) {
            return Err(RepositoryError::NotFound);
        }

        for id in &targets {
            guard.leads.remove(id);
        }
        guard
            .activities
            .retain(|activity| !targets.contains(&activity.lead_id));
        guard.notes.retain(|note| !targets.contains(&note.lead_id));
        Ok(targets.len())
    }
}

impl ActivityRepository for InMemoryCrmStore {
    fn for_lead(&self, agency: &AgencyId, lead: &LeadId) -> Result<Vec<Activity>, RepositoryError> {
        let guard = self.lock();
        if !owns_lead(&guard, agency, lead) {
            return Err(RepositoryError::NotFound);
        }
        let mut activities: Vec<Activity> = guard
            .activities
            .iter()
            .filter(|activity| &activity.lead_id == lead)
            .cloned()
            .collect();
        // Appended in chronological order; reversing yields newest-first even
        // when timestamps collide.
        activities.reverse();
        Ok(activities)
    }
}

impl NotificationRepository for InMemoryCrmStore {
    fn push(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut guard = self.lock();
        guard.notifications.push(notification);
        Ok(())
    }

    fn feed(&self, user: &UserId, limit: usize) -> Result<NotificationFeed, RepositoryError> {
        let guard = self.lock();
        let notifications: Vec<Notification> = guard
            .notifications
            .iter()
            .rev()
            .filter(|notification| &notification.recipient == user)
            .take(limit)
            .cloned()
            .collect();
        let unread_count = guard
            .notifications
            .iter()
            .filter(|notification| &notification.recipient == user && !notification.read)
            .count();
        Ok(NotificationFeed {
            notifications,
            unread_count,
        })
    }

    fn mark_all_read(&self, user: &UserId) -> Result<(), RepositoryError> {
        let mut guard = self.lock();
        for notification in guard
            .notifications
            .iter_mut()
            .filter(|notification| &notification.recipient == user)
        {
            notification.read = true;
        }
        Ok(())
    }
}

impl StatusOptionRepository for InMemoryCrmStore {
    fn list(&self, agency: &AgencyId) -> Result<Vec<StatusOption>, RepositoryError> {
        let guard = self.lock();
        let mut options: Vec<StatusOption> = guard
            .statuses
            .iter()
            .filter(|option| &option.agency_id == agency)
            .cloned()
            .collect();
        options.sort_by_key(|option| option.order);
        Ok(options)
    }

    fn insert_option(&self, option: StatusOption) -> Result<StatusOption, RepositoryError> {
        let mut guard = self.lock();
        let duplicate = guard.statuses.iter().any(|existing| {
            existing.agency_id == option.agency_id
                && existing.name.eq_ignore_ascii_case(&option.name)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.statuses.push(option.clone());
        Ok(option)
    }

    fn set_last_step(&self, agency: &AgencyId, id: &StatusId) -> Result<(), RepositoryError> {
        let mut guard = self.lock();
        let known = guard
            .statuses
            .iter()
            .any(|option| &option.agency_id == agency && &option.id == id);
        if !known {
            return Err(RepositoryError::NotFound);
        }
        // Old and new flag flips happen under the same lock, so two
        // concurrent calls can never leave two options marked.
        for option in guard
            .statuses
            .iter_mut()
            .filter(|option| &option.agency_id == agency)
        {
            option.is_last_step = &option.id == id;
        }
        Ok(())
    }
}

impl SubscriptionRepository for InMemoryCrmStore {
    fn active(&self, agency: &AgencyId) -> Result<Option<Subscription>, RepositoryError> {
        let guard = self.lock();
        Ok(guard.subscriptions.get(agency).cloned())
    }
}

impl TenantUsage for InMemoryCrmStore {
    fn usage(&self, agency: &AgencyId, resource: Resource) -> Result<usize, RepositoryError> {
        let guard = self.lock();
        if let Some(count) = guard.usage_overrides.get(&(agency.clone(), resource)) {
            return Ok(*count);
        }
        Ok(match resource {
            Resource::Prospects => guard
                .leads
                .values()
                .filter(|lead| &lead.agency_id == agency)
                .count(),
            Resource::Users | Resource::Properties => 0,
        })
    }
}

/// Alert transport that records deliveries and can simulate an outage.
#[derive(Default, Clone)]
pub struct RecordingAlertTransport {
    deliveries: Arc<Mutex<Vec<(LeadId, Option<AgentId>)>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingAlertTransport {
    pub fn deliveries(&self) -> Vec<(LeadId, Option<AgentId>)> {
        self.deliveries.lock().expect("alert mutex poisoned").clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl AlertTransport for RecordingAlertTransport {
    fn send(&self, lead: &Lead, assignee: Option<&AgentId>) -> Result<(), AlertError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(AlertError::Transport("simulated outage".to_string()));
        }
        let mut guard = self.deliveries.lock().expect("alert mutex poisoned");
        guard.push((lead.id.clone(), assignee.cloned()));
        Ok(())
    }
}
