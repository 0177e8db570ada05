use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Deserialize;

use super::domain::{AgencyId, LeadStatus, RequestContext, StatusId, StatusOption};
use super::repository::{RepositoryError, StatusOptionRepository};
use crate::error::CoreError;

/// Built-in pipeline shown to agencies that have not defined their own
/// options. `won` is the single default last step.
const BUILTIN_STATUSES: &[(&str, &str, &str, bool)] = &[
    ("new", "New", "#3b82f6", false),
    ("contacted", "Contacted", "#8b5cf6", false),
    ("appointment_scheduled", "Appointment scheduled", "#f59e0b", false),
    ("negotiation", "Negotiation", "#14b8a6", false),
    ("won", "Won", "#22c55e", true),
    ("lost", "Lost", "#ef4444", false),
];

static STATUS_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_status_id() -> StatusId {
    let id = STATUS_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    StatusId(format!("status-{id:06}"))
}

/// Draft for an agency-defined status option.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStatusOption {
    pub name: String,
    pub translation: String,
    #[serde(default = "NewStatusOption::default_color")]
    pub color: String,
    #[serde(default)]
    pub order: u32,
}

impl NewStatusOption {
    fn default_color() -> String {
        "#64748b".to_string()
    }
}

/// Enumerates valid lead statuses and their display metadata for one agency.
pub struct StatusRegistry<R> {
    repository: Arc<R>,
}

impl<R> Clone for StatusRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R> StatusRegistry<R>
where
    R: StatusOptionRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Agency-defined options in display order, or the built-in defaults when
    /// the agency has defined none.
    pub fn list(&self, ctx: &RequestContext) -> Result<Vec<StatusOption>, CoreError> {
        let options = self.repository.list(&ctx.agency_id)?;
        if options.is_empty() {
            return Ok(builtin_options(&ctx.agency_id));
        }
        Ok(options)
    }

    pub fn create(
        &self,
        ctx: &RequestContext,
        draft: NewStatusOption,
    ) -> Result<StatusOption, CoreError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::Validation(
                "status name must not be empty".to_string(),
            ));
        }

        let option = StatusOption {
            id: next_status_id(),
            agency_id: ctx.agency_id.clone(),
            translation: if draft.translation.trim().is_empty() {
                name.clone()
            } else {
                draft.translation.trim().to_string()
            },
            name,
            color: draft.color,
            order: draft.order,
            is_last_step: false,
        };

        match self.repository.insert_option(option) {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::Conflict) => Err(CoreError::Conflict(format!(
                "status '{}' already exists",
                draft.name.trim()
            ))),
            Err(other) => Err(other.into()),
        }
    }

    /// Marks the target as the pipeline's final step, atomically clearing the
    /// flag on every sibling. Unknown ids surface as `NotFound`.
    pub fn set_last_step(&self, ctx: &RequestContext, id: &StatusId) -> Result<(), CoreError> {
        self.repository
            .set_last_step(&ctx.agency_id, id)
            .map_err(Into::into)
    }

    /// Human-readable label for a status: the agency's translation when one
    /// matches the status key, the built-in translation otherwise, and the
    /// raw key as the final fallback for ad-hoc custom statuses.
    pub fn label_for(&self, agency: &AgencyId, status: &LeadStatus) -> Result<String, CoreError> {
        let key = status.key();
        let options = self.repository.list(agency)?;
        if let Some(option) = options.iter().find(|option| option.name == key) {
            return Ok(option.translation.clone());
        }
        if let Some((_, translation, _, _)) =
            BUILTIN_STATUSES.iter().find(|(name, ..)| *name == key)
        {
            return Ok((*translation).to_string());
        }
        Ok(key.to_string())
    }
}

fn builtin_options(agency: &AgencyId) -> Vec<StatusOption> {
    BUILTIN_STATUSES
        .iter()
        .enumerate()
        .map(|(index, (name, translation, color, is_last_step))| StatusOption {
            id: StatusId(format!("builtin-{name}")),
            agency_id: agency.clone(),
            name: (*name).to_string(),
            translation: (*translation).to_string(),
            color: (*color).to_string(),
            order: index as u32,
            is_last_step: *is_last_step,
        })
        .collect()
}
