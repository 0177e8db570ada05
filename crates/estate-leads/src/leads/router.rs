use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    Activity, AgencyId, AgentId, Lead, LeadId, LeadPatch, LeadStatus, NewLead, Note,
    RequestContext, Role, StatusId, StatusOption, UserId,
};
use super::notifications::NotificationDispatcher;
use super::repository::{AlertTransport, CrmStore, NotificationFeed};
use super::service::LeadService;
use super::status::NewStatusOption;
use crate::error::CoreError;

/// Router state bundling the transition engine and the notification feed.
pub struct EngineState<R, A> {
    pub service: Arc<LeadService<R, A>>,
    pub dispatcher: Arc<NotificationDispatcher<R>>,
}

impl<R, A> Clone for EngineState<R, A> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

/// Identity headers set by the upstream gateway after session resolution.
/// The engine never authenticates; it only refuses requests that arrive
/// without a resolved context.
#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let user_id = header("x-user-id").ok_or(CoreError::Unauthorized)?;
        let agency_id = header("x-agency-id").ok_or(CoreError::Unauthorized)?;
        let role = header("x-role")
            .and_then(Role::from_key)
            .ok_or(CoreError::Unauthorized)?;

        Ok(RequestContext {
            user_id: UserId(user_id.to_string()),
            role,
            agency_id: AgencyId(agency_id.to_string()),
        })
    }
}

/// HTTP surface for the lead engine. Tenancy and role checks happen in the
/// services; the router only translates between JSON and domain calls.
pub fn lead_router<R, A>(
    service: Arc<LeadService<R, A>>,
    dispatcher: Arc<NotificationDispatcher<R>>,
) -> Router
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    Router::new()
        .route(
            "/api/v1/leads",
            post(create_lead_handler::<R, A>),
        )
        .route(
            "/api/v1/leads/:lead_id",
            get(get_lead_handler::<R, A>)
                .patch(update_lead_handler::<R, A>)
                .delete(delete_lead_handler::<R, A>),
        )
        .route(
            "/api/v1/leads/:lead_id/notes",
            post(add_note_handler::<R, A>),
        )
        .route(
            "/api/v1/leads/:lead_id/activities",
            get(activities_handler::<R, A>),
        )
        .route(
            "/api/v1/leads/:lead_id/contacted",
            post(mark_contacted_handler::<R, A>),
        )
        .route(
            "/api/v1/leads/bulk/status",
            post(bulk_status_handler::<R, A>),
        )
        .route(
            "/api/v1/leads/bulk/assign",
            post(bulk_assign_handler::<R, A>),
        )
        .route(
            "/api/v1/leads/bulk/delete",
            post(bulk_delete_handler::<R, A>),
        )
        .route("/api/v1/notifications", get(notifications_handler::<R, A>))
        .route(
            "/api/v1/notifications/read-all",
            post(mark_all_read_handler::<R, A>),
        )
        .route(
            "/api/v1/statuses",
            get(list_statuses_handler::<R, A>).post(create_status_handler::<R, A>),
        )
        .route(
            "/api/v1/statuses/:status_id/last-step",
            post(set_last_step_handler::<R, A>),
        )
        .with_state(EngineState {
            service,
            dispatcher,
        })
}

#[derive(Debug, Deserialize)]
struct NoteRequest {
    body: String,
}

#[derive(Debug, Deserialize)]
struct BulkStatusRequest {
    ids: Vec<LeadId>,
    status: LeadStatus,
    #[serde(default)]
    appointment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BulkAssignRequest {
    ids: Vec<LeadId>,
    agent_id: AgentId,
}

#[derive(Debug, Deserialize)]
struct BulkDeleteRequest {
    ids: Vec<LeadId>,
}

async fn create_lead_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Json(draft): Json<NewLead>,
) -> Result<(StatusCode, Json<Lead>), CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let lead = state.service.create_lead(&ctx, draft)?;
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn get_lead_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Path(lead_id): Path<String>,
) -> Result<Json<Lead>, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let lead = state.service.get(&ctx, &LeadId(lead_id))?;
    Ok(Json(lead))
}

async fn update_lead_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Path(lead_id): Path<String>,
    Json(patch): Json<LeadPatch>,
) -> Result<Json<Lead>, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let lead = state.service.update_lead(&ctx, &LeadId(lead_id), patch)?;
    Ok(Json(lead))
}

async fn delete_lead_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Path(lead_id): Path<String>,
) -> Result<StatusCode, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    state.service.delete_lead(&ctx, &LeadId(lead_id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_note_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Path(lead_id): Path<String>,
    Json(request): Json<NoteRequest>,
) -> Result<(StatusCode, Json<Note>), CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let note = state
        .service
        .add_note(&ctx, &LeadId(lead_id), request.body)?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn activities_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Path(lead_id): Path<String>,
) -> Result<Json<Vec<Activity>>, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let activities = state.service.activities(&ctx, &LeadId(lead_id))?;
    Ok(Json(activities))
}

async fn mark_contacted_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Path(lead_id): Path<String>,
) -> Result<Json<Lead>, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let lead = state.service.mark_contacted(&ctx, &LeadId(lead_id))?;
    Ok(Json(lead))
}

async fn bulk_status_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Json(request): Json<BulkStatusRequest>,
) -> Result<Json<serde_json::Value>, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let affected = state.service.bulk_update_status(
        &ctx,
        &request.ids,
        request.status,
        request.appointment_date,
    )?;
    Ok(Json(json!({ "affected": affected })))
}

async fn bulk_assign_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Json(request): Json<BulkAssignRequest>,
) -> Result<Json<serde_json::Value>, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let affected = state
        .service
        .bulk_assign(&ctx, &request.ids, &request.agent_id)?;
    Ok(Json(json!({ "affected": affected })))
}

async fn bulk_delete_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<serde_json::Value>, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let affected = state.service.bulk_delete(&ctx, &request.ids)?;
    Ok(Json(json!({ "affected": affected })))
}

async fn notifications_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
) -> Result<Json<NotificationFeed>, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let feed = state.dispatcher.list_recent(&ctx)?;
    Ok(Json(feed))
}

async fn mark_all_read_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
) -> Result<StatusCode, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    state.dispatcher.mark_all_read(&ctx)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_statuses_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
) -> Result<Json<Vec<StatusOption>>, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let statuses = state.service.statuses().list(&ctx)?;
    Ok(Json(statuses))
}

async fn create_status_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Json(draft): Json<NewStatusOption>,
) -> Result<(StatusCode, Json<StatusOption>), CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    let option = state.service.statuses().create(&ctx, draft)?;
    Ok((StatusCode::CREATED, Json(option)))
}

async fn set_last_step_handler<R, A>(
    State(state): State<EngineState<R, A>>,
    ctx: RequestContext,
    Path(status_id): Path<String>,
) -> Result<StatusCode, CoreError>
where
    R: CrmStore + 'static,
    A: AlertTransport + 'static,
{
    state
        .service
        .statuses()
        .set_last_step(&ctx, &StatusId(status_id))?;
    Ok(StatusCode::NO_CONTENT)
}
