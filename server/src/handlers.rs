//! Route handlers. Each one translates HTTP input, runs one core operation on the store and
//! serializes the result.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use iss_core::analytics::{
    build_dashboard_stats, list_active_impacts, recent_activity, ActiveImpact, ActivityEntry,
    DashboardStats, ACTIVITY_FEED_LEN,
};
use iss_core::deflection::{search_deflection, DeflectionResult};
use iss_core::domain::{NewService, ResolveTicket, Service, Ticket, TicketStatus};
use iss_core::repo::{
    self, get_ticket_detail, list_services, TicketDetail, TicketFilter, TicketListItem,
};
use iss_core::validate::{validate_ticket_draft, TicketDraft};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

pub const LIVENESS_MESSAGE: &str = "Impact Support System API is Running";

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn root() -> &'static str {
    LIVENESS_MESSAGE
}

pub async fn active_impacts(State(state): State<AppState>) -> ApiResult<Vec<ActiveImpact>> {
    let hints = state.hints.clone();
    let impacts = state
        .with_conn(move |conn| list_active_impacts(conn, &hints))
        .await?;
    Ok(Json(impacts))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeflectionQuery {
    pub q: Option<String>,
}

pub async fn deflection(
    State(state): State<AppState>,
    query: Result<Query<DeflectionQuery>, QueryRejection>,
) -> Json<DeflectionResult> {
    let q = query.map(|Query(q)| q.q).unwrap_or_default();
    match state
        .with_conn(move |conn| search_deflection(conn, q.as_deref()))
        .await
    {
        Ok(result) => Json(result),
        Err(err) => {
            warn!(
                code = err.code.as_str(),
                details = err.details.as_deref().unwrap_or(""),
                "deflection search degraded to empty result"
            );
            Json(DeflectionResult::default())
        }
    }
}

pub async fn activity_log(State(state): State<AppState>) -> Json<Vec<ActivityEntry>> {
    match state
        .with_conn(|conn| recent_activity(conn, ACTIVITY_FEED_LEN))
        .await
    {
        Ok(entries) => Json(entries),
        Err(err) => {
            warn!(
                code = err.code.as_str(),
                details = err.details.as_deref().unwrap_or(""),
                "activity log degraded to empty result"
            );
            Json(Vec::new())
        }
    }
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let stats = state.with_conn(|conn| build_dashboard_stats(conn)).await?;
    Ok(Json(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    pub status: Option<String>,
    pub limit: Option<String>,
}

fn parse_limit(raw: Option<&str>) -> Result<Option<u32>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<u32>()
            .map(Some)
            .map_err(|_| {
                ApiError::bad_request(format!("limit must be a non-negative integer, got {v}"))
            }),
    }
}

pub async fn list_tickets(
    State(state): State<AppState>,
    query: Result<Query<TicketQuery>, QueryRejection>,
) -> ApiResult<Vec<TicketListItem>> {
    let Query(query) = query?;
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<TicketStatus>()?),
    };
    let limit = state.config.ticket_limit(parse_limit(query.limit.as_deref())?);
    let filter = TicketFilter {
        status,
        limit: Some(limit),
    };

    let tickets = state
        .with_conn(move |conn| repo::list_tickets(conn, &filter))
        .await?;
    Ok(Json(tickets))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<TicketDetail> {
    let Path(id) = id?;
    let hints = state.hints.clone();
    let detail = state
        .with_conn(move |conn| get_ticket_detail(conn, id, &hints))
        .await?;
    Ok(Json(detail))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedTicket {
    pub success: bool,
    pub id: i64,
    pub incident_id: String,
    pub impact_score: i64,
}

pub async fn create_ticket(
    State(state): State<AppState>,
    payload: Result<Json<TicketDraft>, JsonRejection>,
) -> ApiResult<CreatedTicket> {
    let Json(draft) = payload?;
    let new_ticket = validate_ticket_draft(&draft)?;
    let ticket = state
        .with_conn(move |conn| repo::create_ticket(conn, &new_ticket, OffsetDateTime::now_utc()))
        .await?;
    Ok(Json(CreatedTicket {
        success: true,
        id: ticket.id,
        incident_id: ticket.incident_id,
        impact_score: ticket.impact_score,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Ticket> {
    let Path(id) = id?;
    let Json(update) = payload?;
    let status = update
        .status
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Missing required field: status"))?
        .parse::<TicketStatus>()?;
    let ticket = state
        .with_conn(move |conn| repo::update_ticket_status(conn, id, status))
        .await?;
    Ok(Json(ticket))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    pub root_cause: Option<String>,
    pub root_cause_category: Option<String>,
}

pub async fn resolve(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> ApiResult<Ticket> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let resolution = ResolveTicket {
        root_cause: req.root_cause.unwrap_or_default(),
        root_cause_category: req.root_cause_category,
    };
    let ticket = state
        .with_conn(move |conn| {
            repo::resolve_ticket(conn, id, &resolution, OffsetDateTime::now_utc())
        })
        .await?;
    Ok(Json(ticket))
}

#[derive(Debug, Default, Deserialize)]
pub struct EtaOverrideRequest {
    pub eta_override: Option<String>,
}

pub async fn eta_override(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<EtaOverrideRequest>, JsonRejection>,
) -> ApiResult<Ticket> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let ticket = state
        .with_conn(move |conn| repo::set_eta_override(conn, id, req.eta_override.as_deref()))
        .await?;
    Ok(Json(ticket))
}

pub async fn services(State(state): State<AppState>) -> ApiResult<Vec<Service>> {
    let services = state.with_conn(|conn| list_services(conn)).await?;
    Ok(Json(services))
}

pub async fn create_service(
    State(state): State<AppState>,
    payload: Result<Json<NewService>, JsonRejection>,
) -> Result<(StatusCode, Json<Service>), ApiError> {
    let Json(service) = payload?;
    let created = state
        .with_conn(move |conn| repo::create_service(conn, &service))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
