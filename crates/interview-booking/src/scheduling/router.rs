use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    AvailabilitySlot, BookingId, BookingStatus, Caller, CallerRole, CandidateId, CandidateInfo,
    DateRange, EmployerId, InterviewType, JobId, SlotId, SlotView,
};
use super::engine::SchedulingEngine;
use super::error::SchedulingError;
use super::invitations::IssueInvitation;
use super::repository::{NotificationSink, ScheduleStore};
use super::slots::{SlotDraft, SlotPatch};

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

/// Caller identity asserted by the upstream auth layer through request headers.
#[derive(Debug, Clone)]
pub struct RequestCaller(pub Caller);

impl RequestCaller {
    pub fn from_headers(headers: &HeaderMap) -> Option<Caller> {
        let id = headers
            .get(CALLER_ID_HEADER)?
            .to_str()
            .ok()
            .map(str::trim)
            .filter(|id| !id.is_empty())?;
        let role = CallerRole::parse(headers.get(CALLER_ROLE_HEADER)?.to_str().ok()?)?;
        Some(Caller {
            id: id.to_string(),
            role,
        })
    }
}

#[async_trait]
impl<St> FromRequestParts<St> for RequestCaller
where
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        match Self::from_headers(&parts.headers) {
            Some(caller) => Ok(RequestCaller(caller)),
            None => {
                let payload = json!({ "error": "caller identity required" });
                Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response())
            }
        }
    }
}

/// Optional inclusive window; an open end means unbounded.
#[derive(Debug, Default, Deserialize)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    fn range(&self) -> Result<DateRange, SchedulingError> {
        DateRange::new(
            self.from.unwrap_or(NaiveDate::MIN),
            self.to.unwrap_or(NaiveDate::MAX),
        )
        .ok_or_else(|| SchedulingError::Validation("from must not be after to".to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub history: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct InvitationRequest {
    pub candidate: CandidateInfo,
    #[serde(default)]
    pub interview_type: InterviewType,
    #[serde(default)]
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub slot_id: SlotId,
    #[serde(default)]
    pub notes: Option<String>,
}

/// HTTP surface of the scheduling engine.
pub fn scheduling_router<S, N>(engine: SchedulingEngine<S, N>) -> Router
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/employers/:employer_id/slots",
            post(create_slot_handler::<S, N>).get(list_slots_handler::<S, N>),
        )
        .route(
            "/api/v1/slots/:slot_id",
            get(get_slot_handler::<S, N>)
                .patch(update_slot_handler::<S, N>)
                .delete(delete_slot_handler::<S, N>),
        )
        .route(
            "/api/v1/slots/:slot_id/cancel",
            post(cancel_slot_handler::<S, N>),
        )
        .route(
            "/api/v1/slots/:slot_id/bookings",
            get(slot_bookings_handler::<S, N>),
        )
        .route(
            "/api/v1/employers/:employer_id/calendar",
            get(calendar_handler::<S, N>),
        )
        .route(
            "/api/v1/employers/:employer_id/bookings",
            get(employer_bookings_handler::<S, N>),
        )
        .route("/api/v1/bookings/:booking_id", get(get_booking_handler::<S, N>))
        .route(
            "/api/v1/bookings/:booking_id/status",
            post(transition_handler::<S, N>),
        )
        .route(
            "/api/v1/jobs/:job_id/invitations",
            post(issue_invitation_handler::<S, N>).get(list_invitations_handler::<S, N>),
        )
        .route(
            "/api/v1/jobs/:job_id/available-slots",
            get(available_slots_handler::<S, N>),
        )
        .route(
            "/api/v1/invitations/:token",
            get(resolve_invitation_handler::<S, N>).delete(revoke_invitation_handler::<S, N>),
        )
        .route(
            "/api/v1/invitations/:token/redeem",
            post(redeem_invitation_handler::<S, N>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/bookings",
            get(candidate_bookings_handler::<S, N>),
        )
        .with_state(engine)
}

fn slot_views(slots: &[AvailabilitySlot]) -> Vec<SlotView> {
    slots.iter().map(AvailabilitySlot::view).collect()
}

pub(crate) async fn create_slot_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(employer_id): Path<String>,
    Json(draft): Json<SlotDraft>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let slot = engine
        .slots()
        .create_slot(&caller, &EmployerId(employer_id), draft)
        .await?;
    Ok((StatusCode::CREATED, Json(slot.view())).into_response())
}

pub(crate) async fn list_slots_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(employer_id): Path<String>,
    Query(window): Query<DateWindow>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let slots = engine
        .slots()
        .list_slots(&caller, &EmployerId(employer_id), window.range()?)
        .await?;
    Ok(Json(slot_views(&slots)).into_response())
}

pub(crate) async fn get_slot_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(slot_id): Path<String>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let slot = engine.slots().get_slot(&caller, &SlotId(slot_id)).await?;
    Ok(Json(slot.view()).into_response())
}

pub(crate) async fn update_slot_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(slot_id): Path<String>,
    Json(slot_patch): Json<SlotPatch>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let slot = engine
        .slots()
        .update_slot(&caller, &SlotId(slot_id), slot_patch)
        .await?;
    Ok(Json(slot.view()).into_response())
}

pub(crate) async fn delete_slot_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(slot_id): Path<String>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    engine.slots().delete_slot(&caller, &SlotId(slot_id)).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn cancel_slot_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(slot_id): Path<String>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let slot = engine.slots().cancel_slot(&caller, &SlotId(slot_id)).await?;
    Ok(Json(slot.view()).into_response())
}

pub(crate) async fn slot_bookings_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(slot_id): Path<String>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let bookings = engine
        .bookings()
        .list_by_slot(&caller, &SlotId(slot_id))
        .await?;
    Ok(Json(bookings).into_response())
}

pub(crate) async fn calendar_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(employer_id): Path<String>,
    Query(window): Query<DateWindow>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let days = engine
        .calendar()
        .employer_calendar(&caller, &EmployerId(employer_id), window.range()?)
        .await?;
    Ok(Json(days).into_response())
}

pub(crate) async fn employer_bookings_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(employer_id): Path<String>,
    Query(window): Query<DateWindow>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let bookings = engine
        .bookings()
        .list_by_employer(&caller, &EmployerId(employer_id), window.range()?)
        .await?;
    Ok(Json(bookings).into_response())
}

pub(crate) async fn get_booking_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(booking_id): Path<String>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let booking = engine
        .bookings()
        .get_for(&caller, &BookingId(booking_id))
        .await?;
    Ok(Json(booking).into_response())
}

pub(crate) async fn transition_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(booking_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let booking = engine
        .lifecycle()
        .transition(&caller, &BookingId(booking_id), update.status)
        .await?;
    Ok(Json(booking).into_response())
}

pub(crate) async fn issue_invitation_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(job_id): Path<String>,
    Json(request): Json<InvitationRequest>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let issued = engine
        .invitations()
        .issue(
            &caller,
            IssueInvitation {
                job_id: JobId(job_id),
                candidate: request.candidate,
                interview_type: request.interview_type,
                ttl_hours: request.ttl_hours,
            },
        )
        .await?;
    let payload = json!({
        "invitation_id": issued.invitation.id,
        "token": issued.invitation.token,
        "expires_at": issued.invitation.token_expires_at,
        "invite_url": issued.invite_url,
    });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn list_invitations_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(job_id): Path<String>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let invitations = engine
        .invitations()
        .list_for_job(&caller, &JobId(job_id))
        .await?;
    Ok(Json(invitations).into_response())
}

pub(crate) async fn revoke_invitation_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(token): Path<String>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    engine.invitations().revoke(&caller, &token).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn available_slots_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    Path(job_id): Path<String>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let slots = engine
        .slots()
        .list_available_slots(&JobId(job_id))
        .await?;
    Ok(Json(slot_views(&slots)).into_response())
}

pub(crate) async fn resolve_invitation_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    Path(token): Path<String>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let view = engine.invitations().resolve(&token).await?;
    Ok(Json(view).into_response())
}

pub(crate) async fn redeem_invitation_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    Path(token): Path<String>,
    Json(request): Json<RedeemRequest>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let booking = engine
        .invitations()
        .redeem(&token, &request.slot_id, request.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

pub(crate) async fn candidate_bookings_handler<S, N>(
    State(engine): State<SchedulingEngine<S, N>>,
    RequestCaller(caller): RequestCaller,
    Path(candidate_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, SchedulingError>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    let bookings = engine
        .calendar()
        .candidate_upcoming(&caller, &CandidateId(candidate_id), query.history)
        .await?;
    Ok(Json(bookings).into_response())
}
