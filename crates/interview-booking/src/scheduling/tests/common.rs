use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::config::SchedulingConfig;
use crate::scheduling::domain::{
    AvailabilitySlot, Booking, BookingId, BookingStatus, Caller, CandidateId, CandidateInfo,
    DateRange, EmployerId, InterviewInvitation, InterviewType, InvitationStatus, JobId,
    JobPosting, MeetingDetails, SlotId,
};
use crate::scheduling::repository::{
    BookingEvent, BookingRepository, InvitationRepository, JobDirectory, NotificationError,
    NotificationSink, RepositoryError, SlotRepository,
};
use crate::scheduling::{
    Clock, FixedClock, InMemoryNotificationSink, InMemoryScheduleStore, ReservationRequest,
    SchedulingEngine, SlotDraft,
};

pub(super) const EMPLOYER: &str = "emp-acme";
pub(super) const OTHER_EMPLOYER: &str = "emp-globex";
pub(super) const JOB: &str = "job-backend";
pub(super) const OTHER_JOB: &str = "job-globex-sre";

pub(super) fn interview_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
}

pub(super) fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

/// One week before the interview day.
pub(super) fn clock_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 3)
        .expect("valid date")
        .and_time(time(8, 0))
}

pub(super) fn employer() -> Caller {
    Caller::employer(EMPLOYER)
}

pub(super) fn other_employer() -> Caller {
    Caller::employer(OTHER_EMPLOYER)
}

pub(super) fn admin() -> Caller {
    Caller::admin("ops-admin")
}

pub(super) fn employer_id() -> EmployerId {
    EmployerId::new(EMPLOYER)
}

pub(super) fn job_id() -> JobId {
    JobId::new(JOB)
}

pub(super) fn draft(start: NaiveTime, end: NaiveTime) -> SlotDraft {
    SlotDraft {
        date: interview_day(),
        start_time: start,
        end_time: Some(end),
        duration_minutes: None,
        timezone: "America/Chicago".to_string(),
        meeting: MeetingDetails::Video {
            link: "https://meet.example.com/acme-backend".to_string(),
        },
        instructions: Some("Join five minutes early.".to_string()),
        max_bookings: 1,
        is_recurring: false,
    }
}

pub(super) fn draft_with_capacity(
    start: NaiveTime,
    end: NaiveTime,
    max_bookings: u32,
) -> SlotDraft {
    SlotDraft {
        max_bookings,
        ..draft(start, end)
    }
}

pub(super) fn candidate(suffix: &str) -> CandidateInfo {
    CandidateInfo {
        candidate_id: CandidateId::new(format!("cand-{suffix}")),
        name: format!("Candidate {suffix}"),
        email: format!("candidate.{suffix}@example.com"),
        phone: None,
    }
}

pub(super) fn reservation(slot_id: &SlotId, suffix: &str) -> ReservationRequest {
    ReservationRequest {
        slot_id: slot_id.clone(),
        job_id: job_id(),
        candidate: candidate(suffix),
        interview_type: InterviewType::Technical,
        notes: None,
    }
}

pub(super) struct Harness {
    pub(super) engine: SchedulingEngine<InMemoryScheduleStore, InMemoryNotificationSink>,
    pub(super) store: Arc<InMemoryScheduleStore>,
    pub(super) notifications: Arc<InMemoryNotificationSink>,
    pub(super) clock: Arc<FixedClock>,
}

impl Harness {
    pub(super) async fn publish(&self, start: NaiveTime, end: NaiveTime) -> AvailabilitySlot {
        self.engine
            .slots()
            .create_slot(&employer(), &employer_id(), draft(start, end))
            .await
            .expect("slot published")
    }

    pub(super) async fn slot(&self, slot_id: &SlotId) -> AvailabilitySlot {
        self.store
            .fetch_slot(slot_id)
            .await
            .expect("fetch succeeds")
            .expect("slot present")
    }

    pub(super) async fn book(&self, slot_id: &SlotId, suffix: &str) -> Booking {
        self.engine
            .bookings()
            .reserve(reservation(slot_id, suffix))
            .await
            .expect("reservation succeeds")
    }
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(InMemoryScheduleStore::new());
    store
        .register_job(JobPosting {
            id: job_id(),
            employer_id: employer_id(),
            title: "Backend Engineer".to_string(),
        })
        .expect("job registered");
    store
        .register_job(JobPosting {
            id: JobId::new(OTHER_JOB),
            employer_id: EmployerId::new(OTHER_EMPLOYER),
            title: "Site Reliability Engineer".to_string(),
        })
        .expect("job registered");

    let notifications = Arc::new(InMemoryNotificationSink::new());
    let clock = Arc::new(FixedClock::at(clock_start()));
    let engine = SchedulingEngine::new(
        store.clone(),
        notifications.clone(),
        clock.clone() as Arc<dyn Clock>,
        SchedulingConfig::default(),
    );

    Harness {
        engine,
        store,
        notifications,
        clock,
    }
}

pub(super) struct FailingNotifications;

#[async_trait]
impl NotificationSink for FailingNotifications {
    async fn send(&self, _event: BookingEvent) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

#[async_trait]
impl SlotRepository for UnavailableStore {
    async fn insert_slot(
        &self,
        _slot: AvailabilitySlot,
    ) -> Result<AvailabilitySlot, RepositoryError> {
        offline()
    }

    async fn update_slot(
        &self,
        _slot: AvailabilitySlot,
    ) -> Result<AvailabilitySlot, RepositoryError> {
        offline()
    }

    async fn fetch_slot(&self, _id: &SlotId) -> Result<Option<AvailabilitySlot>, RepositoryError> {
        offline()
    }

    async fn slots_for_day(
        &self,
        _employer_id: &EmployerId,
        _date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>, RepositoryError> {
        offline()
    }

    async fn slots_in_range(
        &self,
        _employer_id: &EmployerId,
        _range: &DateRange,
    ) -> Result<Vec<AvailabilitySlot>, RepositoryError> {
        offline()
    }

    async fn delete_slot(&self, _id: &SlotId) -> Result<(), RepositoryError> {
        offline()
    }

    async fn cancel_slot(&self, _id: &SlotId) -> Result<AvailabilitySlot, RepositoryError> {
        offline()
    }
}

#[async_trait]
impl BookingRepository for UnavailableStore {
    async fn insert_reserving(&self, _booking: Booking) -> Result<Booking, RepositoryError> {
        offline()
    }

    async fn fetch_booking(&self, _id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        offline()
    }

    async fn transition_status(
        &self,
        _id: &BookingId,
        _from: BookingStatus,
        _to: BookingStatus,
    ) -> Result<Option<Booking>, RepositoryError> {
        offline()
    }

    async fn release_capacity(&self, _id: &BookingId) -> Result<bool, RepositoryError> {
        offline()
    }

    async fn bookings_for_employer(
        &self,
        _employer_id: &EmployerId,
        _range: &DateRange,
    ) -> Result<Vec<Booking>, RepositoryError> {
        offline()
    }

    async fn bookings_for_candidate(
        &self,
        _candidate_id: &CandidateId,
    ) -> Result<Vec<Booking>, RepositoryError> {
        offline()
    }

    async fn bookings_for_slot(&self, _slot_id: &SlotId) -> Result<Vec<Booking>, RepositoryError> {
        offline()
    }
}

#[async_trait]
impl InvitationRepository for UnavailableStore {
    async fn insert_invitation(
        &self,
        _invitation: InterviewInvitation,
    ) -> Result<InterviewInvitation, RepositoryError> {
        offline()
    }

    async fn fetch_invitation(
        &self,
        _token: &str,
    ) -> Result<Option<InterviewInvitation>, RepositoryError> {
        offline()
    }

    async fn mark_confirmed(
        &self,
        _token: &str,
        _booking_id: &BookingId,
        _slot_id: &SlotId,
    ) -> Result<Option<InterviewInvitation>, RepositoryError> {
        offline()
    }

    async fn update_invitation_status(
        &self,
        _token: &str,
        _from: InvitationStatus,
        _to: InvitationStatus,
    ) -> Result<Option<InterviewInvitation>, RepositoryError> {
        offline()
    }

    async fn invitation_for_booking(
        &self,
        _booking_id: &BookingId,
    ) -> Result<Option<InterviewInvitation>, RepositoryError> {
        offline()
    }

    async fn invitations_for_job(
        &self,
        _job_id: &JobId,
    ) -> Result<Vec<InterviewInvitation>, RepositoryError> {
        offline()
    }
}

#[async_trait]
impl JobDirectory for UnavailableStore {
    async fn fetch_job(&self, _id: &JobId) -> Result<Option<JobPosting>, RepositoryError> {
        offline()
    }
}

pub(super) fn offline_engine() -> SchedulingEngine<UnavailableStore, InMemoryNotificationSink> {
    SchedulingEngine::new(
        Arc::new(UnavailableStore),
        Arc::new(InMemoryNotificationSink::new()),
        Arc::new(FixedClock::at(clock_start())),
        SchedulingConfig::default(),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
