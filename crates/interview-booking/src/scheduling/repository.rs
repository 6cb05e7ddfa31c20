use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{
    AvailabilitySlot, Booking, BookingId, BookingStatus, CandidateId, DateRange, EmployerId,
    InterviewInvitation, InvitationStatus, JobId, JobPosting, SlotId,
};

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record conflicts with an existing record")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("capacity exhausted")]
    CapacityExhausted,
    #[error("record is still referenced")]
    InUse,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Slot persistence. Implementations own overlap exclusion and the capacity counter.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Fails with `Conflict` if an active slot of the same employer and day overlaps.
    async fn insert_slot(&self, slot: AvailabilitySlot)
        -> Result<AvailabilitySlot, RepositoryError>;

    /// Persists the editable fields; `current_bookings` is kept from storage.
    /// `Conflict` on overlap, `CapacityExhausted` if `max_bookings` would drop
    /// below the stored counter, `InUse` if the date or window moves while the
    /// stored counter is non-zero.
    async fn update_slot(&self, slot: AvailabilitySlot)
        -> Result<AvailabilitySlot, RepositoryError>;

    async fn fetch_slot(&self, id: &SlotId) -> Result<Option<AvailabilitySlot>, RepositoryError>;

    async fn slots_for_day(
        &self,
        employer_id: &EmployerId,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>, RepositoryError>;

    async fn slots_in_range(
        &self,
        employer_id: &EmployerId,
        range: &DateRange,
    ) -> Result<Vec<AvailabilitySlot>, RepositoryError>;

    /// `InUse` while `current_bookings > 0`.
    async fn delete_slot(&self, id: &SlotId) -> Result<(), RepositoryError>;

    /// `InUse` while a scheduled booking references the slot.
    async fn cancel_slot(&self, id: &SlotId) -> Result<AvailabilitySlot, RepositoryError>;
}

/// Booking persistence including the atomic capacity reservation.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Increment the slot counter and insert the booking in one critical section,
    /// the equivalent of
    /// `UPDATE slots SET current = current + 1 WHERE id = ? AND current < max`
    /// followed by the insert within the same transaction.
    ///
    /// `NotFound` if the slot is gone, `InUse` if it was cancelled, `CapacityExhausted`
    /// when full, `Conflict` if the candidate already holds a scheduled booking on the slot.
    async fn insert_reserving(&self, booking: Booking) -> Result<Booking, RepositoryError>;

    async fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;

    /// Compare-and-set on the status. `Ok(None)` when the stored status is not `from`.
    async fn transition_status(
        &self,
        id: &BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Booking>, RepositoryError>;

    /// Hand the booking's unit of capacity back to its slot, at most once and only
    /// for statuses that release capacity. Returns whether a unit was returned.
    async fn release_capacity(&self, id: &BookingId) -> Result<bool, RepositoryError>;

    async fn bookings_for_employer(
        &self,
        employer_id: &EmployerId,
        range: &DateRange,
    ) -> Result<Vec<Booking>, RepositoryError>;

    async fn bookings_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Vec<Booking>, RepositoryError>;

    async fn bookings_for_slot(&self, slot_id: &SlotId) -> Result<Vec<Booking>, RepositoryError>;
}

/// Invitation persistence keyed by token.
#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// `Conflict` on a duplicate token.
    async fn insert_invitation(
        &self,
        invitation: InterviewInvitation,
    ) -> Result<InterviewInvitation, RepositoryError>;

    async fn fetch_invitation(
        &self,
        token: &str,
    ) -> Result<Option<InterviewInvitation>, RepositoryError>;

    /// Bind the booking and move `pending -> confirmed`. `Ok(None)` if no longer pending.
    async fn mark_confirmed(
        &self,
        token: &str,
        booking_id: &BookingId,
        slot_id: &SlotId,
    ) -> Result<Option<InterviewInvitation>, RepositoryError>;

    /// Compare-and-set on the status. `Ok(None)` when the stored status is not `from`.
    async fn update_invitation_status(
        &self,
        token: &str,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<Option<InterviewInvitation>, RepositoryError>;

    async fn invitation_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<InterviewInvitation>, RepositoryError>;

    async fn invitations_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<InterviewInvitation>, RepositoryError>;
}

/// Read-only view of jobs, owned by the recruiting side of the product.
#[async_trait]
pub trait JobDirectory: Send + Sync {
    async fn fetch_job(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError>;
}

/// Everything the engine needs from storage.
pub trait ScheduleStore: SlotRepository + BookingRepository + InvitationRepository + JobDirectory {}

impl<T> ScheduleStore for T where
    T: SlotRepository + BookingRepository + InvitationRepository + JobDirectory
{
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingEventKind {
    #[serde(rename = "booking.created")]
    Created,
    #[serde(rename = "booking.completed")]
    Completed,
    #[serde(rename = "booking.cancelled")]
    Cancelled,
    #[serde(rename = "booking.no_show")]
    NoShow,
}

impl BookingEventKind {
    pub const fn name(self) -> &'static str {
        match self {
            BookingEventKind::Created => "booking.created",
            BookingEventKind::Completed => "booking.completed",
            BookingEventKind::Cancelled => "booking.cancelled",
            BookingEventKind::NoShow => "booking.no_show",
        }
    }

    pub const fn for_status(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Scheduled => BookingEventKind::Created,
            BookingStatus::Completed => BookingEventKind::Completed,
            BookingStatus::Cancelled => BookingEventKind::Cancelled,
            BookingStatus::NoShow => BookingEventKind::NoShow,
        }
    }
}

/// Structured event handed to the delivery side; formatting and retries live there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub job_id: JobId,
    pub employer_id: EmployerId,
    pub candidate_email: String,
    pub scheduled_at: NaiveDateTime,
}

impl BookingEvent {
    pub fn from_booking(kind: BookingEventKind, booking: &Booking) -> Self {
        Self {
            kind,
            booking_id: booking.id.clone(),
            slot_id: booking.slot_id.clone(),
            job_id: booking.job_id.clone(),
            employer_id: booking.employer_id.clone(),
            candidate_email: booking.candidate.email.clone(),
            scheduled_at: booking.scheduled_at,
        }
    }
}

/// One-way outbound hook (e-mail, in-app notification adapters).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, event: BookingEvent) -> Result<(), NotificationError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Best-effort send: failures are logged and never undo the state change that produced the event.
pub(crate) async fn dispatch<N>(sink: &N, event: BookingEvent)
where
    N: NotificationSink + ?Sized,
{
    let kind = event.kind.name();
    let booking_id = event.booking_id.clone();
    match sink.send(event).await {
        Ok(()) => tracing::debug!(event = kind, %booking_id, "notification dispatched"),
        Err(err) => {
            tracing::warn!(event = kind, %booking_id, error = %err, "notification dispatch failed")
        }
    }
}
