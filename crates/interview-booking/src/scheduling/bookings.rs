use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::clock::Clock;
use super::domain::{
    Booking, BookingId, BookingStatus, Caller, CandidateId, CandidateInfo, DateRange, EmployerId,
    InterviewType, JobId, SlotId,
};
use super::error::SchedulingError;
use super::repository::{RepositoryError, ScheduleStore};
use super::require_manager;

/// Everything needed to turn a slot choice into a booking.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReservationRequest {
    pub slot_id: SlotId,
    pub job_id: JobId,
    pub candidate: CandidateInfo,
    #[serde(default)]
    pub interview_type: InterviewType,
    #[serde(default)]
    pub notes: Option<String>,
}

pub(crate) fn validate_candidate(candidate: &CandidateInfo) -> Result<(), SchedulingError> {
    if candidate.candidate_id.as_str().trim().is_empty() {
        return Err(SchedulingError::Validation(
            "candidate_id is required".to_string(),
        ));
    }
    if candidate.name.trim().is_empty() {
        return Err(SchedulingError::Validation(
            "candidate name is required".to_string(),
        ));
    }
    let email = candidate.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(SchedulingError::Validation(
            "candidate email is not a valid address".to_string(),
        )),
    }
}

/// Owns bookings and the capacity counter they consume.
pub struct BookingStore<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for BookingStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S> BookingStore<S>
where
    S: ScheduleStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Reserve one unit of slot capacity and record the booking atomically.
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Booking, SchedulingError> {
        validate_candidate(&request.candidate)?;

        let slot = self
            .store
            .fetch_slot(&request.slot_id)
            .await?
            .ok_or(SchedulingError::NotFound("slot"))?;
        let job = self
            .store
            .fetch_job(&request.job_id)
            .await?
            .ok_or(SchedulingError::NotFound("job"))?;
        if job.employer_id != slot.employer_id {
            return Err(SchedulingError::NotFound("slot"));
        }
        if slot.cancelled || slot.starts_at() <= self.clock.local_now() {
            return Err(SchedulingError::SlotClosed);
        }

        let notes = request
            .notes
            .map(|notes| notes.trim().to_string())
            .filter(|notes| !notes.is_empty());
        let booking = Booking {
            id: BookingId::generate(),
            slot_id: slot.id.clone(),
            job_id: job.id,
            employer_id: slot.employer_id.clone(),
            candidate: request.candidate,
            status: BookingStatus::Scheduled,
            interview_type: request.interview_type,
            notes,
            scheduled_at: slot.starts_at(),
            booked_at: self.clock.now(),
            capacity_released: false,
        };

        match self.store.insert_reserving(booking).await {
            Ok(stored) => {
                info!(
                    booking_id = %stored.id,
                    slot_id = %stored.slot_id,
                    candidate_id = %stored.candidate.candidate_id,
                    "booking reserved"
                );
                Ok(stored)
            }
            Err(RepositoryError::CapacityExhausted) => {
                info!(slot_id = %slot.id, "reservation refused, slot full");
                Err(SchedulingError::SlotFull)
            }
            Err(RepositoryError::Conflict) => Err(SchedulingError::DuplicateBooking),
            Err(RepositoryError::InUse) => Err(SchedulingError::SlotClosed),
            Err(RepositoryError::NotFound) => Err(SchedulingError::NotFound("slot")),
            Err(other) => Err(other.into()),
        }
    }

    /// Give the booking's capacity back to its slot. Repeated calls are no-ops.
    pub async fn release(&self, booking_id: &BookingId) -> Result<bool, SchedulingError> {
        match self.store.release_capacity(booking_id).await {
            Ok(true) => {
                info!(%booking_id, "slot capacity released");
                Ok(true)
            }
            Ok(false) => {
                debug!(%booking_id, "capacity release skipped");
                Ok(false)
            }
            Err(RepositoryError::NotFound) => Err(SchedulingError::NotFound("booking")),
            Err(other) => Err(other.into()),
        }
    }

    pub async fn get(&self, booking_id: &BookingId) -> Result<Booking, SchedulingError> {
        self.store
            .fetch_booking(booking_id)
            .await?
            .ok_or(SchedulingError::NotFound("booking"))
    }

    /// Fetch a booking visible to the caller: the owning employer, the candidate, or an admin.
    pub async fn get_for(
        &self,
        caller: &Caller,
        booking_id: &BookingId,
    ) -> Result<Booking, SchedulingError> {
        let booking = self.get(booking_id).await?;
        if caller.can_manage(&booking.employer_id)
            || caller.can_view_candidate(&booking.candidate.candidate_id)
        {
            Ok(booking)
        } else {
            Err(SchedulingError::Forbidden)
        }
    }

    pub async fn list_by_employer(
        &self,
        caller: &Caller,
        employer_id: &EmployerId,
        range: DateRange,
    ) -> Result<Vec<Booking>, SchedulingError> {
        require_manager(caller, employer_id)?;
        let mut bookings = self.store.bookings_for_employer(employer_id, &range).await?;
        sort_bookings(&mut bookings);
        Ok(bookings)
    }

    pub async fn list_by_candidate(
        &self,
        caller: &Caller,
        candidate_id: &CandidateId,
    ) -> Result<Vec<Booking>, SchedulingError> {
        if !caller.can_view_candidate(candidate_id) {
            return Err(SchedulingError::Forbidden);
        }
        let mut bookings = self.store.bookings_for_candidate(candidate_id).await?;
        sort_bookings(&mut bookings);
        Ok(bookings)
    }

    pub async fn list_by_slot(
        &self,
        caller: &Caller,
        slot_id: &SlotId,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let slot = self
            .store
            .fetch_slot(slot_id)
            .await?
            .ok_or(SchedulingError::NotFound("slot"))?;
        require_manager(caller, &slot.employer_id)?;
        let mut bookings = self.store.bookings_for_slot(slot_id).await?;
        sort_bookings(&mut bookings);
        Ok(bookings)
    }
}

pub(crate) fn sort_bookings(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| {
        (a.scheduled_at, a.booked_at, &a.id).cmp(&(b.scheduled_at, b.booked_at, &b.id))
    });
}
