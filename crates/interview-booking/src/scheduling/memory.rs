//! Reference in-process store used by the server, the CLI demo and the test suite.
//!
//! One mutex guards all four tables, so every port method is a single critical
//! section: the capacity check, counter increment and booking insert of
//! `insert_reserving` cannot interleave with another reservation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::domain::{
    AvailabilitySlot, Booking, BookingId, BookingStatus, CandidateId, DateRange, EmployerId,
    InterviewInvitation, InvitationStatus, JobId, JobPosting, SlotId,
};
use super::repository::{
    BookingEvent, BookingRepository, InvitationRepository, JobDirectory, NotificationError,
    NotificationSink, RepositoryError, SlotRepository,
};

#[derive(Debug, Default)]
struct StoreState {
    slots: HashMap<SlotId, AvailabilitySlot>,
    bookings: HashMap<BookingId, Booking>,
    invitations: HashMap<String, InterviewInvitation>,
    jobs: HashMap<JobId, JobPosting>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryScheduleStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a job known to the directory; replaces any posting with the same id.
    pub fn register_job(&self, job: JobPosting) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("schedule store lock poisoned".to_string()))
    }
}

#[async_trait]
impl SlotRepository for InMemoryScheduleStore {
    async fn insert_slot(
        &self,
        slot: AvailabilitySlot,
    ) -> Result<AvailabilitySlot, RepositoryError> {
        let mut state = self.lock()?;
        if state.slots.contains_key(&slot.id)
            || state.slots.values().any(|existing| existing.conflicts_with(&slot))
        {
            return Err(RepositoryError::Conflict);
        }
        state.slots.insert(slot.id.clone(), slot.clone());
        Ok(slot)
    }

    async fn update_slot(
        &self,
        mut slot: AvailabilitySlot,
    ) -> Result<AvailabilitySlot, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .slots
            .get(&slot.id)
            .ok_or(RepositoryError::NotFound)?;

        if slot.max_bookings < stored.current_bookings {
            return Err(RepositoryError::CapacityExhausted);
        }
        let moved = slot.date != stored.date || slot.range() != stored.range();
        if moved && stored.current_bookings > 0 {
            return Err(RepositoryError::InUse);
        }

        slot.employer_id = stored.employer_id.clone();
        slot.current_bookings = stored.current_bookings;
        slot.cancelled = stored.cancelled;
        slot.created_at = stored.created_at;

        if state.slots.values().any(|existing| existing.conflicts_with(&slot)) {
            return Err(RepositoryError::Conflict);
        }
        state.slots.insert(slot.id.clone(), slot.clone());
        Ok(slot)
    }

    async fn fetch_slot(&self, id: &SlotId) -> Result<Option<AvailabilitySlot>, RepositoryError> {
        Ok(self.lock()?.slots.get(id).cloned())
    }

    async fn slots_for_day(
        &self,
        employer_id: &EmployerId,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>, RepositoryError> {
        Ok(self
            .lock()?
            .slots
            .values()
            .filter(|slot| &slot.employer_id == employer_id && slot.date == date)
            .cloned()
            .collect())
    }

    async fn slots_in_range(
        &self,
        employer_id: &EmployerId,
        range: &DateRange,
    ) -> Result<Vec<AvailabilitySlot>, RepositoryError> {
        Ok(self
            .lock()?
            .slots
            .values()
            .filter(|slot| &slot.employer_id == employer_id && range.contains(slot.date))
            .cloned()
            .collect())
    }

    async fn delete_slot(&self, id: &SlotId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let slot = state.slots.get(id).ok_or(RepositoryError::NotFound)?;
        if slot.current_bookings > 0 {
            return Err(RepositoryError::InUse);
        }
        state.slots.remove(id);
        Ok(())
    }

    async fn cancel_slot(&self, id: &SlotId) -> Result<AvailabilitySlot, RepositoryError> {
        let mut state = self.lock()?;
        let booked = state
            .bookings
            .values()
            .any(|booking| &booking.slot_id == id && booking.is_active());
        let slot = state.slots.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if booked {
            return Err(RepositoryError::InUse);
        }
        slot.cancelled = true;
        Ok(slot.clone())
    }
}

#[async_trait]
impl BookingRepository for InMemoryScheduleStore {
    async fn insert_reserving(&self, booking: Booking) -> Result<Booking, RepositoryError> {
        let mut state = self.lock()?;
        let duplicate = state.bookings.values().any(|existing| {
            existing.slot_id == booking.slot_id
                && existing.candidate.candidate_id == booking.candidate.candidate_id
                && existing.is_active()
        });

        let slot = state
            .slots
            .get_mut(&booking.slot_id)
            .ok_or(RepositoryError::NotFound)?;
        if slot.cancelled {
            return Err(RepositoryError::InUse);
        }
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        if !slot.has_capacity() {
            return Err(RepositoryError::CapacityExhausted);
        }

        slot.current_bookings += 1;
        state.bookings.insert(booking.id.clone(), booking.clone());
        Ok(booking)
    }

    async fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        Ok(self.lock()?.bookings.get(id).cloned())
    }

    async fn transition_status(
        &self,
        id: &BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Booking>, RepositoryError> {
        let mut state = self.lock()?;
        let booking = state.bookings.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if booking.status != from {
            return Ok(None);
        }
        booking.status = to;
        Ok(Some(booking.clone()))
    }

    async fn release_capacity(&self, id: &BookingId) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        let state = &mut *state;
        let booking = state.bookings.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if !booking.status.releases_capacity() || booking.capacity_released {
            return Ok(false);
        }

        booking.capacity_released = true;
        if let Some(slot) = state.slots.get_mut(&booking.slot_id) {
            slot.current_bookings = slot.current_bookings.saturating_sub(1);
        }
        Ok(true)
    }

    async fn bookings_for_employer(
        &self,
        employer_id: &EmployerId,
        range: &DateRange,
    ) -> Result<Vec<Booking>, RepositoryError> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .filter(|booking| {
                &booking.employer_id == employer_id && range.contains(booking.scheduled_at.date())
            })
            .cloned()
            .collect())
    }

    async fn bookings_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Vec<Booking>, RepositoryError> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .filter(|booking| &booking.candidate.candidate_id == candidate_id)
            .cloned()
            .collect())
    }

    async fn bookings_for_slot(&self, slot_id: &SlotId) -> Result<Vec<Booking>, RepositoryError> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .filter(|booking| &booking.slot_id == slot_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InvitationRepository for InMemoryScheduleStore {
    async fn insert_invitation(
        &self,
        invitation: InterviewInvitation,
    ) -> Result<InterviewInvitation, RepositoryError> {
        let mut state = self.lock()?;
        if state.invitations.contains_key(&invitation.token) {
            return Err(RepositoryError::Conflict);
        }
        state
            .invitations
            .insert(invitation.token.clone(), invitation.clone());
        Ok(invitation)
    }

    async fn fetch_invitation(
        &self,
        token: &str,
    ) -> Result<Option<InterviewInvitation>, RepositoryError> {
        Ok(self.lock()?.invitations.get(token).cloned())
    }

    async fn mark_confirmed(
        &self,
        token: &str,
        booking_id: &BookingId,
        slot_id: &SlotId,
    ) -> Result<Option<InterviewInvitation>, RepositoryError> {
        let mut state = self.lock()?;
        let invitation = state
            .invitations
            .get_mut(token)
            .ok_or(RepositoryError::NotFound)?;
        if invitation.status != InvitationStatus::Pending {
            return Ok(None);
        }
        invitation.status = InvitationStatus::Confirmed;
        invitation.booking_id = Some(booking_id.clone());
        invitation.slot_id = Some(slot_id.clone());
        Ok(Some(invitation.clone()))
    }

    async fn update_invitation_status(
        &self,
        token: &str,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<Option<InterviewInvitation>, RepositoryError> {
        let mut state = self.lock()?;
        let invitation = state
            .invitations
            .get_mut(token)
            .ok_or(RepositoryError::NotFound)?;
        if invitation.status != from {
            return Ok(None);
        }
        invitation.status = to;
        Ok(Some(invitation.clone()))
    }

    async fn invitation_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<InterviewInvitation>, RepositoryError> {
        Ok(self
            .lock()?
            .invitations
            .values()
            .find(|invitation| invitation.booking_id.as_ref() == Some(booking_id))
            .cloned())
    }

    async fn invitations_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<InterviewInvitation>, RepositoryError> {
        Ok(self
            .lock()?
            .invitations
            .values()
            .filter(|invitation| &invitation.job_id == job_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobDirectory for InMemoryScheduleStore {
    async fn fetch_job(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }
}

/// Notification sink that records events instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNotificationSink {
    events: Arc<Mutex<Vec<BookingEvent>>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BookingEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn send(&self, event: BookingEvent) -> Result<(), NotificationError> {
        tracing::info!(
            event = event.kind.name(),
            booking_id = %event.booking_id,
            candidate_email = %event.candidate_email,
            "notification recorded"
        );
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("event log poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}
