use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::{debug, info};

use super::clock::Clock;
use super::domain::{
    AvailabilitySlot, Caller, DateRange, EmployerId, JobId, MeetingDetails, SlotId,
};
use super::error::SchedulingError;
use super::repository::{RepositoryError, ScheduleStore};
use super::require_manager;
use super::time_range::{self, format_clock, TimeRange};

fn default_max_bookings() -> u32 {
    1
}

/// Employer input for publishing a slot. Either `end_time` or `duration_minutes` is required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlotDraft {
    pub date: NaiveDate,
    #[serde(with = "time_range::clock")]
    pub start_time: NaiveTime,
    #[serde(default, with = "time_range::clock::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub timezone: String,
    pub meeting: MeetingDetails,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_max_bookings")]
    pub max_bookings: u32,
    #[serde(default)]
    pub is_recurring: bool,
}

impl SlotDraft {
    fn range(&self) -> Result<TimeRange, SchedulingError> {
        match (self.end_time, self.duration_minutes) {
            (Some(end), minutes) => {
                let range = TimeRange::new(self.start_time, end)?;
                Ok(range.apply_edit(None, Some(end), minutes)?)
            }
            (None, Some(minutes)) => Ok(TimeRange::from_duration(self.start_time, minutes)?),
            (None, None) => Err(SchedulingError::Validation(
                "end_time or duration_minutes is required".to_string(),
            )),
        }
    }
}

/// Partial edit of a slot; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlotPatch {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "time_range::clock::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "time_range::clock::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub meeting: Option<MeetingDetails>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub max_bookings: Option<u32>,
    #[serde(default)]
    pub is_recurring: Option<bool>,
}

fn validate_meeting(meeting: &MeetingDetails) -> Result<(), SchedulingError> {
    if meeting.payload().trim().is_empty() {
        return Err(SchedulingError::Validation(format!(
            "{} meetings need a {}",
            meeting.meeting_type().label(),
            match meeting {
                MeetingDetails::Video { .. } => "link",
                MeetingDetails::Phone { .. } => "phone number",
                MeetingDetails::InPerson { .. } => "location",
            }
        )));
    }
    Ok(())
}

fn validate_timezone(timezone: &str) -> Result<(), SchedulingError> {
    if timezone.trim().is_empty() {
        return Err(SchedulingError::Validation(
            "timezone is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_capacity(max_bookings: u32) -> Result<(), SchedulingError> {
    if max_bookings == 0 {
        return Err(SchedulingError::Validation(
            "max_bookings must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Owns availability slots and keeps each employer-day free of overlaps.
pub struct SlotStore<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for SlotStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S> SlotStore<S>
where
    S: ScheduleStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create_slot(
        &self,
        caller: &Caller,
        employer_id: &EmployerId,
        draft: SlotDraft,
    ) -> Result<AvailabilitySlot, SchedulingError> {
        require_manager(caller, employer_id)?;

        let range = draft.range()?;
        validate_capacity(draft.max_bookings)?;
        validate_meeting(&draft.meeting)?;
        validate_timezone(&draft.timezone)?;

        let mut slot = AvailabilitySlot {
            id: SlotId::generate(),
            employer_id: employer_id.clone(),
            date: draft.date,
            start_time: range.start,
            end_time: range.end,
            duration_minutes: 0,
            timezone: draft.timezone.trim().to_string(),
            meeting: draft.meeting,
            instructions: draft.instructions,
            max_bookings: draft.max_bookings,
            current_bookings: 0,
            cancelled: false,
            is_recurring: draft.is_recurring,
            created_at: self.clock.now(),
        };
        slot.set_range(range);

        self.ensure_no_overlap(&slot).await?;
        let stored = match self.store.insert_slot(slot.clone()).await {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => return Err(self.conflict_error(&slot).await),
            Err(other) => return Err(other.into()),
        };

        info!(
            slot_id = %stored.id,
            employer_id = %stored.employer_id,
            date = %stored.date,
            start = %format_clock(stored.start_time),
            end = %format_clock(stored.end_time),
            "slot published"
        );
        Ok(stored)
    }

    pub async fn update_slot(
        &self,
        caller: &Caller,
        slot_id: &SlotId,
        patch: SlotPatch,
    ) -> Result<AvailabilitySlot, SchedulingError> {
        let mut slot = self.get_slot(caller, slot_id).await?;
        if slot.cancelled {
            return Err(SchedulingError::Validation(
                "cancelled slots cannot be edited".to_string(),
            ));
        }

        let range = slot
            .range()
            .apply_edit(patch.start_time, patch.end_time, patch.duration_minutes)?;
        let date = patch.date.unwrap_or(slot.date);
        // Bookings carry the slot's time in scheduled_at, so the window is frozen while booked.
        if (range != slot.range() || date != slot.date) && slot.current_bookings > 0 {
            return Err(SchedulingError::HasBookings);
        }
        slot.set_range(range);
        slot.date = date;
        if let Some(timezone) = patch.timezone {
            validate_timezone(&timezone)?;
            slot.timezone = timezone.trim().to_string();
        }
        if let Some(meeting) = patch.meeting {
            validate_meeting(&meeting)?;
            slot.meeting = meeting;
        }
        if let Some(instructions) = patch.instructions {
            slot.instructions = Some(instructions);
        }
        if let Some(max_bookings) = patch.max_bookings {
            validate_capacity(max_bookings)?;
            if max_bookings < slot.current_bookings {
                return Err(capacity_below_bookings(slot.current_bookings));
            }
            slot.max_bookings = max_bookings;
        }
        if let Some(is_recurring) = patch.is_recurring {
            slot.is_recurring = is_recurring;
        }

        self.ensure_no_overlap(&slot).await?;
        let stored = match self.store.update_slot(slot.clone()).await {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => return Err(self.conflict_error(&slot).await),
            Err(RepositoryError::CapacityExhausted) => {
                return Err(capacity_below_bookings(slot.current_bookings))
            }
            Err(RepositoryError::InUse) => return Err(SchedulingError::HasBookings),
            Err(RepositoryError::NotFound) => return Err(SchedulingError::NotFound("slot")),
            Err(other) => return Err(other.into()),
        };

        info!(slot_id = %stored.id, date = %stored.date, "slot updated");
        Ok(stored)
    }

    pub async fn delete_slot(
        &self,
        caller: &Caller,
        slot_id: &SlotId,
    ) -> Result<(), SchedulingError> {
        let slot = self.get_slot(caller, slot_id).await?;
        if slot.current_bookings > 0 {
            return Err(SchedulingError::HasBookings);
        }

        match self.store.delete_slot(slot_id).await {
            Ok(()) => {
                info!(%slot_id, "slot deleted");
                Ok(())
            }
            Err(RepositoryError::InUse) => Err(SchedulingError::HasBookings),
            Err(RepositoryError::NotFound) => Err(SchedulingError::NotFound("slot")),
            Err(other) => Err(other.into()),
        }
    }

    /// Withdraw a slot from availability while keeping it for history.
    pub async fn cancel_slot(
        &self,
        caller: &Caller,
        slot_id: &SlotId,
    ) -> Result<AvailabilitySlot, SchedulingError> {
        let slot = self.get_slot(caller, slot_id).await?;
        if slot.cancelled {
            return Ok(slot);
        }

        match self.store.cancel_slot(slot_id).await {
            Ok(cancelled) => {
                info!(%slot_id, "slot cancelled");
                Ok(cancelled)
            }
            Err(RepositoryError::InUse) => Err(SchedulingError::HasBookings),
            Err(RepositoryError::NotFound) => Err(SchedulingError::NotFound("slot")),
            Err(other) => Err(other.into()),
        }
    }

    /// Fetch a slot the caller is allowed to manage.
    pub async fn get_slot(
        &self,
        caller: &Caller,
        slot_id: &SlotId,
    ) -> Result<AvailabilitySlot, SchedulingError> {
        let slot = self
            .store
            .fetch_slot(slot_id)
            .await?
            .ok_or(SchedulingError::NotFound("slot"))?;
        require_manager(caller, &slot.employer_id)?;
        Ok(slot)
    }

    pub async fn list_slots(
        &self,
        caller: &Caller,
        employer_id: &EmployerId,
        range: DateRange,
    ) -> Result<Vec<AvailabilitySlot>, SchedulingError> {
        require_manager(caller, employer_id)?;
        let mut slots = self.store.slots_in_range(employer_id, &range).await?;
        sort_slots(&mut slots);
        debug!(%employer_id, count = slots.len(), "listed slots");
        Ok(slots)
    }

    /// Open, upcoming slots of the employer that owns `job_id`.
    pub async fn list_available_slots(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<AvailabilitySlot>, SchedulingError> {
        let job = self
            .store
            .fetch_job(job_id)
            .await?
            .ok_or(SchedulingError::NotFound("job"))?;

        let now = self.clock.local_now();
        let upcoming = DateRange {
            from: now.date(),
            to: NaiveDate::MAX,
        };
        let mut slots: Vec<_> = self
            .store
            .slots_in_range(&job.employer_id, &upcoming)
            .await?
            .into_iter()
            .filter(|slot| slot.is_active() && slot.has_capacity() && slot.starts_at() > now)
            .collect();
        sort_slots(&mut slots);
        Ok(slots)
    }

    async fn ensure_no_overlap(&self, slot: &AvailabilitySlot) -> Result<(), SchedulingError> {
        let same_day = self
            .store
            .slots_for_day(&slot.employer_id, slot.date)
            .await?;
        match same_day.iter().find(|existing| existing.conflicts_with(slot)) {
            Some(existing) => Err(overlap(existing)),
            None => Ok(()),
        }
    }

    /// The store refused on overlap after our pre-check passed: a concurrent write won.
    async fn conflict_error(&self, slot: &AvailabilitySlot) -> SchedulingError {
        match self.ensure_no_overlap(slot).await {
            Err(err) => err,
            Ok(()) => SchedulingError::Repository(RepositoryError::Conflict),
        }
    }
}

fn overlap(existing: &AvailabilitySlot) -> SchedulingError {
    SchedulingError::Overlap {
        conflicting: existing.id.clone(),
        start: format_clock(existing.start_time),
        end: format_clock(existing.end_time),
    }
}

fn capacity_below_bookings(current: u32) -> SchedulingError {
    SchedulingError::Validation(format!(
        "max_bookings cannot drop below the {current} existing bookings"
    ))
}

pub(crate) fn sort_slots(slots: &mut [AvailabilitySlot]) {
    slots.sort_by(|a, b| {
        (a.date, a.start_time, &a.id).cmp(&(b.date, b.start_time, &b.id))
    });
}
