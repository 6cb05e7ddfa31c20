use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::bookings::sort_bookings;
use super::clock::Clock;
use super::domain::{Booking, Caller, CandidateId, DateRange, EmployerId, SlotId, SlotView};
use super::error::SchedulingError;
use super::repository::ScheduleStore;
use super::require_manager;
use super::slots::sort_slots;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    pub slot: SlotView,
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub entries: Vec<CalendarEntry>,
}

/// Read-only projections joining slots with their bookings.
pub struct CalendarView<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for CalendarView<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S> CalendarView<S>
where
    S: ScheduleStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Days that hold at least one slot, ascending; slots by start time; bookings by `booked_at`.
    pub async fn employer_calendar(
        &self,
        caller: &Caller,
        employer_id: &EmployerId,
        range: DateRange,
    ) -> Result<Vec<CalendarDay>, SchedulingError> {
        require_manager(caller, employer_id)?;

        let mut slots = self.store.slots_in_range(employer_id, &range).await?;
        sort_slots(&mut slots);

        let mut by_slot: HashMap<SlotId, Vec<Booking>> = HashMap::new();
        for booking in self.store.bookings_for_employer(employer_id, &range).await? {
            by_slot.entry(booking.slot_id.clone()).or_default().push(booking);
        }

        let mut days: BTreeMap<NaiveDate, Vec<CalendarEntry>> = BTreeMap::new();
        for slot in slots {
            let mut bookings = by_slot.remove(&slot.id).unwrap_or_default();
            bookings.sort_by(|a, b| (a.booked_at, &a.id).cmp(&(b.booked_at, &b.id)));
            days.entry(slot.date).or_default().push(CalendarEntry {
                slot: slot.view(),
                bookings,
            });
        }

        debug!(%employer_id, days = days.len(), "calendar assembled");
        Ok(days
            .into_iter()
            .map(|(date, entries)| CalendarDay { date, entries })
            .collect())
    }

    /// A candidate's bookings by `scheduled_at`. Without history only upcoming
    /// scheduled interviews are returned.
    pub async fn candidate_upcoming(
        &self,
        caller: &Caller,
        candidate_id: &CandidateId,
        include_history: bool,
    ) -> Result<Vec<Booking>, SchedulingError> {
        if !caller.can_view_candidate(candidate_id) {
            return Err(SchedulingError::Forbidden);
        }

        let now = self.clock.local_now();
        let mut bookings: Vec<_> = self
            .store
            .bookings_for_candidate(candidate_id)
            .await?
            .into_iter()
            .filter(|booking| {
                include_history || (booking.is_active() && booking.scheduled_at >= now)
            })
            .collect();
        sort_bookings(&mut bookings);
        Ok(bookings)
    }
}
