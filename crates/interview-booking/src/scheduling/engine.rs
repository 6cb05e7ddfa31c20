use std::sync::Arc;

use super::bookings::BookingStore;
use super::calendar::CalendarView;
use super::clock::Clock;
use super::invitations::InvitationService;
use super::lifecycle::BookingLifecycle;
use super::repository::{NotificationSink, ScheduleStore};
use super::slots::SlotStore;
use crate::config::SchedulingConfig;

/// All scheduling components wired over one store, notifier and clock.
pub struct SchedulingEngine<S, N> {
    slots: SlotStore<S>,
    bookings: BookingStore<S>,
    lifecycle: BookingLifecycle<S, N>,
    invitations: Arc<InvitationService<S, N>>,
    calendar: CalendarView<S>,
}

impl<S, N> Clone for SchedulingEngine<S, N> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            bookings: self.bookings.clone(),
            lifecycle: self.lifecycle.clone(),
            invitations: self.invitations.clone(),
            calendar: self.calendar.clone(),
        }
    }
}

impl<S, N> SchedulingEngine<S, N>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
    ) -> Self {
        let slots = SlotStore::new(store.clone(), clock.clone());
        let bookings = BookingStore::new(store.clone(), clock.clone());
        let lifecycle = BookingLifecycle::new(store.clone(), bookings.clone(), notifier.clone());
        let invitations = Arc::new(InvitationService::new(
            store.clone(),
            slots.clone(),
            bookings.clone(),
            notifier,
            clock.clone(),
            config,
        ));
        let calendar = CalendarView::new(store, clock);

        Self {
            slots,
            bookings,
            lifecycle,
            invitations,
            calendar,
        }
    }

    pub fn slots(&self) -> &SlotStore<S> {
        &self.slots
    }

    pub fn bookings(&self) -> &BookingStore<S> {
        &self.bookings
    }

    pub fn lifecycle(&self) -> &BookingLifecycle<S, N> {
        &self.lifecycle
    }

    pub fn invitations(&self) -> &InvitationService<S, N> {
        &self.invitations
    }

    pub fn calendar(&self) -> &CalendarView<S> {
        &self.calendar
    }
}
