use std::sync::Arc;

use tracing::{info, warn};

use super::bookings::BookingStore;
use super::domain::{Booking, BookingId, BookingStatus, Caller, InvitationStatus};
use super::error::SchedulingError;
use super::repository::{
    dispatch, BookingEvent, BookingEventKind, NotificationSink, RepositoryError, ScheduleStore,
};
use super::require_manager;

/// State machine over booking status.
///
/// `scheduled` is the only non-terminal state. Leaving it for `cancelled` or
/// `no_show` hands the slot capacity back; `completed` keeps it consumed.
pub struct BookingLifecycle<S, N> {
    store: Arc<S>,
    bookings: BookingStore<S>,
    notifier: Arc<N>,
}

impl<S, N> Clone for BookingLifecycle<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bookings: self.bookings.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S, N> BookingLifecycle<S, N>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<S>, bookings: BookingStore<S>, notifier: Arc<N>) -> Self {
        Self {
            store,
            bookings,
            notifier,
        }
    }

    pub async fn transition(
        &self,
        caller: &Caller,
        booking_id: &BookingId,
        target: BookingStatus,
    ) -> Result<Booking, SchedulingError> {
        let booking = self.bookings.get(booking_id).await?;
        require_manager(caller, &booking.employer_id)?;

        if !booking.status.can_transition_to(target) {
            self.finish_release(&booking).await;
            return Err(SchedulingError::InvalidTransition {
                from: booking.status,
                to: target,
            });
        }

        let updated = match self
            .store
            .transition_status(booking_id, BookingStatus::Scheduled, target)
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                let current = self.bookings.get(booking_id).await?;
                self.finish_release(&current).await;
                return Err(SchedulingError::InvalidTransition {
                    from: current.status,
                    to: target,
                });
            }
            Err(RepositoryError::NotFound) => return Err(SchedulingError::NotFound("booking")),
            Err(other) => return Err(other.into()),
        };

        let updated = if target.releases_capacity() {
            self.bookings.release(booking_id).await?;
            self.bookings.get(booking_id).await?
        } else {
            updated
        };

        info!(
            %booking_id,
            from = BookingStatus::Scheduled.label(),
            to = target.label(),
            actor = %caller.id,
            "booking status changed"
        );

        self.follow_invitation(&updated).await;
        dispatch(
            self.notifier.as_ref(),
            BookingEvent::from_booking(BookingEventKind::for_status(target), &updated),
        )
        .await;

        Ok(updated)
    }

    pub async fn complete(
        &self,
        caller: &Caller,
        booking_id: &BookingId,
    ) -> Result<Booking, SchedulingError> {
        self.transition(caller, booking_id, BookingStatus::Completed)
            .await
    }

    pub async fn cancel(
        &self,
        caller: &Caller,
        booking_id: &BookingId,
    ) -> Result<Booking, SchedulingError> {
        self.transition(caller, booking_id, BookingStatus::Cancelled)
            .await
    }

    pub async fn mark_no_show(
        &self,
        caller: &Caller,
        booking_id: &BookingId,
    ) -> Result<Booking, SchedulingError> {
        self.transition(caller, booking_id, BookingStatus::NoShow)
            .await
    }

    /// Hand back capacity still held by a releasing booking whose status flip
    /// outlived its release. Never counts as a transition.
    async fn finish_release(&self, booking: &Booking) {
        if !booking.status.releases_capacity() || booking.capacity_released {
            return;
        }
        if let Err(err) = self.bookings.release(&booking.id).await {
            warn!(booking_id = %booking.id, error = %err, "pending capacity release failed");
        }
    }

    /// Move the invitation that produced this booking along with it.
    async fn follow_invitation(&self, booking: &Booking) {
        let next = match booking.status {
            BookingStatus::Completed => InvitationStatus::Completed,
            BookingStatus::Cancelled | BookingStatus::NoShow => InvitationStatus::Cancelled,
            BookingStatus::Scheduled => return,
        };

        let invitation = match self.store.invitation_for_booking(&booking.id).await {
            Ok(Some(invitation)) => invitation,
            Ok(None) => return,
            Err(err) => {
                warn!(booking_id = %booking.id, error = %err, "invitation lookup failed");
                return;
            }
        };

        if let Err(err) = self
            .store
            .update_invitation_status(&invitation.token, InvitationStatus::Confirmed, next)
            .await
        {
            warn!(
                booking_id = %booking.id,
                invitation_id = %invitation.id,
                error = %err,
                "invitation status not updated"
            );
        }
    }
}
