//! Interview availability and booking engine.
//!
//! Employers publish availability slots, issue single-use invitations per job
//! application, and candidates redeem them into bookings that consume slot
//! capacity. Storage and notification delivery stay behind the ports in
//! [`repository`]; [`memory`] is the in-process implementation.

pub mod bookings;
pub mod calendar;
pub mod clock;
pub mod domain;
pub mod engine;
pub mod error;
pub mod invitations;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
pub mod slots;
pub mod time_range;

#[cfg(test)]
mod tests;

pub use bookings::{BookingStore, ReservationRequest};
pub use calendar::{CalendarDay, CalendarEntry, CalendarView};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    AvailabilitySlot, Booking, BookingId, BookingStatus, Caller, CallerRole, CandidateId,
    CandidateInfo, DateRange, EmployerId, InterviewInvitation, InterviewType, InvitationId,
    InvitationStatus, JobId, JobPosting, MeetingDetails, MeetingType, SlotId, SlotStatus,
    SlotView,
};
pub use engine::SchedulingEngine;
pub use error::SchedulingError;
pub use invitations::{
    InvitationService, InvitationSummary, InvitationView, IssueInvitation, IssuedInvitation,
};
pub use lifecycle::BookingLifecycle;
pub use memory::{InMemoryNotificationSink, InMemoryScheduleStore};
pub use repository::{
    BookingEvent, BookingEventKind, BookingRepository, InvitationRepository, JobDirectory,
    NotificationError, NotificationSink, RepositoryError, ScheduleStore, SlotRepository,
};
pub use router::{scheduling_router, RequestCaller, CALLER_ID_HEADER, CALLER_ROLE_HEADER};
pub use slots::{SlotDraft, SlotPatch, SlotStore};
pub use time_range::{TimeRange, TimeRangeError};

/// Mutations of an employer's data need the owning employer or an admin.
pub(crate) fn require_manager(
    caller: &Caller,
    employer_id: &EmployerId,
) -> Result<(), SchedulingError> {
    if caller.can_manage(employer_id) {
        Ok(())
    } else {
        Err(SchedulingError::Forbidden)
    }
}
