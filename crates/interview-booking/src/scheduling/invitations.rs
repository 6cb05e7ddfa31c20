use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::bookings::{validate_candidate, BookingStore, ReservationRequest};
use super::clock::Clock;
use super::domain::{
    Booking, BookingId, BookingStatus, Caller, CandidateInfo, EmployerId, InterviewInvitation,
    InterviewType, InvitationId, InvitationStatus, JobId, JobPosting, SlotId, SlotView,
};
use super::error::SchedulingError;
use super::repository::{
    dispatch, BookingEvent, BookingEventKind, NotificationSink, RepositoryError, ScheduleStore,
};
use super::require_manager;
use super::slots::SlotStore;
use crate::config::{ttl_from_hours, SchedulingConfig};

const TOKEN_BYTES: usize = 32;
const CONFIRM_POLLS: u32 = 10;
const CONFIRM_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(5);

/// Draw an unguessable invitation token (256 bits, hex) from the OS CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Employer request to let a candidate self-schedule for a job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueInvitation {
    pub job_id: JobId,
    pub candidate: CandidateInfo,
    #[serde(default)]
    pub interview_type: InterviewType,
    /// Overrides the configured time-to-live.
    #[serde(default)]
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedInvitation {
    pub invitation: InterviewInvitation,
    pub invite_url: String,
}

/// What a candidate sees after opening an invitation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationView {
    pub job: JobPosting,
    pub employer_id: EmployerId,
    pub candidate_name: String,
    pub interview_type: InterviewType,
    pub expires_at: DateTime<Utc>,
    pub available_slots: Vec<SlotView>,
}

/// Employer-side listing entry with expiry already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationSummary {
    pub id: InvitationId,
    pub candidate: CandidateInfo,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub booking_id: Option<BookingId>,
    pub slot_id: Option<SlotId>,
    pub invite_url: String,
}

/// Issues and redeems single-use candidate scheduling links.
pub struct InvitationService<S, N> {
    store: Arc<S>,
    slots: SlotStore<S>,
    bookings: BookingStore<S>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
}

impl<S, N> InvitationService<S, N>
where
    S: ScheduleStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        slots: SlotStore<S>,
        bookings: BookingStore<S>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            store,
            slots,
            bookings,
            notifier,
            clock,
            config,
        }
    }

    pub async fn issue(
        &self,
        caller: &Caller,
        request: IssueInvitation,
    ) -> Result<IssuedInvitation, SchedulingError> {
        let job = self
            .store
            .fetch_job(&request.job_id)
            .await?
            .ok_or(SchedulingError::NotFound("job"))?;
        require_manager(caller, &job.employer_id)?;
        validate_candidate(&request.candidate)?;

        let now = self.clock.now();
        let ttl = match request.ttl_hours {
            Some(hours) => ttl_from_hours(hours),
            None => self.config.invitation_ttl(),
        };
        let expires_at = ttl
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                SchedulingError::Validation(
                    "ttl_hours must be a positive number of hours within range".to_string(),
                )
            })?;
        let invitation = InterviewInvitation {
            id: InvitationId::generate(),
            token: generate_token(),
            job_id: job.id,
            employer_id: job.employer_id,
            candidate: request.candidate,
            interview_type: request.interview_type,
            booking_id: None,
            slot_id: None,
            status: InvitationStatus::Pending,
            token_expires_at: expires_at,
            created_at: now,
        };

        let stored = self.store.insert_invitation(invitation).await?;
        info!(
            invitation_id = %stored.id,
            job_id = %stored.job_id,
            expires_at = %stored.token_expires_at,
            "invitation issued"
        );

        let invite_url = self.config.invite_url(&stored.token);
        Ok(IssuedInvitation {
            invitation: stored,
            invite_url,
        })
    }

    /// Open an invitation: the job plus the slots still open for it.
    pub async fn resolve(&self, token: &str) -> Result<InvitationView, SchedulingError> {
        let invitation = self.fetch(token).await?;
        match invitation.effective_status(self.clock.now()) {
            InvitationStatus::Pending => {}
            InvitationStatus::Expired => return Err(SchedulingError::Expired),
            _ => return Err(SchedulingError::NotFound("invitation")),
        }

        let job = self
            .store
            .fetch_job(&invitation.job_id)
            .await?
            .ok_or(SchedulingError::NotFound("invitation"))?;
        let available_slots = self
            .slots
            .list_available_slots(&invitation.job_id)
            .await?
            .iter()
            .map(|slot| slot.view())
            .collect();

        Ok(InvitationView {
            job,
            employer_id: invitation.employer_id,
            candidate_name: invitation.candidate.name,
            interview_type: invitation.interview_type,
            expires_at: invitation.token_expires_at,
            available_slots,
        })
    }

    /// Turn the token into a booking on `slot_id`. Retrying with the same slot
    /// returns the booking already made.
    pub async fn redeem(
        &self,
        token: &str,
        slot_id: &SlotId,
        notes: Option<String>,
    ) -> Result<Booking, SchedulingError> {
        let invitation = self.fetch(token).await?;
        match invitation.status {
            InvitationStatus::Confirmed | InvitationStatus::Completed => {
                return self.replay(&invitation, slot_id).await
            }
            InvitationStatus::Cancelled => return Err(SchedulingError::NotFound("invitation")),
            InvitationStatus::Expired => return Err(SchedulingError::Expired),
            InvitationStatus::Pending => {
                if invitation.is_expired_at(self.clock.now()) {
                    return Err(SchedulingError::Expired);
                }
            }
        }

        let slot = self
            .store
            .fetch_slot(slot_id)
            .await?
            .ok_or(SchedulingError::NotFound("slot"))?;
        if slot.employer_id != invitation.employer_id {
            return Err(SchedulingError::NotFound("slot"));
        }

        let request = ReservationRequest {
            slot_id: slot_id.clone(),
            job_id: invitation.job_id.clone(),
            candidate: invitation.candidate.clone(),
            interview_type: invitation.interview_type,
            notes,
        };
        let booking = match self.bookings.reserve(request).await {
            Ok(booking) => booking,
            Err(SchedulingError::DuplicateBooking) => {
                return self.await_confirmation(token, slot_id).await
            }
            Err(err) => return Err(err),
        };

        match self.store.mark_confirmed(token, &booking.id, slot_id).await {
            Ok(Some(confirmed)) => {
                info!(
                    invitation_id = %confirmed.id,
                    booking_id = %booking.id,
                    "invitation redeemed"
                );
                dispatch(
                    self.notifier.as_ref(),
                    BookingEvent::from_booking(BookingEventKind::Created, &booking),
                )
                .await;
                Ok(booking)
            }
            Ok(None) => {
                warn!(
                    invitation_id = %invitation.id,
                    booking_id = %booking.id,
                    "invitation redeemed concurrently, abandoning duplicate booking"
                );
                self.abandon(&booking).await;
                let current = self.fetch(token).await?;
                match current.status {
                    InvitationStatus::Confirmed | InvitationStatus::Completed => {
                        self.replay(&current, slot_id).await
                    }
                    InvitationStatus::Expired => Err(SchedulingError::Expired),
                    _ => Err(SchedulingError::NotFound("invitation")),
                }
            }
            Err(err) => {
                self.abandon(&booking).await;
                Err(err.into())
            }
        }
    }

    /// Withdraw a pending invitation; its link stops resolving.
    pub async fn revoke(
        &self,
        caller: &Caller,
        token: &str,
    ) -> Result<InterviewInvitation, SchedulingError> {
        let invitation = self.fetch(token).await?;
        require_manager(caller, &invitation.employer_id)?;

        match invitation.status {
            InvitationStatus::Cancelled => return Ok(invitation),
            InvitationStatus::Pending => {}
            _ => return Err(SchedulingError::AlreadyUsed),
        }

        match self
            .store
            .update_invitation_status(token, InvitationStatus::Pending, InvitationStatus::Cancelled)
            .await?
        {
            Some(revoked) => {
                info!(invitation_id = %revoked.id, "invitation revoked");
                Ok(revoked)
            }
            None => Err(SchedulingError::AlreadyUsed),
        }
    }

    pub async fn list_for_job(
        &self,
        caller: &Caller,
        job_id: &JobId,
    ) -> Result<Vec<InvitationSummary>, SchedulingError> {
        let job = self
            .store
            .fetch_job(job_id)
            .await?
            .ok_or(SchedulingError::NotFound("job"))?;
        require_manager(caller, &job.employer_id)?;

        let now = self.clock.now();
        let mut invitations = self.store.invitations_for_job(job_id).await?;
        invitations.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(invitations
            .into_iter()
            .map(|invitation| InvitationSummary {
                status: invitation.effective_status(now),
                invite_url: self.config.invite_url(&invitation.token),
                id: invitation.id,
                candidate: invitation.candidate,
                expires_at: invitation.token_expires_at,
                booking_id: invitation.booking_id,
                slot_id: invitation.slot_id,
            })
            .collect())
    }

    async fn fetch(&self, token: &str) -> Result<InterviewInvitation, SchedulingError> {
        self.store
            .fetch_invitation(token)
            .await?
            .ok_or(SchedulingError::NotFound("invitation"))
    }

    async fn replay(
        &self,
        invitation: &InterviewInvitation,
        slot_id: &SlotId,
    ) -> Result<Booking, SchedulingError> {
        match (&invitation.booking_id, &invitation.slot_id) {
            (Some(booking_id), Some(bound_slot)) if bound_slot == slot_id => {
                self.bookings.get(booking_id).await
            }
            _ => Err(SchedulingError::AlreadyUsed),
        }
    }

    /// A duplicate on a pending token usually means another redeem of the same
    /// token sits between its reserve and its confirm; give it a moment to land.
    async fn await_confirmation(
        &self,
        token: &str,
        slot_id: &SlotId,
    ) -> Result<Booking, SchedulingError> {
        for _ in 0..CONFIRM_POLLS {
            let current = self.fetch(token).await?;
            match current.status {
                InvitationStatus::Confirmed | InvitationStatus::Completed => {
                    return self.replay(&current, slot_id).await
                }
                InvitationStatus::Pending => tokio::time::sleep(CONFIRM_POLL_INTERVAL).await,
                InvitationStatus::Cancelled | InvitationStatus::Expired => break,
            }
        }
        Err(SchedulingError::DuplicateBooking)
    }

    /// Undo a reservation that lost the race for its invitation. Never announced.
    async fn abandon(&self, booking: &Booking) {
        let cancelled = self
            .store
            .transition_status(&booking.id, BookingStatus::Scheduled, BookingStatus::Cancelled)
            .await;
        match cancelled {
            Ok(Some(_)) => {
                if let Err(err) = self.bookings.release(&booking.id).await {
                    warn!(
                        booking_id = %booking.id,
                        error = %err,
                        "abandoned booking kept its capacity"
                    );
                }
            }
            Ok(None) => {}
            Err(RepositoryError::NotFound) => {}
            Err(err) => {
                warn!(booking_id = %booking.id, error = %err, "abandoned booking not cancelled")
            }
        }
    }
}
