use std::sync::Arc;

use super::common::*;
use crate::config::SchedulingConfig;
use crate::scheduling::domain::{BookingStatus, InvitationStatus, SlotStatus};
use crate::scheduling::repository::{BookingEventKind, BookingRepository, InvitationRepository};
use crate::scheduling::{
    Caller, Clock, FixedClock, InMemoryScheduleStore, IssueInvitation, SchedulingEngine,
    SchedulingError,
};

#[tokio::test]
async fn cancel_releases_capacity_and_notifies() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let booking = harness.book(&slot.id, "a").await;

    let cancelled = harness
        .engine
        .lifecycle()
        .cancel(&employer(), &booking.id)
        .await
        .expect("cancel succeeds");

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(cancelled.capacity_released);
    let stored = harness.slot(&slot.id).await;
    assert_eq!(stored.current_bookings, 0);
    assert_eq!(stored.status(), SlotStatus::Available);

    let events = harness.notifications.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, BookingEventKind::Cancelled);
    assert_eq!(events[0].booking_id, booking.id);
}

#[tokio::test]
async fn no_show_releases_capacity() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let booking = harness.book(&slot.id, "a").await;

    let updated = harness
        .engine
        .lifecycle()
        .mark_no_show(&admin(), &booking.id)
        .await
        .expect("no-show succeeds");

    assert_eq!(updated.status, BookingStatus::NoShow);
    assert_eq!(harness.slot(&slot.id).await.current_bookings, 0);
    assert_eq!(
        harness.notifications.events()[0].kind,
        BookingEventKind::NoShow
    );
}

#[tokio::test]
async fn complete_keeps_capacity_consumed() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let booking = harness.book(&slot.id, "a").await;

    let completed = harness
        .engine
        .lifecycle()
        .complete(&employer(), &booking.id)
        .await
        .expect("complete succeeds");

    assert_eq!(completed.status, BookingStatus::Completed);
    assert!(!completed.capacity_released);
    assert_eq!(harness.slot(&slot.id).await.current_bookings, 1);
}

#[tokio::test]
async fn terminal_states_are_closed() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let booking = harness.book(&slot.id, "a").await;
    let lifecycle = harness.engine.lifecycle();

    lifecycle
        .cancel(&employer(), &booking.id)
        .await
        .expect("cancel succeeds");

    for target in [
        BookingStatus::Scheduled,
        BookingStatus::Completed,
        BookingStatus::NoShow,
        BookingStatus::Cancelled,
    ] {
        match lifecycle.transition(&employer(), &booking.id, target).await {
            Err(SchedulingError::InvalidTransition { from, to }) => {
                assert_eq!(from, BookingStatus::Cancelled);
                assert_eq!(to, target);
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }

    let repeat = lifecycle.cancel(&employer(), &booking.id).await;
    assert!(matches!(
        repeat,
        Err(SchedulingError::InvalidTransition {
            from: BookingStatus::Cancelled,
            to: BookingStatus::Cancelled,
        })
    ));
    assert_eq!(harness.slot(&slot.id).await.current_bookings, 0);
    assert_eq!(harness.notifications.events().len(), 1);
}

#[tokio::test]
async fn transition_to_scheduled_is_rejected() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let booking = harness.book(&slot.id, "a").await;

    let result = harness
        .engine
        .lifecycle()
        .transition(&employer(), &booking.id, BookingStatus::Scheduled)
        .await;

    assert!(matches!(
        result,
        Err(SchedulingError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn transition_requires_owner_before_mutating() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let booking = harness.book(&slot.id, "a").await;

    for caller in [other_employer(), Caller::candidate("cand-a")] {
        let result = harness.engine.lifecycle().cancel(&caller, &booking.id).await;
        assert!(matches!(result, Err(SchedulingError::Forbidden)));
    }

    let stored = harness
        .store
        .fetch_booking(&booking.id)
        .await
        .expect("fetch succeeds")
        .expect("booking present");
    assert_eq!(stored.status, BookingStatus::Scheduled);
    assert_eq!(harness.slot(&slot.id).await.current_bookings, 1);
}

#[tokio::test]
async fn interrupted_release_is_finished_on_retry() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let booking = harness.book(&slot.id, "a").await;

    // Status flipped but the capacity release never ran.
    harness
        .store
        .transition_status(&booking.id, BookingStatus::Scheduled, BookingStatus::Cancelled)
        .await
        .expect("transition succeeds");
    assert_eq!(harness.slot(&slot.id).await.current_bookings, 1);

    let retry = harness
        .engine
        .lifecycle()
        .cancel(&employer(), &booking.id)
        .await;
    assert!(matches!(
        retry,
        Err(SchedulingError::InvalidTransition { .. })
    ));

    let healed = harness
        .store
        .fetch_booking(&booking.id)
        .await
        .expect("fetch succeeds")
        .expect("booking present");
    assert!(healed.capacity_released);
    assert_eq!(harness.slot(&slot.id).await.current_bookings, 0);
    assert!(harness.notifications.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transitions_have_single_winner() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let booking = harness.book(&slot.id, "a").await;
    let lifecycle = harness.engine.lifecycle().clone();

    let mut handles = Vec::new();
    for target in [
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ] {
        let lifecycle = lifecycle.clone();
        let booking_id = booking.id.clone();
        handles.push(tokio::spawn(async move {
            lifecycle.transition(&employer(), &booking_id, target).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("task joins").is_ok() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    let events = harness.notifications.events();
    assert_eq!(events.len(), 1, "exactly one transition was applied");
    let current = harness.slot(&slot.id).await.current_bookings;
    let expected = if events[0].kind == BookingEventKind::Completed { 1 } else { 0 };
    assert_eq!(current, expected);
}

#[tokio::test]
async fn notification_failure_does_not_roll_back() {
    let store = Arc::new(InMemoryScheduleStore::new());
    store
        .register_job(crate::scheduling::JobPosting {
            id: job_id(),
            employer_id: employer_id(),
            title: "Backend Engineer".to_string(),
        })
        .expect("job registered");
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at(clock_start()));
    let engine = SchedulingEngine::new(
        store.clone(),
        Arc::new(FailingNotifications),
        clock,
        SchedulingConfig::default(),
    );

    let slot = engine
        .slots()
        .create_slot(&employer(), &employer_id(), draft(time(9, 0), time(9, 30)))
        .await
        .expect("slot published");
    let booking = engine
        .bookings()
        .reserve(reservation(&slot.id, "a"))
        .await
        .expect("reservation succeeds");

    let cancelled = engine
        .lifecycle()
        .cancel(&employer(), &booking.id)
        .await
        .expect("cancel succeeds despite notification failure");

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn invitation_follows_booking_outcome() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let second = harness.publish(time(10, 0), time(10, 30)).await;
    let invitations = harness.engine.invitations();

    let completed_link = invitations
        .issue(
            &employer(),
            IssueInvitation {
                job_id: job_id(),
                candidate: candidate("a"),
                interview_type: Default::default(),
                ttl_hours: None,
            },
        )
        .await
        .expect("issued");
    let cancelled_link = invitations
        .issue(
            &employer(),
            IssueInvitation {
                job_id: job_id(),
                candidate: candidate("b"),
                interview_type: Default::default(),
                ttl_hours: None,
            },
        )
        .await
        .expect("issued");

    let first = invitations
        .redeem(&completed_link.invitation.token, &slot.id, None)
        .await
        .expect("redeemed");
    let other = invitations
        .redeem(&cancelled_link.invitation.token, &second.id, None)
        .await
        .expect("redeemed");

    harness
        .engine
        .lifecycle()
        .complete(&employer(), &first.id)
        .await
        .expect("complete succeeds");
    harness
        .engine
        .lifecycle()
        .cancel(&employer(), &other.id)
        .await
        .expect("cancel succeeds");

    let completed = harness
        .store
        .fetch_invitation(&completed_link.invitation.token)
        .await
        .expect("fetch succeeds")
        .expect("invitation present");
    let cancelled = harness
        .store
        .fetch_invitation(&cancelled_link.invitation.token)
        .await
        .expect("fetch succeeds")
        .expect("invitation present");
    assert_eq!(completed.status, InvitationStatus::Completed);
    assert_eq!(cancelled.status, InvitationStatus::Cancelled);
}
