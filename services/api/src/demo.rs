use crate::infra::{in_memory_engine, SeedJob};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use interview_booking::config::SchedulingConfig;
use interview_booking::error::AppError;
use interview_booking::scheduling::{
    Booking, BookingEvent, Caller, CandidateId, CandidateInfo, EmployerId, FixedClock,
    InterviewType, IssueInvitation, JobId, MeetingDetails, SchedulingError, SlotDraft, SlotView,
};
use interview_booking::scheduling::time_range::{format_clock, parse_clock};
use std::sync::Arc;

const DEMO_EMPLOYER: &str = "emp-demo";
const DEMO_JOB: &str = "job-demo-backend";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Interview date (YYYY-MM-DD). Defaults to tomorrow.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Number of candidates redeeming their invitation for the same slot.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub(crate) contenders: u16,
}

/// What the race produced, captured before and after the winner cancels.
#[derive(Debug)]
pub(crate) struct DemoOutcome {
    pub(crate) slot: SlotView,
    pub(crate) winner: Option<Booking>,
    pub(crate) rejected: Vec<(String, SchedulingError)>,
    pub(crate) reopened: SlotView,
    pub(crate) events: Vec<BookingEvent>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let date = args
        .date
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(1));

    println!("Interview booking demo");
    let outcome = simulate(date, args.contenders).await?;
    render(&outcome);
    Ok(())
}

pub(crate) async fn simulate(date: NaiveDate, contenders: u16) -> Result<DemoOutcome, AppError> {
    let eve = date.checked_sub_signed(Duration::days(1)).ok_or_else(|| {
        SchedulingError::Validation(format!("{date} has no preceding day to start the clock on"))
    })?;
    let clock_start = eve.and_time(parse_clock("12:00").map_err(SchedulingError::from)?);
    let infra = in_memory_engine(
        &[SeedJob {
            employer_id: DEMO_EMPLOYER.to_string(),
            job_id: DEMO_JOB.to_string(),
            title: "Backend Engineer".to_string(),
        }],
        Arc::new(FixedClock::at(clock_start)),
        SchedulingConfig::default(),
    )
    .map_err(SchedulingError::from)?;
    let engine = infra.engine;
    let employer = Caller::employer(DEMO_EMPLOYER);

    let slot = engine
        .slots()
        .create_slot(&employer, &EmployerId::new(DEMO_EMPLOYER), morning_draft(date)?)
        .await?;

    let mut tokens = Vec::with_capacity(usize::from(contenders));
    for index in 1..=contenders {
        let issued = engine
            .invitations()
            .issue(&employer, invitation(index))
            .await?;
        tokens.push((issued.invitation.candidate.name.clone(), issued.invitation.token));
    }

    let handles: Vec<_> = tokens
        .into_iter()
        .map(|(name, token)| {
            let engine = engine.clone();
            let slot_id = slot.id.clone();
            tokio::spawn(async move {
                let result = engine.invitations().redeem(&token, &slot_id, None).await;
                (name, result)
            })
        })
        .collect();

    let mut winner = None;
    let mut rejected = Vec::new();
    for handle in handles {
        let (name, result) = handle
            .await
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        match result {
            Ok(booking) => winner = Some(booking),
            Err(err) => rejected.push((name, err)),
        }
    }
    rejected.sort_by(|left, right| left.0.cmp(&right.0));

    let booked = engine.slots().get_slot(&employer, &slot.id).await?.view();

    if let Some(booking) = &winner {
        engine.lifecycle().cancel(&employer, &booking.id).await?;
    }
    let reopened = engine.slots().get_slot(&employer, &slot.id).await?.view();

    Ok(DemoOutcome {
        slot: booked,
        winner,
        rejected,
        reopened,
        events: infra.notifications.events(),
    })
}

fn render(outcome: &DemoOutcome) {
    let slot = &outcome.slot;
    println!(
        "- Slot {} on {} {}-{} ({}) | capacity {}/{} | {:?}",
        slot.id,
        slot.date,
        format_clock(slot.start_time),
        format_clock(slot.end_time),
        slot.timezone,
        slot.current_bookings,
        slot.max_bookings,
        slot.status
    );

    match &outcome.winner {
        Some(booking) => println!(
            "- Booked: {} <{}> at {} ({})",
            booking.candidate.name, booking.candidate.email, booking.scheduled_at, booking.status
        ),
        None => println!("- No candidate secured the slot"),
    }
    for (name, err) in &outcome.rejected {
        println!("  Rejected {}: {}", name, err.public_message());
    }

    let reopened = &outcome.reopened;
    println!(
        "- After cancellation: capacity {}/{} | {:?}",
        reopened.current_bookings, reopened.max_bookings, reopened.status
    );

    println!("Notification events:");
    for event in &outcome.events {
        println!(
            "  - {} booking {} for {} at {}",
            event.kind.name(),
            event.booking_id,
            event.candidate_email,
            event.scheduled_at
        );
    }
}

fn morning_draft(date: NaiveDate) -> Result<SlotDraft, SchedulingError> {
    Ok(SlotDraft {
        date,
        start_time: parse_clock("09:00")?,
        end_time: Some(parse_clock("09:30")?),
        duration_minutes: None,
        timezone: "UTC".to_string(),
        meeting: MeetingDetails::Video {
            link: "https://meet.example.com/demo".to_string(),
        },
        instructions: Some("Join five minutes early.".to_string()),
        max_bookings: 1,
        is_recurring: false,
    })
}

fn invitation(index: u16) -> IssueInvitation {
    IssueInvitation {
        job_id: JobId::new(DEMO_JOB),
        candidate: CandidateInfo {
            candidate_id: CandidateId::new(format!("cand-{index:02}")),
            name: format!("Candidate {index:02}"),
            email: format!("candidate{index:02}@example.com"),
            phone: None,
        },
        interview_type: InterviewType::Technical,
        ttl_hours: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_booking::scheduling::{BookingEventKind, BookingStatus, SlotStatus};

    fn demo_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn race_produces_single_booking() {
        let outcome = simulate(demo_date(), 5).await.expect("demo runs");

        let winner = outcome.winner.expect("one candidate wins");
        assert_eq!(winner.status, BookingStatus::Scheduled);
        assert_eq!(outcome.rejected.len(), 4);
        assert!(outcome
            .rejected
            .iter()
            .all(|(_, err)| matches!(err, SchedulingError::SlotFull)));
        assert_eq!(outcome.slot.current_bookings, 1);
        assert_eq!(outcome.slot.status, SlotStatus::Booked);
    }

    #[tokio::test]
    async fn earliest_representable_date_is_rejected() {
        let result = simulate(NaiveDate::MIN, 1).await;
        assert!(matches!(
            result,
            Err(AppError::Scheduling(SchedulingError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn cancellation_reopens_slot() {
        let outcome = simulate(demo_date(), 1).await.expect("demo runs");

        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.reopened.current_bookings, 0);
        assert_eq!(outcome.reopened.status, SlotStatus::Available);
        let kinds: Vec<_> = outcome.events.iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![BookingEventKind::Created, BookingEventKind::Cancelled]
        );
    }
}
