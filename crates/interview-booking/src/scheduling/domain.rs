use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::time_range::{self, TimeRange};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a published availability slot.
    SlotId
);
opaque_id!(
    /// Identifier of a candidate booking.
    BookingId
);
opaque_id!(
    /// Identifier of an issued invitation (distinct from its secret token).
    InvitationId
);
opaque_id!(EmployerId);
opaque_id!(JobId);
opaque_id!(
    /// Stable candidate key supplied by the applicant tracking side.
    CandidateId
);

impl SlotId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl BookingId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl InvitationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Role asserted by the upstream authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Employer,
    Admin,
    Candidate,
}

impl CallerRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "employer" => Some(Self::Employer),
            "admin" => Some(Self::Admin),
            "candidate" => Some(Self::Candidate),
            _ => None,
        }
    }
}

/// Identity of whoever invokes an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub role: CallerRole,
}

impl Caller {
    pub fn employer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: CallerRole::Employer,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: CallerRole::Admin,
        }
    }

    pub fn candidate(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: CallerRole::Candidate,
        }
    }

    /// Owning employer or an admin.
    pub fn can_manage(&self, employer_id: &EmployerId) -> bool {
        match self.role {
            CallerRole::Admin => true,
            CallerRole::Employer => self.id == employer_id.0,
            CallerRole::Candidate => false,
        }
    }

    pub fn can_view_candidate(&self, candidate_id: &CandidateId) -> bool {
        match self.role {
            CallerRole::Admin => true,
            CallerRole::Candidate => self.id == candidate_id.0,
            CallerRole::Employer => false,
        }
    }
}

/// Inclusive calendar window used by listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            from: date,
            to: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    Video,
    Phone,
    InPerson,
}

impl MeetingType {
    pub const fn label(self) -> &'static str {
        match self {
            MeetingType::Video => "video",
            MeetingType::Phone => "phone",
            MeetingType::InPerson => "in_person",
        }
    }
}

/// Meeting payload; the variant doubles as the meeting type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeetingDetails {
    Video { link: String },
    Phone { number: String },
    InPerson { location: String },
}

impl MeetingDetails {
    pub fn meeting_type(&self) -> MeetingType {
        match self {
            MeetingDetails::Video { .. } => MeetingType::Video,
            MeetingDetails::Phone { .. } => MeetingType::Phone,
            MeetingDetails::InPerson { .. } => MeetingType::InPerson,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            MeetingDetails::Video { link } => link,
            MeetingDetails::Phone { number } => number,
            MeetingDetails::InPerson { location } => location,
        }
    }
}

/// Display status derived from the capacity counters and the cancellation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Cancelled,
}

impl SlotStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::Cancelled => "cancelled",
        }
    }
}

/// Employer-published interview window with a booking capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: SlotId,
    pub employer_id: EmployerId,
    pub date: NaiveDate,
    #[serde(with = "time_range::clock")]
    pub start_time: NaiveTime,
    #[serde(with = "time_range::clock")]
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
    pub timezone: String,
    pub meeting: MeetingDetails,
    pub instructions: Option<String>,
    pub max_bookings: u32,
    pub current_bookings: u32,
    pub cancelled: bool,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Replace the time window, keeping the stored duration in step with it.
    pub fn set_range(&mut self, range: TimeRange) {
        self.start_time = range.start;
        self.end_time = range.end;
        self.duration_minutes = range.duration_minutes();
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled
    }

    pub fn has_capacity(&self) -> bool {
        self.current_bookings < self.max_bookings
    }

    pub fn status(&self) -> SlotStatus {
        if self.cancelled {
            SlotStatus::Cancelled
        } else if self.has_capacity() {
            SlotStatus::Available
        } else {
            SlotStatus::Booked
        }
    }

    /// Same employer, same day, both active, and the windows intersect.
    pub fn conflicts_with(&self, other: &AvailabilitySlot) -> bool {
        self.id != other.id
            && self.employer_id == other.employer_id
            && self.date == other.date
            && self.is_active()
            && other.is_active()
            && self.range().overlaps(&other.range())
    }

    pub fn view(&self) -> SlotView {
        SlotView {
            id: self.id.clone(),
            employer_id: self.employer_id.clone(),
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            timezone: self.timezone.clone(),
            meeting_type: self.meeting.meeting_type(),
            meeting: self.meeting.clone(),
            instructions: self.instructions.clone(),
            max_bookings: self.max_bookings,
            current_bookings: self.current_bookings,
            status: self.status(),
            is_recurring: self.is_recurring,
        }
    }
}

/// Serialized representation of a slot including its derived fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub id: SlotId,
    pub employer_id: EmployerId,
    pub date: NaiveDate,
    #[serde(with = "time_range::clock")]
    pub start_time: NaiveTime,
    #[serde(with = "time_range::clock")]
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
    pub timezone: String,
    pub meeting_type: MeetingType,
    pub meeting: MeetingDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub max_bookings: u32,
    pub current_bookings: u32,
    pub status: SlotStatus,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewType {
    #[default]
    Screening,
    Technical,
    Behavioral,
    Final,
    Hr,
}

/// Contact details captured when the booking is made, detached from the live profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub candidate_id: CandidateId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Scheduled)
    }

    /// Terminal states that hand the slot capacity back.
    pub const fn releases_capacity(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::NoShow)
    }

    pub const fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(self, BookingStatus::Scheduled) && next.is_terminal()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A candidate's reservation against one slot for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub slot_id: SlotId,
    pub job_id: JobId,
    pub employer_id: EmployerId,
    pub candidate: CandidateInfo,
    pub status: BookingStatus,
    pub interview_type: InterviewType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Local wall-clock moment the interview takes place.
    pub scheduled_at: NaiveDateTime,
    pub booked_at: DateTime<Utc>,
    /// Set once this booking's unit of capacity went back to the slot.
    pub capacity_released: bool,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Scheduled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Expired,
}

impl InvitationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Confirmed => "confirmed",
            InvitationStatus::Completed => "completed",
            InvitationStatus::Cancelled => "cancelled",
            InvitationStatus::Expired => "expired",
        }
    }
}

/// Single-use, time-bounded grant letting a candidate pick one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewInvitation {
    pub id: InvitationId,
    pub token: String,
    pub job_id: JobId,
    pub employer_id: EmployerId,
    pub candidate: CandidateInfo,
    pub interview_type: InterviewType,
    pub booking_id: Option<BookingId>,
    pub slot_id: Option<SlotId>,
    pub status: InvitationStatus,
    pub token_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl InterviewInvitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.token_expires_at
    }

    /// Stored status with expiry applied; pending tokens past their deadline read as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        match self.status {
            InvitationStatus::Pending if self.is_expired_at(now) => InvitationStatus::Expired,
            status => status,
        }
    }
}

/// Job reference needed to find which employer's calendar a candidate may book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub employer_id: EmployerId,
    pub title: String,
}
