use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Two half-open spans overlap iff each starts before the other ends.
    /// Spans that only touch at an endpoint do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_instant(self.start), format_instant(self.end))
    }
}

/// RFC 3339 rendering of a Unix-ms instant, falling back to the raw number
/// for values chrono cannot represent.
pub fn format_instant(ms: Ms) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}

/// Booking lifecycle. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Approved => "Approved",
            BookingStatus::Rejected => "Rejected",
        }
    }

    /// Whether a booking in this state holds its time slot.
    pub fn occupies(&self) -> bool {
        !matches!(self, BookingStatus::Rejected)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "approved" => Ok(BookingStatus::Approved),
            "rejected" => Ok(BookingStatus::Rejected),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// Descriptive fields owned by the requester. The scheduling core carries
/// them through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub topic: String,
    pub department: String,
    pub coordinator_name: String,
    pub coordinator_number: String,
    pub speaker_name: String,
    pub speaker_number: String,
    pub required_attendance: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub hall: String,
    pub span: Span,
    pub status: BookingStatus,
    pub requested_by: String,
    pub details: BookingDetails,
    pub created_at: Ms,
}

impl Booking {
    pub fn summary(&self) -> BookingSummary {
        BookingSummary {
            id: self.id,
            hall: self.hall.clone(),
            topic: self.details.topic.clone(),
            department: self.details.department.clone(),
            start: format_instant(self.span.start),
            end: format_instant(self.span.end),
            status: self.status,
        }
    }
}

/// The organisation-public view of a booking, used in conflict and
/// availability diagnostics. Contact numbers and the requester are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingSummary {
    pub id: Ulid,
    pub hall: String,
    pub topic: String,
    pub department: String,
    pub start: String,
    pub end: String,
    pub status: BookingStatus,
}

/// A submission before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub hall: String,
    pub start: Ms,
    pub end: Ms,
    pub details: BookingDetails,
}

/// The event types. Flat, no nesting; this is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingSubmitted {
        booking: Booking,
    },
    BookingDecided {
        id: Ulid,
        hall: String,
        status: BookingStatus,
    },
}

impl Event {
    pub fn hall(&self) -> &str {
        match self {
            Event::BookingSubmitted { booking } => &booking.hall,
            Event::BookingDecided { hall, .. } => hall,
        }
    }
}

/// All bookings of one hall, sorted by `span.start`.
#[derive(Debug, Clone)]
pub struct HallState {
    pub name: String,
    pub bookings: Vec<Booking>,
}

impl HallState {
    pub fn new(name: String) -> Self {
        Self {
            name,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn get(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn get_mut(&mut self, id: &Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    /// Return only bookings whose span overlaps the query window, regardless
    /// of status. Uses binary search to skip bookings starting at or after
    /// `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }

    /// Bookings that still hold their slot (status ≠ Rejected).
    pub fn occupying(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(|b| b.status.occupies())
    }
}
