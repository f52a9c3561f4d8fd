use std::fmt;
use std::str::FromStr;

use crate::model::BookingStatus;

/// An administrator's verdict on a pending booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target(self) -> BookingStatus {
        match self {
            Decision::Approve => BookingStatus::Approved,
            Decision::Reject => BookingStatus::Rejected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    /// Accepts the verb (`approve`) or the resulting status (`Approved`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approve),
            "reject" | "rejected" => Ok(Decision::Reject),
            other => Err(format!("not a decision: {other} (expected Approved or Rejected)")),
        }
    }
}

/// Pending → Approved | Rejected. Terminal states accept nothing; the
/// error carries the state the booking is already in.
pub fn transition(current: BookingStatus, decision: Decision) -> Result<BookingStatus, BookingStatus> {
    match current {
        BookingStatus::Pending => Ok(decision.target()),
        BookingStatus::Approved | BookingStatus::Rejected => Err(current),
    }
}
