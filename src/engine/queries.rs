use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::availability::{resolve_day_availability, DayAvailability};
use super::conflict::{conflicting_bookings, validate_span};
use super::{Engine, EngineError};

/// Optional equality filters for listing bookings across halls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub hall: Option<String>,
    pub status: Option<BookingStatus>,
    /// Matched case-insensitively.
    pub department: Option<String>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(hall) = &self.hall
            && booking.hall != hall.trim()
        {
            return false;
        }
        if let Some(status) = self.status
            && booking.status != status
        {
            return false;
        }
        if let Some(dept) = &self.department
            && !booking.details.department.eq_ignore_ascii_case(dept.trim())
        {
            return false;
        }
        true
    }
}

/// Case-insensitive substring filters that narrow the blockers a day query
/// reports. They never change the day's status or its free slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub coordinator_name: Option<String>,
    pub speaker_name: Option<String>,
    pub department: Option<String>,
    pub topic: Option<String>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.coordinator_name.is_none()
            && self.speaker_name.is_none()
            && self.department.is_none()
            && self.topic.is_none()
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        let d = &booking.details;
        [
            (&self.coordinator_name, &d.coordinator_name),
            (&self.speaker_name, &d.speaker_name),
            (&self.department, &d.department),
            (&self.topic, &d.topic),
        ]
        .into_iter()
        .all(|(filter, value)| filter.as_deref().is_none_or(|f| contains_ci(value, f)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub hall: String,
    pub day: NaiveDate,
    pub filters: SearchFilters,
}

impl AvailabilityQuery {
    pub fn new(hall: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            hall: hall.into(),
            day,
            filters: SearchFilters::default(),
        }
    }
}

impl Engine {
    /// Every non-rejected booking of the hall, ordered by start. An unknown
    /// hall has no bookings.
    pub async fn list_hall_bookings(&self, hall: &str) -> Result<Vec<Booking>, EngineError> {
        let hall = self.resolve_hall(hall)?;
        let Some(hs) = self.get_hall(&hall) else {
            return Ok(Vec::new());
        };
        let guard = hs.read().await;
        Ok(guard.occupying().cloned().collect())
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let hall = self.get_hall_for_booking(&id).ok_or(EngineError::NotFound(id))?;
        let hs = self.get_hall(&hall).ok_or(EngineError::NotFound(id))?;
        let guard = hs.read().await;
        guard.get(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// All bookings matching `filter`, newest first.
    pub async fn list_bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        let halls = match &filter.hall {
            Some(h) => vec![h.trim().to_string()],
            None => self.hall_names(),
        };
        let mut out = Vec::new();
        for hall in halls {
            let Some(hs) = self.get_hall(&hall) else { continue };
            let guard = hs.read().await;
            out.extend(guard.bookings.iter().filter(|b| filter.matches(b)).cloned());
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        out
    }

    /// Read-only dry run: bookings that would block a submission for
    /// `[start, end)` in `hall`.
    pub async fn find_conflicts(&self, hall: &str, start: Ms, end: Ms) -> Result<Vec<Booking>, EngineError> {
        let hall = self.resolve_hall(hall)?;
        let span = validate_span(start, end)?;
        let Some(hs) = self.get_hall(&hall) else {
            return Ok(Vec::new());
        };
        let guard = hs.read().await;
        Ok(conflicting_bookings(&hall, &span, guard.overlapping(&span))
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn day_availability(&self, query: &AvailabilityQuery) -> Result<DayAvailability, EngineError> {
        let hall = self.resolve_hall(&query.hall)?;
        let window = self.calendar.day_window(query.day);
        let catalogue = &self.calendar.catalogue;

        let mut result = match self.get_hall(&hall) {
            Some(hs) => {
                let guard = hs.read().await;
                resolve_day_availability(&hall, query.day, window, catalogue, guard.overlapping(&window))
            }
            None => resolve_day_availability(&hall, query.day, window, catalogue, std::iter::empty::<&Booking>()),
        };
        // Day status and slots always count every booking; filters only
        // narrow which blockers are reported.
        if !query.filters.is_empty() {
            result.blockers.retain(|b| query.filters.matches(b));
        }

        tracing::debug!(
            hall = %hall,
            day = %query.day,
            available = result.available,
            blockers = result.blockers.len(),
            "day availability resolved"
        );
        Ok(result)
    }
}
