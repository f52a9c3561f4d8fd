use chrono::NaiveDate;

use crate::calendar::SlotCatalogue;
use crate::model::*;

use super::conflict::conflicting_bookings;

// ── Availability Algorithm ────────────────────────────────────────

/// One catalogue slot and whether any blocker overlaps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub span: Span,
    pub free: bool,
}

/// Day-level answer for one hall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    pub hall: String,
    pub day: NaiveDate,
    pub window: Span,
    /// False only when an Approved booking intersects the day.
    pub available: bool,
    pub has_approved_blockers: bool,
    /// Non-rejected bookings intersecting the day, sorted by start.
    pub blockers: Vec<Booking>,
    /// Catalogue slots with their free/busy state. Empty on a hard-blocked day.
    pub slots: Vec<Slot>,
    /// Contiguous free time inside the catalogue envelope. Empty on a
    /// hard-blocked day.
    pub free_windows: Vec<Span>,
}

impl DayAvailability {
    pub fn free_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.free)
    }

    pub fn message(&self) -> &'static str {
        if self.has_approved_blockers {
            "Hall is not available on the selected date due to approved events."
        } else if self.blockers.is_empty() {
            "Hall is available on the selected date."
        } else {
            "Hall has pending events but may be available."
        }
    }
}

/// Classify the day's bookings into hard (Approved) and soft (Pending)
/// blockers and enumerate the catalogue slots.
///
/// `existing` may contain bookings outside the day or for other halls;
/// only non-rejected bookings of `hall` intersecting `window` count.
pub fn resolve_day_availability<'a, I>(
    hall: &str,
    day: NaiveDate,
    window: Span,
    catalogue: &SlotCatalogue,
    existing: I,
) -> DayAvailability
where
    I: IntoIterator<Item = &'a Booking>,
{
    let mut blockers: Vec<Booking> = conflicting_bookings(hall, &window, existing)
        .into_iter()
        .cloned()
        .collect();
    blockers.sort_by_key(|b| b.span.start);

    let has_approved_blockers = blockers
        .iter()
        .any(|b| b.status == BookingStatus::Approved);

    let (slots, free_windows) = if has_approved_blockers {
        (Vec::new(), Vec::new())
    } else {
        let busy: Vec<Span> = blockers.iter().map(|b| b.span).collect();
        let slots = partition_slots(&catalogue.slots(window.start), &busy);
        let free_windows = subtract_intervals(&[catalogue.envelope(window.start)], &merge_overlapping(&busy));
        (slots, free_windows)
    };

    DayAvailability {
        hall: hall.to_string(),
        day,
        window,
        available: !has_approved_blockers,
        has_approved_blockers,
        blockers,
        slots,
        free_windows,
    }
}

/// Mark each slot busy if any blocker overlaps it.
pub fn partition_slots(slots: &[Span], blockers: &[Span]) -> Vec<Slot> {
    slots
        .iter()
        .map(|&span| Slot {
            span,
            free: !blockers.iter().any(|b| b.overlaps(&span)),
        })
        .collect()
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`. Both inputs sorted by start; `to_remove` disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
