use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or_default()
}

/// Precondition check for candidate intervals. The detector itself assumes
/// `start < end`; callers run this first.
pub(crate) fn validate_span(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if start >= end {
        return Err(EngineError::Validation(format!(
            "start ({}) must be before end ({})",
            format_instant(start),
            format_instant(end)
        )));
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if end - start > MAX_BOOKING_DURATION_MS {
        return Err(EngineError::LimitExceeded("booking too long"));
    }
    Ok(Span::new(start, end))
}

/// Trim every descriptive field and report all missing ones at once.
pub(crate) fn validate_details(details: &mut BookingDetails) -> Result<(), EngineError> {
    let mut missing = Vec::new();
    let fields: [(&'static str, &mut String); 6] = [
        ("topic", &mut details.topic),
        ("department", &mut details.department),
        ("coordinator_name", &mut details.coordinator_name),
        ("coordinator_number", &mut details.coordinator_number),
        ("speaker_name", &mut details.speaker_name),
        ("speaker_number", &mut details.speaker_number),
    ];
    for (name, value) in fields {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            missing.push(name);
        } else if trimmed.len() > MAX_FIELD_LEN {
            return Err(EngineError::LimitExceeded("field too long"));
        } else if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
    }
    if details.required_attendance == 0 {
        missing.push("required_attendance");
    }
    if !missing.is_empty() {
        return Err(EngineError::MissingFields(missing));
    }
    if details.required_attendance > MAX_REQUIRED_ATTENDANCE {
        return Err(EngineError::LimitExceeded("required attendance too large"));
    }
    Ok(())
}

/// Existing booking `b` conflicts with the candidate when its span overlaps
/// the candidate's.
///
/// The partial-overlap test `b.start < c.end && b.end > c.start` already
/// covers both containment cases (candidate inside `b`, `b` inside candidate),
/// so it is the only predicate evaluated.
fn span_conflicts(existing: &Span, candidate: &Span) -> bool {
    existing.overlaps(candidate)
}

/// Every booking in `existing` that occupies `hall` during `candidate`.
/// Bookings for other halls and Rejected bookings are ignored.
pub fn conflicting_bookings<'a, I>(hall: &str, candidate: &Span, existing: I) -> Vec<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    existing
        .into_iter()
        .filter(|b| b.hall == hall && b.status.occupies() && span_conflicts(&b.span, candidate))
        .collect()
}

pub fn has_conflict<'a, I>(hall: &str, candidate: &Span, existing: I) -> bool
where
    I: IntoIterator<Item = &'a Booking>,
{
    existing
        .into_iter()
        .any(|b| b.hall == hall && b.status.occupies() && span_conflicts(&b.span, candidate))
}

/// Conflict gate used at write time: `Ok` when the hall is free for
/// `candidate`, otherwise the public summaries of every blocking booking.
pub(crate) fn check_no_conflict(hall: &HallState, candidate: &Span) -> Result<(), EngineError> {
    let conflicts = conflicting_bookings(&hall.name, candidate, hall.overlapping(candidate));
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Conflict(
            conflicts.into_iter().map(Booking::summary).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{booking, details};

    const H: Ms = 3_600_000;
    const M: Ms = 60_000;
    /// 2024-05-01T00:00:00Z
    const DAY: Ms = 1_714_521_600_000;

    const HALL: &str = "Auditorium";

    fn pending(start: Ms, end: Ms) -> Booking {
        booking(HALL, start, end, BookingStatus::Pending)
    }

    #[test]
    fn disjoint_intervals_never_conflict_either_way() {
        let a = pending(DAY + 9 * H, DAY + 10 * H);
        let b = pending(DAY + 12 * H, DAY + 13 * H);
        assert!(!has_conflict(HALL, &b.span, [&a]));
        assert!(!has_conflict(HALL, &a.span, [&b]));
    }

    #[test]
    fn identical_interval_conflicts() {
        let existing = pending(DAY + 9 * H, DAY + 10 * H);
        assert!(has_conflict(HALL, &existing.span, [&existing]));
    }

    #[test]
    fn containment_conflicts_both_ways() {
        let outer = Span::new(DAY + 10 * H, DAY + 12 * H);
        let inner = Span::new(DAY + 10 * H + 30 * M, DAY + 11 * H);

        let nested = pending(inner.start, inner.end);
        assert!(has_conflict(HALL, &outer, [&nested]));

        let enclosing = pending(outer.start, outer.end);
        assert!(has_conflict(HALL, &inner, [&enclosing]));
    }

    #[test]
    fn rejected_booking_never_conflicts() {
        let rejected = booking(HALL, DAY + 9 * H, DAY + 10 * H, BookingStatus::Rejected);
        assert!(!has_conflict(HALL, &rejected.span, [&rejected]));
        assert!(conflicting_bookings(HALL, &rejected.span, [&rejected]).is_empty());
    }

    #[test]
    fn approved_and_pending_both_occupy() {
        let approved = booking(HALL, DAY + 9 * H, DAY + 10 * H, BookingStatus::Approved);
        let pending = pending(DAY + 10 * H, DAY + 11 * H);
        let candidate = Span::new(DAY + 9 * H + 30 * M, DAY + 10 * H + 30 * M);
        let hits = conflicting_bookings(HALL, &candidate, [&approved, &pending]);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn touching_boundary_does_not_conflict() {
        let existing = pending(DAY + 11 * H, DAY + 12 * H);
        let candidate = Span::new(DAY + 10 * H, DAY + 11 * H);
        assert!(!has_conflict(HALL, &candidate, [&existing]));
        let after = Span::new(DAY + 12 * H, DAY + 13 * H);
        assert!(!has_conflict(HALL, &after, [&existing]));
    }

    #[test]
    fn other_halls_are_ignored() {
        let elsewhere = booking("Seminar Room", DAY + 9 * H, DAY + 10 * H, BookingStatus::Approved);
        assert!(!has_conflict(HALL, &elsewhere.span, [&elsewhere]));
    }

    #[test]
    fn single_predicate_matches_three_predicate_form() {
        // The three-way test: partial overlap, candidate contains existing,
        // existing contains candidate. Exhaustive over small intervals.
        fn three_way(b: &Span, c: &Span) -> bool {
            (b.start < c.end && b.end > c.start)
                || (c.start <= b.start && c.end >= b.end)
                || (b.start <= c.start && b.end >= c.end)
        }
        for bs in 0..6 {
            for be in (bs + 1)..7 {
                for cs in 0..6 {
                    for ce in (cs + 1)..7 {
                        let b = Span::new(bs, be);
                        let c = Span::new(cs, ce);
                        assert_eq!(span_conflicts(&b, &c), three_way(&b, &c), "b={b:?} c={c:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn check_no_conflict_reports_public_summaries() {
        let mut hall = HallState::new(HALL.into());
        let mut approved = booking(HALL, DAY + 14 * H, DAY + 15 * H, BookingStatus::Approved);
        approved.details = details("Quantum Talk");
        let approved_id = approved.id;
        hall.insert_booking(approved);

        let err = check_no_conflict(&hall, &Span::new(DAY + 14 * H + 30 * M, DAY + 15 * H + 30 * M))
            .unwrap_err();
        match err {
            EngineError::Conflict(summaries) => {
                assert_eq!(summaries.len(), 1);
                assert_eq!(summaries[0].id, approved_id);
                assert_eq!(summaries[0].topic, "Quantum Talk");
                assert_eq!(summaries[0].start, "2024-05-01T14:00:00.000Z");
                assert_eq!(summaries[0].status, BookingStatus::Approved);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }

        assert!(check_no_conflict(&hall, &Span::new(DAY + 15 * H, DAY + 16 * H)).is_ok());
    }

    #[test]
    fn validate_span_rejects_inverted_and_empty() {
        assert!(matches!(validate_span(DAY + H, DAY + H), Err(EngineError::Validation(_))));
        assert!(matches!(validate_span(DAY + 2 * H, DAY + H), Err(EngineError::Validation(_))));
        assert!(validate_span(DAY + H, DAY + 2 * H).is_ok());
    }

    #[test]
    fn validate_span_enforces_limits() {
        assert!(matches!(validate_span(0, H), Err(EngineError::LimitExceeded(_))));
        assert!(matches!(
            validate_span(DAY, DAY + MAX_BOOKING_DURATION_MS + 1),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn validate_details_trims_and_lists_missing() {
        let mut d = details("  Intro to Rust  ");
        validate_details(&mut d).unwrap();
        assert_eq!(d.topic, "Intro to Rust");

        let mut d = BookingDetails {
            topic: "Talk".into(),
            department: "   ".into(),
            required_attendance: 0,
            ..details("x")
        };
        match validate_details(&mut d) {
            Err(EngineError::MissingFields(fields)) => {
                assert_eq!(fields, vec!["department", "required_attendance"]);
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }
}
