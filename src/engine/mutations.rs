use std::collections::HashSet;

use tokio::sync::oneshot;
use ulid::Ulid;

use crate::auth::Identity;
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, now_ms, validate_details, validate_span};
use super::status::{transition, Decision};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Create a Pending booking if the hall is free for the requested span.
    ///
    /// The hall's write lock is held from the conflict check until the
    /// booking is durable and visible.
    pub async fn submit_booking(&self, request: NewBooking, requester: &Identity) -> Result<Booking, EngineError> {
        let NewBooking { hall, start, end, mut details } = request;
        let hall = self.resolve_hall(&hall)?;
        validate_details(&mut details)?;
        let span = validate_span(start, end)?;

        let _gate = self.compaction_gate.read().await;
        let hs = self.hall_state(&hall);
        let mut guard = hs.write().await;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_HALL {
            return Err(EngineError::LimitExceeded("too many bookings in hall"));
        }

        if let Err(e) = check_no_conflict(&guard, &span) {
            if let EngineError::Conflict(ref hits) = e {
                tracing::info!(
                    hall = %hall,
                    requested_by = %requester.user,
                    span = %span,
                    conflicts = hits.len(),
                    "submission rejected: slot taken"
                );
            }
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let booking = Booking {
            id: Ulid::new(),
            hall,
            span,
            status: BookingStatus::Pending,
            requested_by: requester.user.clone(),
            details,
            created_at: now_ms(),
        };
        let event = Event::BookingSubmitted { booking: booking.clone() };
        self.persist_and_apply(&mut guard, &event).await?;

        tracing::info!(
            booking_id = %booking.id,
            hall = %booking.hall,
            requested_by = %booking.requested_by,
            span = %booking.span,
            "booking submitted"
        );
        metrics::counter!(observability::BOOKINGS_SUBMITTED_TOTAL).increment(1);
        Ok(booking)
    }

    /// Move a Pending booking to Approved or Rejected. Admin only.
    pub async fn decide_booking(&self, id: Ulid, decision: Decision, actor: &Identity) -> Result<Booking, EngineError> {
        let result = self.apply_decision(id, decision, actor).await;
        let outcome = match &result {
            Ok(_) => "applied",
            Err(EngineError::Forbidden(_)) => "forbidden",
            Err(EngineError::NotFound(_)) => "not_found",
            Err(EngineError::InvalidTransition { .. }) => "invalid_transition",
            Err(EngineError::Conflict(_)) => "conflict",
            Err(_) => "error",
        };
        metrics::counter!(
            observability::BOOKING_DECISIONS_TOTAL,
            "decision" => decision.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    pub async fn approve(&self, id: Ulid, actor: &Identity) -> Result<Booking, EngineError> {
        self.decide_booking(id, Decision::Approve, actor).await
    }

    pub async fn reject(&self, id: Ulid, actor: &Identity) -> Result<Booking, EngineError> {
        self.decide_booking(id, Decision::Reject, actor).await
    }

    async fn apply_decision(&self, id: Ulid, decision: Decision, actor: &Identity) -> Result<Booking, EngineError> {
        if !actor.is_admin() {
            tracing::warn!(booking_id = %id, user = %actor.user, %decision, "decision refused: not an admin");
            return Err(EngineError::Forbidden(format!(
                "user {} may not {decision} bookings",
                actor.user
            )));
        }

        let _gate = self.compaction_gate.read().await;
        let (hall, mut guard) = self.resolve_booking_write(&id).await?;
        let (current, span) = guard
            .get(&id)
            .map(|b| (b.status, b.span))
            .ok_or(EngineError::NotFound(id))?;

        let next = transition(current, decision).map_err(|current| {
            tracing::info!(booking_id = %id, %current, %decision, "decision ignored: already decided");
            EngineError::InvalidTransition { id, current }
        })?;

        if next == BookingStatus::Approved {
            let clashes: Vec<BookingSummary> = guard
                .overlapping(&span)
                .filter(|b| b.id != id && b.status == BookingStatus::Approved)
                .map(Booking::summary)
                .collect();
            if !clashes.is_empty() {
                tracing::warn!(booking_id = %id, hall = %hall, clashes = clashes.len(), "approval would double-book hall");
                return Err(EngineError::Conflict(clashes));
            }
        }

        let event = Event::BookingDecided { id, hall: hall.clone(), status: next };
        self.persist_and_apply(&mut guard, &event).await?;

        tracing::info!(booking_id = %id, hall = %hall, status = %next, decided_by = %actor.user, "booking decided");
        guard.get(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Compact the WAL by rewriting it with one submission record per booking,
    /// carrying its current status.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.compaction_gate.write().await;

        let mut events = Vec::new();
        let mut seen = HashSet::new();
        for hall in self.hall_names() {
            let Some(hs) = self.get_hall(&hall) else { continue };
            let guard = hs.read().await;
            for booking in &guard.bookings {
                if seen.insert(booking.id) {
                    events.push(Event::BookingSubmitted { booking: booking.clone() });
                }
            }
        }
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        tracing::info!(bookings = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
