mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod status;

pub use availability::{
    merge_overlapping, partition_slots, resolve_day_availability, subtract_intervals, DayAvailability, Slot,
};
pub use conflict::{conflicting_bookings, has_conflict};
pub use error::EngineError;
pub use queries::{AvailabilityQuery, BookingFilter, SearchFilters};
pub use status::{transition, Decision};

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::calendar::Calendar;
use crate::limits::MAX_HALL_NAME_LEN;
use crate::model::*;
use crate::wal::Wal;

pub type SharedHallState = Arc<RwLock<HallState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!(batch = batch.len(), "WAL flush failed: {e}");
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

/// Booking store: every hall's bookings behind that hall's own lock.
///
/// Submissions and decisions hold the hall's write lock across the
/// conflict check, the WAL append and the in-memory apply, so two
/// overlapping submissions for one hall are serialized and at most one
/// passes the conflict check.
pub struct Engine {
    pub(super) halls: DashMap<String, SharedHallState>,
    /// Reverse lookup: booking id → hall name
    pub(super) booking_to_hall: DashMap<Ulid, String>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared; compaction holds it exclusively so no
    /// append can land between the snapshot and the file swap.
    pub(super) compaction_gate: RwLock<()>,
    pub(super) calendar: Calendar,
    /// When set, only these halls accept bookings.
    pub(super) hall_catalogue: Option<HashSet<String>>,
}

/// Apply an event directly to a HallState. Caller holds the lock.
fn apply_to_hall(hs: &mut HallState, event: &Event, index: &DashMap<Ulid, String>) {
    match event {
        Event::BookingSubmitted { booking } => {
            index.insert(booking.id, booking.hall.clone());
            hs.insert_booking(booking.clone());
        }
        Event::BookingDecided { id, status, .. } => {
            if let Some(b) = hs.get_mut(id) {
                b.status = *status;
            }
        }
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, calendar: Calendar) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let booking_to_hall = DashMap::new();
        let mut replayed: HashMap<String, HallState> = HashMap::new();
        for event in &events {
            let hall = event.hall();
            let hs = replayed
                .entry(hall.to_string())
                .or_insert_with(|| HallState::new(hall.to_string()));
            apply_to_hall(hs, event, &booking_to_hall);
        }

        let halls = DashMap::new();
        for (name, hs) in replayed {
            halls.insert(name, Arc::new(RwLock::new(hs)));
        }
        tracing::info!(
            events = events.len(),
            halls = halls.len(),
            bookings = booking_to_hall.len(),
            "booking store replayed"
        );

        Ok(Self {
            halls,
            booking_to_hall,
            wal_tx,
            compaction_gate: RwLock::new(()),
            calendar,
            hall_catalogue: None,
        })
    }

    /// Restrict bookings to a fixed set of hall names.
    pub fn with_hall_catalogue<I, S>(mut self, halls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: HashSet<String> = halls
            .into_iter()
            .map(|h| h.into().trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        self.hall_catalogue = (!set.is_empty()).then_some(set);
        self
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply, under the caller's hall write lock. Memory is
    /// untouched when the append fails.
    pub(super) async fn persist_and_apply(&self, hs: &mut HallState, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_hall(hs, event, &self.booking_to_hall);
        Ok(())
    }

    /// Normalize a hall name and check it against the catalogue.
    pub(super) fn resolve_hall(&self, raw: &str) -> Result<String, EngineError> {
        let hall = raw.trim();
        if hall.is_empty() {
            return Err(EngineError::MissingFields(vec!["hall"]));
        }
        if hall.len() > MAX_HALL_NAME_LEN {
            return Err(EngineError::LimitExceeded("hall name too long"));
        }
        if let Some(catalogue) = &self.hall_catalogue
            && !catalogue.contains(hall)
        {
            return Err(EngineError::UnknownHall(hall.to_string()));
        }
        Ok(hall.to_string())
    }

    pub fn get_hall(&self, hall: &str) -> Option<SharedHallState> {
        self.halls.get(hall).map(|e| e.value().clone())
    }

    /// Get or lazily create the hall's state.
    pub(super) fn hall_state(&self, hall: &str) -> SharedHallState {
        self.halls
            .entry(hall.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(HallState::new(hall.to_string()))))
            .clone()
    }

    pub fn hall_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.halls.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn get_hall_for_booking(&self, id: &Ulid) -> Option<String> {
        self.booking_to_hall.get(id).map(|e| e.value().clone())
    }

    /// Lookup booking → hall, get hall, acquire write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        id: &Ulid,
    ) -> Result<(String, tokio::sync::OwnedRwLockWriteGuard<HallState>), EngineError> {
        let hall = self.get_hall_for_booking(id).ok_or(EngineError::NotFound(*id))?;
        let hs = self.get_hall(&hall).ok_or(EngineError::NotFound(*id))?;
        let guard = hs.write_owned().await;
        Ok((hall, guard))
    }
}
