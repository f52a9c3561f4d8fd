use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

use crate::limits::MAX_SLOTS_PER_DAY;
use crate::model::{Ms, Span};

const MINUTE_MS: Ms = 60_000;
const DAY_MINUTES: u32 = 24 * 60;

/// Fixed catalogue of equal-length time-of-day slots, e.g. hourly 09:00–17:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCatalogue {
    /// Minutes after local midnight at which the first slot starts.
    pub first_start_minute: u32,
    pub slot_minutes: u32,
    pub count: u32,
}

impl Default for SlotCatalogue {
    fn default() -> Self {
        Self {
            first_start_minute: 9 * 60,
            slot_minutes: 60,
            count: 8,
        }
    }
}

impl SlotCatalogue {
    pub fn new(first_start: NaiveTime, slot_minutes: u32, count: u32) -> Result<Self, String> {
        use chrono::Timelike;
        let first_start_minute = first_start.hour() * 60 + first_start.minute();
        if slot_minutes == 0 || slot_minutes > DAY_MINUTES {
            return Err("slot length must be between 1 minute and 24 hours".into());
        }
        if count == 0 || count > MAX_SLOTS_PER_DAY {
            return Err(format!("slot count must be between 1 and {MAX_SLOTS_PER_DAY}"));
        }
        if first_start_minute + slot_minutes * count > DAY_MINUTES {
            return Err("slot catalogue runs past midnight".into());
        }
        Ok(Self {
            first_start_minute,
            slot_minutes,
            count,
        })
    }

    /// Slot spans for the day starting at `day_start`.
    pub fn slots(&self, day_start: Ms) -> Vec<Span> {
        let len = Ms::from(self.slot_minutes) * MINUTE_MS;
        let first = day_start + Ms::from(self.first_start_minute) * MINUTE_MS;
        (0..Ms::from(self.count))
            .map(|i| Span::new(first + i * len, first + (i + 1) * len))
            .collect()
    }

    /// The span from the first slot's start to the last slot's end.
    pub fn envelope(&self, day_start: Ms) -> Span {
        let start = day_start + Ms::from(self.first_start_minute) * MINUTE_MS;
        let len = Ms::from(self.slot_minutes) * Ms::from(self.count) * MINUTE_MS;
        Span::new(start, start + len)
    }
}

/// Reference time zone and slot catalogue used to turn calendar days into
/// instant windows.
#[derive(Debug, Clone, Copy)]
pub struct Calendar {
    pub offset: FixedOffset,
    pub catalogue: SlotCatalogue,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            catalogue: SlotCatalogue::default(),
        }
    }
}

impl Calendar {
    pub fn new(offset_minutes: i32, catalogue: SlotCatalogue) -> Result<Self, String> {
        let offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| format!("time zone offset out of range: {offset_minutes} minutes"))?;
        Ok(Self { offset, catalogue })
    }

    /// `[local 00:00, next local 00:00)` for `day`, as Unix ms.
    pub fn day_window(&self, day: NaiveDate) -> Span {
        let midnight = day.and_time(NaiveTime::MIN);
        let start = self
            .offset
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| midnight.and_utc().timestamp_millis());
        Span::new(start, start + Duration::days(1).num_milliseconds())
    }

    /// Calendar day (in the reference zone) containing the instant.
    pub fn day_of(&self, ms: Ms) -> Option<NaiveDate> {
        DateTime::from_timestamp_millis(ms).map(|dt| dt.with_timezone(&self.offset).date_naive())
    }
}

/// Parse a `YYYY-MM-DD` day, or the date part of an RFC 3339 timestamp.
pub fn parse_day(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    let date_part = s.split('T').next().unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| format!("bad date {s:?}: {e}"))
}

/// Parse an instant given either as Unix ms or as an RFC 3339 timestamp.
pub fn parse_instant(s: &str) -> Result<Ms, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<Ms>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| format!("bad timestamp {s:?}: {e}"))
}

/// Parse `HH:MM`.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| format!("bad time of day {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = 3_600_000;

    fn day(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    #[test]
    fn utc_day_window() {
        let cal = Calendar::default();
        let w = cal.day_window(day("2024-05-01"));
        assert_eq!(w.start, 1_714_521_600_000);
        assert_eq!(w.duration_ms(), 24 * H);
    }

    #[test]
    fn offset_shifts_day_window() {
        // UTC+05:30: local midnight is 18:30 UTC the previous day.
        let cal = Calendar::new(330, SlotCatalogue::default()).unwrap();
        let w = cal.day_window(day("2024-05-01"));
        assert_eq!(w.start, 1_714_521_600_000 - 330 * 60_000);
        assert_eq!(cal.day_of(w.start), Some(day("2024-05-01")));
        assert_eq!(cal.day_of(w.start - 1), Some(day("2024-04-30")));
    }

    #[test]
    fn default_catalogue_is_hourly_nine_to_five() {
        let cal = Calendar::default();
        let start = cal.day_window(day("2024-05-01")).start;
        let slots = cal.catalogue.slots(start);
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0], Span::new(start + 9 * H, start + 10 * H));
        assert_eq!(slots[7], Span::new(start + 16 * H, start + 17 * H));
        assert_eq!(cal.catalogue.envelope(start), Span::new(start + 9 * H, start + 17 * H));
    }

    #[test]
    fn catalogue_rejects_overflow_past_midnight() {
        let t = parse_time_of_day("20:00").unwrap();
        assert!(SlotCatalogue::new(t, 60, 5).is_err());
        assert!(SlotCatalogue::new(t, 60, 4).is_ok());
        assert!(SlotCatalogue::new(t, 0, 1).is_err());
    }

    #[test]
    fn instants_parse_from_ms_or_rfc3339() {
        assert_eq!(parse_instant("1714572000000"), Ok(1_714_572_000_000));
        assert_eq!(parse_instant("2024-05-01T14:00:00Z"), Ok(1_714_572_000_000));
        assert_eq!(parse_instant("2024-05-01T19:30:00+05:30"), Ok(1_714_572_000_000));
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn day_accepts_timestamp_prefix() {
        assert_eq!(parse_day("2024-05-01T10:00:00Z"), Ok(day("2024-05-01")));
        assert!(parse_day("05/01/2024").is_err());
    }
}
