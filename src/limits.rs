use crate::model::Ms;

pub const MAX_HALL_NAME_LEN: usize = 128;
pub const MAX_FIELD_LEN: usize = 512;
pub const MAX_USER_NAME_LEN: usize = 64;

pub const MAX_BOOKINGS_PER_HALL: usize = 100_000;
pub const MAX_REQUIRED_ATTENDANCE: u32 = 1_000_000;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single booking may not run longer than 31 days.
pub const MAX_BOOKING_DURATION_MS: Ms = 31 * 24 * 3_600_000;

pub const MAX_SLOTS_PER_DAY: u32 = 96;
