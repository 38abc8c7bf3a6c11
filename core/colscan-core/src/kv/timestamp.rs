//! Hybrid-logical timestamps and the bounded-staleness read header.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hybrid-logical clock timestamp: wall time in nanoseconds plus a logical tiebreaker.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    pub wall_time: i64,
    pub logical: i32,
}

impl Timestamp {
    pub const fn new(wall_time: i64, logical: i32) -> Self {
        Self { wall_time, logical }
    }

    pub fn is_empty(&self) -> bool {
        *self == Timestamp::default()
    }

    /// Decimal encoding `wall.logical` with a ten-digit fraction, scaled by 10^10.
    ///
    /// This is the representation of the MVCC timestamp system column.
    pub fn as_scaled_decimal(&self) -> i128 {
        i128::from(self.wall_time) * 10_000_000_000 + i128::from(self.logical)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:010}", self.wall_time, self.logical)
    }
}

/// Header attached to a bounded-staleness read.
///
/// The server may serve the read at any timestamp in
/// `[min_timestamp_bound, max_timestamp_bound)`; an unset max is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedStalenessHeader {
    pub min_timestamp_bound: Timestamp,
    /// Fail rather than block when the min bound cannot be served locally
    pub min_timestamp_bound_strict: bool,
    pub max_timestamp_bound: Option<Timestamp>,
}

impl BoundedStalenessHeader {
    /// Build a header whose min bound is no older than the schema it will be decoded under.
    ///
    /// `schema_modified_at` is the table's last-modification time; the requested
    /// min bound is raised to it when it is older.
    pub fn for_schema(
        requested_min: Timestamp,
        strict: bool,
        max_timestamp_bound: Option<Timestamp>,
        schema_modified_at: Timestamp,
    ) -> Self {
        Self {
            min_timestamp_bound: requested_min.max(schema_modified_at),
            min_timestamp_bound_strict: strict,
            max_timestamp_bound,
        }
    }
}
