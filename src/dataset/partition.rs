//! Row-range partitions and helpers to reshape them.

use serde::{Deserialize, Serialize};

/// Half-open row range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    /// First row of the range.
    pub start: u64,
    /// One past the last row.
    pub end: u64,
}

impl Partition {
    /// Creates a partition covering `[start, end)`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        Partition {
            start,
            end: end.max(start),
        }
    }

    /// Number of rows in the partition.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns true if the partition holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Iterates over the row numbers.
    pub fn rows(&self) -> std::ops::Range<u64> {
        self.start..self.end
    }
}

/// Keeps at most `limit` rows, taking partitions in order.
///
/// The partition that crosses the limit is shortened; later partitions
/// and empty ones are dropped.
#[must_use]
pub fn truncate(parts: &[Partition], limit: u64) -> Vec<Partition> {
    let mut remaining = limit;
    let mut out = Vec::new();
    for part in parts {
        if remaining == 0 {
            break;
        }
        let take = part.len().min(remaining);
        if take > 0 {
            out.push(Partition::new(part.start, part.start + take));
            remaining -= take;
        }
    }
    out
}

/// Splits partitions so that roughly `n` similarly sized ranges result.
///
/// Existing boundaries are kept; a partition is only ever cut into
/// smaller contiguous pieces.
#[must_use]
pub fn split(parts: &[Partition], n: usize) -> Vec<Partition> {
    let total: u64 = parts.iter().map(Partition::len).sum();
    if n <= 1 || total == 0 {
        return parts.iter().copied().filter(|p| !p.is_empty()).collect();
    }
    let chunk = total.div_ceil(n as u64).max(1);
    let mut out = Vec::new();
    for part in parts {
        let mut start = part.start;
        while start < part.end {
            let end = (start + chunk).min(part.end);
            out.push(Partition::new(start, end));
            start = end;
        }
    }
    out
}
