//! Key spans — `[key, end_key)` ranges over the sorted key space.

use serde::{Deserialize, Serialize};

/// A contiguous key range `[key, end_key)`.
///
/// An empty `end_key` denotes a point span covering exactly `key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub key: Vec<u8>,
    pub end_key: Vec<u8>,
}

impl Span {
    pub fn new(key: impl Into<Vec<u8>>, end_key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            end_key: end_key.into(),
        }
    }

    /// Span covering a single key.
    pub fn point(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            end_key: Vec::new(),
        }
    }

    pub fn is_point(&self) -> bool {
        self.end_key.is_empty()
    }

    /// 키가 스팬 범위에 포함되는지 확인
    pub fn contains_key(&self, key: &[u8]) -> bool {
        if self.is_point() {
            key == self.key.as_slice()
        } else {
            key >= self.key.as_slice() && key < self.end_key.as_slice()
        }
    }

    /// Whether `[start, end)` intersects this span. An empty `end` is unbounded.
    pub fn overlaps(&self, start: &[u8], end: &[u8]) -> bool {
        let below_end = |k: &[u8]| end.is_empty() || k < end;
        if self.is_point() {
            return self.key.as_slice() >= start && below_end(&self.key);
        }
        below_end(&self.key) && start < self.end_key.as_slice()
    }

    /// Overwrite the key bytes with zeroes in place and truncate both buffers.
    ///
    /// The allocations are kept, so the zeroed bytes stay in memory owned by the span.
    pub fn clear_keys(&mut self) {
        scrub(&mut self.key);
        scrub(&mut self.end_key);
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.end_key.is_empty()
    }
}

fn scrub(buf: &mut Vec<u8>) {
    buf.fill(0);
    // 읽히지 않는 쓰기로 간주되어 제거되지 않도록
    std::hint::black_box(buf.as_slice());
    buf.clear();
}
