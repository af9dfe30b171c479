//! Fixed-capacity ring buffer.
//!
//! Every bounded history in the crate (trait evidence and sources, asked
//! topics, recent agent actions, reply windows, the episode log, trait
//! snapshots and the mood journal) is a [`RingBuffer`]: pushing past capacity
//! evicts the oldest entry.
//!
//! The capacity is part of the type, so it never has to be persisted. A ring
//! serializes as a plain sequence, oldest first; deserializing a longer
//! sequence keeps only the newest `N` entries.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A FIFO buffer holding at most `N` items.
#[derive(Clone, PartialEq)]
pub struct RingBuffer<T, const N: usize> {
    items: VecDeque<T>,
}

impl<T, const N: usize> RingBuffer<T, N> {
    /// Maximum number of items retained.
    pub const CAPACITY: usize = N;

    /// Create an empty ring.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: VecDeque::with_capacity(N),
        }
    }

    /// Append an item, returning the evicted oldest item if the ring was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if N == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() == N {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Most recently pushed item.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Number of items currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the ring holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the ring is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() == N
    }

    /// Iterate oldest → newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Iterate mutably oldest → newest.
    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut T> + ExactSizeIterator {
        self.items.iter_mut()
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for RingBuffer<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &N)
            .field("items", &self.items)
            .finish()
    }
}

impl<T, const N: usize> Extend<T> for RingBuffer<T, N> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<T, const N: usize> FromIterator<T> for RingBuffer<T, N> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ring = Self::new();
        ring.extend(iter);
        ring
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a RingBuffer<T, N> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize, const N: usize> Serialize for RingBuffer<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

struct RingVisitor<T, const N: usize>(PhantomData<T>);

impl<'de, T: Deserialize<'de>, const N: usize> Visitor<'de> for RingVisitor<T, N> {
    type Value = RingBuffer<T, N>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a sequence (at most {N} items are kept)")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut ring = RingBuffer::new();
        while let Some(item) = seq.next_element()? {
            ring.push(item);
        }
        Ok(ring)
    }
}

impl<'de, T: Deserialize<'de>, const N: usize> Deserialize<'de> for RingBuffer<T, N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(RingVisitor::<T, N>(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest_when_full() {
        let mut ring: RingBuffer<u32, 3> = RingBuffer::new();
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert!(ring.is_full());
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(ring.latest(), Some(&4));
    }

    #[test]
    fn zero_capacity_holds_nothing() {
        let mut ring: RingBuffer<&str, 0> = RingBuffer::new();
        assert_eq!(ring.push("a"), Some("a"));
        assert!(ring.is_empty());
    }

    #[test]
    fn deserializing_oversized_sequence_keeps_newest() {
        let ring: RingBuffer<u32, 2> = serde_json::from_str("[1, 2, 3, 4]").expect("decode");
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn serializes_as_plain_sequence() {
        let ring: RingBuffer<u32, 5> = [7, 8].into_iter().collect();
        assert_eq!(serde_json::to_string(&ring).expect("encode"), "[7,8]");
    }
}
