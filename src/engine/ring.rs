use serde::{Deserialize, Serialize};

/// Fixed-capacity FIFO log. Once full, each push overwrites the oldest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RingParts<T>", bound(deserialize = "T: Deserialize<'de>"))]
pub struct RingHistory<T> {
    buf: Vec<T>,
    /// Slot the next push overwrites once `buf` is full.
    head: usize,
    capacity: usize,
}

impl<T> RingHistory<T> {
    /// A zero capacity is bumped to one so the newest entry is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Append, returning the evicted entry if the ring was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.buf.len() < self.capacity {
            self.buf.push(item);
            return None;
        }
        let evicted = std::mem::replace(&mut self.buf[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&T> {
        if self.buf.is_empty() {
            return None;
        }
        let idx = (self.head + self.buf.len() - 1) % self.buf.len();
        self.buf.get(idx)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (newer, older) = self.buf.split_at(self.head);
        older.iter().chain(newer.iter())
    }
}

/// Wire form, checked before it becomes a ring.
#[derive(Deserialize)]
struct RingParts<T> {
    buf: Vec<T>,
    head: usize,
    capacity: usize,
}

impl<T> TryFrom<RingParts<T>> for RingHistory<T> {
    type Error = String;

    fn try_from(parts: RingParts<T>) -> Result<Self, Self::Error> {
        let RingParts { buf, head, capacity } = parts;
        if capacity == 0 {
            return Err("ring capacity must be positive".into());
        }
        if buf.len() > capacity {
            return Err(format!("ring holds {} entries over capacity {capacity}", buf.len()));
        }
        // The head only moves once the ring is full.
        let head_ok = if buf.len() == capacity { head < capacity } else { head == 0 };
        if !head_ok {
            return Err(format!("ring head {head} invalid for {} of {capacity} entries", buf.len()));
        }
        Ok(Self { buf, head, capacity })
    }
}

impl<T: Clone> RingHistory<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
