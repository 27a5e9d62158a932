//! Time-bucketed ring buffer of jobs ready to run.
//!
//! The queue covers a window `[first, last)` of chunks. Each chunk maps to
//! the bucket at `time % capacity`, so the window has to fit in the ring.
//! When it does not, the ring grows geometrically (`(3 * len + 1) / 2`,
//! repeated from the current length) and every live bucket is moved to its
//! slot in the new ring. The ring never shrinks.
//!
//! Buckets hold a handful of entries at most, kept sorted so the head of
//! the first non-empty bucket is always the smallest ready job.

use std::fmt;

use tracing::trace;

use crate::look_ahead::AdmissionGate;
use crate::types::{JobId, Phase};

/// Ready jobs, ordered by time then same-time rank.
#[derive(Clone)]
pub struct ReadyQueue<P: Phase> {
    buckets: Vec<Vec<JobId<P>>>,
    first: usize,
    last: usize,
    len: usize,
}

impl<P: Phase> Default for ReadyQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Phase> ReadyQueue<P> {
    /// Create an empty queue with a ring of one bucket.
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new()],
            first: 0,
            last: 0,
            len: 0,
        }
    }

    /// Ring length after growing from `current` until `required` fits.
    pub fn grown_capacity(current: usize, required: usize) -> usize {
        let mut length = current.max(1);
        while length < required {
            length = (3 * length + 1) / 2;
        }
        length
    }

    /// Number of buckets in the ring.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// First chunk of the window.
    pub fn first(&self) -> usize {
        self.first
    }

    /// One past the last chunk of the window.
    pub fn last(&self) -> usize {
        self.last
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot(&self, time: usize) -> usize {
        time % self.buckets.len()
    }

    /// Queue a ready job.
    ///
    /// Returns `false`, leaving the queue untouched, if `id` is already
    /// queued.
    pub fn add(&mut self, id: JobId<P>) -> bool {
        if self.contains(&id) {
            return false;
        }

        let time = id.time();
        let (first, last) = if self.first == self.last {
            (time, time + 1)
        } else {
            (self.first.min(time), self.last.max(time + 1))
        };
        if last - first > self.buckets.len() {
            self.grow(last - first);
        }
        self.first = first;
        self.last = last;

        let slot = self.slot(time);
        let bucket = &mut self.buckets[slot];
        let position = bucket.partition_point(|queued| *queued < id);
        bucket.insert(position, id);
        self.len += 1;
        true
    }

    fn grow(&mut self, required: usize) {
        let old_length = self.buckets.len();
        let new_length = Self::grown_capacity(old_length, required);
        let mut buckets = vec![Vec::new(); new_length];
        for time in self.first..self.last {
            buckets[time % new_length] = std::mem::take(&mut self.buckets[time % old_length]);
        }
        self.buckets = buckets;
        trace!(old_length, new_length, "ready queue grown");
    }

    /// Remove and return the smallest ready job, if the gate lets its chunk
    /// run.
    pub fn next<G: AdmissionGate + ?Sized>(&mut self, gate: &G) -> Option<JobId<P>> {
        self.skip_empty();
        if self.first == self.last {
            return None;
        }

        let slot = self.slot(self.first);
        let head = *self.buckets[slot].first()?;
        if !gate.ok(head.time(), head.rank()) {
            return None;
        }
        self.buckets[slot].remove(0);
        self.len -= 1;
        self.skip_empty();
        Some(head)
    }

    /// Peek at the smallest ready job without removing it.
    pub fn peek(&self) -> Option<&JobId<P>> {
        (self.first..self.last)
            .map(|time| &self.buckets[self.slot(time)])
            .find_map(|bucket| bucket.first())
    }

    fn skip_empty(&mut self) {
        while self.first < self.last && self.buckets[self.slot(self.first)].is_empty() {
            self.first += 1;
        }
    }

    /// Whether `id` is queued.
    pub fn contains(&self, id: &JobId<P>) -> bool {
        (self.first..self.last).contains(&id.time())
            && self.buckets[self.slot(id.time())].contains(id)
    }

    /// Check the global layout invariants.
    ///
    /// - the window fits in the ring
    /// - no bucket outside `[first, last)` holds entries
    /// - every entry sits in the bucket of its own chunk
    /// - buckets are sorted and free of duplicates
    /// - the cached length matches the contents
    pub fn check_invariants(&self) -> Result<(), String> {
        let capacity = self.buckets.len();
        if self.first > self.last {
            return Err(format!("window [{}, {}) is inverted", self.first, self.last));
        }
        if self.last - self.first > capacity {
            return Err(format!(
                "window [{}, {}) does not fit in {capacity} buckets",
                self.first, self.last
            ));
        }

        let mut live = vec![false; capacity];
        for time in self.first..self.last {
            live[time % capacity] = true;
        }

        let mut total = 0;
        for (slot, bucket) in self.buckets.iter().enumerate() {
            if !live[slot] && !bucket.is_empty() {
                return Err(format!("bucket {slot} outside the window holds {} jobs", bucket.len()));
            }
            for pair in bucket.windows(2) {
                if pair[0] >= pair[1] {
                    return Err(format!("bucket {slot} not strictly sorted: {} then {}", pair[0], pair[1]));
                }
            }
            for id in bucket {
                if id.time() % capacity != slot || !(self.first..self.last).contains(&id.time()) {
                    return Err(format!("{id} stored in bucket {slot}"));
                }
            }
            total += bucket.len();
        }

        if total != self.len {
            return Err(format!("length {} but {total} jobs stored", self.len));
        }
        Ok(())
    }

    /// Iterate over queued jobs in order.
    pub fn iter(&self) -> impl Iterator<Item = &JobId<P>> + '_ {
        (self.first..self.last).flat_map(move |time| self.buckets[self.slot(time)].iter())
    }
}

impl<P: Phase> fmt::Debug for ReadyQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyQueue")
            .field("first", &self.first)
            .field("last", &self.last)
            .field("capacity", &self.buckets.len())
            .field("jobs", &self.iter().map(ToString::to_string).collect::<Vec<_>>())
            .finish()
    }
}
