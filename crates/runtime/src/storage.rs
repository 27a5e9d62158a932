//! Bookkeeping storage for a run.
//!
//! [`ResultStore`] retains finished results until every successor has taken
//! its copy. [`PendingJobs`] counts, for every known job that is not yet
//! ready, how many predecessors it still waits for.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::job::JobResult;
use crate::types::{JobId, Phase};

#[derive(Debug)]
struct Retained<V> {
    result: Option<Arc<JobResult<V>>>,
    consumers: usize,
}

/// Results of finished jobs, each kept until its last consumer takes it.
#[derive(Debug)]
pub struct ResultStore<P: Phase, V> {
    retained: IndexMap<JobId<P>, Retained<V>>,
    max_retained: usize,
}

impl<P: Phase, V> Default for ResultStore<P, V> {
    fn default() -> Self {
        Self {
            retained: IndexMap::new(),
            max_retained: 0,
        }
    }
}

impl<P: Phase, V> ResultStore<P, V> {
    /// Keep `result` for `consumers` successors.
    ///
    /// A result nobody consumes is dropped immediately.
    pub fn insert(&mut self, id: JobId<P>, result: Option<Arc<JobResult<V>>>, consumers: usize) {
        if consumers == 0 {
            return;
        }
        self.retained.insert(id, Retained { result, consumers });
        self.max_retained = self.max_retained.max(self.retained.len());
    }

    /// Hand `predecessor`'s result to `consumer`, releasing it after its
    /// last consumer.
    pub fn take(&mut self, predecessor: &JobId<P>, consumer: &JobId<P>) -> Result<Option<Arc<JobResult<V>>>> {
        let entry = self
            .retained
            .get_mut(predecessor)
            .ok_or_else(|| Error::MissingResult {
                job: consumer.to_string(),
                predecessor: predecessor.to_string(),
            })?;
        let result = entry.result.clone();
        entry.consumers -= 1;
        if entry.consumers == 0 {
            self.retained.swap_remove(predecessor);
        }
        Ok(result)
    }

    /// Number of results currently retained.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    /// True if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Largest number of results retained at once.
    pub fn max_retained(&self) -> usize {
        self.max_retained
    }
}

/// Jobs the scheduler knows about that are not ready yet.
#[derive(Debug)]
pub struct PendingJobs<P: Phase> {
    waiting: IndexMap<JobId<P>, usize>,
}

impl<P: Phase> Default for PendingJobs<P> {
    fn default() -> Self {
        Self {
            waiting: IndexMap::new(),
        }
    }
}

impl<P: Phase> PendingJobs<P> {
    /// Whether `id` is waiting.
    pub fn contains(&self, id: &JobId<P>) -> bool {
        self.waiting.contains_key(id)
    }

    /// Start tracking `id`, which waits for `outstanding` events.
    pub fn insert(&mut self, id: JobId<P>, outstanding: usize) {
        self.waiting.insert(id, outstanding);
    }

    /// Record one satisfied dependency of `id`.
    ///
    /// Returns `true` when that was the last one; the job then stops being
    /// tracked.
    pub fn satisfy(&mut self, id: &JobId<P>) -> Result<bool> {
        let outstanding = self
            .waiting
            .get_mut(id)
            .filter(|outstanding| **outstanding > 0)
            .ok_or_else(|| Error::Internal(format!("{id} is not waiting for anything")))?;
        *outstanding -= 1;
        if *outstanding == 0 {
            self.waiting.swap_remove(id);
            return Ok(true);
        }
        Ok(false)
    }

    /// Number of waiting jobs.
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    /// True if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Smallest waiting job, for diagnostics.
    pub fn first(&self) -> Option<&JobId<P>> {
        self.waiting.keys().min()
    }
}
