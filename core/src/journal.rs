//! Bounded history of completed request/response pairs.
//!
//! The journal is append-only from the pipeline's point of view. Once the
//! configured limit is exceeded the oldest entries are evicted first.

use crate::message::{Request, Response};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Default number of entries kept by [`BoundedJournal`].
pub const DEFAULT_JOURNAL_LIMIT: usize = 10;

/// One recorded exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct JournalEntry {
    request: Request,
    response: Response,
    recorded_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(request: Request, response: Response) -> Self {
        Self {
            request,
            response,
            recorded_at: Utc::now(),
        }
    }

    /// The (stopped) request.
    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// The response.
    #[must_use]
    pub const fn response(&self) -> &Response {
        &self.response
    }

    /// When the entry was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Time the request took, if it was timed.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.request.elapsed()
    }
}

/// Storage for recorded exchanges.
pub trait Journal: Send + Sync {
    /// Append an exchange, evicting the oldest entries beyond the limit.
    fn record(&self, request: Request, response: Response);

    /// All entries, oldest first.
    fn entries(&self) -> Vec<JournalEntry>;

    /// Remove every entry.
    fn clear(&self);

    /// Number of entries.
    fn len(&self) -> usize;

    /// Whether the journal is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries kept.
    fn limit(&self) -> usize;
}

/// In-memory FIFO journal.
#[derive(Debug)]
pub struct BoundedJournal {
    entries: Mutex<VecDeque<JournalEntry>>,
    limit: usize,
}

impl BoundedJournal {
    /// Create a journal keeping at most `limit` entries.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(limit.min(1024))),
            limit,
        }
    }
}

impl Default for BoundedJournal {
    fn default() -> Self {
        Self::new(DEFAULT_JOURNAL_LIMIT)
    }
}

impl Journal for BoundedJournal {
    fn record(&self, request: Request, response: Response) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        entries.push_back(JournalEntry::new(request, response));
        while entries.len() > self.limit {
            entries.pop_front();
        }

        tracing::trace!(size = entries.len(), limit = self.limit, "Journal entry recorded");
    }

    fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn limit(&self) -> usize {
        self.limit
    }
}
