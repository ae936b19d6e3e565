use chrono::{DateTime, Duration, Utc};

/// Seconds spent on a question, ready to be added to its answer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFlush {
    pub index: usize,
    pub secs: u32,
}

/// Outcome of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationStep {
    pub from: usize,
    pub to: usize,
    pub flush: Option<TimeFlush>,
}

impl NavigationStep {
    #[must_use]
    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

/// Current-question cursor over a fixed number of questions.
///
/// Tracks when the current question was put on screen so time spent can be
/// flushed into the ledger whenever the user leaves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    count: usize,
    current: usize,
    displayed_since: Option<DateTime<Utc>>,
}

impl Navigator {
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count,
            current: 0,
            displayed_since: None,
        }
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.count
    }

    /// Clamp an index into `[0, count - 1]`.
    #[must_use]
    pub fn clamp(&self, index: usize) -> usize {
        index.min(self.count.saturating_sub(1))
    }

    /// Start timing the current question.
    pub fn show(&mut self, now: DateTime<Utc>) {
        self.displayed_since = Some(now);
    }

    /// Stop timing and return whatever was accumulated on the current question.
    pub fn hide(&mut self, now: DateTime<Utc>) -> Option<TimeFlush> {
        let flush = self.elapsed(now);
        self.displayed_since = None;
        flush
    }

    /// Take the whole seconds spent on the current question so far.
    ///
    /// Sub-second remainders stay on the clock so repeated flushes do not
    /// lose time.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Option<TimeFlush> {
        let flush = self.elapsed(now)?;
        if let Some(since) = self.displayed_since.as_mut() {
            *since += Duration::seconds(i64::from(flush.secs));
        }
        Some(flush)
    }

    fn elapsed(&self, now: DateTime<Utc>) -> Option<TimeFlush> {
        let since = self.displayed_since?;
        let secs = (now - since).num_seconds();
        if secs <= 0 {
            return None;
        }
        Some(TimeFlush {
            index: self.current,
            secs: u32::try_from(secs).unwrap_or(u32::MAX),
        })
    }

    /// Move to `index` (clamped), flushing time for the question being left.
    ///
    /// The sub-second remainder carries over to the next question.
    pub fn go_to(&mut self, index: usize, now: DateTime<Utc>) -> NavigationStep {
        let from = self.current;
        let to = self.clamp(index);
        if from == to {
            return NavigationStep {
                from,
                to,
                flush: None,
            };
        }

        let flush = self.flush(now);
        self.current = to;

        NavigationStep { from, to, flush }
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> NavigationStep {
        if self.is_last() {
            return self.go_to(self.current, now);
        }
        self.go_to(self.current + 1, now)
    }

    pub fn previous(&mut self, now: DateTime<Utc>) -> NavigationStep {
        if self.is_first() {
            return self.go_to(self.current, now);
        }
        self.go_to(self.current - 1, now)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
