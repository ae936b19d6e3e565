use super::service::SessionStatus;

/// Aggregated view of session progress, useful for front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub status: SessionStatus,
    pub total: usize,
    pub answered: usize,
    pub flagged: usize,
    pub current: usize,
    pub remaining_secs: u32,
}

impl SessionProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }
}
