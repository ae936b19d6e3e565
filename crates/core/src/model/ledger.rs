use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::question::Question;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("question {index} is out of range for {len} questions")]
    QuestionOutOfRange { index: usize, len: usize },

    #[error("option {option} is out of range for question {index}")]
    OptionOutOfRange { index: usize, option: usize },
}

//
// ─── ANSWER RECORD ────────────────────────────────────────────────────────────
//

/// Per-question state of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub selected: Option<usize>,
    pub time_spent_secs: u32,
    pub flagged: bool,
}

impl AnswerRecord {
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }
}

//
// ─── LEDGER ───────────────────────────────────────────────────────────────────
//

/// One `AnswerRecord` per question, in question order.
///
/// The record count is fixed at construction and always equals the question
/// count of the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerLedger {
    records: Vec<AnswerRecord>,
}

impl AnswerLedger {
    /// Creates a ledger of `len` unanswered, zero-time records.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            records: vec![AnswerRecord::default(); len],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[AnswerRecord] {
        &self.records
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&AnswerRecord> {
        self.records.get(index)
    }

    fn record_mut(&mut self, index: usize) -> Result<&mut AnswerRecord, LedgerError> {
        let len = self.records.len();
        self.records
            .get_mut(index)
            .ok_or(LedgerError::QuestionOutOfRange { index, len })
    }

    /// Record a selection for `question`, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the index or option is out of range.
    pub fn set_answer(
        &mut self,
        index: usize,
        question: &Question,
        option: usize,
    ) -> Result<AnswerRecord, LedgerError> {
        if !question.has_option(option) {
            return Err(LedgerError::OptionOutOfRange { index, option });
        }
        let record = self.record_mut(index)?;
        record.selected = Some(option);
        Ok(*record)
    }

    /// Reset the selection for a question to unanswered.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::QuestionOutOfRange` for an invalid index.
    pub fn clear_answer(&mut self, index: usize) -> Result<AnswerRecord, LedgerError> {
        let record = self.record_mut(index)?;
        record.selected = None;
        Ok(*record)
    }

    /// Add seconds to a question's accumulated time without touching its answer.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::QuestionOutOfRange` for an invalid index.
    pub fn record_time(&mut self, index: usize, delta_secs: u32) -> Result<AnswerRecord, LedgerError> {
        let record = self.record_mut(index)?;
        record.time_spent_secs = record.time_spent_secs.saturating_add(delta_secs);
        Ok(*record)
    }

    /// Flip the review flag of a question.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::QuestionOutOfRange` for an invalid index.
    pub fn toggle_flag(&mut self, index: usize) -> Result<AnswerRecord, LedgerError> {
        let record = self.record_mut(index)?;
        record.flagged = !record.flagged;
        Ok(*record)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_answered()).count()
    }

    #[must_use]
    pub fn flagged_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.flagged.then_some(i))
            .collect()
    }

    #[must_use]
    pub fn total_time_secs(&self) -> u32 {
        self.records
            .iter()
            .fold(0_u32, |acc, r| acc.saturating_add(r.time_spent_secs))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
