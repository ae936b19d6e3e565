//! Results derivation for completed sessions.
//!
//! `score_session` is the single scoring contract: on-screen summaries and
//! persisted results both come from it, so the two can never disagree.

use std::collections::BTreeMap;

use crate::model::{AnswerRecord, Question, SubjectScore};

/// Derived statistics for a set of answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSheet {
    pub total: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
    pub score_percent: f64,
    pub passed: bool,
    pub time_spent_secs: u32,
    pub subjects: Vec<SubjectScore>,
}

fn count_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Percentage of `correct` over `total`, 0 for an empty set.
#[must_use]
pub fn percent(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(correct) * 100.0 / f64::from(total)).clamp(0.0, 100.0)
}

/// Score a session's answers against its questions.
///
/// Questions without a matching record count as unanswered. Subjects are
/// reported in lexical order.
#[must_use]
pub fn score_session(
    questions: &[Question],
    records: &[AnswerRecord],
    passing_score: u8,
) -> ScoreSheet {
    let mut correct = 0_usize;
    let mut unanswered = 0_usize;
    let mut by_subject: BTreeMap<&str, (u32, u32)> = BTreeMap::new();

    for (index, question) in questions.iter().enumerate() {
        let selected = records.get(index).and_then(|r| r.selected);
        let entry = by_subject.entry(question.subject()).or_insert((0, 0));
        entry.1 = entry.1.saturating_add(1);

        match selected {
            None => unanswered += 1,
            Some(option) if question.is_correct(option) => {
                correct += 1;
                entry.0 = entry.0.saturating_add(1);
            }
            Some(_) => {}
        }
    }

    let total = count_u32(questions.len());
    let correct = count_u32(correct);
    let unanswered = count_u32(unanswered);
    let incorrect = total - correct - unanswered;
    let score_percent = percent(correct, total);
    let time_spent_secs = records
        .iter()
        .fold(0_u32, |acc, r| acc.saturating_add(r.time_spent_secs));

    let subjects = by_subject
        .into_iter()
        .map(|(subject, (correct, total))| SubjectScore {
            subject: subject.to_string(),
            correct,
            total,
        })
        .collect();

    ScoreSheet {
        total,
        correct,
        incorrect,
        unanswered,
        score_percent,
        passed: score_percent >= f64::from(passing_score),
        time_spent_secs,
        subjects,
    }
}
