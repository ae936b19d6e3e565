use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use studify_core::countdown::{Countdown, CountdownTick};
use studify_core::grading::score_session;
use studify_core::model::{
    AnswerLedger, AnswerRecord, CompletedResult, ExamTemplate, FinishReason, LedgerError,
    Navigator, Question, QuestionId, SessionId, TemplateId, TimeFlush,
};

use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── STATUS & EFFECTS ──────────────────────────────────────────────────────────
//

/// Lifecycle state of an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::NotStarted => "not started",
            SessionStatus::InProgress => "in progress",
            SessionStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Current state of one answer record, addressed for mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerSnapshot {
    pub session_id: SessionId,
    pub template_id: TemplateId,
    pub question_index: usize,
    pub question_id: QuestionId,
    pub record: AnswerRecord,
}

/// Side effects requested by a transition. The session never performs I/O
/// itself; whoever owns it decides how to carry these out.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Begin delivering one tick per second tagged with `generation`.
    StartTimer { generation: u64, seconds: u32 },
    /// Stop the timer of `generation`.
    StopTimer { generation: u64 },
    /// Mirror one answer record to storage.
    SyncAnswer(AnswerSnapshot),
    /// Store the completed result.
    PersistResult(CompletedResult),
}

/// Outcome of `ExamSession::finish`.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishStep {
    pub result: CompletedResult,
    /// Empty when the session had already completed.
    pub effects: Vec<SessionEffect>,
}

/// Outcome of applying one timer tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionTick {
    /// Stale generation, stopped countdown, or session not in progress.
    Ignored,
    Running { remaining_secs: u32 },
    Expired(FinishStep),
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    NotStarted,
    InProgress { started_at: DateTime<Utc> },
    Completed { result: CompletedResult },
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One timed attempt at a fixed, shared question list.
///
/// All transitions take an explicit `now` and return the side effects they
/// need instead of running them, so the transition table can be exercised
/// without a runtime.
#[derive(Debug, Clone)]
pub struct ExamSession {
    id: SessionId,
    template_id: TemplateId,
    questions: Arc<[Question]>,
    passing_score: u8,
    phase: Phase,
    ledger: AnswerLedger,
    navigator: Navigator,
    countdown: Countdown,
    generation: u64,
}

impl ExamSession {
    /// Create a not-started session over `questions`.
    ///
    /// An empty question list or a zero time limit is accepted here; `start`
    /// rejects both.
    #[must_use]
    pub fn new(
        template_id: TemplateId,
        questions: Arc<[Question]>,
        time_limit_secs: u32,
        passing_score: u8,
    ) -> Self {
        let count = questions.len();
        Self {
            id: SessionId::generate(),
            template_id,
            questions,
            passing_score,
            phase: Phase::NotStarted,
            ledger: AnswerLedger::new(count),
            navigator: Navigator::new(count),
            countdown: Countdown::new(time_limit_secs),
            generation: 0,
        }
    }

    /// Create a session over a template's questions in stored order.
    #[must_use]
    pub fn from_template(template: &ExamTemplate) -> Self {
        Self::new(
            template.id(),
            Arc::clone(template.questions()),
            template.time_limit_secs(),
            template.passing_score(),
        )
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        self.template_id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self.phase {
            Phase::NotStarted => SessionStatus::NotStarted,
            Phase::InProgress { .. } => SessionStatus::InProgress,
            Phase::Completed { .. } => SessionStatus::Completed,
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn passing_score(&self) -> u8 {
        self.passing_score
    }

    #[must_use]
    pub fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.navigator.current()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.navigator.current())
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.countdown.limit_secs()
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.countdown.remaining_secs()
    }

    /// Generation of the most recently started timer. Zero before the first start.
    #[must_use]
    pub fn timer_generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match &self.phase {
            Phase::NotStarted => None,
            Phase::InProgress { started_at } => Some(*started_at),
            Phase::Completed { result } => Some(result.started_at()),
        }
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.result().map(CompletedResult::completed_at)
    }

    #[must_use]
    pub fn result(&self) -> Option<&CompletedResult> {
        match &self.phase {
            Phase::Completed { result } => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        matches!(self.phase, Phase::InProgress { .. })
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            status: self.status(),
            total: self.question_count(),
            answered: self.ledger.answered_count(),
            flagged: self.ledger.flagged_indices().len(),
            current: self.navigator.current(),
            remaining_secs: self.countdown.remaining_secs(),
        }
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Start the session at `now`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is not
    /// started, and `SessionError::Unavailable` if there are no questions or
    /// no time to answer them.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<Vec<SessionEffect>, SessionError> {
        if !matches!(self.phase, Phase::NotStarted) {
            return Err(SessionError::InvalidTransition {
                action: "start",
                status: self.status(),
            });
        }
        if self.questions.is_empty() || self.countdown.limit_secs() == 0 {
            return Err(SessionError::Unavailable);
        }

        self.countdown.start();
        self.navigator.show(now);
        self.generation = self.generation.wrapping_add(1);
        self.phase = Phase::InProgress { started_at: now };

        Ok(vec![SessionEffect::StartTimer {
            generation: self.generation,
            seconds: self.countdown.remaining_secs(),
        }])
    }

    /// Complete the session and compute its result.
    ///
    /// Calling this on a completed session returns the stored result again
    /// with no effects, whatever `reason` is passed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if the session has not
    /// started.
    pub fn finish(
        &mut self,
        now: DateTime<Utc>,
        reason: FinishReason,
    ) -> Result<FinishStep, SessionError> {
        let started_at = match &self.phase {
            Phase::NotStarted => {
                return Err(SessionError::InvalidTransition {
                    action: "finish",
                    status: SessionStatus::NotStarted,
                });
            }
            Phase::Completed { result } => {
                return Ok(FinishStep {
                    result: result.clone(),
                    effects: Vec::new(),
                });
            }
            Phase::InProgress { started_at } => *started_at,
        };
        let completed_at = now.max(started_at);

        self.countdown.stop();
        let mut effects = vec![SessionEffect::StopTimer {
            generation: self.generation,
        }];
        let flush = self.navigator.hide(completed_at);
        effects.extend(self.apply_flush(flush)?);

        let sheet = score_session(&self.questions, self.ledger.records(), self.passing_score);
        let result = CompletedResult::from_sheet(
            self.id,
            self.template_id,
            started_at,
            completed_at,
            reason,
            sheet,
        )?;

        effects.push(SessionEffect::PersistResult(result.clone()));
        self.phase = Phase::Completed {
            result: result.clone(),
        };
        Ok(FinishStep { result, effects })
    }

    /// Return a completed session to not-started under a new id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is completed.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Completed { .. }) {
            return Err(SessionError::InvalidTransition {
                action: "restart",
                status: self.status(),
            });
        }

        let count = self.questions.len();
        self.id = SessionId::generate();
        self.ledger = AnswerLedger::new(count);
        self.navigator = Navigator::new(count);
        self.countdown = Countdown::new(self.countdown.limit_secs());
        self.phase = Phase::NotStarted;
        Ok(())
    }

    /// Apply one timer tick from the timer of `generation`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` only if finishing on expiry fails.
    pub fn tick(
        &mut self,
        generation: u64,
        now: DateTime<Utc>,
    ) -> Result<SessionTick, SessionError> {
        if generation != self.generation || !self.is_in_progress() {
            return Ok(SessionTick::Ignored);
        }
        match self.countdown.tick() {
            CountdownTick::Idle => Ok(SessionTick::Ignored),
            CountdownTick::Running { remaining } => Ok(SessionTick::Running {
                remaining_secs: remaining,
            }),
            CountdownTick::Expired => Ok(SessionTick::Expired(
                self.finish(now, FinishReason::TimeExpired)?,
            )),
        }
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Move to `index`, clamped into range.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session.
    pub fn go_to(
        &mut self,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEffect>, SessionError> {
        self.ensure_in_progress()?;
        let step = self.navigator.go_to(index, now);
        self.apply_flush(step.flush)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session.
    pub fn next(&mut self, now: DateTime<Utc>) -> Result<Vec<SessionEffect>, SessionError> {
        self.ensure_in_progress()?;
        let step = self.navigator.next(now);
        self.apply_flush(step.flush)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session.
    pub fn previous(&mut self, now: DateTime<Utc>) -> Result<Vec<SessionEffect>, SessionError> {
        self.ensure_in_progress()?;
        let step = self.navigator.previous(now);
        self.apply_flush(step.flush)
    }

    /// Flip the review flag of a question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session, or
    /// `SessionError::Ledger` for an out-of-range index.
    pub fn toggle_flag(&mut self, index: usize) -> Result<Vec<SessionEffect>, SessionError> {
        self.ensure_in_progress()?;
        self.ledger.toggle_flag(index)?;
        Ok(vec![SessionEffect::SyncAnswer(self.snapshot(index)?)])
    }

    //
    // ─── ANSWERS ───────────────────────────────────────────────────────────────
    //

    /// Select `option` for question `index`, replacing any earlier selection.
    ///
    /// Time spent on the displayed question is flushed first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session, or
    /// `SessionError::Ledger` if the index or option is out of range. Nothing
    /// changes on error.
    pub fn set_answer(
        &mut self,
        index: usize,
        option: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEffect>, SessionError> {
        self.ensure_in_progress()?;
        let question = self.question(index)?;
        if !question.has_option(option) {
            return Err(LedgerError::OptionOutOfRange { index, option }.into());
        }

        let flush = self.navigator.flush(now);
        let mut touched = self.flush_into_ledger(flush)?;
        self.ledger.set_answer(index, &self.questions[index], option)?;
        if !touched.contains(&index) {
            touched.push(index);
        }
        self.snapshots(&touched)
    }

    /// Reset question `index` to unanswered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session, or
    /// `SessionError::Ledger` for an out-of-range index.
    pub fn clear_answer(
        &mut self,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEffect>, SessionError> {
        self.ensure_in_progress()?;
        self.question(index)?;

        let flush = self.navigator.flush(now);
        let mut touched = self.flush_into_ledger(flush)?;
        self.ledger.clear_answer(index)?;
        if !touched.contains(&index) {
            touched.push(index);
        }
        self.snapshots(&touched)
    }

    /// Add `delta_secs` to a question's time without touching its answer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session, or
    /// `SessionError::Ledger` for an out-of-range index.
    pub fn record_time(
        &mut self,
        index: usize,
        delta_secs: u32,
    ) -> Result<Vec<SessionEffect>, SessionError> {
        self.ensure_in_progress()?;
        self.ledger.record_time(index, delta_secs)?;
        Ok(vec![SessionEffect::SyncAnswer(self.snapshot(index)?)])
    }

    /// Mirror-ready snapshot of one record.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Ledger` for an out-of-range index.
    pub fn snapshot(&self, index: usize) -> Result<AnswerSnapshot, SessionError> {
        let question = self.question(index)?;
        let record = self
            .ledger
            .get(index)
            .copied()
            .ok_or(LedgerError::QuestionOutOfRange {
                index,
                len: self.ledger.len(),
            })?;
        Ok(AnswerSnapshot {
            session_id: self.id,
            template_id: self.template_id,
            question_index: index,
            question_id: question.id(),
            record,
        })
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.is_in_progress() {
            Ok(())
        } else {
            Err(SessionError::NotInProgress)
        }
    }

    fn question(&self, index: usize) -> Result<&Question, SessionError> {
        self.questions.get(index).ok_or_else(|| {
            LedgerError::QuestionOutOfRange {
                index,
                len: self.questions.len(),
            }
            .into()
        })
    }

    fn flush_into_ledger(&mut self, flush: Option<TimeFlush>) -> Result<Vec<usize>, SessionError> {
        let mut touched = Vec::with_capacity(2);
        if let Some(flush) = flush {
            self.ledger.record_time(flush.index, flush.secs)?;
            touched.push(flush.index);
        }
        Ok(touched)
    }

    fn apply_flush(&mut self, flush: Option<TimeFlush>) -> Result<Vec<SessionEffect>, SessionError> {
        let touched = self.flush_into_ledger(flush)?;
        self.snapshots(&touched)
    }

    fn snapshots(&self, indices: &[usize]) -> Result<Vec<SessionEffect>, SessionError> {
        indices
            .iter()
            .map(|&index| self.snapshot(index).map(SessionEffect::SyncAnswer))
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use studify_core::model::{QuestionDraft, QuestionId};
    use studify_core::time::fixed_now;

    fn build_questions(subjects: &[&str]) -> Arc<[Question]> {
        subjects
            .iter()
            .enumerate()
            .map(|(i, subject)| {
                QuestionDraft {
                    subject: (*subject).to_string(),
                    prompt: format!("Question {i}"),
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_option: 0,
                    explanation: None,
                }
                .validate()
                .unwrap()
                .assign_id(QuestionId::new(i as u64 + 1))
            })
            .collect()
    }

    fn session(count: usize, limit: u32) -> ExamSession {
        let subjects = vec!["Math"; count];
        ExamSession::new(TemplateId::new(1), build_questions(&subjects), limit, 70)
    }

    fn sync_indices(effects: &[SessionEffect]) -> Vec<usize> {
        effects
            .iter()
            .filter_map(|e| match e {
                SessionEffect::SyncAnswer(s) => Some(s.question_index),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_yields_blank_ledger_and_timer_effect() {
        let mut session = session(4, 600);
        let effects = session.start(fixed_now()).unwrap();

        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(session.ledger().len(), 4);
        assert!(session
            .ledger()
            .records()
            .iter()
            .all(|r| r.selected.is_none() && r.time_spent_secs == 0 && !r.flagged));
        assert_eq!(
            effects,
            vec![SessionEffect::StartTimer {
                generation: 1,
                seconds: 600
            }]
        );
        assert_eq!(session.started_at(), Some(fixed_now()));
    }

    #[test]
    fn start_without_questions_is_unavailable() {
        let mut session = ExamSession::new(TemplateId::new(1), Arc::from(Vec::new()), 60, 70);
        let err = session.start(fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::Unavailable));
        assert_eq!(session.status(), SessionStatus::NotStarted);
    }

    #[test]
    fn start_without_time_limit_is_unavailable() {
        let mut session = session(2, 0);
        assert!(matches!(
            session.start(fixed_now()).unwrap_err(),
            SessionError::Unavailable
        ));
        assert_eq!(session.status(), SessionStatus::NotStarted);
        assert_eq!(session.timer_generation(), 0);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut session = session(2, 60);
        session.start(fixed_now()).unwrap();
        let err = session.start(fixed_now()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                action: "start",
                status: SessionStatus::InProgress
            }
        ));
    }

    #[test]
    fn finish_before_start_is_rejected() {
        let mut session = session(2, 60);
        let err = session
            .finish(fixed_now(), FinishReason::Submitted)
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
    }

    #[test]
    fn finish_is_idempotent() {
        let mut session = session(3, 60);
        let start = fixed_now();
        session.start(start).unwrap();
        session.set_answer(0, 0, start).unwrap();

        let first = session
            .finish(start + Duration::seconds(20), FinishReason::Submitted)
            .unwrap();
        let second = session
            .finish(start + Duration::seconds(45), FinishReason::TimeExpired)
            .unwrap();

        assert_eq!(first.result, second.result);
        assert!(second.effects.is_empty());
        assert_eq!(second.result.reason(), FinishReason::Submitted);
        assert!(matches!(
            first.effects.first(),
            Some(SessionEffect::StopTimer { generation: 1 })
        ));
        assert!(matches!(
            first.effects.last(),
            Some(SessionEffect::PersistResult(_))
        ));
    }

    #[test]
    fn early_submit_scores_three_of_five() {
        let mut session = session(5, 300);
        let now = fixed_now();
        session.start(now).unwrap();
        for index in 0..3 {
            session.set_answer(index, 0, now).unwrap();
        }

        let step = session.finish(now, FinishReason::Submitted).unwrap();
        let result = step.result;

        assert!((result.score_percent() - 60.0).abs() < f64::EPSILON);
        assert_eq!(result.correct(), 3);
        assert_eq!(result.unanswered(), 2);
        assert_eq!(result.incorrect(), 0);
        assert!(!result.passed());
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[test]
    fn ten_ticks_expire_a_ten_second_session() {
        let mut session = session(2, 10);
        let start = fixed_now();
        session.start(start).unwrap();
        let generation = session.timer_generation();

        for second in 1..10 {
            let tick = session
                .tick(generation, start + Duration::seconds(second))
                .unwrap();
            assert_eq!(
                tick,
                SessionTick::Running {
                    remaining_secs: u32::try_from(10 - second).unwrap()
                }
            );
        }
        let last = session
            .tick(generation, start + Duration::seconds(10))
            .unwrap();
        let SessionTick::Expired(step) = last else {
            panic!("expected expiry, got {last:?}");
        };
        assert_eq!(step.result.reason(), FinishReason::TimeExpired);
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.remaining_secs(), 0);

        let eleventh = session
            .tick(generation, start + Duration::seconds(11))
            .unwrap();
        assert_eq!(eleventh, SessionTick::Ignored);
        assert_eq!(session.result(), Some(&step.result));
    }

    #[test]
    fn stale_generation_ticks_are_ignored() {
        let mut session = session(1, 5);
        let now = fixed_now();
        session.start(now).unwrap();
        let old = session.timer_generation();
        session.finish(now, FinishReason::Submitted).unwrap();
        session.restart().unwrap();
        session.start(now).unwrap();

        assert_eq!(session.tick(old, now).unwrap(), SessionTick::Ignored);
        assert_eq!(session.remaining_secs(), 5);
        assert_eq!(
            session.tick(old + 1, now).unwrap(),
            SessionTick::Running { remaining_secs: 4 }
        );
    }

    #[test]
    fn restart_resets_to_not_started_with_fresh_ledger() {
        let mut session = session(3, 30);
        let start = fixed_now();
        session.start(start).unwrap();
        session.set_answer(1, 2, start).unwrap();
        session.toggle_flag(2).unwrap();
        session
            .finish(start + Duration::seconds(9), FinishReason::Submitted)
            .unwrap();
        let old_id = session.id();

        session.restart().unwrap();

        assert_eq!(session.status(), SessionStatus::NotStarted);
        assert_ne!(session.id(), old_id);
        assert_eq!(session.ledger(), &AnswerLedger::new(3));
        assert_eq!(session.result(), None);
        assert_eq!(session.started_at(), None);
        assert_eq!(session.current_index(), 0);

        let effects = session.start(start + Duration::minutes(5)).unwrap();
        assert_eq!(
            effects,
            vec![SessionEffect::StartTimer {
                generation: 2,
                seconds: 30
            }]
        );
    }

    #[test]
    fn restart_requires_completed_session() {
        let mut session = session(1, 30);
        assert!(matches!(
            session.restart().unwrap_err(),
            SessionError::InvalidTransition {
                action: "restart",
                ..
            }
        ));
    }

    #[test]
    fn go_to_clamps_and_flushes_time() {
        let mut session = session(5, 300);
        let start = fixed_now();
        session.start(start).unwrap();

        let effects = session.go_to(42, start + Duration::seconds(8)).unwrap();
        assert_eq!(session.current_index(), 4);
        assert_eq!(sync_indices(&effects), vec![0]);
        assert_eq!(session.ledger().get(0).unwrap().time_spent_secs, 8);

        session.next(start + Duration::seconds(9)).unwrap();
        assert_eq!(session.current_index(), 4);
        session.previous(start + Duration::seconds(10)).unwrap();
        assert_eq!(session.current_index(), 3);
        assert_eq!(session.ledger().get(4).unwrap().time_spent_secs, 2);
    }

    #[test]
    fn quick_navigation_keeps_total_time_spent() {
        let mut session = session(3, 300);
        let start = fixed_now();
        session.start(start).unwrap();

        for step in 1..=10_i64 {
            let target = usize::try_from(step % 3).unwrap();
            session
                .go_to(target, start + Duration::milliseconds(1_900 * step))
                .unwrap();
        }
        let step = session
            .finish(start + Duration::seconds(19), FinishReason::Submitted)
            .unwrap();

        assert_eq!(step.result.time_spent_secs(), 19);
    }

    #[test]
    fn set_answer_flushes_displayed_question_time() {
        let mut session = session(3, 300);
        let start = fixed_now();
        session.start(start).unwrap();

        let effects = session
            .set_answer(2, 1, start + Duration::seconds(6))
            .unwrap();

        assert_eq!(sync_indices(&effects), vec![0, 2]);
        assert_eq!(session.ledger().get(0).unwrap().time_spent_secs, 6);
        assert_eq!(session.ledger().get(2).unwrap().selected, Some(1));

        let effects = session
            .set_answer(0, 3, start + Duration::seconds(7))
            .unwrap();
        assert_eq!(sync_indices(&effects), vec![0]);
        assert_eq!(session.ledger().get(0).unwrap().time_spent_secs, 7);
    }

    #[test]
    fn invalid_answer_changes_nothing() {
        let mut session = session(2, 300);
        let start = fixed_now();
        session.start(start).unwrap();
        let before = session.ledger().clone();

        let err = session
            .set_answer(0, 9, start + Duration::seconds(3))
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Ledger(LedgerError::OptionOutOfRange { index: 0, option: 9 })
        ));
        assert!(session.set_answer(5, 0, start).is_err());
        assert_eq!(session.ledger(), &before);
    }

    #[test]
    fn clear_answer_and_flags_are_mirrored() {
        let mut session = session(2, 300);
        let now = fixed_now();
        session.start(now).unwrap();
        session.set_answer(1, 0, now).unwrap();

        let effects = session.clear_answer(1, now).unwrap();
        assert_eq!(sync_indices(&effects), vec![1]);
        assert_eq!(session.ledger().get(1).unwrap().selected, None);

        let effects = session.toggle_flag(1).unwrap();
        let [SessionEffect::SyncAnswer(snapshot)] = effects.as_slice() else {
            panic!("expected one sync effect");
        };
        assert!(snapshot.record.flagged);
        assert_eq!(snapshot.session_id, session.id());
        assert_eq!(snapshot.question_id, QuestionId::new(2));

        assert!(matches!(
            session.toggle_flag(2).unwrap_err(),
            SessionError::Ledger(LedgerError::QuestionOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn mutations_outside_progress_fail() {
        let mut session = session(2, 300);
        let now = fixed_now();
        assert!(matches!(
            session.set_answer(0, 0, now).unwrap_err(),
            SessionError::NotInProgress
        ));
        assert!(matches!(
            session.go_to(1, now).unwrap_err(),
            SessionError::NotInProgress
        ));

        session.start(now).unwrap();
        session.finish(now, FinishReason::Submitted).unwrap();

        assert!(matches!(
            session.toggle_flag(0).unwrap_err(),
            SessionError::NotInProgress
        ));
        assert!(matches!(
            session.record_time(0, 3).unwrap_err(),
            SessionError::NotInProgress
        ));
    }

    #[test]
    fn finish_flushes_time_and_reports_subjects() {
        let questions = build_questions(&["Physics", "Biology", "Physics"]);
        let mut session = ExamSession::new(TemplateId::new(4), questions, 120, 50);
        let start = fixed_now();
        session.start(start).unwrap();
        session.set_answer(0, 0, start).unwrap();
        session.set_answer(1, 2, start).unwrap();
        session.go_to(2, start + Duration::seconds(4)).unwrap();
        session.record_time(1, 3).unwrap();

        let step = session
            .finish(start + Duration::seconds(10), FinishReason::Submitted)
            .unwrap();
        let result = step.result;

        assert_eq!(result.time_spent_secs(), 13);
        assert_eq!(result.completed_at(), start + Duration::seconds(10));
        let subjects: Vec<_> = result
            .subjects()
            .iter()
            .map(|s| (s.subject.as_str(), s.correct, s.total))
            .collect();
        assert_eq!(subjects, vec![("Biology", 0, 1), ("Physics", 1, 2)]);
        assert!(!result.passed());
        assert_eq!(sync_indices(&step.effects), vec![2]);
    }

    #[test]
    fn progress_reports_counts() {
        let mut session = session(4, 90);
        let now = fixed_now();
        session.start(now).unwrap();
        session.set_answer(0, 0, now).unwrap();
        session.set_answer(3, 1, now).unwrap();
        session.toggle_flag(2).unwrap();
        session.go_to(2, now).unwrap();

        let progress = session.progress();
        assert_eq!(progress.status, SessionStatus::InProgress);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.unanswered(), 2);
        assert_eq!(progress.flagged, 1);
        assert_eq!(progress.current, 2);
        assert_eq!(progress.remaining_secs, 90);
    }
}
