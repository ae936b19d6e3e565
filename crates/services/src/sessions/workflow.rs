use std::sync::Arc;
use std::time::Duration;

use storage::repository::{
    AnswerRepository, ResultId, ResultRepository, StorageError, TemplateRepository,
};
use studify_core::model::{CompletedResult, FinishReason, TemplateId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::queries::SessionQueries;
use super::service::{ExamSession, FinishStep, SessionEffect, SessionTick};
use super::sync::{AnswerSync, SessionNotice};
use super::timer::{SessionTimer, TICK_PERIOD, TimerTick};
use crate::Clock;
use crate::error::SessionError;

/// Result of finishing an exam, including whether it reached storage.
#[derive(Debug)]
pub struct FinishOutcome {
    pub result: CompletedResult,
    /// Row id once the result has been stored.
    pub result_id: Option<ResultId>,
    /// Set when storing failed during this call. The local result stands.
    pub persist_error: Option<StorageError>,
}

impl FinishOutcome {
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.result_id.is_some()
    }
}

/// Outcome of handing one timer tick to an `ActiveExam`.
#[derive(Debug)]
pub enum ExamTick {
    Ignored,
    Running { remaining_secs: u32 },
    Expired(FinishOutcome),
}

//
// ─── LOOP SERVICE ──────────────────────────────────────────────────────────────
//

/// Opens exam attempts against storage.
#[derive(Clone)]
pub struct ExamLoopService {
    clock: Clock,
    templates: Arc<dyn TemplateRepository>,
    answers: Arc<dyn AnswerRepository>,
    results: Arc<dyn ResultRepository>,
    tick_period: Duration,
}

impl ExamLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        templates: Arc<dyn TemplateRepository>,
        answers: Arc<dyn AnswerRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            clock,
            templates,
            answers,
            results,
            tick_period: TICK_PERIOD,
        }
    }

    #[must_use]
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    /// Open a not-started attempt at a template.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Unavailable` if the template is missing or
    /// empty, or `SessionError::Storage` on repository failures.
    pub async fn open(&self, template_id: TemplateId) -> Result<ActiveExam, SessionError> {
        let template = SessionQueries::load_template(self.templates.as_ref(), template_id).await?;
        let questions = SessionQueries::question_order(&template);
        let session = ExamSession::new(
            template.id(),
            questions,
            template.time_limit_secs(),
            template.passing_score(),
        );
        info!(
            template_id = %template.id(),
            session_id = %session.id(),
            questions = session.question_count(),
            time_limit_secs = session.time_limit_secs(),
            "exam opened"
        );

        let (ticks_tx, ticks_rx) = mpsc::channel(1);
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        Ok(ActiveExam {
            clock: self.clock,
            title: template.title().to_string(),
            session,
            timer: SessionTimer::new(),
            tick_period: self.tick_period,
            ticks_tx,
            ticks_rx,
            sync: AnswerSync::new(self.clock, Arc::clone(&self.answers), notices_tx),
            notices_rx,
            results: Arc::clone(&self.results),
            result_id: None,
        })
    }
}

//
// ─── ACTIVE EXAM ───────────────────────────────────────────────────────────────
//

/// Per-attempt context: the session plus the timer, mirroring, and result
/// storage that carry out its effects.
///
/// Owned by a single task. Dropping it aborts the timer and any pending
/// mirror writes. Methods that start the timer or mirror answers must run
/// inside a Tokio runtime.
pub struct ActiveExam {
    clock: Clock,
    title: String,
    session: ExamSession,
    timer: SessionTimer,
    tick_period: Duration,
    ticks_tx: mpsc::Sender<TimerTick>,
    ticks_rx: mpsc::Receiver<TimerTick>,
    sync: AnswerSync,
    notices_rx: mpsc::UnboundedReceiver<SessionNotice>,
    results: Arc<dyn ResultRepository>,
    result_id: Option<ResultId>,
}

impl ActiveExam {
    #[must_use]
    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn result_id(&self) -> Option<ResultId> {
        self.result_id
    }

    #[must_use]
    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Mirror writes that have not finished yet.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.sync.pending()
    }

    /// # Errors
    ///
    /// Returns `SessionError` if the session cannot start.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let effects = self.session.start(self.clock.now())?;
        info!(
            session_id = %self.session.id(),
            generation = self.session.timer_generation(),
            "exam started"
        );
        self.apply(effects);
        Ok(())
    }

    /// Wait for the next timer tick.
    ///
    /// Stays pending while no timer is running.
    pub async fn next_tick(&mut self) -> Option<TimerTick> {
        self.ticks_rx.recv().await
    }

    /// Apply a tick received from `next_tick`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if finishing on expiry fails.
    pub async fn on_tick(&mut self, tick: TimerTick) -> Result<ExamTick, SessionError> {
        match self.session.tick(tick.generation, self.clock.now())? {
            SessionTick::Ignored => {
                debug!(generation = tick.generation, "tick ignored");
                Ok(ExamTick::Ignored)
            }
            SessionTick::Running { remaining_secs } => {
                debug!(generation = tick.generation, remaining_secs, "tick");
                Ok(ExamTick::Running { remaining_secs })
            }
            SessionTick::Expired(step) => {
                info!(session_id = %self.session.id(), "exam time expired");
                Ok(ExamTick::Expired(self.complete(step).await))
            }
        }
    }

    /// Finish the attempt and store its result.
    ///
    /// Finishing again returns the same result without storing it twice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session has not started. Storage
    /// failures are reported in `FinishOutcome::persist_error` instead.
    pub async fn finish(&mut self, reason: FinishReason) -> Result<FinishOutcome, SessionError> {
        let step = self.session.finish(self.clock.now(), reason)?;
        if !step.effects.is_empty() {
            info!(
                session_id = %self.session.id(),
                reason = reason.as_str(),
                "exam finished"
            );
        }
        Ok(self.complete(step).await)
    }

    /// Store the completed result again after a failed attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotCompleted` before the session completes, or
    /// `SessionError::Storage` if storing fails again.
    pub async fn retry_persist(&mut self) -> Result<ResultId, SessionError> {
        if let Some(id) = self.result_id {
            return Ok(id);
        }
        let result = self
            .session
            .result()
            .cloned()
            .ok_or(SessionError::NotCompleted)?;
        Ok(self.persist(&result).await?)
    }

    /// Start over under a new session id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is completed.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        let previous = self.session.id();
        self.session.restart()?;
        self.timer.stop();
        self.result_id = None;
        info!(
            previous_session_id = %previous,
            session_id = %self.session.id(),
            "exam restarted"
        );
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session.
    pub fn go_to(&mut self, index: usize) -> Result<(), SessionError> {
        let effects = self.session.go_to(index, self.clock.now())?;
        self.apply(effects);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session.
    pub fn next(&mut self) -> Result<(), SessionError> {
        let effects = self.session.next(self.clock.now())?;
        self.apply(effects);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active session.
    pub fn previous(&mut self) -> Result<(), SessionError> {
        let effects = self.session.previous(self.clock.now())?;
        self.apply(effects);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError` outside an active session or for a bad index.
    pub fn toggle_flag(&mut self, index: usize) -> Result<(), SessionError> {
        let effects = self.session.toggle_flag(index)?;
        self.apply(effects);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError` outside an active session or for a bad index
    /// or option.
    pub fn set_answer(&mut self, index: usize, option: usize) -> Result<(), SessionError> {
        let effects = self.session.set_answer(index, option, self.clock.now())?;
        self.apply(effects);
        Ok(())
    }

    /// Answer the question currently on screen.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` outside an active session or for a bad option.
    pub fn answer_current(&mut self, option: usize) -> Result<(), SessionError> {
        self.set_answer(self.session.current_index(), option)
    }

    /// # Errors
    ///
    /// Returns `SessionError` outside an active session or for a bad index.
    pub fn clear_answer(&mut self, index: usize) -> Result<(), SessionError> {
        let effects = self.session.clear_answer(index, self.clock.now())?;
        self.apply(effects);
        Ok(())
    }

    /// Drain notices raised since the last call.
    pub fn notices(&mut self) -> Vec<SessionNotice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.notices_rx.try_recv() {
            out.push(notice);
        }
        out
    }

    /// Wait until every mirror write issued so far has finished.
    pub async fn settle(&mut self) {
        self.sync.settle().await;
    }

    //
    // ─── EFFECTS ───────────────────────────────────────────────────────────────
    //

    fn apply(&mut self, effects: Vec<SessionEffect>) -> Option<CompletedResult> {
        let mut to_persist = None;
        for effect in effects {
            match effect {
                SessionEffect::StartTimer {
                    generation,
                    seconds,
                } => {
                    debug!(generation, seconds, "starting timer");
                    self.timer
                        .start(generation, self.tick_period, self.ticks_tx.clone());
                }
                SessionEffect::StopTimer { generation } => {
                    debug!(generation, "stopping timer");
                    self.timer.stop();
                }
                SessionEffect::SyncAnswer(snapshot) => self.sync.mirror(snapshot),
                SessionEffect::PersistResult(result) => to_persist = Some(result),
            }
        }
        to_persist
    }

    async fn complete(&mut self, step: FinishStep) -> FinishOutcome {
        let persist_error = match self.apply(step.effects) {
            Some(result) => self.persist(&result).await.err(),
            None => None,
        };
        FinishOutcome {
            result: step.result,
            result_id: self.result_id,
            persist_error,
        }
    }

    async fn persist(&mut self, result: &CompletedResult) -> Result<ResultId, StorageError> {
        match self.results.append_result(result).await {
            Ok(id) => {
                info!(
                    result_id = id,
                    session_id = %result.session_id(),
                    score_percent = result.score_percent(),
                    passed = result.passed(),
                    "result stored"
                );
                self.result_id = Some(id);
                Ok(id)
            }
            Err(err) => {
                warn!(
                    session_id = %result.session_id(),
                    error = %err,
                    "storing result failed"
                );
                Err(err)
            }
        }
    }
}
