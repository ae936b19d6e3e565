use std::sync::Arc;

use storage::repository::{AnswerRepository, AnswerSyncRecord};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::service::AnswerSnapshot;
use crate::Clock;

/// Non-blocking problems reported back to the session owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// An answer record could not be mirrored. Local state is unaffected.
    SyncFailed {
        question_index: usize,
        error: String,
    },
}

/// Fire-and-forget mirroring of answer records.
///
/// Each snapshot is written by its own task with no ordering guarantee;
/// storage keeps the last write per `(session, question)`. Pending writes
/// are aborted when this is dropped, so callers that care should `settle`
/// first.
pub(crate) struct AnswerSync {
    clock: Clock,
    answers: Arc<dyn AnswerRepository>,
    notices: mpsc::UnboundedSender<SessionNotice>,
    pending: JoinSet<()>,
}

impl AnswerSync {
    pub(crate) fn new(
        clock: Clock,
        answers: Arc<dyn AnswerRepository>,
        notices: mpsc::UnboundedSender<SessionNotice>,
    ) -> Self {
        Self {
            clock,
            answers,
            notices,
            pending: JoinSet::new(),
        }
    }

    pub(crate) fn mirror(&mut self, snapshot: AnswerSnapshot) {
        while self.pending.try_join_next().is_some() {}

        let record = AnswerSyncRecord {
            session_id: snapshot.session_id,
            template_id: snapshot.template_id,
            question_index: u32::try_from(snapshot.question_index).unwrap_or(u32::MAX),
            question_id: snapshot.question_id,
            record: snapshot.record,
            synced_at: self.clock.now(),
        };
        let answers = Arc::clone(&self.answers);
        let notices = self.notices.clone();

        self.pending.spawn(async move {
            match answers.upsert_answer(&record).await {
                Ok(()) => debug!(
                    session_id = %record.session_id,
                    question_index = record.question_index,
                    "answer mirrored"
                ),
                Err(err) => {
                    warn!(
                        session_id = %record.session_id,
                        question_index = record.question_index,
                        error = %err,
                        "answer mirroring failed"
                    );
                    let _ = notices.send(SessionNotice::SyncFailed {
                        question_index: snapshot.question_index,
                        error: err.to_string(),
                    });
                }
            }
        });
    }

    /// Wait for every pending write to finish.
    pub(crate) async fn settle(&mut self) {
        while self.pending.join_next().await.is_some() {}
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }
}
