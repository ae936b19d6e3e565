mod progress;
mod queries;
mod service;
mod sync;
mod timer;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use service::{
    AnswerSnapshot, ExamSession, FinishStep, SessionEffect, SessionStatus, SessionTick,
};
pub use sync::SessionNotice;
pub use timer::{SessionTimer, TICK_PERIOD, TimerTick};
pub use view::{ResultListItem, ResultService};
pub use workflow::{ActiveExam, ExamLoopService, ExamTick, FinishOutcome};
