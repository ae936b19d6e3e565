mod ids;
mod ledger;
mod navigation;
mod question;
mod result;
mod template;

pub use ids::{ParseIdError, QuestionId, SessionId, TemplateId};
pub use ledger::{AnswerLedger, AnswerRecord, LedgerError};
pub use navigation::{NavigationStep, Navigator, TimeFlush};
pub use question::{MIN_OPTIONS, Question, QuestionDraft, QuestionError, ValidatedQuestion};
pub use result::{CompletedResult, FinishReason, ResultError, SubjectScore};
pub use template::{
    DEFAULT_PASSING_SCORE, ExamTemplate, TemplateDraft, TemplateError, ValidatedTemplate,
};
