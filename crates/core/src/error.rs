use thiserror::Error;

use crate::model::{LedgerError, QuestionError, ResultError, TemplateError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Result(#[from] ResultError),
}
