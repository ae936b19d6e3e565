#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod sessions;
pub mod template_service;

pub use studify_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use error::{AppServicesError, SessionError, TemplateServiceError};
pub use template_service::TemplateService;

pub use sessions::{
    ActiveExam, ExamLoopService, ExamSession, ExamTick, FinishOutcome, ResultListItem,
    ResultService, SessionEffect, SessionNotice, SessionProgress, SessionStatus,
};
