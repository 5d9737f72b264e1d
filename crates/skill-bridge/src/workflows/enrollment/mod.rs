//! Candidate enrollment funnel: quiz intake, scoring, video review, and admission decision.
//!
//! [`EnrollmentService`] owns the lifecycle; the collaborator traits re-exported here are the
//! seams where question generation, scoring, video review, storage, and email plug in.

pub mod domain;
pub mod evaluation;
pub mod intake;
pub mod notification;
pub mod questions;
pub mod repository;
pub mod router;
pub mod service;
pub mod video;
pub mod views;

#[cfg(test)]
mod tests;

pub use domain::{
    AttemptId, AttemptStatus, DispatchOutcome, DispatchRecord, EnrollmentAttempt, FinalDecision,
    InvalidTransition, Question, QuestionView, ScoreSummary, StageTransition, VideoKind, VideoRef,
    UNANSWERED,
};
pub use evaluation::{
    CollaboratorError, DecisionEngine, EvaluationConfig, ReviewOutcome, RubricReviewer,
    ScoringEngine, ThresholdGrader, VideoReview,
};
pub use intake::{EnrollmentRequest, IntakeGuard, IntakeRejection, ValidatedEnrollment};
pub use notification::{
    DisabledDispatcher, NotificationDispatcher, QuizNotification, SmtpDispatcher, SmtpSetupError,
};
pub use questions::{QuestionGenerator, TemplateQuestionBank};
pub use repository::{AttemptRepository, RepositoryError};
pub use router::enrollment_router;
pub use service::{Clock, EnrollmentError, EnrollmentService, SystemClock};
pub use video::{LocalVideoStore, VideoArtifact, VideoStore, VideoStoreError, VideoUpload};
pub use views::{
    DecisionView, DispatchError, EnrollmentReceipt, QuizView, ResendReceipt, ScoreView,
    StatusView, SubmissionReceipt, VideoReceipt,
};
