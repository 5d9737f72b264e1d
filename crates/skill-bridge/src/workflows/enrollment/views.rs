//! Response shapes handed back to callers. None of them carry answers or correct indices.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    AttemptId, AttemptStatus, DispatchOutcome, EnrollmentAttempt, QuestionView, StageTransition,
};

/// Returned by create: enough to reach the quiz, nothing about its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentReceipt {
    pub quiz_id: AttemptId,
    pub quiz_url: String,
    pub email_queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
}

/// Why a dispatch did not deliver. Reported as data so callers can tell
/// "not configured" from "transport hiccup".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchError {
    NotConfigured,
    Failed(String),
}

impl DispatchError {
    pub fn from_outcome(outcome: &DispatchOutcome) -> Option<Self> {
        match outcome {
            DispatchOutcome::Delivered => None,
            DispatchOutcome::NotConfigured => Some(DispatchError::NotConfigured),
            DispatchOutcome::Failed(reason) => Some(DispatchError::Failed(reason.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResendReceipt {
    pub ok: bool,
    pub email_queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_error: Option<DispatchError>,
}

impl ResendReceipt {
    pub fn from_outcome(outcome: &DispatchOutcome) -> Self {
        Self {
            ok: outcome.delivered(),
            email_queued: outcome.attempted(),
            dispatch_error: DispatchError::from_outcome(outcome),
        }
    }
}

/// Questions served to the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizView {
    pub quiz_id: AttemptId,
    pub topic: String,
    pub questions: Vec<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreView {
    pub quiz_id: AttemptId,
    pub score: u32,
    pub total: u32,
    pub passed: bool,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub accepted: bool,
    pub status: AttemptStatus,
    pub result: ScoreView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoReceipt {
    pub accepted: bool,
    pub status: AttemptStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionView {
    pub quiz_id: AttemptId,
    pub selected: bool,
    pub passed_quiz: bool,
    pub feedback: String,
    pub video_score: u8,
}

/// Stage summary a client uses to decide which page to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub quiz_id: AttemptId,
    pub status: AttemptStatus,
    pub email_queued: bool,
    pub history: Vec<StageTransition>,
}

impl StatusView {
    pub fn from_attempt(attempt: &EnrollmentAttempt) -> Self {
        Self {
            quiz_id: attempt.id.clone(),
            status: attempt.status,
            email_queued: attempt.email_queued,
            history: attempt.history.clone(),
        }
    }
}
