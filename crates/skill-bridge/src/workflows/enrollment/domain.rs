use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel stored for a question the candidate left unanswered.
pub const UNANSWERED: i32 = -1;

/// Opaque quiz identifier. Whoever holds it can act as the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub String);

impl AttemptId {
    pub fn generate() -> Self {
        Self(format!("quiz_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Multiple-choice question as produced by the question generator.
///
/// `correct_index` stays inside the service; candidates only ever see [`QuestionView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id.clone(),
            text: self.text.clone(),
            options: self.options.clone(),
        }
    }

    pub fn accepts(&self, answer: i32) -> bool {
        answer == UNANSWERED || (answer >= 0 && (answer as usize) < self.options.len())
    }

    pub fn is_correct(&self, answer: i32) -> bool {
        answer >= 0 && answer as usize == self.correct_index
    }
}

/// Candidate-facing projection of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
}

/// Lifecycle stage of an enrollment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Created,
    EmailSent,
    EmailFailed,
    InProgress,
    Submitted,
    Scored,
    VideoPending,
    VideoSubmitted,
    Finalized,
    Retry,
}

impl AttemptStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AttemptStatus::Created => "created",
            AttemptStatus::EmailSent => "email_sent",
            AttemptStatus::EmailFailed => "email_failed",
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Scored => "scored",
            AttemptStatus::VideoPending => "video_pending",
            AttemptStatus::VideoSubmitted => "video_submitted",
            AttemptStatus::Finalized => "finalized",
            AttemptStatus::Retry => "retry",
        }
    }

    /// Edges of the lifecycle graph. `Scored` exits depend on the pass flag, which the
    /// caller checks separately.
    pub const fn can_transition_to(self, next: AttemptStatus) -> bool {
        use AttemptStatus as S;
        matches!(
            (self, next),
            (S::Created, S::EmailSent)
                | (S::Created, S::EmailFailed)
                | (S::Created, S::InProgress)
                | (S::EmailSent, S::InProgress)
                | (S::EmailFailed, S::InProgress)
                | (S::InProgress, S::Submitted)
                | (S::Submitted, S::Scored)
                | (S::Scored, S::VideoPending)
                | (S::Scored, S::Retry)
                | (S::VideoPending, S::VideoSubmitted)
                | (S::VideoSubmitted, S::Finalized)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, AttemptStatus::Finalized | AttemptStatus::Retry)
    }

    /// The quiz can still be opened (questions served) in these stages.
    pub const fn is_open(self) -> bool {
        matches!(
            self,
            AttemptStatus::Created
                | AttemptStatus::EmailSent
                | AttemptStatus::EmailFailed
                | AttemptStatus::InProgress
        )
    }

    /// Answers have been accepted; score fields may or may not be populated yet.
    pub const fn is_post_submission(self) -> bool {
        !self.is_open()
    }

    pub const fn has_score(self) -> bool {
        matches!(
            self,
            AttemptStatus::Scored
                | AttemptStatus::VideoPending
                | AttemptStatus::VideoSubmitted
                | AttemptStatus::Finalized
                | AttemptStatus::Retry
        )
    }

    pub const fn has_video(self) -> bool {
        matches!(
            self,
            AttemptStatus::VideoSubmitted | AttemptStatus::Finalized
        )
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Entry in the append-only stage log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub status: AttemptStatus,
    pub at: DateTime<Utc>,
}

/// Scoring output for a submitted quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub score: u32,
    pub total: u32,
    pub passed: bool,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoKind {
    Upload,
    Link,
}

/// Where the candidate's skills video ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub kind: VideoKind,
    pub location: String,
    pub received_at: DateTime<Utc>,
}

/// Final admission judgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalDecision {
    pub selected: bool,
    pub passed_quiz: bool,
    pub feedback: String,
    pub video_score: u8,
}

/// Result of one notification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Delivered,
    NotConfigured,
    Failed(String),
}

impl DispatchOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered)
    }

    /// A dispatch was actually attempted, whatever the transport said.
    pub fn attempted(&self) -> bool {
        !matches!(self, DispatchOutcome::NotConfigured)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub attempted_at: DateTime<Utc>,
    pub outcome: DispatchOutcome,
}

/// Raised when code tries to walk an edge that is not in the lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move attempt from {from} to {to}")]
pub struct InvalidTransition {
    pub from: AttemptStatus,
    pub to: AttemptStatus,
}

/// One candidate's end-to-end enrollment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentAttempt {
    pub id: AttemptId,
    pub email: String,
    pub topic: String,
    pub num_questions: u32,
    pub status: AttemptStatus,
    pub questions: Vec<Question>,
    pub answers: Vec<i32>,
    pub score: Option<ScoreSummary>,
    pub video: Option<VideoRef>,
    pub decision: Option<FinalDecision>,
    pub email_queued: bool,
    pub notifications: Vec<DispatchRecord>,
    pub history: Vec<StageTransition>,
    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub revision: u64,
}

impl EnrollmentAttempt {
    pub fn new(
        id: AttemptId,
        email: String,
        topic: String,
        questions: Vec<Question>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let answers = vec![UNANSWERED; questions.len()];
        Self {
            id,
            email,
            topic,
            num_questions: questions.len() as u32,
            status: AttemptStatus::Created,
            questions,
            answers,
            score: None,
            video: None,
            decision: None,
            email_queued: false,
            notifications: Vec::new(),
            history: vec![StageTransition {
                status: AttemptStatus::Created,
                at: created_at,
            }],
            created_at,
            opened_at: None,
            submitted_at: None,
            revision: 0,
        }
    }

    /// Move to `next`, recording the stage in the history log.
    ///
    /// Leaving `Scored` must follow the pass flag, and video stages need `video` set first.
    pub fn advance(
        &mut self,
        next: AttemptStatus,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        let rejected = InvalidTransition {
            from: self.status,
            to: next,
        };
        if self.status.is_terminal() || !self.status.can_transition_to(next) {
            return Err(rejected);
        }
        if self.status == AttemptStatus::Scored {
            let allowed = match next {
                AttemptStatus::VideoPending => self.passed_quiz(),
                AttemptStatus::Retry => self.score.is_some() && !self.passed_quiz(),
                _ => false,
            };
            if !allowed {
                return Err(rejected);
            }
        }
        if next.has_video() && self.video.is_none() {
            return Err(rejected);
        }

        self.status = next;
        self.history.push(StageTransition { status: next, at });
        Ok(())
    }

    pub fn record_dispatch(&mut self, outcome: DispatchOutcome, at: DateTime<Utc>) {
        self.email_queued = self.email_queued || outcome.attempted();
        self.notifications.push(DispatchRecord {
            attempted_at: at,
            outcome,
        });
    }

    pub fn email_matches(&self, candidate: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(candidate.trim())
    }

    pub fn passed_quiz(&self) -> bool {
        self.score.as_ref().is_some_and(|score| score.passed)
    }

    /// Deadline for submitting answers, if the quiz has been opened and a window applies.
    pub fn deadline(&self, window: Option<chrono::Duration>) -> Option<DateTime<Utc>> {
        match (self.opened_at, window) {
            (Some(opened_at), Some(window)) => opened_at.checked_add_signed(window),
            _ => None,
        }
    }
}
