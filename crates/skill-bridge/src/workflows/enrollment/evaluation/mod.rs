mod config;
mod grading;
mod review;

pub use config::EvaluationConfig;
pub use grading::ThresholdGrader;
pub use review::RubricReviewer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{AttemptId, Question, ScoreSummary, VideoRef};

/// Computes the quiz score, pass flag, and improvement hints.
#[async_trait]
pub trait ScoringEngine: Send + Sync {
    async fn score(
        &self,
        questions: &[Question],
        answers: &[i32],
    ) -> Result<ScoreSummary, CollaboratorError>;
}

/// Reviews the skills video and produces the admission inputs.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    async fn review(&self, review: VideoReview) -> Result<ReviewOutcome, CollaboratorError>;
}

/// Everything the decision engine sees about an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReview {
    pub quiz_id: AttemptId,
    pub topic: String,
    pub video: VideoRef,
    pub prior_score: ScoreSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    /// 0..=100; values outside the range are clamped by the controller.
    pub video_score: u8,
    pub feedback: String,
}

/// Failure talking to a scoring, generation, or decision collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator timed out")]
    Timeout,
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator returned malformed output: {0}")]
    Malformed(String),
}
