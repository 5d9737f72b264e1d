use async_trait::async_trait;

use super::config::EvaluationConfig;
use super::{CollaboratorError, DecisionEngine, ReviewOutcome, VideoReview};

/// Stand-in reviewer that scores every video at the configured baseline.
#[derive(Debug, Clone)]
pub struct RubricReviewer {
    baseline: u8,
}

impl RubricReviewer {
    pub fn new(config: &EvaluationConfig) -> Self {
        Self {
            baseline: config.baseline_video_score.min(100),
        }
    }
}

#[async_trait]
impl DecisionEngine for RubricReviewer {
    async fn review(&self, review: VideoReview) -> Result<ReviewOutcome, CollaboratorError> {
        let feedback = format!(
            "Solid grasp of {} fundamentals; deepen the walkthrough with real-world integration examples.",
            review.topic
        );
        Ok(ReviewOutcome {
            video_score: self.baseline,
            feedback,
        })
    }
}
