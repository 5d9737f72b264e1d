use serde::{Deserialize, Serialize};

use crate::config::EnrollmentConfig;

/// Thresholds used by the grader and the admission rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub pass_threshold_pct: u8,
    pub selection_threshold: u8,
    pub baseline_video_score: u8,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            pass_threshold_pct: 70,
            selection_threshold: 70,
            baseline_video_score: 60,
        }
    }
}

impl From<&EnrollmentConfig> for EvaluationConfig {
    fn from(config: &EnrollmentConfig) -> Self {
        Self {
            pass_threshold_pct: config.pass_threshold_pct,
            selection_threshold: config.selection_threshold,
            baseline_video_score: config.baseline_video_score,
        }
    }
}

impl EvaluationConfig {
    /// Correct answers needed to pass, never less than one.
    pub fn required_correct(&self, total: u32) -> u32 {
        let pct = u64::from(self.pass_threshold_pct.min(100));
        let required = (u64::from(total) * pct) / 100;
        (required as u32).max(1)
    }

    pub fn is_selected(&self, passed_quiz: bool, video_score: u8) -> bool {
        passed_quiz && video_score >= self.selection_threshold
    }
}
