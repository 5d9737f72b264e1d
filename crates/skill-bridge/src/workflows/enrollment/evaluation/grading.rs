use async_trait::async_trait;

use super::config::EvaluationConfig;
use super::{CollaboratorError, ScoringEngine};
use crate::workflows::enrollment::domain::{Question, ScoreSummary};

/// Exact-match grader: one point per answer equal to the question's correct index.
#[derive(Debug, Clone)]
pub struct ThresholdGrader {
    config: EvaluationConfig,
}

impl ThresholdGrader {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    pub fn grade(&self, questions: &[Question], answers: &[i32]) -> ScoreSummary {
        let total = questions.len() as u32;
        let score = questions
            .iter()
            .zip(answers)
            .filter(|(question, answer)| question.is_correct(**answer))
            .count() as u32;
        let passed = total > 0 && score >= self.config.required_correct(total);

        let mut suggestions = Vec::new();
        if passed {
            suggestions.push(
                "Great work! Prepare a concise project walkthrough for your skills video."
                    .to_string(),
            );
        } else {
            suggestions.push(
                "Review the foundational concepts and practise with targeted exercises before re-enrolling."
                    .to_string(),
            );
        }
        let missed = total - score;
        if missed > 0 {
            suggestions.push(format!(
                "Revisit the {missed} question{} you missed out of {total}.",
                if missed == 1 { "" } else { "s" }
            ));
        }

        ScoreSummary {
            score,
            total,
            passed,
            suggestions,
        }
    }
}

#[async_trait]
impl ScoringEngine for ThresholdGrader {
    async fn score(
        &self,
        questions: &[Question],
        answers: &[i32],
    ) -> Result<ScoreSummary, CollaboratorError> {
        if questions.len() != answers.len() {
            return Err(CollaboratorError::Malformed(format!(
                "{} answers for {} questions",
                answers.len(),
                questions.len()
            )));
        }
        Ok(self.grade(questions, answers))
    }
}
