use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;

use super::domain::Question;
use super::evaluation::CollaboratorError;

/// Produces the question set for a new attempt.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, topic: &str, count: u32) -> Result<Vec<Question>, CollaboratorError>;
}

const PROMPTS: &[&str] = &[
    "Which of the following best describes {topic}?",
    "Which scenario is a common use case for {topic}?",
    "Which statement about {topic} is most accurate?",
    "What is a key benefit of using {topic}?",
    "Which practice aligns with good use of {topic}?",
    "Which pitfall should be avoided when working with {topic}?",
    "Which component is most closely associated with {topic}?",
    "Which metric is most relevant when evaluating {topic}?",
];

const STRENGTHS: &[&str] = &[
    "Improved efficiency through automation",
    "Better scalability under variable load",
    "Faster prototyping and iteration",
    "Higher developer productivity",
    "More consistent outcomes at scale",
    "Validating behavior against real-world test sets",
    "Versioning changes and tracking metrics",
];

const DISTRACTORS: &[&str] = &[
    "Guaranteed zero maintenance after launch",
    "Skipping tests without any loss in quality",
    "Removing every runtime dependency automatically",
    "Fixed latency regardless of workload",
    "Replacing monitoring with occasional spot checks",
    "Shipping changes without version control",
];

/// Offline question source built from prompt templates and statement pools.
///
/// Each question gets four options rendered the same way, so option text carries no hint
/// of which one is correct.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateQuestionBank;

impl TemplateQuestionBank {
    pub fn build<R: Rng + ?Sized>(&self, topic: &str, count: u32, rng: &mut R) -> Vec<Question> {
        (0..count)
            .map(|index| {
                let prompt = PROMPTS.choose(rng).copied().unwrap_or(PROMPTS[0]);
                let strength = STRENGTHS.choose(rng).copied().unwrap_or(STRENGTHS[0]);

                let mut statements: Vec<&str> =
                    DISTRACTORS.choose_multiple(rng, 3).copied().collect();
                statements.push(strength);
                statements.shuffle(rng);
                let correct_index = statements
                    .iter()
                    .position(|statement| *statement == strength)
                    .unwrap_or_default();

                Question {
                    id: format!("q{}", index + 1),
                    text: prompt.replace("{topic}", topic),
                    options: statements
                        .into_iter()
                        .map(|statement| render_option(statement, topic))
                        .collect(),
                    correct_index,
                }
            })
            .collect()
    }
}

fn render_option(statement: &str, topic: &str) -> String {
    format!("{statement} when working with {topic}")
}

#[async_trait]
impl QuestionGenerator for TemplateQuestionBank {
    async fn generate(&self, topic: &str, count: u32) -> Result<Vec<Question>, CollaboratorError> {
        let mut rng = rand::thread_rng();
        Ok(self.build(topic, count, &mut rng))
    }
}

/// Reject generator output that would break the answer/question invariants.
pub fn check_question_set(questions: &[Question], expected: u32) -> Result<(), CollaboratorError> {
    if questions.len() != expected as usize {
        return Err(CollaboratorError::Malformed(format!(
            "expected {expected} questions, generator returned {}",
            questions.len()
        )));
    }
    if let Some(question) = questions
        .iter()
        .find(|question| question.options.len() < 2 || question.correct_index >= question.options.len())
    {
        return Err(CollaboratorError::Malformed(format!(
            "question {} has no valid correct option",
            question.id
        )));
    }
    Ok(())
}
