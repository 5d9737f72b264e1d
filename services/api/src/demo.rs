use crate::infra::{ConfiguredDispatcher, InMemoryAttemptRepository};
use clap::Args;
use skill_bridge::config::EnrollmentConfig;
use skill_bridge::error::AppError;
use skill_bridge::workflows::enrollment::{
    AttemptRepository, EnrollmentError, EnrollmentRequest, EnrollmentService, Question,
    VideoArtifact,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Quiz topic for the demo candidate
    #[arg(long, default_value = "Rust")]
    pub(crate) topic: String,
    /// Candidate email recorded on the attempt (no mail is sent)
    #[arg(long, default_value = "candidate@example.com")]
    pub(crate) email: String,
    /// Number of questions to generate (1-30)
    #[arg(long, default_value_t = 5)]
    pub(crate) questions: u32,
    /// How many questions the candidate answers correctly (defaults to all)
    #[arg(long)]
    pub(crate) correct: Option<u32>,
    /// YouTube link submitted as the skills video
    #[arg(long, default_value = "https://youtu.be/dQw4w9WgXcQ")]
    pub(crate) video_link: String,
    /// Minimum video score for selection
    #[arg(long, default_value_t = 60)]
    pub(crate) selection_threshold: u8,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            topic: "Rust".to_string(),
            email: "candidate@example.com".to_string(),
            questions: 5,
            correct: None,
            video_link: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            selection_threshold: 60,
        }
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        topic,
        email,
        questions,
        correct,
        video_link,
        selection_threshold,
    } = args;

    let repository = Arc::new(InMemoryAttemptRepository::default());
    let service = EnrollmentService::new(
        repository.clone(),
        Arc::new(ConfiguredDispatcher::from_config(None)),
        EnrollmentConfig {
            selection_threshold,
            ..EnrollmentConfig::default()
        },
    );

    println!("Skill Bridge enrollment demo");
    let receipt = service
        .create_attempt(EnrollmentRequest {
            email,
            topic,
            num_questions: questions,
        })
        .await?;
    println!("- Quiz created: {}", receipt.quiz_id);
    println!("  Link: {}", receipt.quiz_url);
    println!(
        "  Email queued: {}",
        if receipt.email_queued { "yes" } else { "no (SMTP disabled)" }
    );

    let quiz = service.fetch_questions(&receipt.quiz_id).await?;
    if let Some(remaining) = quiz.remaining_seconds {
        println!("- Quiz opened with {remaining}s on the clock");
    }

    // The scripted candidate answers from the stored key; the quiz view carries none.
    let key = repository
        .fetch(&receipt.quiz_id)
        .map_err(EnrollmentError::from)?
        .map(|attempt| attempt.questions)
        .unwrap_or_default();
    let correct = correct.unwrap_or(questions) as usize;
    let answers: Vec<i32> = key
        .iter()
        .enumerate()
        .map(|(index, question)| pick_answer(question, index < correct))
        .collect();
    for (question, answer) in quiz.questions.iter().zip(&answers) {
        let choice = usize::try_from(*answer)
            .ok()
            .and_then(|index| question.options.get(index))
            .map(String::as_str)
            .unwrap_or("(skipped)");
        println!("  {} {}\n    -> {}", question.id, question.text, choice);
    }

    let submission = service.submit_answers(&receipt.quiz_id, answers).await?;
    let result = submission.result;
    println!(
        "- Score: {}/{} ({})",
        result.score,
        result.total,
        if result.passed { "passed" } else { "not passed" }
    );
    for suggestion in &result.suggestions {
        println!("  * {suggestion}");
    }

    if !result.passed {
        println!("- Stage: {}; the candidate may re-enroll with a new quiz", submission.status);
        return Ok(());
    }

    let video = service
        .upload_video(&receipt.quiz_id, VideoArtifact::Link { url: video_link })
        .await?;
    println!("- Video accepted; stage {}", video.status);

    let decision = service.final_decision(&receipt.quiz_id)?;
    println!(
        "- Decision: {} (video score {})",
        if decision.selected {
            "selected"
        } else {
            "not selected"
        },
        decision.video_score
    );
    println!("  Feedback: {}", decision.feedback);

    let status = service.attempt_status(&receipt.quiz_id)?;
    let path: Vec<String> = status
        .history
        .iter()
        .map(|step| step.status.to_string())
        .collect();
    println!("- Stage history: {}", path.join(" -> "));

    Ok(())
}

/// Answer right from the key, or take the next option round to miss on purpose.
fn pick_answer(question: &Question, answer_correctly: bool) -> i32 {
    let options = question.options.len().max(1);
    let index = if answer_correctly {
        question.correct_index
    } else {
        (question.correct_index + 1) % options
    };
    index as i32
}
