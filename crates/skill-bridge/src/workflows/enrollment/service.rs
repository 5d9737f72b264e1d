use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use super::domain::{
    AttemptId, AttemptStatus, DispatchOutcome, EnrollmentAttempt, FinalDecision, ScoreSummary,
    VideoKind, VideoRef,
};
use super::evaluation::{
    CollaboratorError, DecisionEngine, EvaluationConfig, RubricReviewer, ScoringEngine,
    ThresholdGrader, VideoReview,
};
use super::intake::{EnrollmentRequest, IntakeGuard, IntakeRejection};
use super::notification::{NotificationDispatcher, QuizNotification};
use super::questions::{check_question_set, QuestionGenerator, TemplateQuestionBank};
use super::repository::{AttemptRepository, RepositoryError};
use super::video::{youtube_video_id, LocalVideoStore, VideoArtifact, VideoStore};
use super::views::{
    DecisionView, EnrollmentReceipt, QuizView, ResendReceipt, ScoreView, StatusView,
    SubmissionReceipt, VideoReceipt,
};
use crate::config::EnrollmentConfig;

/// Source of "now" for stage timestamps and the quiz window.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Per-attempt write locks so at most one transition per id is in flight.
#[derive(Default)]
pub(crate) struct AttemptLocks {
    table: Mutex<HashMap<AttemptId, Arc<tokio::sync::Mutex<()>>>>,
}

impl AttemptLocks {
    pub(crate) async fn acquire(&self, id: &AttemptId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().expect("attempt lock table poisoned");
            // Entries only the table still references are idle.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Enrollment lifecycle controller: owns the state machine and sequences the collaborators.
pub struct EnrollmentService<R, N> {
    guard: IntakeGuard,
    repository: Arc<R>,
    notifier: Arc<N>,
    generator: Arc<dyn QuestionGenerator>,
    scorer: Arc<dyn ScoringEngine>,
    reviewer: Arc<dyn DecisionEngine>,
    videos: Arc<dyn VideoStore>,
    clock: Arc<dyn Clock>,
    locks: AttemptLocks,
    config: EnrollmentConfig,
    evaluation: EvaluationConfig,
}

impl<R, N> EnrollmentService<R, N>
where
    R: AttemptRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    /// Build a controller with the in-process collaborators.
    pub fn new(repository: Arc<R>, notifier: Arc<N>, config: EnrollmentConfig) -> Self {
        let evaluation = EvaluationConfig::from(&config);
        Self {
            guard: IntakeGuard,
            repository,
            notifier,
            generator: Arc::new(TemplateQuestionBank),
            scorer: Arc::new(ThresholdGrader::new(evaluation.clone())),
            reviewer: Arc::new(RubricReviewer::new(&evaluation)),
            videos: Arc::new(LocalVideoStore::new(config.video_upload_dir.clone())),
            clock: Arc::new(SystemClock),
            locks: AttemptLocks::default(),
            config,
            evaluation,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn QuestionGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn ScoringEngine>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_reviewer(mut self, reviewer: Arc<dyn DecisionEngine>) -> Self {
        self.reviewer = reviewer;
        self
    }

    pub fn with_video_store(mut self, videos: Arc<dyn VideoStore>) -> Self {
        self.videos = videos;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EnrollmentConfig {
        &self.config
    }

    /// Validate the request, generate questions, persist, then try to email the link.
    pub async fn create_attempt(
        &self,
        request: EnrollmentRequest,
    ) -> Result<EnrollmentReceipt, EnrollmentError> {
        let admitted = self.guard.admit(request)?;

        let questions = self
            .bounded(
                "question generation",
                self.generator
                    .generate(&admitted.topic, admitted.num_questions),
            )
            .await?;
        check_question_set(&questions, admitted.num_questions).map_err(|source| {
            warn!(topic = %admitted.topic, error = %source, "question generator output rejected");
            EnrollmentError::CollaboratorUnavailable {
                operation: "question generation",
                source,
            }
        })?;

        let now = self.clock.now();
        let attempt = EnrollmentAttempt::new(
            AttemptId::generate(),
            admitted.email,
            admitted.topic,
            questions,
            now,
        );
        let stored = self.repository.insert(attempt)?;
        let quiz_id = stored.id.clone();
        let quiz_url = self.config.quiz_url(quiz_id.as_str());

        let outcome = self
            .dispatch(QuizNotification {
                email: stored.email.clone(),
                quiz_id: quiz_id.clone(),
                quiz_url: quiz_url.clone(),
            })
            .await;
        self.record_creation_dispatch(&quiz_id, outcome.clone()).await;

        info!(
            quiz_id = %quiz_id,
            topic = %stored.topic,
            num_questions = stored.num_questions,
            email_queued = outcome.attempted(),
            "enrollment attempt created"
        );

        Ok(EnrollmentReceipt {
            quiz_id,
            quiz_url,
            email_queued: outcome.attempted(),
            expires_in_seconds: self.config.quiz_time_limit.map(|limit| limit.as_secs()),
        })
    }

    /// Re-send the quiz link to the address on record. Never changes the stage.
    pub async fn resend_notification(
        &self,
        id: &AttemptId,
        email: &str,
    ) -> Result<ResendReceipt, EnrollmentError> {
        let attempt = self.load(id)?;
        if !attempt.email_matches(email) {
            warn!(quiz_id = %id, "resend rejected: email does not match record");
            return Err(EnrollmentError::EmailMismatch(id.clone()));
        }

        let outcome = self
            .dispatch(QuizNotification {
                email: attempt.email.clone(),
                quiz_id: id.clone(),
                quiz_url: self.config.quiz_url(id.as_str()),
            })
            .await;

        let _write = self.locks.acquire(id).await;
        let mut fresh = self.load(id)?;
        fresh.record_dispatch(outcome.clone(), self.clock.now());
        if let Err(err) = self.persist(fresh) {
            warn!(quiz_id = %id, error = %err, "failed to record resend outcome");
        }

        Ok(ResendReceipt::from_outcome(&outcome))
    }

    /// Serve the questions; the first call starts the quiz window.
    pub async fn fetch_questions(&self, id: &AttemptId) -> Result<QuizView, EnrollmentError> {
        let attempt = self.load(id)?;
        Self::ensure_servable(&attempt)?;

        let attempt = if attempt.status == AttemptStatus::InProgress {
            attempt
        } else {
            let _write = self.locks.acquire(id).await;
            let mut fresh = self.load(id)?;
            Self::ensure_servable(&fresh)?;
            if fresh.status == AttemptStatus::InProgress {
                fresh
            } else {
                let now = self.clock.now();
                fresh.opened_at = Some(now);
                advance(&mut fresh, AttemptStatus::InProgress, now)?;
                let stored = self.persist(fresh)?;
                info!(quiz_id = %id, "quiz opened");
                stored
            }
        };

        let expires_at = attempt.deadline(self.quiz_window());
        let remaining_seconds = expires_at
            .map(|deadline| (deadline - self.clock.now()).num_seconds().max(0));

        Ok(QuizView {
            quiz_id: attempt.id.clone(),
            topic: attempt.topic.clone(),
            questions: attempt.questions.iter().map(|question| question.view()).collect(),
            expires_at,
            remaining_seconds,
        })
    }

    /// Accept answers once, score them, and route to video intake or retry.
    pub async fn submit_answers(
        &self,
        id: &AttemptId,
        answers: Vec<i32>,
    ) -> Result<SubmissionReceipt, EnrollmentError> {
        let _write = self.locks.acquire(id).await;
        let mut attempt = self.load(id)?;

        match attempt.status {
            AttemptStatus::InProgress => {}
            status if status.is_post_submission() => {
                return Err(EnrollmentError::AlreadySubmitted(id.clone()));
            }
            status => {
                return Err(EnrollmentError::WrongStage {
                    id: id.clone(),
                    status,
                })
            }
        }

        if answers.len() != attempt.questions.len() {
            return Err(EnrollmentError::AnswerCountMismatch {
                expected: attempt.questions.len(),
                received: answers.len(),
            });
        }
        if let Some((index, answer)) = attempt
            .questions
            .iter()
            .zip(&answers)
            .enumerate()
            .find(|(_, (question, answer))| !question.accepts(**answer))
            .map(|(index, (_, answer))| (index, *answer))
        {
            return Err(EnrollmentError::InvalidInput(format!(
                "answer {answer} for question {} is out of range",
                index + 1
            )));
        }

        let now = self.clock.now();
        if let Some(deadline) = attempt.deadline(self.quiz_window()) {
            if now > deadline {
                warn!(quiz_id = %id, %deadline, "submission after quiz window closed");
                return Err(EnrollmentError::DeadlineExceeded {
                    id: id.clone(),
                    deadline,
                });
            }
        }

        let summary = self
            .bounded("scoring", self.scorer.score(&attempt.questions, &answers))
            .await?;
        if summary.total as usize != attempt.questions.len() || summary.score > summary.total {
            let source = CollaboratorError::Malformed(format!(
                "score {}/{} for {} questions",
                summary.score,
                summary.total,
                attempt.questions.len()
            ));
            warn!(quiz_id = %id, error = %source, "scoring output rejected");
            return Err(EnrollmentError::CollaboratorUnavailable {
                operation: "scoring",
                source,
            });
        }
        let passed = summary.passed;

        attempt.answers = answers;
        attempt.submitted_at = Some(now);
        advance(&mut attempt, AttemptStatus::Submitted, now)?;
        attempt.score = Some(summary);
        advance(&mut attempt, AttemptStatus::Scored, now)?;
        let next = if passed {
            AttemptStatus::VideoPending
        } else {
            AttemptStatus::Retry
        };
        advance(&mut attempt, next, now)?;

        let stored = self.persist(attempt)?;
        let result = score_view(&stored)?;
        info!(
            quiz_id = %id,
            score = result.score,
            total = result.total,
            passed,
            status = %stored.status,
            "quiz submission scored"
        );

        Ok(SubmissionReceipt {
            accepted: true,
            status: stored.status,
            result,
        })
    }

    pub fn score_result(&self, id: &AttemptId) -> Result<ScoreView, EnrollmentError> {
        let attempt = self.load(id)?;
        score_view(&attempt)
    }

    /// Take the skills video, have it reviewed, and finalize the admission decision.
    pub async fn upload_video(
        &self,
        id: &AttemptId,
        artifact: VideoArtifact,
    ) -> Result<VideoReceipt, EnrollmentError> {
        let _write = self.locks.acquire(id).await;
        let attempt = self.load(id)?;

        match attempt.status {
            AttemptStatus::VideoPending => {}
            AttemptStatus::Retry => return Err(EnrollmentError::NotEligible(id.clone())),
            status => {
                return Err(EnrollmentError::WrongStage {
                    id: id.clone(),
                    status,
                })
            }
        }
        let prior_score = match &attempt.score {
            Some(score) if score.passed => score.clone(),
            _ => return Err(EnrollmentError::NotEligible(id.clone())),
        };

        let now = self.clock.now();
        let video = match artifact {
            VideoArtifact::Upload(upload) => {
                if upload.bytes.is_empty() {
                    return Err(EnrollmentError::InvalidInput(
                        "uploaded video is empty".to_string(),
                    ));
                }
                if upload.bytes.len() > self.config.video_max_bytes {
                    return Err(EnrollmentError::VideoTooLarge {
                        limit: self.config.video_max_bytes,
                    });
                }
                self.bounded("video storage", async {
                    self.videos
                        .store(id, &upload, now)
                        .await
                        .map_err(|err| CollaboratorError::Unavailable(err.to_string()))
                })
                .await?
            }
            VideoArtifact::Link { url } => {
                let video_id = youtube_video_id(&url).ok_or_else(|| {
                    EnrollmentError::InvalidInput(format!("unsupported video link: {url}"))
                })?;
                VideoRef {
                    kind: VideoKind::Link,
                    location: format!("youtube:{video_id}"),
                    received_at: now,
                }
            }
        };

        let finalized = self.finalize_video(attempt, video.clone(), prior_score, now).await;
        if finalized.is_err() && video.kind == VideoKind::Upload {
            if let Err(err) = self.videos.discard(&video).await {
                warn!(quiz_id = %id, error = %err, "failed to discard unreviewed video");
            }
        }
        let stored = finalized?;

        Ok(VideoReceipt {
            accepted: true,
            status: stored.status,
        })
    }

    async fn finalize_video(
        &self,
        mut attempt: EnrollmentAttempt,
        video: VideoRef,
        prior_score: ScoreSummary,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentAttempt, EnrollmentError> {
        let id = attempt.id.clone();
        let outcome = self
            .bounded(
                "video review",
                self.reviewer.review(VideoReview {
                    quiz_id: id.clone(),
                    topic: attempt.topic.clone(),
                    video: video.clone(),
                    prior_score: prior_score.clone(),
                }),
            )
            .await?;
        let video_score = outcome.video_score.min(100);
        let decision = FinalDecision {
            selected: self.evaluation.is_selected(prior_score.passed, video_score),
            passed_quiz: prior_score.passed,
            feedback: outcome.feedback,
            video_score,
        };
        let selected = decision.selected;

        attempt.video = Some(video);
        advance(&mut attempt, AttemptStatus::VideoSubmitted, now)?;
        attempt.decision = Some(decision);
        advance(&mut attempt, AttemptStatus::Finalized, now)?;

        let stored = self.persist(attempt)?;
        info!(quiz_id = %id, video_score, selected, "admission decision finalized");
        Ok(stored)
    }

    pub fn final_decision(&self, id: &AttemptId) -> Result<DecisionView, EnrollmentError> {
        let attempt = self.load(id)?;
        match (&attempt.status, &attempt.decision) {
            (AttemptStatus::Finalized, Some(decision)) => Ok(DecisionView {
                quiz_id: attempt.id.clone(),
                selected: decision.selected,
                passed_quiz: decision.passed_quiz,
                feedback: decision.feedback.clone(),
                video_score: decision.video_score,
            }),
            _ => Err(EnrollmentError::NotFinalizedYet(id.clone())),
        }
    }

    pub fn attempt_status(&self, id: &AttemptId) -> Result<StatusView, EnrollmentError> {
        let attempt = self.load(id)?;
        Ok(StatusView::from_attempt(&attempt))
    }

    fn ensure_servable(attempt: &EnrollmentAttempt) -> Result<(), EnrollmentError> {
        if !attempt.status.is_open() {
            return Err(EnrollmentError::WrongStage {
                id: attempt.id.clone(),
                status: attempt.status,
            });
        }
        if attempt.questions.is_empty() {
            return Err(EnrollmentError::NotYetGenerated(attempt.id.clone()));
        }
        Ok(())
    }

    async fn record_creation_dispatch(&self, id: &AttemptId, outcome: DispatchOutcome) {
        let _write = self.locks.acquire(id).await;
        let now = self.clock.now();
        let mut attempt = match self.load(id) {
            Ok(attempt) => attempt,
            Err(err) => {
                warn!(quiz_id = %id, error = %err, "failed to reload attempt after dispatch");
                return;
            }
        };

        if attempt.status == AttemptStatus::Created {
            let next = if outcome.delivered() {
                AttemptStatus::EmailSent
            } else {
                AttemptStatus::EmailFailed
            };
            if let Err(err) = attempt.advance(next, now) {
                warn!(quiz_id = %id, error = %err, "dispatch stage not recorded");
            }
        }
        attempt.record_dispatch(outcome, now);

        if let Err(err) = self.persist(attempt) {
            warn!(quiz_id = %id, error = %err, "failed to record dispatch outcome");
        }
    }

    async fn dispatch(&self, notification: QuizNotification) -> DispatchOutcome {
        let quiz_id = notification.quiz_id.clone();
        let outcome = match tokio::time::timeout(
            self.config.collaborator_timeout,
            self.notifier.dispatch(notification),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => DispatchOutcome::Failed("notification dispatch timed out".to_string()),
        };

        match &outcome {
            DispatchOutcome::Delivered => info!(quiz_id = %quiz_id, "quiz link emailed"),
            DispatchOutcome::NotConfigured => {
                info!(quiz_id = %quiz_id, "email not configured; quiz link not sent")
            }
            DispatchOutcome::Failed(reason) => {
                warn!(quiz_id = %quiz_id, %reason, "quiz link email failed")
            }
        }
        outcome
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, EnrollmentError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        let source = match tokio::time::timeout(self.config.collaborator_timeout, call).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => CollaboratorError::Timeout,
        };
        warn!(operation, error = %source, "collaborator call failed");
        Err(EnrollmentError::CollaboratorUnavailable { operation, source })
    }

    fn quiz_window(&self) -> Option<chrono::Duration> {
        self.config
            .quiz_time_limit
            .and_then(|limit| chrono::Duration::from_std(limit).ok())
    }

    fn load(&self, id: &AttemptId) -> Result<EnrollmentAttempt, EnrollmentError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| EnrollmentError::NotFound(id.clone()))
    }

    fn persist(&self, attempt: EnrollmentAttempt) -> Result<EnrollmentAttempt, EnrollmentError> {
        let id = attempt.id.clone();
        self.repository.update(attempt).map_err(|err| match err {
            RepositoryError::Conflict => EnrollmentError::Conflict(id),
            RepositoryError::NotFound => EnrollmentError::NotFound(id),
            other => EnrollmentError::Repository(other),
        })
    }
}

fn advance(
    attempt: &mut EnrollmentAttempt,
    next: AttemptStatus,
    at: DateTime<Utc>,
) -> Result<(), EnrollmentError> {
    attempt
        .advance(next, at)
        .map_err(|_| EnrollmentError::WrongStage {
            id: attempt.id.clone(),
            status: attempt.status,
        })
}

fn score_view(attempt: &EnrollmentAttempt) -> Result<ScoreView, EnrollmentError> {
    match (&attempt.score, attempt.status.has_score()) {
        (Some(summary), true) => Ok(ScoreView {
            quiz_id: attempt.id.clone(),
            score: summary.score,
            total: summary.total,
            passed: summary.passed,
            suggestions: summary.suggestions.clone(),
        }),
        _ => Err(EnrollmentError::NotScoredYet(attempt.id.clone())),
    }
}

/// Error raised by the enrollment controller.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("uploaded video exceeds {limit} bytes")]
    VideoTooLarge { limit: usize },
    #[error("quiz {0} not found")]
    NotFound(AttemptId),
    #[error("quiz {id} is {status}; operation not allowed at this stage")]
    WrongStage { id: AttemptId, status: AttemptStatus },
    #[error("answers for quiz {0} were already submitted")]
    AlreadySubmitted(AttemptId),
    #[error("expected {expected} answers, received {received}")]
    AnswerCountMismatch { expected: usize, received: usize },
    #[error("email does not match the address on record for quiz {0}")]
    EmailMismatch(AttemptId),
    #[error("questions for quiz {0} have not been generated yet")]
    NotYetGenerated(AttemptId),
    #[error("quiz {0} has not been scored yet")]
    NotScoredYet(AttemptId),
    #[error("quiz {0} did not pass; no video can be submitted")]
    NotEligible(AttemptId),
    #[error("quiz {0} has no final decision yet")]
    NotFinalizedYet(AttemptId),
    #[error("quiz {id} window closed at {deadline}")]
    DeadlineExceeded {
        id: AttemptId,
        deadline: DateTime<Utc>,
    },
    #[error("{operation} unavailable: {source}")]
    CollaboratorUnavailable {
        operation: &'static str,
        source: CollaboratorError,
    },
    #[error("quiz {0} was modified concurrently; retry the request")]
    Conflict(AttemptId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EnrollmentError {
    /// Stable machine-readable code for API payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            EnrollmentError::InvalidInput(_) => "invalid_input",
            EnrollmentError::VideoTooLarge { .. } => "video_too_large",
            EnrollmentError::NotFound(_) => "not_found",
            EnrollmentError::WrongStage { .. } => "wrong_stage",
            EnrollmentError::AlreadySubmitted(_) => "already_submitted",
            EnrollmentError::AnswerCountMismatch { .. } => "answer_count_mismatch",
            EnrollmentError::EmailMismatch(_) => "email_mismatch",
            EnrollmentError::NotYetGenerated(_) => "not_yet_generated",
            EnrollmentError::NotScoredYet(_) => "not_scored_yet",
            EnrollmentError::NotEligible(_) => "not_eligible",
            EnrollmentError::NotFinalizedYet(_) => "not_finalized_yet",
            EnrollmentError::DeadlineExceeded { .. } => "deadline_exceeded",
            EnrollmentError::CollaboratorUnavailable { .. } => "collaborator_unavailable",
            EnrollmentError::Conflict(_) => "conflict",
            EnrollmentError::Repository(_) => "repository_error",
        }
    }
}

impl From<IntakeRejection> for EnrollmentError {
    fn from(rejection: IntakeRejection) -> Self {
        EnrollmentError::InvalidInput(rejection.to_string())
    }
}
