use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::EnrollmentConfig;
use crate::workflows::enrollment::{
    AttemptId, AttemptRepository, Clock, CollaboratorError, DecisionEngine, DispatchOutcome,
    EnrollmentAttempt, EnrollmentRequest, EnrollmentService, EvaluationConfig,
    NotificationDispatcher, Question, QuestionGenerator, QuizNotification, RepositoryError,
    ReviewOutcome, ScoreSummary, ScoringEngine, ThresholdGrader, VideoKind, VideoRef, VideoReview,
    VideoStore, VideoStoreError, VideoUpload,
};

/// Correct option index per question for the fixed five-question quiz.
pub(super) const CORRECT: [usize; 5] = [0, 1, 2, 3, 0];

pub(super) fn enrollment_config() -> EnrollmentConfig {
    EnrollmentConfig {
        frontend_base_url: "https://quiz.example.test".to_string(),
        quiz_time_limit: Some(Duration::from_secs(600)),
        pass_threshold_pct: 60,
        selection_threshold: 70,
        baseline_video_score: 60,
        collaborator_timeout: Duration::from_millis(200),
        video_upload_dir: "unused".into(),
        video_max_bytes: 1024,
    }
}

pub(super) fn request() -> EnrollmentRequest {
    EnrollmentRequest {
        email: "ada@example.com".to_string(),
        topic: "Rust".to_string(),
        num_questions: 5,
    }
}

/// Answers with exactly `correct` right answers followed by wrong ones.
pub(super) fn answers_with(correct: usize) -> Vec<i32> {
    CORRECT
        .iter()
        .enumerate()
        .map(|(index, right)| {
            if index < correct {
                *right as i32
            } else {
                ((*right + 1) % 4) as i32
            }
        })
        .collect()
}

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub(super) struct Harness {
    pub(super) service: EnrollmentService<MemoryRepository, RecordingDispatcher>,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) dispatcher: Arc<RecordingDispatcher>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) scorer: Arc<CountingScorer>,
    pub(super) reviewer: Arc<FixedReviewer>,
    pub(super) videos: Arc<MemoryVideoStore>,
}

pub(super) fn harness() -> Harness {
    harness_with(DispatchOutcome::Delivered, enrollment_config())
}

pub(super) fn harness_with(outcome: DispatchOutcome, config: EnrollmentConfig) -> Harness {
    let repository = Arc::new(MemoryRepository::default());
    let dispatcher = Arc::new(RecordingDispatcher::new(outcome));
    let clock = Arc::new(ManualClock::new(start()));
    let scorer = Arc::new(CountingScorer::new(EvaluationConfig::from(&config)));
    let reviewer = Arc::new(FixedReviewer::new(80));
    let videos = Arc::new(MemoryVideoStore::default());

    let service = EnrollmentService::new(repository.clone(), dispatcher.clone(), config)
        .with_generator(Arc::new(FixedQuestions))
        .with_scorer(scorer.clone())
        .with_reviewer(reviewer.clone())
        .with_video_store(videos.clone())
        .with_clock(clock.clone());

    Harness {
        service,
        repository,
        dispatcher,
        clock,
        scorer,
        reviewer,
        videos,
    }
}

pub(super) fn upload(bytes: usize) -> VideoUpload {
    VideoUpload {
        file_name: "walkthrough.mp4".to_string(),
        content_type: Some("video/mp4".to_string()),
        bytes: vec![7; bytes],
    }
}

pub(super) fn stored(repository: &MemoryRepository, id: &AttemptId) -> EnrollmentAttempt {
    repository
        .fetch(id)
        .expect("fetch succeeds")
        .expect("attempt stored")
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<HashMap<AttemptId, EnrollmentAttempt>>,
}

impl AttemptRepository for MemoryRepository {
    fn insert(&self, attempt: EnrollmentAttempt) -> Result<EnrollmentAttempt, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&attempt.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(attempt.id.clone(), attempt.clone());
        Ok(attempt)
    }

    fn update(&self, mut attempt: EnrollmentAttempt) -> Result<EnrollmentAttempt, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let current = guard.get(&attempt.id).ok_or(RepositoryError::NotFound)?;
        if current.revision != attempt.revision {
            return Err(RepositoryError::Conflict);
        }
        attempt.revision += 1;
        guard.insert(attempt.id.clone(), attempt.clone());
        Ok(attempt)
    }

    fn fetch(&self, id: &AttemptId) -> Result<Option<EnrollmentAttempt>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

pub(super) struct RecordingDispatcher {
    outcome: DispatchOutcome,
    sent: Mutex<Vec<QuizNotification>>,
}

impl RecordingDispatcher {
    pub(super) fn new(outcome: DispatchOutcome) -> Self {
        Self {
            outcome,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn sent(&self) -> Vec<QuizNotification> {
        self.sent.lock().expect("dispatcher mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, notification: QuizNotification) -> DispatchOutcome {
        self.sent
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(notification);
        self.outcome.clone()
    }
}

pub(super) struct FixedQuestions;

#[async_trait]
impl QuestionGenerator for FixedQuestions {
    async fn generate(&self, topic: &str, count: u32) -> Result<Vec<Question>, CollaboratorError> {
        Ok((0..count as usize)
            .map(|index| Question {
                id: format!("q{}", index + 1),
                text: format!("{topic} question {}", index + 1),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_index: CORRECT[index % CORRECT.len()],
            })
            .collect())
    }
}

pub(super) struct FailingQuestions;

#[async_trait]
impl QuestionGenerator for FailingQuestions {
    async fn generate(&self, _topic: &str, _count: u32) -> Result<Vec<Question>, CollaboratorError> {
        Err(CollaboratorError::Unavailable("model offline".to_string()))
    }
}

/// Real grader that counts how often it was asked.
pub(super) struct CountingScorer {
    grader: ThresholdGrader,
    calls: AtomicUsize,
}

impl CountingScorer {
    pub(super) fn new(config: EvaluationConfig) -> Self {
        Self {
            grader: ThresholdGrader::new(config),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringEngine for CountingScorer {
    async fn score(
        &self,
        questions: &[Question],
        answers: &[i32],
    ) -> Result<ScoreSummary, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Widen the race window for concurrent submissions.
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.grader.score(questions, answers).await
    }
}

pub(super) struct FailingScorer;

#[async_trait]
impl ScoringEngine for FailingScorer {
    async fn score(
        &self,
        _questions: &[Question],
        _answers: &[i32],
    ) -> Result<ScoreSummary, CollaboratorError> {
        Err(CollaboratorError::Unavailable("grader offline".to_string()))
    }
}

pub(super) struct StalledScorer;

#[async_trait]
impl ScoringEngine for StalledScorer {
    async fn score(
        &self,
        _questions: &[Question],
        _answers: &[i32],
    ) -> Result<ScoreSummary, CollaboratorError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(CollaboratorError::Timeout)
    }
}

pub(super) struct FixedReviewer {
    score: u8,
    reviews: Mutex<Vec<VideoReview>>,
}

impl FixedReviewer {
    pub(super) fn new(score: u8) -> Self {
        Self {
            score,
            reviews: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn reviews(&self) -> Vec<VideoReview> {
        self.reviews.lock().expect("reviewer mutex poisoned").clone()
    }
}

#[async_trait]
impl DecisionEngine for FixedReviewer {
    async fn review(&self, review: VideoReview) -> Result<ReviewOutcome, CollaboratorError> {
        self.reviews
            .lock()
            .expect("reviewer mutex poisoned")
            .push(review);
        Ok(ReviewOutcome {
            video_score: self.score,
            feedback: "Clear walkthrough.".to_string(),
        })
    }
}

pub(super) struct FailingReviewer;

#[async_trait]
impl DecisionEngine for FailingReviewer {
    async fn review(&self, _review: VideoReview) -> Result<ReviewOutcome, CollaboratorError> {
        Err(CollaboratorError::Unavailable("reviewer offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryVideoStore {
    stored: Mutex<Vec<(String, AttemptId, usize)>>,
}

impl MemoryVideoStore {
    pub(super) fn stored(&self) -> Vec<(AttemptId, usize)> {
        self.stored
            .lock()
            .expect("video mutex poisoned")
            .iter()
            .map(|(_, id, len)| (id.clone(), *len))
            .collect()
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn store(
        &self,
        quiz_id: &AttemptId,
        upload: &VideoUpload,
        received_at: DateTime<Utc>,
    ) -> Result<VideoRef, VideoStoreError> {
        let location = format!("memory://{quiz_id}/{}", upload.file_name);
        self.stored.lock().expect("video mutex poisoned").push((
            location.clone(),
            quiz_id.clone(),
            upload.bytes.len(),
        ));
        Ok(VideoRef {
            kind: VideoKind::Upload,
            location,
            received_at,
        })
    }

    async fn discard(&self, video: &VideoRef) -> Result<(), VideoStoreError> {
        self.stored
            .lock()
            .expect("video mutex poisoned")
            .retain(|(location, _, _)| location != &video.location);
        Ok(())
    }
}

pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

/// Serves reads one revision behind, as if another instance wrote in between.
pub(super) struct StaleRepository {
    inner: Arc<MemoryRepository>,
}

impl StaleRepository {
    pub(super) fn wrap(inner: Arc<MemoryRepository>) -> Self {
        Self { inner }
    }
}

impl AttemptRepository for StaleRepository {
    fn insert(&self, attempt: EnrollmentAttempt) -> Result<EnrollmentAttempt, RepositoryError> {
        self.inner.insert(attempt)
    }

    fn update(&self, attempt: EnrollmentAttempt) -> Result<EnrollmentAttempt, RepositoryError> {
        self.inner.update(attempt)
    }

    fn fetch(&self, id: &AttemptId) -> Result<Option<EnrollmentAttempt>, RepositoryError> {
        Ok(self.inner.fetch(id)?.map(|mut attempt| {
            attempt.revision = attempt.revision.wrapping_sub(1);
            attempt
        }))
    }
}
