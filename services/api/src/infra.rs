use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use skill_bridge::config::{AppConfig, SmtpConfig};
use skill_bridge::workflows::enrollment::{
    AttemptId, AttemptRepository, DisabledDispatcher, DispatchOutcome, EnrollmentAttempt,
    EnrollmentService, NotificationDispatcher, QuizNotification, RepositoryError,
    SmtpDispatcher,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local attempt store with revision-checked updates.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAttemptRepository {
    records: Arc<Mutex<HashMap<AttemptId, EnrollmentAttempt>>>,
}

impl AttemptRepository for InMemoryAttemptRepository {
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
        match guard.get(&attempt.id) {
            Some(current) if current.revision == attempt.revision => {
                attempt.revision += 1;
                guard.insert(attempt.id.clone(), attempt.clone());
                Ok(attempt)
            }
            Some(_) => Err(RepositoryError::Conflict),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &AttemptId) -> Result<Option<EnrollmentAttempt>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

/// Mail transport picked at startup from the SMTP settings.
pub(crate) enum ConfiguredDispatcher {
    Smtp(SmtpDispatcher),
    Disabled(DisabledDispatcher),
}

impl ConfiguredDispatcher {
    pub(crate) fn from_config(smtp: Option<&SmtpConfig>) -> Self {
        let Some(smtp) = smtp else {
            info!("SMTP not configured; quiz links will not be emailed");
            return Self::Disabled(DisabledDispatcher);
        };

        match SmtpDispatcher::from_config(smtp) {
            Ok(dispatcher) => {
                info!(host = %smtp.host, port = smtp.port, "SMTP dispatcher ready");
                Self::Smtp(dispatcher)
            }
            Err(err) => {
                warn!(error = %err, "SMTP settings rejected; quiz links will not be emailed");
                Self::Disabled(DisabledDispatcher)
            }
        }
    }
}

#[async_trait]
impl NotificationDispatcher for ConfiguredDispatcher {
    async fn dispatch(&self, notification: QuizNotification) -> DispatchOutcome {
        match self {
            ConfiguredDispatcher::Smtp(dispatcher) => dispatcher.dispatch(notification).await,
            ConfiguredDispatcher::Disabled(dispatcher) => dispatcher.dispatch(notification).await,
        }
    }
}

pub(crate) type EnrollmentApp = EnrollmentService<InMemoryAttemptRepository, ConfiguredDispatcher>;

pub(crate) fn enrollment_service(config: &AppConfig) -> Arc<EnrollmentApp> {
    let repository = Arc::new(InMemoryAttemptRepository::default());
    let dispatcher = Arc::new(ConfiguredDispatcher::from_config(config.smtp.as_ref()));
    Arc::new(EnrollmentService::new(
        repository,
        dispatcher,
        config.enrollment.clone(),
    ))
}
