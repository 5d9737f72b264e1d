use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

pub const MIN_QUESTIONS: u32 = 1;
pub const MAX_QUESTIONS: u32 = 30;

/// Inbound request to start an enrollment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EnrollmentRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub topic: String,
    #[validate(range(min = 1, max = 30, message = "must be between 1 and 30"))]
    pub num_questions: u32,
}

/// Request after trimming and validation; the only shape the controller persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEnrollment {
    pub email: String,
    pub topic: String,
    pub num_questions: u32,
}

/// Create-request rejection, one entry per offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid enrollment request: {}", .fields.join("; "))]
pub struct IntakeRejection {
    pub fields: Vec<String>,
}

impl From<ValidationErrors> for IntakeRejection {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, problems)| {
                let detail = problems
                    .iter()
                    .filter_map(|problem| problem.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field} {detail}")
            })
            .collect();
        fields.sort();
        Self { fields }
    }
}

/// Normalises and validates create requests before any collaborator is called.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard;

impl IntakeGuard {
    pub fn admit(&self, request: EnrollmentRequest) -> Result<ValidatedEnrollment, IntakeRejection> {
        let normalised = EnrollmentRequest {
            email: request.email.trim().to_string(),
            topic: request.topic.trim().to_string(),
            num_questions: request.num_questions,
        };
        normalised.validate()?;

        Ok(ValidatedEnrollment {
            email: normalised.email,
            topic: normalised.topic,
            num_questions: normalised.num_questions,
        })
    }
}
