use async_trait::async_trait;
use shared::domain::{AnswerSubmission, DailyProgress, Question, Verdict};

pub mod controller;
pub mod credentials;
pub mod error;
pub mod session;
pub mod transport;

pub use controller::{QuizController, QuizEvent};
pub use credentials::{CredentialProvider, MissingCredentialProvider, StaticCredentialProvider};
pub use error::{QuizError, TransportError, ValidationError};
pub use session::{Phase, ScoringPolicy, SessionId, SessionState, Summary};
pub use transport::HttpScoringClient;

/// Request/response boundary to the remote scoring service. Timeouts are the
/// implementation's concern and surface as ordinary transport errors.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn fetch_question_set(&self) -> Result<Vec<Question>, TransportError>;
    async fn submit_answer(&self, submission: &AnswerSubmission)
        -> Result<Verdict, TransportError>;
    /// Best-effort; callers ignore failures.
    async fn finish_session(&self) -> Result<(), TransportError>;
    async fn fetch_daily_progress(&self) -> Result<DailyProgress, TransportError>;
}

pub struct MissingScoringService;

#[async_trait]
impl ScoringService for MissingScoringService {
    async fn fetch_question_set(&self) -> Result<Vec<Question>, TransportError> {
        Err(TransportError::Network("scoring service is unavailable".into()))
    }

    async fn submit_answer(
        &self,
        submission: &AnswerSubmission,
    ) -> Result<Verdict, TransportError> {
        Err(TransportError::Network(format!(
            "scoring service is unavailable for question {}",
            submission.question_id
        )))
    }

    async fn finish_session(&self) -> Result<(), TransportError> {
        Err(TransportError::Network("scoring service is unavailable".into()))
    }

    async fn fetch_daily_progress(&self) -> Result<DailyProgress, TransportError> {
        Err(TransportError::Network("scoring service is unavailable".into()))
    }
}
