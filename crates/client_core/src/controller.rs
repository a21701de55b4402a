//! Async driver for [`SessionState`].
//!
//! The lock is never held across a scoring-service call. Between the begin
//! and apply halves of a step the session may be reset or restarted; the
//! ticket check in `session` then turns the late response into
//! `QuizError::StaleResponse` instead of a mutation.

use std::sync::Arc;

use shared::domain::Verdict;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    error::{QuizError, TransportError},
    session::{AdvanceOutcome, Phase, ScoringPolicy, SessionId, SessionState, Summary},
    ScoringService,
};

#[derive(Debug, Clone)]
pub enum QuizEvent {
    PhaseChanged {
        session: SessionId,
        phase: Phase,
    },
    FetchFailed {
        session: SessionId,
        error: TransportError,
    },
    VerdictReceived {
        session: SessionId,
        verdict: Verdict,
    },
    SubmitFailed {
        session: SessionId,
        error: TransportError,
    },
    FinishNotificationFailed {
        session: SessionId,
        error: TransportError,
    },
    Completed {
        session: SessionId,
        summary: Summary,
    },
}

pub struct QuizController {
    service: Arc<dyn ScoringService>,
    policy: ScoringPolicy,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<QuizEvent>,
}

impl QuizController {
    pub fn new(service: Arc<dyn ScoringService>) -> Arc<Self> {
        Self::with_policy(service, ScoringPolicy::default())
    }

    pub fn with_policy(service: Arc<dyn ScoringService>, policy: ScoringPolicy) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            service,
            policy,
            inner: Mutex::new(SessionState::new(policy)),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<QuizEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the live session.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.clone()
    }

    pub async fn summary(&self) -> Option<Summary> {
        self.inner.lock().await.summary()
    }

    /// Discards the live session. Responses still in flight for it are
    /// dropped when they arrive.
    pub async fn reset(&self) -> SessionId {
        let session = {
            let mut state = self.inner.lock().await;
            *state = SessionState::new(self.policy);
            state.id()
        };
        info!(%session, "quiz: session reset");
        self.emit_phase(session, Phase::Idle);
        session
    }

    /// Starts a brand-new session and fetches its question set.
    pub async fn start(&self) -> Result<Phase, QuizError> {
        let ticket = {
            let mut state = self.inner.lock().await;
            *state = SessionState::new(self.policy);
            state.begin_fetch()?
        };
        let session = ticket.session();
        info!(%session, "quiz: session starting");
        self.emit_phase(session, Phase::Loading);

        let outcome = self.service.fetch_question_set().await;

        let (result, summary) = {
            let mut state = self.inner.lock().await;
            let result = state.apply_question_set(ticket, outcome);
            (result, state.summary())
        };

        match result {
            Ok(phase) => {
                self.emit_phase(session, phase);
                if let Some(summary) = summary {
                    info!(%session, "quiz: empty question set, nothing to answer");
                    self.emit(QuizEvent::Completed { session, summary });
                }
                Ok(phase)
            }
            Err(QuizError::Transport(error)) => {
                warn!(%session, %error, "quiz: question fetch failed");
                self.emit(QuizEvent::FetchFailed {
                    session,
                    error: error.clone(),
                });
                self.emit_phase(session, Phase::Failed);
                Err(QuizError::Transport(error))
            }
            Err(err) => {
                warn!(%session, error = %err, "quiz: dropping question set");
                Err(err)
            }
        }
    }

    pub async fn select_choice(&self, choice: &str) -> Result<(), QuizError> {
        self.inner.lock().await.select_choice(choice)?;
        Ok(())
    }

    /// Submits the current selection. A transport failure puts the question
    /// back on screen with the selection intact.
    pub async fn submit(&self) -> Result<Verdict, QuizError> {
        let ticket = self.inner.lock().await.begin_submit()?;
        let session = ticket.session();
        self.emit_phase(session, Phase::Submitting);

        let outcome = self.service.submit_answer(ticket.submission()).await;
        let question_id = ticket.submission().question_id;

        let result = self.inner.lock().await.apply_verdict(ticket, outcome);
        match result {
            Ok(verdict) => {
                info!(
                    %session,
                    question_id = question_id.0,
                    correct = verdict.is_correct,
                    total_score = verdict.authoritative_total_score,
                    "quiz: verdict received"
                );
                self.emit(QuizEvent::VerdictReceived {
                    session,
                    verdict: verdict.clone(),
                });
                self.emit_phase(session, Phase::Reviewing);
                Ok(verdict)
            }
            Err(QuizError::Transport(error)) => {
                warn!(%session, question_id = question_id.0, %error, "quiz: answer submission failed");
                self.emit(QuizEvent::SubmitFailed {
                    session,
                    error: error.clone(),
                });
                self.emit_phase(session, Phase::Presenting);
                Err(QuizError::Transport(error))
            }
            Err(err) => {
                warn!(%session, question_id = question_id.0, error = %err, "quiz: dropping verdict");
                Err(err)
            }
        }
    }

    /// Moves past the reviewed question. After the last one the finish
    /// notification is sent and the session completes whatever it returns.
    pub async fn advance(&self) -> Result<Phase, QuizError> {
        let (session, outcome) = {
            let mut state = self.inner.lock().await;
            let outcome = state.advance()?;
            (state.id(), outcome)
        };
        let ticket = match outcome {
            AdvanceOutcome::NextQuestion { index } => {
                info!(%session, index, "quiz: next question");
                self.emit_phase(session, Phase::Presenting);
                return Ok(Phase::Presenting);
            }
            AdvanceOutcome::Finish(ticket) => ticket,
        };
        self.emit_phase(session, Phase::Finishing);

        let outcome = self.service.finish_session().await;
        if let Err(error) = &outcome {
            warn!(%session, %error, "quiz: finish notification failed, completing anyway");
            self.emit(QuizEvent::FinishNotificationFailed {
                session,
                error: error.clone(),
            });
        }

        let summary = {
            let mut state = self.inner.lock().await;
            if let Err(err) = state.apply_finish(ticket, outcome) {
                warn!(%session, error = %err, "quiz: dropping finish acknowledgement");
                return Err(err);
            }
            state.summary()
        };

        self.emit_phase(session, Phase::Completed);
        if let Some(summary) = summary {
            info!(
                %session,
                correct = summary.correct_count,
                missed = summary.missed_items.len(),
                session_points = summary.session_points_earned,
                total_score = ?summary.authoritative_total_score,
                "quiz: session completed"
            );
            self.emit(QuizEvent::Completed { session, summary });
        }
        Ok(Phase::Completed)
    }

    fn emit_phase(&self, session: SessionId, phase: Phase) {
        self.emit(QuizEvent::PhaseChanged { session, phase });
    }

    fn emit(&self, event: QuizEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
