//! Quiz session state machine.
//!
//! Pure and synchronous: no I/O happens here. Every network-bound step is
//! split in two. A `begin_*` call moves the phase and hands out a ticket
//! stamped with the session id; the matching `apply_*` call takes the ticket
//! back together with the outcome. Tickets that no longer match the live
//! session are rejected without touching state, so a late response can never
//! update a session the user already left.
//!
//! ```text
//! Idle/Failed --begin_fetch--> Loading --ok, non-empty--> Presenting
//!                                      --ok, empty------> Completed
//!                                      --error----------> Failed
//! Presenting --begin_submit--> Submitting --verdict--> Reviewing
//!                                         --error----> Presenting
//! Reviewing --advance, more left--> Presenting
//! Reviewing --advance, last-------> Finishing --apply_finish--> Completed
//! ```

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use shared::domain::{AnswerSubmission, MissedItem, Question, Verdict};
use tracing::debug;

use crate::error::{QuizError, TransportError, ValidationError};

pub const DEFAULT_POINTS_PER_CORRECT: i64 = 10;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Loading,
    Presenting,
    Submitting,
    Reviewing,
    Finishing,
    Completed,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Presenting => "presenting",
            Self::Submitting => "submitting",
            Self::Reviewing => "reviewing",
            Self::Finishing => "finishing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the local, per-session point total grows on a correct verdict.
///
/// The session total is cosmetic: it is never sent to the server and never
/// reconciled with the authoritative score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringPolicy {
    FixedIncrement(i64),
    /// Grow by the increase in the server's total between verdicts. The first
    /// correct verdict of a session has no baseline and falls back to
    /// `DEFAULT_POINTS_PER_CORRECT`.
    AuthoritativeDelta,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::FixedIncrement(DEFAULT_POINTS_PER_CORRECT)
    }
}

#[derive(Debug)]
pub struct FetchTicket {
    session: SessionId,
}

impl FetchTicket {
    pub fn session(&self) -> SessionId {
        self.session
    }
}

#[derive(Debug)]
pub struct SubmitTicket {
    session: SessionId,
    index: usize,
    submission: AnswerSubmission,
}

impl SubmitTicket {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn submission(&self) -> &AnswerSubmission {
        &self.submission
    }
}

#[derive(Debug)]
pub struct FinishTicket {
    session: SessionId,
}

impl FinishTicket {
    pub fn session(&self) -> SessionId {
        self.session
    }
}

#[derive(Debug)]
pub enum AdvanceOutcome {
    NextQuestion { index: usize },
    Finish(FinishTicket),
}

/// Final results, available once the session is `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total_questions: usize,
    pub answered: usize,
    pub correct_count: usize,
    pub session_points_earned: i64,
    pub authoritative_total_score: Option<i64>,
    pub missed_items: Vec<MissedItem>,
    pub finish_acknowledged: bool,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    id: SessionId,
    policy: ScoringPolicy,
    phase: Phase,
    questions: Vec<Question>,
    current_index: usize,
    selected_choice: Option<String>,
    pending_verdict: Option<Verdict>,
    session_points_earned: i64,
    authoritative_total_score: Option<i64>,
    correct_count: usize,
    missed_items: Vec<MissedItem>,
    last_error: Option<TransportError>,
    finish_acknowledged: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(ScoringPolicy::default())
    }
}

impl SessionState {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            id: SessionId::next(),
            policy,
            phase: Phase::Idle,
            questions: Vec::new(),
            current_index: 0,
            selected_choice: None,
            pending_verdict: None,
            session_points_earned: 0,
            authoritative_total_score: None,
            correct_count: 0,
            missed_items: Vec::new(),
            last_error: None,
            finish_acknowledged: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Question on screen while presenting, submitting or reviewing.
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Presenting | Phase::Submitting | Phase::Reviewing => {
                self.questions.get(self.current_index)
            }
            _ => None,
        }
    }

    /// 1-based position for "Question N of M".
    pub fn position(&self) -> usize {
        self.current_index + 1
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn selected_choice(&self) -> Option<&str> {
        self.selected_choice.as_deref()
    }

    pub fn pending_verdict(&self) -> Option<&Verdict> {
        self.pending_verdict.as_ref()
    }

    pub fn session_points_earned(&self) -> i64 {
        self.session_points_earned
    }

    pub fn authoritative_total_score(&self) -> Option<i64> {
        self.authoritative_total_score
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn missed_items(&self) -> &[MissedItem] {
        &self.missed_items
    }

    /// Most recent transport failure, cleared by the next successful step.
    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    pub fn summary(&self) -> Option<Summary> {
        if self.phase != Phase::Completed {
            return None;
        }
        Some(Summary {
            total_questions: self.questions.len(),
            answered: self.correct_count + self.missed_items.len(),
            correct_count: self.correct_count,
            session_points_earned: self.session_points_earned,
            authoritative_total_score: self.authoritative_total_score,
            missed_items: self.missed_items.clone(),
            finish_acknowledged: self.finish_acknowledged,
        })
    }

    pub fn begin_fetch(&mut self) -> Result<FetchTicket, ValidationError> {
        self.require("start", &[Phase::Idle, Phase::Failed])?;
        self.set_phase(Phase::Loading);
        Ok(FetchTicket { session: self.id })
    }

    pub fn apply_question_set(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<Vec<Question>, TransportError>,
    ) -> Result<Phase, QuizError> {
        self.check_ticket(ticket.session, Phase::Loading)?;

        match outcome {
            Ok(questions) => {
                self.questions = questions;
                self.current_index = 0;
                self.last_error = None;
                if self.questions.is_empty() {
                    self.set_phase(Phase::Completed);
                } else {
                    self.set_phase(Phase::Presenting);
                }
                Ok(self.phase)
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                self.set_phase(Phase::Failed);
                Err(err.into())
            }
        }
    }

    pub fn select_choice(&mut self, choice: &str) -> Result<(), ValidationError> {
        self.require("select_choice", &[Phase::Presenting])?;
        let question = self.live_question()?;
        if !question.has_choice(choice) {
            return Err(ValidationError::UnknownChoice {
                choice: choice.to_string(),
            });
        }
        self.selected_choice = Some(choice.to_string());
        Ok(())
    }

    pub fn begin_submit(&mut self) -> Result<SubmitTicket, ValidationError> {
        self.require("submit", &[Phase::Presenting])?;
        let chosen_choice = self
            .selected_choice
            .clone()
            .ok_or(ValidationError::NoSelection)?;
        let question_id = self.live_question()?.id;

        self.set_phase(Phase::Submitting);
        Ok(SubmitTicket {
            session: self.id,
            index: self.current_index,
            submission: AnswerSubmission {
                question_id,
                chosen_choice,
            },
        })
    }

    pub fn apply_verdict(
        &mut self,
        ticket: SubmitTicket,
        outcome: Result<Verdict, TransportError>,
    ) -> Result<Verdict, QuizError> {
        self.check_ticket(ticket.session, Phase::Submitting)?;
        if ticket.index != self.current_index {
            return Err(QuizError::StaleResponse {
                ticket: ticket.session,
                live: self.id,
            });
        }

        let verdict = match outcome {
            Ok(verdict) => verdict,
            Err(err) => {
                // Selection survives so the same answer can be resubmitted.
                self.last_error = Some(err.clone());
                self.set_phase(Phase::Presenting);
                return Err(err.into());
            }
        };

        let previous_total = self.authoritative_total_score;
        self.authoritative_total_score = Some(verdict.authoritative_total_score);

        if verdict.is_correct {
            self.correct_count += 1;
            let points = self.points_for_correct(previous_total, &verdict);
            self.session_points_earned = self.session_points_earned.saturating_add(points);
        } else {
            let prompt = self
                .questions
                .get(self.current_index)
                .map(|q| q.prompt.clone())
                .unwrap_or_default();
            self.missed_items.push(MissedItem {
                prompt,
                chosen_choice: ticket.submission.chosen_choice,
                correct_choice: verdict.correct_choice.clone(),
            });
        }

        self.last_error = None;
        self.pending_verdict = Some(verdict.clone());
        self.set_phase(Phase::Reviewing);
        Ok(verdict)
    }

    pub fn advance(&mut self) -> Result<AdvanceOutcome, ValidationError> {
        self.require("advance", &[Phase::Reviewing])?;
        self.selected_choice = None;
        self.pending_verdict = None;

        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            self.set_phase(Phase::Presenting);
            Ok(AdvanceOutcome::NextQuestion {
                index: self.current_index,
            })
        } else {
            self.set_phase(Phase::Finishing);
            Ok(AdvanceOutcome::Finish(FinishTicket { session: self.id }))
        }
    }

    /// Completes the session whatever the finish notification returned.
    pub fn apply_finish(
        &mut self,
        ticket: FinishTicket,
        outcome: Result<(), TransportError>,
    ) -> Result<(), QuizError> {
        self.check_ticket(ticket.session, Phase::Finishing)?;
        self.finish_acknowledged = outcome.is_ok();
        self.set_phase(Phase::Completed);
        Ok(())
    }

    fn points_for_correct(&self, previous_total: Option<i64>, verdict: &Verdict) -> i64 {
        match self.policy {
            ScoringPolicy::FixedIncrement(points) => points.max(0),
            ScoringPolicy::AuthoritativeDelta => match previous_total {
                Some(previous) => verdict
                    .authoritative_total_score
                    .saturating_sub(previous)
                    .max(0),
                None => DEFAULT_POINTS_PER_CORRECT,
            },
        }
    }

    fn live_question(&self) -> Result<&Question, ValidationError> {
        self.questions
            .get(self.current_index)
            .ok_or(ValidationError::WrongPhase {
                operation: "question lookup",
                phase: self.phase,
            })
    }

    fn require(&self, operation: &'static str, allowed: &[Phase]) -> Result<(), ValidationError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ValidationError::WrongPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn check_ticket(&self, session: SessionId, expected: Phase) -> Result<(), QuizError> {
        if session != self.id || self.phase != expected {
            return Err(QuizError::StaleResponse {
                ticket: session,
                live: self.id,
            });
        }
        Ok(())
    }

    fn set_phase(&mut self, next: Phase) {
        debug!(session = %self.id, from = %self.phase, to = %next, "quiz: phase transition");
        self.phase = next;
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
