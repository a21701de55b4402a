use std::collections::VecDeque;

use async_trait::async_trait;
use shared::domain::{AnswerSubmission, DailyProgress, MissedItem, Question, QuestionId};
use tokio::sync::{broadcast::error::TryRecvError, Notify};

use super::*;
use crate::{error::ValidationError, MissingScoringService};

#[derive(Default)]
struct FakeScoringService {
    question_sets: Mutex<VecDeque<Result<Vec<Question>, TransportError>>>,
    verdicts: Mutex<VecDeque<Result<Verdict, TransportError>>>,
    finish_error: Option<TransportError>,
    submissions: Mutex<Vec<AnswerSubmission>>,
    fetch_calls: Mutex<u32>,
    finish_calls: Mutex<u32>,
    submit_entered: Option<Arc<Notify>>,
    submit_gate: Option<Arc<Notify>>,
}

impl FakeScoringService {
    fn with_questions(questions: Vec<Question>) -> Self {
        Self {
            question_sets: Mutex::new(VecDeque::from([Ok(questions)])),
            ..Self::default()
        }
    }

    fn push_question_set(self, outcome: Result<Vec<Question>, TransportError>) -> Self {
        self.question_sets
            .try_lock()
            .expect("unshared during setup")
            .push_back(outcome);
        self
    }

    fn push_verdict(self, outcome: Result<Verdict, TransportError>) -> Self {
        self.verdicts
            .try_lock()
            .expect("unshared during setup")
            .push_back(outcome);
        self
    }

    fn failing_finish(mut self, error: TransportError) -> Self {
        self.finish_error = Some(error);
        self
    }

    fn gated_submit(mut self, entered: Arc<Notify>, gate: Arc<Notify>) -> Self {
        self.submit_entered = Some(entered);
        self.submit_gate = Some(gate);
        self
    }
}

#[async_trait]
impl ScoringService for FakeScoringService {
    async fn fetch_question_set(&self) -> Result<Vec<Question>, TransportError> {
        *self.fetch_calls.lock().await += 1;
        self.question_sets
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<Verdict, TransportError> {
        self.submissions.lock().await.push(submission.clone());
        if let Some(entered) = &self.submit_entered {
            entered.notify_one();
        }
        if let Some(gate) = &self.submit_gate {
            gate.notified().await;
        }
        self.verdicts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted verdict".into())))
    }

    async fn finish_session(&self) -> Result<(), TransportError> {
        *self.finish_calls.lock().await += 1;
        match &self.finish_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn fetch_daily_progress(&self) -> Result<DailyProgress, TransportError> {
        Ok(DailyProgress {
            completed: 0,
            target: 5,
        })
    }
}

fn question(id: i64, prompt: &str, choices: &[&str]) -> Question {
    Question {
        id: QuestionId(id),
        prompt: prompt.to_string(),
        choices: choices.iter().map(|c| c.to_string()).collect(),
    }
}

fn animals_and_colors() -> Vec<Question> {
    vec![
        question(1, "kedi", &["cat", "dog"]),
        question(2, "mavi", &["red", "blue"]),
    ]
}

fn verdict(is_correct: bool, correct_choice: &str, total: i64) -> Verdict {
    Verdict {
        is_correct,
        correct_choice: correct_choice.to_string(),
        authoritative_total_score: total,
        feedback_message: if is_correct {
            "Correct!".into()
        } else {
            format!("Wrong. Correct answer: {correct_choice}")
        },
    }
}

fn network_down() -> TransportError {
    TransportError::Network("connection refused".into())
}

fn drain(rx: &mut broadcast::Receiver<QuizEvent>) -> Vec<QuizEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

fn phases(events: &[QuizEvent]) -> Vec<Phase> {
    events
        .iter()
        .filter_map(|e| match e {
            QuizEvent::PhaseChanged { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn full_run_produces_expected_summary() {
    let service = Arc::new(
        FakeScoringService::with_questions(animals_and_colors())
            .push_verdict(Ok(verdict(true, "cat", 50)))
            .push_verdict(Ok(verdict(false, "blue", 50))),
    );
    let controller = QuizController::new(service.clone());
    let mut rx = controller.subscribe_events();

    assert_eq!(controller.start().await.expect("start"), Phase::Presenting);

    controller.select_choice("cat").await.expect("select cat");
    let first = controller.submit().await.expect("submit cat");
    assert!(first.is_correct);
    assert_eq!(controller.state().await.session_points_earned(), 10);
    assert_eq!(controller.advance().await.expect("advance"), Phase::Presenting);

    controller.select_choice("red").await.expect("select red");
    let second = controller.submit().await.expect("submit red");
    assert!(!second.is_correct);
    assert_eq!(controller.advance().await.expect("advance"), Phase::Completed);

    let summary = controller.summary().await.expect("summary");
    assert_eq!(summary.session_points_earned, 10);
    assert_eq!(summary.authoritative_total_score, Some(50));
    assert_eq!(summary.correct_count, 1);
    assert!(summary.finish_acknowledged);
    assert_eq!(
        summary.missed_items,
        vec![MissedItem {
            prompt: "mavi".into(),
            chosen_choice: "red".into(),
            correct_choice: "blue".into(),
        }]
    );

    let submissions = service.submissions.lock().await.clone();
    assert_eq!(
        submissions,
        vec![
            AnswerSubmission {
                question_id: QuestionId(1),
                chosen_choice: "cat".into()
            },
            AnswerSubmission {
                question_id: QuestionId(2),
                chosen_choice: "red".into()
            },
        ]
    );
    assert_eq!(*service.finish_calls.lock().await, 1);

    let events = drain(&mut rx);
    assert_eq!(
        phases(&events),
        vec![
            Phase::Loading,
            Phase::Presenting,
            Phase::Submitting,
            Phase::Reviewing,
            Phase::Presenting,
            Phase::Submitting,
            Phase::Reviewing,
            Phase::Finishing,
            Phase::Completed,
        ]
    );
    assert!(matches!(events.last(), Some(QuizEvent::Completed { .. })));
}

#[tokio::test]
async fn empty_question_set_completes_without_answering() {
    let service = Arc::new(FakeScoringService::with_questions(Vec::new()));
    let controller = QuizController::new(service.clone());
    let mut rx = controller.subscribe_events();

    assert_eq!(controller.start().await.expect("start"), Phase::Completed);

    let summary = controller.summary().await.expect("summary");
    assert_eq!(summary.session_points_earned, 0);
    assert!(summary.missed_items.is_empty());
    assert!(service.submissions.lock().await.is_empty());
    assert_eq!(*service.finish_calls.lock().await, 0);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, QuizEvent::Completed { .. })));
}

#[tokio::test]
async fn fetch_failure_fails_session_until_retried() {
    let service = Arc::new(
        FakeScoringService::default()
            .push_question_set(Err(network_down()))
            .push_question_set(Ok(animals_and_colors())),
    );
    let controller = QuizController::new(service.clone());

    let err = controller.start().await.expect_err("first start fails");
    assert!(err.is_transport());
    let state = controller.state().await;
    assert_eq!(state.phase(), Phase::Failed);
    assert_eq!(state.last_error(), Some(&network_down()));

    assert_eq!(controller.start().await.expect("retry"), Phase::Presenting);
    assert_eq!(*service.fetch_calls.lock().await, 2);
}

#[tokio::test]
async fn missing_service_fails_start() {
    let controller = QuizController::new(Arc::new(MissingScoringService));
    let err = controller.start().await.expect_err("must fail");
    assert!(matches!(
        err,
        QuizError::Transport(TransportError::Network(_))
    ));
    assert_eq!(controller.state().await.phase(), Phase::Failed);
}

#[tokio::test]
async fn select_choice_before_start_is_validation_error() {
    let controller = QuizController::new(Arc::new(FakeScoringService::default()));
    let err = controller.select_choice("cat").await.expect_err("must fail");
    assert_eq!(
        err,
        QuizError::Validation(ValidationError::WrongPhase {
            operation: "select_choice",
            phase: Phase::Idle
        })
    );
    assert_eq!(controller.state().await.selected_choice(), None);
}

#[tokio::test]
async fn submit_without_selection_is_validation_error() {
    let service = Arc::new(FakeScoringService::with_questions(animals_and_colors()));
    let controller = QuizController::new(service.clone());
    controller.start().await.expect("start");

    let err = controller.submit().await.expect_err("must fail");
    assert!(err.is_validation());
    assert_eq!(controller.state().await.phase(), Phase::Presenting);
    assert!(service.submissions.lock().await.is_empty());
}

#[tokio::test]
async fn submit_failure_keeps_selection_for_retry() {
    let service = Arc::new(
        FakeScoringService::with_questions(animals_and_colors())
            .push_verdict(Err(network_down()))
            .push_verdict(Ok(verdict(true, "cat", 70))),
    );
    let controller = QuizController::new(service.clone());
    let mut rx = controller.subscribe_events();
    controller.start().await.expect("start");
    controller.select_choice("cat").await.expect("select");

    let err = controller.submit().await.expect_err("first submit fails");
    assert!(err.is_transport());
    let state = controller.state().await;
    assert_eq!(state.phase(), Phase::Presenting);
    assert_eq!(state.selected_choice(), Some("cat"));

    let verdict = controller.submit().await.expect("retry submit");
    assert!(verdict.is_correct);
    assert_eq!(controller.state().await.phase(), Phase::Reviewing);
    assert_eq!(service.submissions.lock().await.len(), 2);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, QuizEvent::SubmitFailed { .. })));
}

#[tokio::test]
async fn finish_notification_failure_still_completes() {
    let service = Arc::new(
        FakeScoringService::with_questions(vec![question(1, "kedi", &["cat", "dog"])])
            .push_verdict(Ok(verdict(true, "cat", 10)))
            .failing_finish(TransportError::Network("timed out".into())),
    );
    let controller = QuizController::new(service.clone());
    let mut rx = controller.subscribe_events();
    controller.start().await.expect("start");
    controller.select_choice("cat").await.expect("select");
    controller.submit().await.expect("submit");

    assert_eq!(controller.advance().await.expect("advance"), Phase::Completed);
    let summary = controller.summary().await.expect("summary");
    assert!(!summary.finish_acknowledged);
    assert_eq!(summary.session_points_earned, 10);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, QuizEvent::FinishNotificationFailed { .. })));
}

#[tokio::test]
async fn late_verdict_after_reset_is_dropped() {
    let entered = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let service = Arc::new(
        FakeScoringService::with_questions(animals_and_colors())
            .push_verdict(Ok(verdict(true, "cat", 50)))
            .gated_submit(entered.clone(), gate.clone()),
    );
    let controller = QuizController::new(service);
    controller.start().await.expect("start");
    controller.select_choice("cat").await.expect("select");

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    entered.notified().await;

    let fresh = controller.reset().await;
    gate.notify_one();

    let err = pending
        .await
        .expect("join")
        .expect_err("late verdict must be rejected");
    assert!(matches!(err, QuizError::StaleResponse { live, .. } if live == fresh));

    let state = controller.state().await;
    assert_eq!(state.id(), fresh);
    assert_eq!(state.phase(), Phase::Idle);
    assert_eq!(state.session_points_earned(), 0);
    assert_eq!(state.authoritative_total_score(), None);
}

#[tokio::test]
async fn start_discards_previous_session() {
    let service = Arc::new(
        FakeScoringService::with_questions(animals_and_colors())
            .push_question_set(Ok(animals_and_colors()))
            .push_verdict(Ok(verdict(false, "cat", 0))),
    );
    let controller = QuizController::new(service);
    controller.start().await.expect("start");
    let first = controller.state().await.id();
    controller.select_choice("dog").await.expect("select");
    controller.submit().await.expect("submit");

    controller.start().await.expect("restart");
    let state = controller.state().await;
    assert_ne!(state.id(), first);
    assert_eq!(state.phase(), Phase::Presenting);
    assert!(state.missed_items().is_empty());
    assert_eq!(state.current_index(), 0);
}

#[tokio::test]
async fn server_delta_policy_follows_authoritative_score() {
    let service = Arc::new(
        FakeScoringService::with_questions(animals_and_colors())
            .push_verdict(Ok(verdict(true, "cat", 40)))
            .push_verdict(Ok(verdict(true, "blue", 55))),
    );
    let controller = QuizController::with_policy(service, ScoringPolicy::AuthoritativeDelta);
    controller.start().await.expect("start");
    controller.select_choice("cat").await.expect("select");
    controller.submit().await.expect("submit");
    controller.advance().await.expect("advance");
    controller.select_choice("blue").await.expect("select");
    controller.submit().await.expect("submit");

    assert_eq!(controller.state().await.session_points_earned(), 10 + 15);
}
