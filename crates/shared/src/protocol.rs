use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AnswerSubmission, DailyProgress, Question, QuestionId, UserId, Verdict};

pub const MIN_CHOICES: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStartResponse {
    pub user_id: UserId,
    #[serde(default)]
    pub clerk_id: String,
    pub questions: Vec<QuestionPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub word_id: i64,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub correct: bool,
    pub correct_answer: String,
    pub user_score: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyProgressResponse {
    pub completed: i64,
    pub target: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("question {id} has {count} choices, at least two required")]
    TooFewChoices { id: i64, count: usize },
    #[error("question {id} repeats choice '{choice}'")]
    DuplicateChoice { id: i64, choice: String },
}

impl TryFrom<QuestionPayload> for Question {
    type Error = PayloadError;

    fn try_from(value: QuestionPayload) -> Result<Self, Self::Error> {
        if value.options.len() < MIN_CHOICES {
            return Err(PayloadError::TooFewChoices {
                id: value.id,
                count: value.options.len(),
            });
        }

        let mut seen = HashSet::new();
        for option in &value.options {
            if !seen.insert(option.as_str()) {
                return Err(PayloadError::DuplicateChoice {
                    id: value.id,
                    choice: option.clone(),
                });
            }
        }

        Ok(Question {
            id: QuestionId(value.id),
            prompt: value.question,
            choices: value.options,
        })
    }
}

impl QuizStartResponse {
    /// Converts the payload into a question set, preserving server order.
    /// An empty list is valid.
    pub fn into_question_set(self) -> Result<Vec<Question>, PayloadError> {
        self.questions.into_iter().map(Question::try_from).collect()
    }
}

impl From<&AnswerSubmission> for AnswerRequest {
    fn from(value: &AnswerSubmission) -> Self {
        Self {
            word_id: value.question_id.0,
            answer: value.chosen_choice.clone(),
        }
    }
}

impl From<AnswerResponse> for Verdict {
    fn from(value: AnswerResponse) -> Self {
        Self {
            is_correct: value.correct,
            correct_choice: value.correct_answer,
            authoritative_total_score: value.user_score,
            feedback_message: value.message,
        }
    }
}

impl From<DailyProgressResponse> for DailyProgress {
    fn from(value: DailyProgressResponse) -> Self {
        Self {
            completed: value.completed,
            target: value.target,
        }
    }
}
