//! reqwest implementation of [`ScoringService`] against the quiz HTTP API.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Client, Method, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AnswerSubmission, DailyProgress, Question, Verdict},
    error::ApiError,
    protocol::{AnswerRequest, AnswerResponse, DailyProgressResponse, QuizStartResponse},
};
use tracing::{debug, info};

use crate::{credentials::CredentialProvider, error::TransportError, ScoringService};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const START_PATH: &str = "/quiz/start";
const ANSWER_PATH: &str = "/quiz/answer";
const FINISH_PATH: &str = "/quiz/finish";
const DAILY_PROGRESS_PATH: &str = "/quiz/daily_progress";

pub struct HttpScoringClient {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpScoringClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, credentials, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build http client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .header(CONTENT_TYPE, "application/json");

        match self.credentials.obtain_credential().await {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => {
                debug!(%path, "scoring: sending request without credential");
                builder
            }
        }
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response, TransportError> {
        let res = builder.send().await?;
        let status = res.status();
        debug!(%path, status = status.as_u16(), "scoring: response received");

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status.as_u16(), &body).into());
        }
        Ok(res)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, TransportError> {
        let res = self.send(path, builder).await?;
        res.json::<T>()
            .await
            .map_err(|e| TransportError::Decode(format!("{path}: {e}")))
    }
}

#[async_trait]
impl ScoringService for HttpScoringClient {
    async fn fetch_question_set(&self) -> Result<Vec<Question>, TransportError> {
        let builder = self.request(Method::GET, START_PATH).await;
        let response: QuizStartResponse = self.send_json(START_PATH, builder).await?;
        let user_id = response.user_id;
        let questions = response.into_question_set()?;
        info!(user_id = user_id.0, count = questions.len(), "scoring: question set fetched");
        Ok(questions)
    }

    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<Verdict, TransportError> {
        let builder = self
            .request(Method::POST, ANSWER_PATH)
            .await
            .json(&AnswerRequest::from(submission));
        let response: AnswerResponse = self.send_json(ANSWER_PATH, builder).await?;
        Ok(response.into())
    }

    async fn finish_session(&self) -> Result<(), TransportError> {
        let builder = self.request(Method::POST, FINISH_PATH).await;
        self.send(FINISH_PATH, builder).await?;
        Ok(())
    }

    async fn fetch_daily_progress(&self) -> Result<DailyProgress, TransportError> {
        let builder = self.request(Method::GET, DAILY_PROGRESS_PATH).await;
        let response: DailyProgressResponse = self.send_json(DAILY_PROGRESS_PATH, builder).await?;
        Ok(response.into())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
