use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode, Url};

use crate::config::TutorApiConfig;
use crate::error::{parse_error_message, TutorApiError};
use crate::headers::build_headers;
use crate::payload::{ConversationState, SendMessageRequest};
use crate::retry::is_transient_failure;
use crate::url::{endpoint_url, normalize_base_url};

const CONVERSATIONS_SEGMENT: &str = "conversations";
const MESSAGES_SEGMENT: &str = "messages";

#[derive(Debug)]
pub struct TutorApiClient {
    http: Client,
    config: TutorApiConfig,
}

impl TutorApiClient {
    pub fn new(config: TutorApiConfig) -> Result<Self, TutorApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(TutorApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TutorApiConfig {
        &self.config
    }

    pub fn normalized_base_url(&self) -> String {
        normalize_base_url(&self.config.base_url)
    }

    pub fn conversation_url(&self, conversation_id: &str) -> Result<Url, TutorApiError> {
        endpoint_url(
            &self.config.base_url,
            &[CONVERSATIONS_SEGMENT, conversation_id],
        )
    }

    pub fn messages_url(&self, conversation_id: &str) -> Result<Url, TutorApiError> {
        endpoint_url(
            &self.config.base_url,
            &[CONVERSATIONS_SEGMENT, conversation_id, MESSAGES_SEGMENT],
        )
    }

    pub fn build_headers(&self, user_agent: Option<&str>) -> Result<HeaderMap, TutorApiError> {
        let headers = build_headers(&self.config, user_agent)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| TutorApiError::InvalidHeader(format!("invalid key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| TutorApiError::InvalidHeader(format!("invalid value for {key}")))?,
            );
        }
        Ok(out)
    }

    pub fn build_send_request(
        &self,
        conversation_id: &str,
        request: &SendMessageRequest,
    ) -> Result<reqwest::RequestBuilder, TutorApiError> {
        let headers = self.build_headers(self.config.user_agent.as_deref())?;
        Ok(self
            .http
            .post(self.messages_url(conversation_id)?)
            .headers(headers)
            .json(request))
    }

    pub fn build_fetch_request(
        &self,
        conversation_id: &str,
    ) -> Result<reqwest::RequestBuilder, TutorApiError> {
        let headers = self.build_headers(self.config.user_agent.as_deref())?;
        Ok(self
            .http
            .get(self.conversation_url(conversation_id)?)
            .headers(headers))
    }

    /// Posts one message and returns the conversation state after it.
    ///
    /// Sending is not idempotent, so this makes exactly one attempt.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        request: &SendMessageRequest,
    ) -> Result<ConversationState, TutorApiError> {
        let response = self
            .build_send_request(conversation_id, request)?
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }

        decode_state(response).await
    }

    /// Fetches the conversation state, retrying transient failures.
    pub async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationState, TutorApiError> {
        let policy = self.config.retry;
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=policy.max_retries {
            let response = self.build_fetch_request(conversation_id)?.send().await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return decode_state(response).await;
                    }

                    last_status = Some(status);
                    let body = response_text(status, response).await;
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if policy.allows_retry_after(attempt)
                        && is_transient_failure(status.as_u16(), &body)
                    {
                        tokio::time::sleep(policy.delay_for(attempt)).await;
                        continue;
                    }

                    return Err(TutorApiError::Status(status, message));
                }
                Err(error) => {
                    last_error = Some(error.to_string());
                    if policy.allows_retry_after(attempt) {
                        tokio::time::sleep(policy.delay_for(attempt)).await;
                        continue;
                    }
                    return Err(TutorApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(TutorApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }
}

async fn decode_state(response: Response) -> Result<ConversationState, TutorApiError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice::<ConversationState>(&body)?)
}

async fn status_error(status: StatusCode, response: Response) -> TutorApiError {
    let body = response_text(status, response).await;
    TutorApiError::Status(status, parse_error_message(status, &body))
}

async fn response_text(status: StatusCode, response: Response) -> String {
    response.text().await.unwrap_or_else(|_| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    })
}
