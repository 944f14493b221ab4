//! Boundary to the conversation backend.

use async_trait::async_trait;
use tracing::debug;
use tutor_api::{ConversationState, SendMessageRequest, TutorApiClient};

use crate::error::TransportError;
use crate::tracker::OutgoingMessagePayload;

/// Delivers messages to the tutor and reads conversations back.
///
/// A successful `send_message` means the backend accepted the message; the
/// returned state already includes the tutor's reply.
#[async_trait]
pub trait ConversationTransport: Send + Sync + 'static {
    async fn send_message(
        &self,
        conversation_id: &str,
        payload: &OutgoingMessagePayload,
    ) -> Result<ConversationState, TransportError>;

    async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationState, TransportError>;
}

#[async_trait]
impl ConversationTransport for TutorApiClient {
    async fn send_message(
        &self,
        conversation_id: &str,
        payload: &OutgoingMessagePayload,
    ) -> Result<ConversationState, TransportError> {
        let request = SendMessageRequest::from(payload.clone());
        debug!(
            conversation_id,
            url = %self.normalized_base_url(),
            "posting tutor message"
        );
        Ok(TutorApiClient::send_message(self, conversation_id, &request).await?)
    }

    async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationState, TransportError> {
        Ok(TutorApiClient::fetch_conversation(self, conversation_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tutor_api::{TutorApiConfig, TutorApiError};

    use super::*;

    #[tokio::test]
    async fn api_client_rejects_missing_token_before_io() {
        let client = TutorApiClient::new(TutorApiConfig::new("  ")).expect("client builds");
        let transport: Arc<dyn ConversationTransport> = Arc::new(client);

        let payload = OutgoingMessagePayload {
            text: "hi".to_string(),
            code: None,
            stdout: None,
            stderr: None,
        };
        let error = transport
            .send_message("c1", &payload)
            .await
            .expect_err("missing token fails");

        assert!(matches!(
            error,
            TransportError::Api(TutorApiError::MissingAccessToken)
        ));
        assert!(!error.is_retryable());
    }
}
