use serde_json::{json, Value};
use tutor_api::{
    ConversationMessage, ConversationState, MessageRole, SendMessageRequest, TutorApiClient,
    TutorApiConfig,
};

#[test]
fn unattached_fields_serialize_as_explicit_null() {
    let body = serde_json::to_value(SendMessageRequest::text_only("hi")).expect("serialize");

    assert_eq!(
        body,
        json!({"text": "hi", "code": null, "stdout": null, "stderr": null})
    );
}

#[test]
fn empty_output_serializes_as_empty_string_not_null() {
    let request = SendMessageRequest {
        text: "why".to_string(),
        code: Some("pass".to_string()),
        stdout: Some(String::new()),
        stderr: Some(String::new()),
    };
    let body = serde_json::to_value(&request).expect("serialize");

    assert_eq!(body["stdout"], Value::String(String::new()));
    assert_eq!(body["stderr"], Value::String(String::new()));
}

#[test]
fn send_request_posts_json_body_to_messages_endpoint() {
    let client = TutorApiClient::new(
        TutorApiConfig::new("token").with_base_url("https://tutor.example.com/api"),
    )
    .expect("client");
    let request = SendMessageRequest {
        text: "why".to_string(),
        code: Some("print(5)".to_string()),
        stdout: Some("5\n".to_string()),
        stderr: Some(String::new()),
    };

    let http_request = client
        .build_send_request("conv-1", &request)
        .expect("build request")
        .build()
        .expect("request");

    assert_eq!(http_request.method(), "POST");
    assert_eq!(
        http_request.url().as_str(),
        "https://tutor.example.com/api/conversations/conv-1/messages"
    );
    assert_eq!(
        request_body_json(&http_request),
        json!({"text": "why", "code": "print(5)", "stdout": "5\n", "stderr": ""})
    );
}

#[test]
fn conversation_state_accepts_alternate_field_names() {
    let state: ConversationState = serde_json::from_value(json!({
        "messages": [
            {"role": "user", "content": "hi", "attachedCode": "x = 1"},
            {"role": "assistant", "text": "hello"}
        ]
    }))
    .expect("deserialize state");

    assert_eq!(
        state.messages,
        vec![
            ConversationMessage {
                role: MessageRole::User,
                text: "hi".to_string(),
                attached_code: Some("x = 1".to_string()),
            },
            ConversationMessage {
                role: MessageRole::Assistant,
                text: "hello".to_string(),
                attached_code: None,
            },
        ]
    );
}

#[test]
fn role_names_match_wire_format() {
    for role in [MessageRole::User, MessageRole::Assistant] {
        assert_eq!(
            serde_json::to_value(role).expect("serialize role"),
            Value::String(role.as_str().to_string())
        );
    }
    assert_eq!(MessageRole::Assistant.as_str(), "assistant");
}

#[test]
fn missing_message_list_is_empty_state() {
    let state: ConversationState = serde_json::from_value(json!({})).expect("deserialize state");
    assert!(state.messages.is_empty());
}

fn request_body_json(request: &reqwest::Request) -> Value {
    let body = request
        .body()
        .expect("request should carry JSON body")
        .as_bytes()
        .expect("JSON body should be buffered bytes");
    serde_json::from_slice::<Value>(body).expect("request body should be valid JSON")
}
