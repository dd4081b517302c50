//! Request validation for the chat endpoint.

use serde::Deserialize;
use serde_json::Value;

use super::error::DispatchError;
use crate::llm::Message;
use crate::models::ModelRegistry;

/// A validated chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Conversation history, oldest first.
    pub messages: Vec<Message>,
    /// Logical model id, known to the registry at validation time.
    pub model_id: String,
}

/// Validate a raw JSON body of the form `{ messages: [...], model: "..." }`.
pub fn validate(body: &Value, models: &ModelRegistry) -> Result<ChatRequest, DispatchError> {
    let Some(raw_messages) = body.get("messages").and_then(Value::as_array) else {
        return Err(DispatchError::invalid_input("Messages array is required"));
    };

    if raw_messages.is_empty() {
        return Err(DispatchError::invalid_input(
            "Messages array must not be empty",
        ));
    }

    let mut messages = Vec::with_capacity(raw_messages.len());
    for (index, raw) in raw_messages.iter().enumerate() {
        let message = Message::deserialize(raw).map_err(|_| {
            DispatchError::invalid_input(format!(
                "messages[{index}] must have a role of \"user\" or \"assistant\" and string content"
            ))
        })?;
        messages.push(message);
    }

    let model_id = match body.get("model").and_then(Value::as_str) {
        Some(model) if !model.is_empty() => model,
        _ => return Err(DispatchError::invalid_input("Model selection is required")),
    };

    models.get(model_id)?;

    Ok(ChatRequest {
        messages,
        model_id: model_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dispatch::DispatchErrorKind;
    use crate::llm::Role;

    fn check(body: Value) -> Result<ChatRequest, DispatchError> {
        validate(&body, &ModelRegistry::builtin())
    }

    #[test]
    fn accepts_valid_request() {
        let request = check(json!({
            "messages": [
                {"role": "user", "content": "Hola"},
                {"role": "assistant", "content": "¡Hola!"},
                {"role": "user", "content": "¿Qué tal?"}
            ],
            "model": "claude"
        }))
        .unwrap();

        assert_eq!(request.model_id, "claude");
        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(request.messages[2].content, "¿Qué tal?");
    }

    #[test]
    fn missing_messages() {
        let err = check(json!({"model": "claude"})).unwrap_err();
        assert_eq!(err.kind, DispatchErrorKind::InvalidInput);
        assert_eq!(err.message, "Messages array is required");
    }

    #[test]
    fn messages_not_an_array() {
        for messages in [json!("hello"), json!({"role": "user"}), json!(null), json!(3)] {
            let err = check(json!({"messages": messages, "model": "claude"})).unwrap_err();
            assert_eq!(err.message, "Messages array is required");
        }
    }

    #[test]
    fn body_not_an_object() {
        let err = check(json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.kind, DispatchErrorKind::InvalidInput);
    }

    #[test]
    fn empty_messages_rejected() {
        let err = check(json!({"messages": [], "model": "claude"})).unwrap_err();
        assert_eq!(err.kind, DispatchErrorKind::InvalidInput);
        assert_eq!(err.message, "Messages array must not be empty");
    }

    #[test]
    fn malformed_message_names_index() {
        let err = check(json!({
            "messages": [
                {"role": "user", "content": "ok"},
                {"role": "system", "content": "be terse"}
            ],
            "model": "claude"
        }))
        .unwrap_err();
        assert_eq!(err.kind, DispatchErrorKind::InvalidInput);
        assert!(err.message.starts_with("messages[1]"));
    }

    #[test]
    fn missing_or_empty_model() {
        for body in [
            json!({"messages": [{"role": "user", "content": "hi"}]}),
            json!({"messages": [{"role": "user", "content": "hi"}], "model": ""}),
            json!({"messages": [{"role": "user", "content": "hi"}], "model": 4}),
        ] {
            let err = check(body).unwrap_err();
            assert_eq!(err.kind, DispatchErrorKind::InvalidInput);
            assert_eq!(err.message, "Model selection is required");
        }
    }

    #[test]
    fn unknown_model() {
        let err = check(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "model": "gpt-4"
        }))
        .unwrap_err();
        assert_eq!(err.kind, DispatchErrorKind::UnknownModel);
        assert!(err.message.contains("claude, gemini, gpt4"));
    }
}
