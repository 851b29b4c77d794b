//! Integration tests for the chat session.

use deepdive_core::brain::{Brain, MockLlmProvider};
use deepdive_core::chat::ChatSession;
use deepdive_core::config::{ChatConfig, LlmConfig};
use deepdive_core::error::LlmError;
use deepdive_core::types::Role;
use std::sync::Arc;

fn create_chat(provider: Arc<MockLlmProvider>) -> ChatSession {
    let brain = Arc::new(Brain::new(provider, &LlmConfig::default()));
    ChatSession::new(brain, &ChatConfig::default())
}

#[tokio::test]
async fn test_conversation_carries_history() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::text_response("QKD is quantum key distribution."));
    provider.queue_response(MockLlmProvider::text_response("東京とドイツで導入されています。"));
    let chat = create_chat(provider.clone());

    chat.send("What is QKD?").await.unwrap();
    let reply = chat.send("どこで使われていますか？").await.unwrap();
    assert_eq!(reply, "東京とドイツで導入されています。");

    let requests = provider.requests();
    let second = &requests[1].messages;
    assert_eq!(second[0].role, Role::System);
    let turns: Vec<(Role, &str)> = second[1..]
        .iter()
        .map(|m| (m.role, m.text.as_str()))
        .collect();
    assert_eq!(
        turns,
        vec![
            (Role::User, "What is QKD?"),
            (Role::Model, "QKD is quantum key distribution."),
            (Role::User, "どこで使われていますか？"),
        ]
    );
}

#[tokio::test]
async fn test_failed_turn_shows_fallback_and_is_not_replayed() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_error(LlmError::RateLimited {
        retry_after_secs: 10,
    });
    provider.queue_response(MockLlmProvider::text_response("Hello!"));
    let chat = create_chat(provider.clone());

    let fallback = chat.send("first").await.unwrap();
    assert_eq!(fallback, ChatConfig::default().fallback_reply);
    chat.send("second").await.unwrap();

    let texts: Vec<String> = chat.transcript().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["first", fallback.as_str(), "second", "Hello!"]);

    // The remote side only ever saw the turn that succeeded.
    let second_request = &provider.requests()[1].messages;
    assert_eq!(second_request.len(), 2);
    assert_eq!(second_request[1].text, "second");
}

#[tokio::test]
async fn test_reset_starts_a_new_conversation() {
    let provider = Arc::new(MockLlmProvider::new());
    let chat = create_chat(provider.clone());

    chat.send("one").await.unwrap();
    chat.reset();
    assert!(chat.transcript().is_empty());
    chat.send("two").await.unwrap();

    let last = provider.requests().last().unwrap().messages.clone();
    assert_eq!(last.len(), 2);
    assert_eq!(last[1].text, "two");
}

#[tokio::test]
async fn test_inert_chat_never_calls_out() {
    let chat = ChatSession::inert(&ChatConfig::default());
    assert!(chat.is_inert());
    assert!(chat.send("hello").await.is_none());
    assert!(chat.transcript().is_empty());
}
