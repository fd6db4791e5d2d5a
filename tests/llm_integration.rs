//! Integration tests against the live LLM APIs.
//!
//! These tests make real API calls.
//! Run with: ANTHROPIC_API_KEY=your_key cargo test --test llm_integration -- --ignored

use std::sync::Arc;

use serde_json::json;

use docuforge::agents::HookGenerator;
use docuforge::llm::{
    AnthropicProvider, GenerationRequest, LlmProvider, LlmProviderExt, Message,
    OpenAiCompatibleProvider,
};
use docuforge::stage::Stage;
use docuforge::state::PipelineState;

fn anthropic() -> AnthropicProvider {
    AnthropicProvider::from_env()
        .expect("ANTHROPIC_API_KEY environment variable must be set for integration tests")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let client = anthropic();

    let request = GenerationRequest::new(
        "",
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(content.contains('4'), "Response should contain '4', got: {}", content);
    assert!(response.usage.total_tokens > 0, "Should have token usage");
}

#[tokio::test]
#[ignore]
async fn test_health_round_trip_phrase() {
    let client = anthropic();
    let reply = client
        .complete(
            "",
            "Reply with 'API test successful' and nothing else.",
            client.default_model(),
            50,
            0.0,
        )
        .await
        .expect("completion");
    assert!(reply.to_lowercase().contains("successful"), "got: {}", reply);
}

#[tokio::test]
#[ignore]
async fn test_hook_stage_live() {
    let stage = HookGenerator::new(Arc::new(anthropic()));
    let seed = PipelineState::create(json!({
        "hook_assignment": {"topic": "Why octopuses have three hearts", "hook_count": 3}
    }))
    .expect("seed");

    let out = stage.run(seed).await;

    assert!(out.errors().is_empty(), "errors: {:?}", out.errors());
    let confidence = out.confidence("hook");
    assert!((0.0..=1.0).contains(&confidence));
    assert!(out.get_str("hook_text").is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
#[ignore] // Needs OPENAI_API_KEY
async fn test_openai_compatible_generation() {
    let client = OpenAiCompatibleProvider::from_env()
        .expect("OPENAI_API_KEY environment variable must be set");
    let reply = client
        .complete("Be concise.", "Name the largest planet. One word.", "", 10, 0.0)
        .await
        .expect("completion");
    assert!(reply.to_lowercase().contains("jupiter"), "got: {}", reply);
}
