use futures::StreamExt;
use mockito::Matcher;
use parley_core::chat::{ReplyChunk, StreamRequest};
use parley_core::types::{Attachment, Message};
use parley_llm::{GeminiProvider, ModelStreamClient, ProviderConfig, MISSING_API_KEY_MESSAGE};
use serde_json::json;
use std::sync::Arc;

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|e| format!("data: {}\r\n\r\n", e))
        .collect()
}

fn text_event(text: &str) -> serde_json::Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

fn provider_for(server: &mockito::ServerGuard) -> GeminiProvider {
    let config = ProviderConfig::new(server.url())
        .with_api_key("test-key")
        .with_system_instruction("Be brief.");
    GeminiProvider::new(config).unwrap()
}

async fn collect(provider: &GeminiProvider, request: StreamRequest) -> Vec<ReplyChunk> {
    provider.stream_reply(request).collect().await
}

#[tokio::test]
async fn streams_text_chunks_in_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-2.5-flash:streamGenerateContent")
        .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{"role": "user", "parts": [{"text": "Plan a trip"}]}],
            "systemInstruction": {"parts": [{"text": "Be brief."}]}
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse(&[text_event("Hel"), text_event("lo"), text_event(" world")]))
        .create_async()
        .await;

    let provider = provider_for(&server);
    let chunks = collect(&provider, StreamRequest::new("Plan a trip")).await;

    mock.assert_async().await;
    let text: String = chunks.iter().map(|c| c.text_delta()).collect();
    assert_eq!(text, "Hello world");
    assert!(chunks.iter().all(|c| !c.is_failure()));
}

#[tokio::test]
async fn search_uses_search_model_and_tool() {
    let mut server = mockito::Server::new_async().await;
    let grounded = json!({
        "candidates": [{
            "content": {"parts": [{"text": "It is sunny."}]},
            "groundingMetadata": {"groundingChunks": [
                {"web": {"uri": "https://weather.example/today", "title": "Weather Today"}}
            ]}
        }]
    });
    let mock = server
        .mock("POST", "/models/gemini-3-pro-preview:streamGenerateContent")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({"tools": [{"googleSearch": {}}]})))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse(&[grounded]))
        .create_async()
        .await;

    let provider = provider_for(&server);
    let chunks = collect(&provider, StreamRequest::new("weather?").with_search(true)).await;

    mock.assert_async().await;
    assert_eq!(chunks.len(), 1);
    let source = chunks[0].grounding().unwrap().web_sources().next().unwrap().clone();
    assert_eq!(source.title, "Weather Today");
}

#[tokio::test]
async fn history_and_images_are_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-2.5-flash:streamGenerateContent")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "first"}]},
                {"role": "model", "parts": [{"text": "reply"}]},
                {"role": "user", "parts": [{"inlineData": {"mimeType": "image/png", "data": "iVBO"}}]}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse(&[text_event("A cat.")]))
        .create_async()
        .await;

    let mut reply = Message::model_placeholder();
    reply.content = "reply".into();
    let history = vec![Arc::new(Message::user("first", vec![])), Arc::new(reply)];
    let request = StreamRequest::new("")
        .with_history(history)
        .with_attachments(vec![Attachment::new("image/png", "iVBO")]);

    let provider = provider_for(&server);
    let chunks = collect(&provider, request).await;

    mock.assert_async().await;
    assert_eq!(chunks, vec![ReplyChunk::text("A cat.")]);
}

#[tokio::test]
async fn missing_key_yields_single_failure_without_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let provider = GeminiProvider::new(ProviderConfig::new(server.url())).unwrap();
    let chunks = collect(&provider, StreamRequest::new("hello")).await;

    mock.assert_async().await;
    assert_eq!(chunks, vec![ReplyChunk::failed(MISSING_API_KEY_MESSAGE)]);
}

#[tokio::test]
async fn http_error_becomes_failure_chunk() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", Matcher::Any)
        .with_status(500)
        .with_body(r#"{"error":{"code":500,"message":"backend exploded"}}"#)
        .create_async()
        .await;

    let provider = provider_for(&server);
    let chunks = collect(&provider, StreamRequest::new("hello")).await;

    assert_eq!(chunks.len(), 1);
    match &chunks[0] {
        ReplyChunk::Failed { message } => {
            assert!(message.starts_with("Error: "));
            assert!(message.contains("backend exploded"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_event_ends_stream_after_good_chunks() {
    let mut server = mockito::Server::new_async().await;
    let body = format!("{}data: {{not json\r\n\r\n{}", sse(&[text_event("partial")]), sse(&[text_event("never")]));
    server
        .mock("POST", Matcher::Any)
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let provider = provider_for(&server);
    let chunks = collect(&provider, StreamRequest::new("hello")).await;

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], ReplyChunk::text("partial"));
    assert!(chunks[1].is_failure());
    assert!(chunks[1].text_delta().starts_with("Error: "));
}

#[tokio::test]
async fn connection_failure_becomes_failure_chunk() {
    let config = ProviderConfig::new("http://127.0.0.1:9").with_api_key("k");
    let provider = GeminiProvider::new(config).unwrap();
    let chunks = collect(&provider, StreamRequest::new("hello")).await;

    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].is_failure());
}
