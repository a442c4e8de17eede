mod harness;

use atelier_core::{AspectRatio, GenerationRequest, GenerationResult, InputImage, ProviderError, ProviderKind};
use atelier_keys::KeySession;
use atelier_providers::Generator;
use harness::config::{BUNDLED_KEY, ConfigBuilder};
use harness::mock_vendor::{MockResponse, MockVendor};
use serde_json::json;

async fn setup(fallback: MockResponse) -> (MockVendor, Generator, KeySession) {
    let mock = MockVendor::start(fallback).await.unwrap();
    let config = ConfigBuilder::new()
        .with_provider(ProviderKind::OpenAi, &mock.base_url())
        .with_default_provider(ProviderKind::OpenAi)
        .build();

    let generator = Generator::from_config(&config).unwrap();
    let session = KeySession::from_config(&config).unwrap();
    (mock, generator, session)
}

fn chat_response(content: &str) -> MockResponse {
    MockResponse::ok(&json!({"choices": [{"message": {"content": content}}]}))
}

fn images_response(b64: &str) -> MockResponse {
    MockResponse::ok(&json!({"created": 0, "data": [{"b64_json": b64}]}))
}

#[tokio::test]
async fn text_extracts_message_content() {
    let (mock, generator, session) = setup(chat_response("{\"a\":1}")).await;

    let text = generator
        .generate_text(&session.resolve(), "Return a", None)
        .await
        .unwrap();

    assert_eq!(text, "{\"a\":1}");

    let request = mock.last_request();
    assert_eq!(request.path, "/v1/chat/completions");
    assert_eq!(request.header("authorization"), Some(format!("Bearer {BUNDLED_KEY}").as_str()));

    let body = request.json();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["response_format"], json!({"type": "json_object"}));
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Return a");
}

#[tokio::test]
async fn text_with_schema_uses_json_schema_format() {
    let (mock, generator, session) = setup(chat_response("{\"tags\":[]}")).await;
    let schema = json!({"type": "object", "properties": {"tags": {"type": "array"}}});

    generator
        .generate_text(&session.resolve(), "Tag it", Some(&schema))
        .await
        .unwrap();

    let body = mock.last_request().json();
    assert_eq!(body["response_format"]["type"], "json_schema");
    assert_eq!(body["response_format"]["json_schema"]["schema"], schema);
}

#[tokio::test]
async fn image_from_text_maps_ratio_to_nearest_size() {
    let (mock, generator, session) = setup(images_response("Zm9v")).await;

    let image = generator
        .generate_image_from_text(&session.resolve(), "A harbor", AspectRatio::new(16, 9).unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(image.data, "Zm9v");
    assert_eq!(image.mime_type, "image/png");

    let request = mock.last_request();
    assert_eq!(request.path, "/v1/images/generations");

    let body = request.json();
    assert_eq!(body["model"], "gpt-image-1");
    assert_eq!(body["size"], "1536x1024");
    assert_eq!(body["n"], 1);

    let prompt = body["prompt"].as_str().unwrap();
    assert!(prompt.starts_with("A harbor"));
    assert!(prompt.contains("letterbox"));
}

#[tokio::test]
async fn exact_ratio_has_no_letterbox() {
    let (mock, generator, session) = setup(images_response("Zm9v")).await;

    generator
        .generate_image_from_text(&session.resolve(), "A harbor", AspectRatio::new(2, 3).unwrap())
        .await
        .unwrap();

    let body = mock.last_request().json();
    assert_eq!(body["size"], "1024x1536");
    assert!(!body["prompt"].as_str().unwrap().contains("letterbox"));
}

#[tokio::test]
async fn image_edit_uploads_multipart_parts() {
    let (mock, generator, session) = setup(images_response("ZWRpdGVk")).await;
    let request = GenerationRequest::new("Add a hat")
        .with_image(InputImage::new(b"first".to_vec(), "image/png", "cat.png"))
        .with_image(InputImage::new(b"second".to_vec(), "image/jpeg", "hat.jpg"));

    let generation = generator.generate(&session.resolve(), &request).await.unwrap();
    assert!(matches!(generation.result, GenerationResult::Image(ref image) if image.data == "ZWRpdGVk"));

    let recorded = mock.last_request();
    assert_eq!(recorded.path, "/v1/images/edits");
    assert!(
        recorded
            .header("content-type")
            .is_some_and(|value| value.starts_with("multipart/form-data"))
    );

    let body = recorded.body_text();
    assert_eq!(body.matches("name=\"image[]\"").count(), 2);
    assert!(body.contains("filename=\"cat.png\""));
    assert!(body.contains("filename=\"hat.jpg\""));
    assert!(body.contains("Add a hat"));
    assert!(body.contains("1024x1024"));
}

#[tokio::test]
async fn empty_image_data_is_none() {
    let (_mock, generator, session) = setup(MockResponse::ok(&json!({"data": []}))).await;

    let image = generator
        .generate_image_from_text(&session.resolve(), "A harbor", AspectRatio::SQUARE)
        .await
        .unwrap();

    assert!(image.is_none());
}

#[tokio::test]
async fn server_error_without_envelope_uses_status_line() {
    let (mock, generator, session) = setup(MockResponse::text(503, "upstream connect error")).await;

    let err = generator
        .generate_text(&session.resolve(), "prompt", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Generic(_)), "got {err:?}");
    assert!(err.to_string().contains("HTTP 503 Service Unavailable"));
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn insufficient_quota_is_not_retried() {
    let (mock, generator, session) = setup(MockResponse::json(
        429,
        &json!({"error": {"message": "You exceeded your current quota, please check your plan and billing details.", "type": "insufficient_quota", "code": "insufficient_quota"}}),
    ))
    .await;

    let err = generator
        .generate_text(&session.resolve(), "prompt", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::QuotaExceeded(_)), "got {err:?}");
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn rejected_key_fails_validation() {
    let (mock, generator, _) = setup(MockResponse::json(
        401,
        &json!({"error": {"message": "Incorrect API key provided: sk-bad.", "type": "invalid_request_error", "code": "invalid_api_key"}}),
    ))
    .await;

    let validation = generator.validate_api_key(ProviderKind::OpenAi, "sk-bad").await;

    assert!(!validation.is_valid);
    assert!(validation.error.unwrap().contains("OpenAI rejected"));

    let body = mock.last_request().json();
    assert_eq!(body["max_tokens"], 1);
    assert_eq!(mock.last_request().header("authorization"), Some("Bearer sk-bad"));
}
