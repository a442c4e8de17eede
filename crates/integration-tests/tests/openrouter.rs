mod harness;

use atelier_core::{AspectRatio, GenerationRequest, InputImage, ProviderError, ProviderKind};
use atelier_keys::KeySession;
use atelier_providers::Generator;
use harness::config::ConfigBuilder;
use harness::mock_vendor::{MockResponse, MockVendor};
use serde_json::json;

async fn setup(fallback: MockResponse) -> (MockVendor, Generator, KeySession) {
    let mock = MockVendor::start(fallback).await.unwrap();
    let config = ConfigBuilder::new()
        .with_provider(ProviderKind::OpenRouter, &mock.base_url())
        .configure(ProviderKind::OpenRouter, |provider| {
            provider.app_url = Some("https://atelier.example".to_owned());
            provider.app_name = Some("Atelier".to_owned());
        })
        .with_default_provider(ProviderKind::OpenRouter)
        .build();

    let generator = Generator::from_config(&config).unwrap();
    let session = KeySession::from_config(&config).unwrap();
    (mock, generator, session)
}

#[tokio::test]
async fn image_from_json_encoded_content_string() {
    let (mock, generator, session) = setup(MockResponse::ok(&json!({
        "choices": [{"message": {
            "role": "assistant",
            "content": "[{\"type\":\"image_url\",\"image_url\":{\"url\":\"data:image/png;base64,Zm9v\"}}]"
        }}]
    })))
    .await;

    let image = generator
        .generate_image_from_text(&session.resolve(), "A fox", AspectRatio::SQUARE)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(image.data, "Zm9v");
    assert_eq!(image.mime_type, "image/png");

    let request = mock.last_request();
    assert_eq!(request.path, "/v1/chat/completions");
    assert_eq!(request.header("http-referer"), Some("https://atelier.example"));
    assert_eq!(request.header("x-title"), Some("Atelier"));

    let body = request.json();
    assert_eq!(body["model"], "google/gemini-2.5-flash-image");
    assert_eq!(body["modalities"], json!(["image", "text"]));
}

#[tokio::test]
async fn image_from_images_array_with_input_parts() {
    let (mock, generator, session) = setup(MockResponse::ok(&json!({
        "choices": [{"message": {
            "role": "assistant",
            "content": "Done.",
            "images": [{"type": "image_url", "image_url": {"url": "data:image/webp;base64,YmFy"}}]
        }}]
    })))
    .await;

    let request = GenerationRequest::new("Swap the sky")
        .with_image(InputImage::new(vec![0xff, 0xd8], "image/jpeg", "photo.jpg"))
        .with_aspect_ratio(AspectRatio::new(4, 3).unwrap());

    let image = generator
        .generate_image(&session.resolve(), &request)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(image.data, "YmFy");
    assert_eq!(image.mime_type, "image/webp");

    let body = mock.last_request().json();
    let parts = body["messages"][0]["content"].as_array().unwrap();
    assert_eq!(parts[0]["type"], "text");
    assert!(parts[0]["text"].as_str().unwrap().contains("4:3"));
    assert_eq!(parts[1]["type"], "image_url");
    assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,/9g=");
}

#[tokio::test]
async fn text_reply_without_image_is_none() {
    let (_mock, generator, session) = setup(MockResponse::ok(&json!({
        "choices": [{"message": {"role": "assistant", "content": "I can only describe it."}}]
    })))
    .await;

    let image = generator
        .generate_image_from_text(&session.resolve(), "A fox", AspectRatio::SQUARE)
        .await
        .unwrap();

    assert!(image.is_none());
}

#[tokio::test]
async fn payment_required_is_billing_error() {
    let (mock, generator, session) = setup(MockResponse::json(
        402,
        &json!({"error": {"message": "Insufficient credits", "code": 402}}),
    ))
    .await;

    let err = generator
        .generate_image_from_text(&session.resolve(), "A fox", AspectRatio::SQUARE)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Generic(_)), "got {err:?}");
    let message = err.to_string();
    assert!(message.contains("Insufficient credits on the OpenRouter account"));
    assert!(message.contains("billing"));
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn payment_required_on_text_is_billing_error() {
    let (_mock, generator, session) = setup(MockResponse::text(402, "")).await;

    let err = generator
        .generate_text(&session.resolve(), "prompt", None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Insufficient credits"));
}

#[tokio::test]
async fn text_accepts_content_parts() {
    let (_mock, generator, session) = setup(MockResponse::ok(&json!({
        "choices": [{"message": {"content": [{"type": "text", "text": "{\"a\":1}"}]}}]
    })))
    .await;

    let text = generator
        .generate_text(&session.resolve(), "prompt", None)
        .await
        .unwrap();

    assert_eq!(text, "{\"a\":1}");
}
