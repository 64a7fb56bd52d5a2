//! Integration tests for `ApiClient` against a mock tutor backend.
//!
//! Each test stands up an `httpmock` server and drives the client through
//! the collaborator ports, checking request shape and failure mapping.

use httpmock::Method::POST;
use httpmock::MockServer;
use maya_core::{ChatPort, PortError, RecordedAudio, SpeechSynthesisPort, TranscriptionPort};
use maya_http::{ApiClient, ApiConfig};
use serde_json::json;
use tempfile::tempdir;

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&ApiConfig::new().with_base_url(server.base_url())).unwrap()
}

#[tokio::test]
async fn synthesize_posts_text_and_returns_audio_bytes() {
    let server = MockServer::start_async().await;
    let wav = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/tts/")
                .json_body(json!({ "text": "नमस्कार" }));
            then.status(200)
                .header("content-type", "audio/wav")
                .body(wav.clone());
        })
        .await;

    let client = client_for(&server);
    let bytes = client.synthesize("नमस्कार").await.unwrap();

    mock.assert_async().await;
    assert_eq!(bytes, wav);
}

#[tokio::test]
async fn synthesize_maps_server_error_to_synthesis_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/tts/");
            then.status(500).body("boom");
        })
        .await;

    let err = client_for(&server).synthesize("hello").await.unwrap_err();
    assert!(
        matches!(err, PortError::SynthesisFailed(ref m) if m.contains("500")),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn synthesize_rejects_empty_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/tts/");
            then.status(200);
        })
        .await;

    let err = client_for(&server).synthesize("hello").await.unwrap_err();
    assert!(matches!(err, PortError::SynthesisFailed(_)));
}

#[tokio::test]
async fn synthesize_is_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/tts/");
            then.status(503);
        })
        .await;

    let _ = client_for(&server).synthesize("hello").await;
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn transcribe_uploads_multipart_file_field() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/transcribe/")
                .body_contains("name=\"file\"")
                .body_contains("filename=\"attempt.m4a\"")
                .body_contains("audio/m4a");
            then.status(200)
                .json_body(json!({ "transcription": "  नमस्कार \n" }));
        })
        .await;

    let dir = tempdir().unwrap();
    let path = dir.path().join("attempt.m4a");
    std::fs::write(&path, b"fake-aac-bytes").unwrap();
    let audio = RecordedAudio::new(&path, "audio/m4a", 1500);

    let transcript = client_for(&server).transcribe(&audio).await.unwrap();

    mock.assert_async().await;
    assert_eq!(transcript, "नमस्कार");
}

#[tokio::test]
async fn transcribe_without_field_is_transcription_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/transcribe/");
            then.status(200).json_body(json!({ "detail": "nope" }));
        })
        .await;

    let dir = tempdir().unwrap();
    let path = dir.path().join("attempt.wav");
    std::fs::write(&path, b"RIFF").unwrap();
    let audio = RecordedAudio::new(&path, "audio/wav", 10);

    let err = client_for(&server).transcribe(&audio).await.unwrap_err();
    assert!(matches!(err, PortError::TranscriptionFailed(_)));
}

#[tokio::test]
async fn transcribe_missing_file_is_input_error() {
    let server = MockServer::start_async().await;
    let audio = RecordedAudio::new("/definitely/not/here.m4a", "audio/m4a", 0);

    let err = client_for(&server).transcribe(&audio).await.unwrap_err();
    assert!(matches!(err, PortError::Input(_)));
}

#[tokio::test]
async fn chat_round_trip() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/")
                .json_body(json!({ "question": "How do I say thank you?" }));
            then.status(200).json_body(json!({ "response": "धन्यवाद" }));
        })
        .await;

    let answer = client_for(&server)
        .ask("How do I say thank you?")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(answer, "धन्यवाद");
}

#[tokio::test]
async fn chat_failure_maps_to_chat_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/");
            then.status(404);
        })
        .await;

    let err = client_for(&server).ask("hi").await.unwrap_err();
    assert!(matches!(err, PortError::ChatFailed(_)));
}
