//! Client for the tutor backend.
//!
//! One [`ApiClient`] is created per app session and shared (`Arc`) by every
//! component that needs a collaborator port.

use async_trait::async_trait;
use maya_core::{ChatPort, PortError, RecordedAudio, SpeechSynthesisPort, TranscriptionPort};
use reqwest::multipart::{Form, Part};
use url::Url;

use crate::config::ApiConfig;
use crate::dto::{ChatRequest, ChatResponse, TranscriptionResponse, TtsRequest};
use crate::error::{ApiError, ApiResult};

const TTS_PATH: &str = "tts/";
const TRANSCRIBE_PATH: &str = "transcribe/";
const CHAT_PATH: &str = "chat/";

/// `reqwest`-backed client implementing every collaborator port.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: normalize_base(&config.base_url)?,
        })
    }

    /// Create a client from `MAYA_*` environment overrides.
    pub fn from_env() -> ApiResult<Self> {
        Self::new(&ApiConfig::from_env())
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Request synthesized speech for `text`, returning WAV bytes.
    pub async fn text_to_speech(&self, text: &str) -> ApiResult<Vec<u8>> {
        let url = self.endpoint(TTS_PATH)?;
        tracing::debug!(%url, chars = text.chars().count(), "POST tts");

        let response = self
            .http
            .post(url.clone())
            .json(&TtsRequest { text })
            .send()
            .await?;
        let response = check_status(response, &url)?;

        let bytes = response.bytes().await?;
        tracing::debug!(%url, bytes = bytes.len(), "tts response");

        if bytes.is_empty() {
            return Err(ApiError::InvalidResponse {
                message: "empty audio body".to_string(),
            });
        }
        Ok(bytes.to_vec())
    }

    /// Upload a recording and return the trimmed transcript.
    pub async fn transcribe_file(&self, audio: &RecordedAudio) -> ApiResult<String> {
        let url = self.endpoint(TRANSCRIBE_PATH)?;
        let bytes = tokio::fs::read(audio.path()).await?;
        tracing::debug!(
            %url,
            file = %audio.file_name(),
            mime = %audio.mime_type,
            bytes = bytes.len(),
            "POST transcribe"
        );

        let part = Part::bytes(bytes)
            .file_name(audio.file_name())
            .mime_str(&audio.mime_type)?;
        let form = Form::new().part("file", part);

        let response = self.http.post(url.clone()).multipart(form).send().await?;
        let response = check_status(response, &url)?;

        let body: TranscriptionResponse =
            response
                .json()
                .await
                .map_err(|e| ApiError::InvalidResponse {
                    message: format!("expected {{\"transcription\": string}}: {e}"),
                })?;

        let transcript = body.transcription.trim().to_string();
        tracing::debug!(%url, transcript = %transcript, "transcribe response");
        Ok(transcript)
    }

    /// Ask the chat assistant a question.
    pub async fn chat(&self, question: &str) -> ApiResult<String> {
        let url = self.endpoint(CHAT_PATH)?;
        tracing::debug!(%url, "POST chat");

        let response = self
            .http
            .post(url.clone())
            .json(&ChatRequest { question })
            .send()
            .await?;
        let response = check_status(response, &url)?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                message: format!("expected {{\"response\": string}}: {e}"),
            })?;
        Ok(body.response)
    }
}

/// Ensure the base URL ends in `/` so `join` appends instead of replacing the
/// last path segment.
fn normalize_base(raw: &str) -> ApiResult<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Ok(Url::parse(&raw)?)
}

fn check_status(response: reqwest::Response, url: &Url) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    tracing::warn!(%url, status = status.as_u16(), "Backend request failed");
    Err(ApiError::RequestFailed {
        status: status.as_u16(),
        url: url.to_string(),
    })
}

// ============================================================================
// Port implementations
// ============================================================================

#[async_trait]
impl SpeechSynthesisPort for ApiClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, PortError> {
        self.text_to_speech(text)
            .await
            .map_err(ApiError::into_synthesis)
    }
}

#[async_trait]
impl TranscriptionPort for ApiClient {
    async fn transcribe(&self, audio: &RecordedAudio) -> Result<String, PortError> {
        self.transcribe_file(audio)
            .await
            .map_err(ApiError::into_transcription)
    }
}

#[async_trait]
impl ChatPort for ApiClient {
    async fn ask(&self, question: &str) -> Result<String, PortError> {
        self.chat(question).await.map_err(ApiError::into_chat)
    }
}
