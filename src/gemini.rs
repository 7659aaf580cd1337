/// Thin typed client for the Gemini REST API
///
/// Covers batch generation, SSE streamed generation, speech synthesis and
/// the long-running video generation operation. Request/response bodies
/// mirror the vendor wire format (camelCase JSON); anything the commands
/// never touch is left unmodeled.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::time::Duration;

use crate::media::{self, InlineMedia};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generation can run for minutes on the pro model
const REQUEST_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline(media: InlineMedia) -> Self {
        Part {
            text: None,
            inline_data: Some(Blob {
                mime_type: media.mime_type,
                data: media.data,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Content {
            role: Some("user".to_string()),
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Content {
            role: Some("model".to_string()),
            parts,
        }
    }

    pub fn system(text: &str) -> Self {
        Content {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechSettings>,
}

impl GenerationConfig {
    /// Audio-only response spoken by a prebuilt voice
    pub fn audio_voice(voice_name: &str) -> Self {
        GenerationConfig {
            response_modalities: Some(vec!["AUDIO".to_string()]),
            speech_config: Some(SpeechSettings::prebuilt(voice_name)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSettings {
    pub voice_config: VoiceConfig,
}

impl SpeechSettings {
    pub fn prebuilt(voice_name: &str) -> Self {
        SpeechSettings {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice_name.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<&'a GenerationConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> String {
        let mut out = String::new();
        if let Some(content) = self.candidates.first().and_then(|c| c.content.as_ref()) {
            for part in &content.parts {
                if let Some(text) = &part.text {
                    out.push_str(text);
                }
            }
        }
        out
    }

    /// First inline-data part of the first candidate (TTS audio)
    pub fn inline_data(&self) -> Option<&Blob> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.iter().find_map(|p| p.inline_data.as_ref()))
    }
}

// Long-running video generation operation

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub response: Option<OperationResponse>,
    pub error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSample {
    pub video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    pub uri: Option<String>,
}

impl Operation {
    /// URI of the first generated video, if the operation produced one
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoRequest<'a> {
    instances: Vec<VideoInstance<'a>>,
    parameters: VideoParameters<'a>,
}

#[derive(Serialize)]
struct VideoInstance<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters<'a> {
    sample_count: u32,
    aspect_ratio: &'a str,
    resolution: &'a str,
}

pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(GeminiClient { http, api_key })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn model_url(&self, model: &str, verb: &str) -> String {
        format!("{}/models/{}:{}?key={}", BASE_URL, model, verb, self.api_key)
    }

    /// Batch content generation
    pub fn generate_content(
        &self,
        model: &str,
        contents: &[Content],
        system_instruction: Option<&str>,
        generation_config: Option<&GenerationConfig>,
    ) -> Result<GenerateContentResponse> {
        let request = GenerateContentRequest {
            contents,
            system_instruction: system_instruction.map(Content::system),
            generation_config,
        };

        let response = self
            .http
            .post(self.model_url(model, "generateContent"))
            .json(&request)
            .send()
            .context("Request to the Gemini API failed")?;

        Self::check_status(response)?
            .json()
            .context("Failed to parse Gemini response")
    }

    /// Streamed content generation over SSE. `on_chunk` fires once per text
    /// chunk; the concatenated text is returned at the end.
    pub fn generate_content_stream(
        &self,
        model: &str,
        contents: &[Content],
        system_instruction: Option<&str>,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<String> {
        let request = GenerateContentRequest {
            contents,
            system_instruction: system_instruction.map(Content::system),
            generation_config: None,
        };

        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            BASE_URL, model, self.api_key
        );
        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .context("Request to the Gemini API failed")?;
        let response = Self::check_status(response)?;

        let mut full_text = String::new();
        let reader = BufReader::new(response);
        for line in reader.lines() {
            let line = line.context("Stream from the Gemini API broke off")?;
            let Some(payload) = line.strip_prefix("data: ") else {
                continue;
            };
            if payload.trim().is_empty() {
                continue;
            }
            let chunk: GenerateContentResponse = serde_json::from_str(payload)
                .context("Failed to parse streamed Gemini chunk")?;
            let text = chunk.text();
            if !text.is_empty() {
                on_chunk(&text);
                full_text.push_str(&text);
            }
        }

        Ok(full_text)
    }

    /// Synthesize speech for `text` and return the raw 24 kHz mono PCM bytes
    pub fn generate_speech(&self, model: &str, text: &str, voice: &str) -> Result<Vec<u8>> {
        let contents = [Content {
            role: None,
            parts: vec![Part::text(text)],
        }];
        let config = GenerationConfig::audio_voice(voice);

        let response = self.generate_content(model, &contents, None, Some(&config))?;
        let blob = response
            .inline_data()
            .context("No audio data in the API response")?;
        media::base64_decode(&blob.data)
    }

    /// Submit a video generation job; returns the pending operation
    pub fn generate_video(
        &self,
        model: &str,
        prompt: &str,
        aspect_ratio: &str,
        resolution: &str,
    ) -> Result<Operation> {
        let request = GenerateVideoRequest {
            instances: vec![VideoInstance { prompt }],
            parameters: VideoParameters {
                sample_count: 1,
                aspect_ratio,
                resolution,
            },
        };

        let response = self
            .http
            .post(self.model_url(model, "predictLongRunning"))
            .json(&request)
            .send()
            .context("Request to the Gemini API failed")?;

        Self::check_status(response)?
            .json()
            .context("Failed to parse video operation")
    }

    /// Fetch the current state of a long-running operation by name
    pub fn poll_operation(&self, name: &str) -> Result<Operation> {
        let url = format!("{}/{}?key={}", BASE_URL, name, self.api_key);
        let response = self
            .http
            .get(url)
            .send()
            .context("Request to the Gemini API failed")?;

        Self::check_status(response)?
            .json()
            .context("Failed to parse video operation")
    }

    /// Download a generated artifact by URI (the key is appended, as the
    /// download links require it)
    pub fn download(&self, uri: &str) -> Result<Vec<u8>> {
        let url = format!("{}&key={}", uri, self.api_key);
        let response = self
            .http
            .get(url)
            .send()
            .context("Failed to download generated video")?;
        let response = Self::check_status(response)?;
        let bytes = response
            .bytes()
            .context("Failed to read generated video")?;
        Ok(bytes.to_vec())
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        bail!("Gemini API returned {}: {}", status, body.trim())
    }
}
