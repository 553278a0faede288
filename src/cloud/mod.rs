//! Cloud vision fallback
//!
//! Sends one frame to an external multimodal recognition service when the
//! local pipeline comes up empty. Far higher latency than the local path and
//! typically metered, so it sits behind its own cooldown, and every failure
//! mode here is non-fatal: the scan cycle proceeds with a local-only result.

use std::time::{Duration, Instant};

use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::frame::Frame;

/// Instruction sent with every frame. The service must answer with exactly
/// the JSON shape [`CloudReading`] deserializes.
const EXTRACTION_PROMPT: &str = "Read the machine label in this photo. Reply with a single JSON \
     object and nothing else, with fields: code (string or null, the decoded \
     QR/barcode content if one is visible), counter (integer or null, the \
     number shown on the digital counter display), location (string or null), \
     machine (string or null), confidence (one of \"high\", \"medium\", \"low\").";

/// JPEG quality for the uploaded frame. Counter digits survive compression
/// well; payload size dominates request latency.
const JPEG_QUALITY: u8 = 80;

/// Cloud vision client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Service endpoint URL; empty disables the fallback
    pub endpoint: String,
    /// Environment variable holding the API credential
    pub api_key_env: String,
    /// Minimum interval between requests, independent of the scan cooldown
    pub cooldown_ms: u64,
    /// Request timeout
    pub timeout_ms: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key_env: "METERSCAN_VISION_API_KEY".to_string(),
            cooldown_ms: 10_000,
            timeout_ms: 30_000,
        }
    }
}

/// Confidence tier reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Map the tier onto the pipeline's 0-100 confidence scale.
    pub fn as_confidence(self) -> f32 {
        match self {
            ConfidenceTier::High => 90.0,
            ConfidenceTier::Medium => 60.0,
            ConfidenceTier::Low => 30.0,
        }
    }
}

/// Structured result parsed from the service response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudReading {
    /// Decoded code content, when the service saw one
    pub code: Option<String>,
    /// Counter value read off the display
    pub counter: Option<u64>,
    /// Free-form location hint
    pub location: Option<String>,
    /// Free-form machine identifier hint
    pub machine: Option<String>,
    /// Service-reported confidence tier
    pub confidence: ConfidenceTier,
}

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("cloud vision fallback is not configured")]
    Disabled,
    #[error("cloud vision credential missing from ${0}")]
    MissingCredential(String),
    #[error("cloud vision cooldown active")]
    CooldownActive,
    #[error("failed to encode frame: {0}")]
    Encode(String),
    #[error("cloud vision request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("cloud vision returned HTTP {0}")]
    Http(u16),
    /// Malformed/non-JSON responses are captured distinctly rather than
    /// silently defaulting to null fields.
    #[error("cloud vision response was not parseable: {0}")]
    Parse(String),
}

#[derive(Serialize)]
struct CloudRequest<'a> {
    instruction: &'a str,
    image_media_type: &'a str,
    image_base64: String,
}

/// Client for the external multimodal recognition service.
pub struct CloudVision {
    config: CloudConfig,
    client: reqwest::Client,
    last_request: Mutex<Option<Instant>>,
}

impl CloudVision {
    pub fn new(config: CloudConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            last_request: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.endpoint.is_empty()
    }

    /// Analyze a single frame.
    ///
    /// Declines immediately (no thread blocking) while the cooldown window is
    /// open; the cooldown stamp is taken when a request is actually issued.
    pub async fn analyze(&self, frame: &Frame) -> Result<CloudReading, CloudError> {
        if !self.is_enabled() {
            return Err(CloudError::Disabled);
        }

        let api_key = std::env::var(&self.config.api_key_env)
            .map_err(|_| CloudError::MissingCredential(self.config.api_key_env.clone()))?;

        {
            let mut last = self.last_request.lock();
            if let Some(at) = *last {
                if at.elapsed() < Duration::from_millis(self.config.cooldown_ms) {
                    return Err(CloudError::CooldownActive);
                }
            }
            *last = Some(Instant::now());
        }

        let image_base64 = encode_frame(frame)?;
        debug!(
            endpoint = %self.config.endpoint,
            payload_bytes = image_base64.len(),
            "sending frame to cloud vision"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&CloudRequest {
                instruction: EXTRACTION_PROMPT,
                image_media_type: "image/jpeg",
                image_base64,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "cloud vision request rejected");
            return Err(CloudError::Http(status.as_u16()));
        }

        let body = response.text().await?;
        parse_reading(&body)
    }
}

/// Parse the service reply. The model is instructed to answer with bare
/// JSON, but replies wrapped in markdown fences show up in practice and are
/// tolerated; anything else is a parse failure.
fn parse_reading(body: &str) -> Result<CloudReading, CloudError> {
    let trimmed = body.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(stripped).map_err(|e| CloudError::Parse(e.to_string()))
}

/// JPEG-compress and base64-encode a frame for upload.
fn encode_frame(frame: &Frame) -> Result<String, CloudError> {
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data().to_vec())
        .ok_or_else(|| CloudError::Encode("frame buffer does not match dimensions".into()))?;
    // JPEG has no alpha channel
    let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| CloudError::Encode(e.to_string()))?;

    Ok(base64::engine::general_purpose::STANDARD.encode(&jpeg))
}
