//! Request models for the Qolaba API.
//!
//! Optional fields are skipped on serialization so request bodies carry
//! only what the caller set or the defaults fill in.

use crate::validate::{Checker, Validate, ValidationErrors};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_image_model() -> String {
    "flux".to_string()
}

fn default_dimension() -> u32 {
    512
}

fn default_steps() -> u32 {
    20
}

fn default_guidance_scale() -> f64 {
    7.5
}

fn default_strength() -> f64 {
    0.8
}

fn default_tts_voice() -> String {
    "alloy".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_tts_format() -> String {
    "mp3".to_string()
}

fn default_speed() -> f64 {
    1.0
}

fn default_chat_model() -> String {
    "gpt-4".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_chunk_size() -> u32 {
    1000
}

fn default_chunk_overlap() -> u32 {
    200
}

/// Generate an image from a text prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextToImageRequest {
    /// Text description of the image to generate.
    pub prompt: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    /// Image width in pixels.
    #[serde(default = "default_dimension")]
    pub width: u32,
    /// Image height in pixels.
    #[serde(default = "default_dimension")]
    pub height: u32,
    /// Number of inference steps.
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    /// Random seed for reproducibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// What to avoid in the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

impl Validate for TextToImageRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker.non_empty("prompt", &self.prompt);
        checker.range_u32("width", self.width, 64, 2048);
        checker.range_u32("height", self.height, 64, 2048);
        checker.range_u32("steps", self.steps, 1, 100);
        checker.range_f64("guidance_scale", self.guidance_scale, 1.0, 20.0);
        checker.finish()
    }
}

/// Transform a source image guided by a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageToImageRequest {
    /// Source image URL or base64 data.
    pub image: String,
    pub prompt: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    /// Transformation strength.
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Validate for ImageToImageRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker.non_empty("image", &self.image);
        checker.non_empty("prompt", &self.prompt);
        checker.range_f64("strength", self.strength, 0.0, 1.0);
        checker.range_u32("steps", self.steps, 1, 100);
        checker.range_f64("guidance_scale", self.guidance_scale, 1.0, 20.0);
        checker.finish()
    }
}

/// Repaint a masked region of an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InpaintingRequest {
    /// Source image URL or base64 data.
    pub image: String,
    /// Mask image URL or base64 data.
    pub mask: String,
    /// Text description of what to paint.
    pub prompt: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Validate for InpaintingRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker.non_empty("image", &self.image);
        checker.non_empty("mask", &self.mask);
        checker.non_empty("prompt", &self.prompt);
        checker.range_u32("steps", self.steps, 1, 100);
        checker.range_f64("guidance_scale", self.guidance_scale, 1.0, 20.0);
        checker.finish()
    }
}

/// Replace the background of an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceBackgroundRequest {
    /// Source image URL or base64 data.
    pub image: String,
    /// Text description of the new background.
    pub prompt: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Validate for ReplaceBackgroundRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker.non_empty("image", &self.image);
        checker.non_empty("prompt", &self.prompt);
        checker.range_u32("steps", self.steps, 1, 100);
        checker.range_f64("guidance_scale", self.guidance_scale, 1.0, 20.0);
        checker.finish()
    }
}

/// Allowed text-to-speech voices.
pub const TTS_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// Allowed audio output formats.
pub const TTS_FORMATS: &[&str] = &["mp3", "opus", "aac", "flac"];

/// Synthesize speech from text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextToSpeechRequest {
    /// Text to convert to speech.
    pub text: String,
    #[serde(default = "default_tts_voice")]
    pub voice: String,
    #[serde(default = "default_tts_model")]
    pub model: String,
    /// Audio format.
    #[serde(default = "default_tts_format")]
    pub response_format: String,
    /// Speech speed.
    #[serde(default = "default_speed")]
    pub speed: f64,
}

impl Validate for TextToSpeechRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker.non_empty("text", &self.text);
        checker.max_len("text", &self.text, 4000);
        checker.one_of("voice", &self.voice, TTS_VOICES);
        checker.one_of("response_format", &self.response_format, TTS_FORMATS);
        checker.range_f64("speed", self.speed, 0.25, 4.0);
        checker.finish()
    }
}

/// Allowed chat message roles.
pub const CHAT_ROLES: &[&str] = &["system", "user", "assistant"];

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role (system, user, assistant).
    pub role: String,
    /// Message content.
    pub content: String,
}

/// Chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Maximum response tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Nucleus sampling parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
}

impl Validate for ChatRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker.check(
            !self.messages.is_empty(),
            "messages",
            "non_empty",
            "messages cannot be empty",
        );
        checker.check(
            self.messages.len() <= 50,
            "messages",
            "max_length",
            "too many messages (max 50)",
        );
        for (index, message) in self.messages.iter().enumerate() {
            checker.one_of(&format!("messages[{index}].role"), &message.role, CHAT_ROLES);
        }
        if let Some(max_tokens) = self.max_tokens {
            checker.range_u32("max_tokens", max_tokens, 1, 4000);
        }
        checker.range_f64("temperature", self.temperature, 0.0, 2.0);
        if let Some(top_p) = self.top_p {
            checker.range_f64("top_p", top_p, 0.0, 1.0);
        }
        if let Some(penalty) = self.frequency_penalty {
            checker.range_f64("frequency_penalty", penalty, -2.0, 2.0);
        }
        if let Some(penalty) = self.presence_penalty {
            checker.range_f64("presence_penalty", penalty, -2.0, 2.0);
        }
        checker.finish()
    }
}

/// Store a file in a vector database collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreRequest {
    /// File URL or path to store.
    pub file: String,
    /// Vector collection name.
    pub collection_name: String,
    /// File metadata.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Text chunk size.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    /// Chunk overlap.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
}

impl Validate for VectorStoreRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker.non_empty("file", &self.file);
        checker.non_empty("collection_name", &self.collection_name);
        checker.check(
            self.collection_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            "collection_name",
            "pattern",
            "collection name can only contain letters, numbers, underscores, and hyphens",
        );
        checker.range_u32("chunk_size", self.chunk_size, 100, 4000);
        checker.range_u32("chunk_overlap", self.chunk_overlap, 0, 1000);
        checker.check(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap",
            "less_than",
            "chunk overlap must be less than chunk size",
        );
        checker.finish()
    }
}
