//! Schema models for the Qolaba API.
//!
//! Request models mirror the remote API's endpoints (image synthesis and
//! editing, speech synthesis, chat, vector storage) with serde defaults and
//! field-level validation; response models cover task status polling and
//! the API's error payload.

pub mod requests;
pub mod responses;
pub mod validate;

pub use requests::{
    ChatMessage, ChatRequest, ImageToImageRequest, InpaintingRequest, ReplaceBackgroundRequest,
    TextToImageRequest, TextToSpeechRequest, VectorStoreRequest,
};
pub use responses::{ApiErrorBody, TaskState, TaskStatusResponse};
pub use validate::{validate_payload, Validate, ValidationError, ValidationErrors};
