//! Shared constants/defaults for things
//!

/// Longest side, in pixels, of the image sent to the generation service.
pub const DEFAULT_MAX_SIDE: u32 = 1280;

/// JPEG quality used when re-encoding uploads.
pub const DEFAULT_JPEG_QUALITY: u8 = 72;

/// Vision capable model used for caption generation.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Base URL of the OpenAI compatible API.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Seconds to wait for a single caption generation call.
pub const DEFAULT_GENERATION_TIMEOUT_SECONDS: u64 = 60;

/// Seconds to wait for the webhook to accept a submission.
pub const DEFAULT_SINK_TIMEOUT_SECONDS: u64 = 90;

/// Largest accepted upload body, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// MIME type of every image handed to the generation service.
pub const NORMALIZED_MIME_TYPE: &str = "image/jpeg";

/// How much of the webhook reply we keep for display.
pub const SINK_REPLY_DISPLAY_CHARS: usize = 600;

/// How much of an upstream error body ends up in logs and error messages.
pub const ERROR_BODY_LOG_CHARS: usize = 800;

/// Truncates to at most `limit` characters, marking the cut.
pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}
