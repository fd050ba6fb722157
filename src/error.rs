//! Error handling

use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{error, info};

use crate::pipeline::CaptionDraft;

/// Everything that can abort a caption request.
#[derive(Debug)]
pub enum CaptionError {
    /// When you didn't do the right thing, eg no image field
    BadRequest(String),
    /// The upload could not be decoded as an image
    Decode(String),
    /// The generation service failed for one variant
    Generation {
        /// Id of the variant that failed
        variant: String,
        /// What went wrong
        message: String,
    },
    /// The webhook refused or never answered
    Sink {
        /// What went wrong
        message: String,
        /// Drafts that were generated before the sink failed, surfaced here only
        drafts: Vec<CaptionDraft>,
    },
    /// When an internal server error occurs
    InternalServerError(String),
}

impl CaptionError {
    /// HTTP status the web layer answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CaptionError::BadRequest(_) | CaptionError::Decode(_) => StatusCode::BAD_REQUEST,
            CaptionError::Generation { .. } | CaptionError::Sink { .. } => StatusCode::BAD_GATEWAY,
            CaptionError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Drafts carried by the error, if any.
    pub fn drafts(&self) -> &[CaptionDraft] {
        match self {
            CaptionError::Sink { drafts, .. } => drafts,
            _ => &[],
        }
    }
}

impl std::fmt::Display for CaptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(message) => write!(f, "Bad request: {message}"),
            Self::Decode(message) => write!(f, "Failed to decode image: {message}"),
            Self::Generation { variant, message } => {
                write!(f, "Caption generation failed for variant {variant}: {message}")
            }
            Self::Sink { message, .. } => write!(f, "Webhook submission failed: {message}"),
            Self::InternalServerError(message) => write!(f, "Internal server error: {message}"),
        }
    }
}

impl std::error::Error for CaptionError {}

impl From<axum::extract::multipart::MultipartError> for CaptionError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        CaptionError::BadRequest(err.body_text())
    }
}

impl IntoResponse for CaptionError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        match &self {
            CaptionError::BadRequest(_) | CaptionError::Decode(_) => info!("{}", self),
            _ => error!("{}", self),
        }
        let mut response = axum::response::Response::new(axum::body::Body::from(self.to_string()));
        *response.status_mut() = status;
        response
    }
}
