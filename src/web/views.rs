use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Multipart, State};
use axum::response::{Html, IntoResponse, Response};
use tracing::{debug, error, info, instrument};

use super::AppState;
use crate::error::CaptionError;
use crate::pipeline::{CaptionDraft, CaptionRequest, PipelineOutcome};

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub(crate) struct IndexTemplate {
    variant_count: usize,
}

#[derive(Template, WebTemplate)]
#[template(path = "result.html")]
pub(crate) struct ResultTemplate {
    drafts: Vec<CaptionDraft>,
    sink_status: u16,
    sink_reply: String,
    raw_bytes: usize,
    normalized_bytes: usize,
    base64_chars: usize,
}

impl From<PipelineOutcome> for ResultTemplate {
    fn from(outcome: PipelineOutcome) -> Self {
        Self {
            drafts: outcome.drafts,
            sink_status: outcome.sink_reply.status,
            sink_reply: outcome.sink_reply.body,
            raw_bytes: outcome.raw_bytes,
            normalized_bytes: outcome.normalized_bytes,
            base64_chars: outcome.base64_chars,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub(crate) struct ErrorTemplate {
    message: String,
    has_drafts: bool,
    drafts: Vec<CaptionDraft>,
}

/// handles the / GET
pub(crate) async fn index_handler(State(state): State<AppState>) -> IndexTemplate {
    IndexTemplate {
        variant_count: state.pipeline.variants().len(),
    }
}

/// handles the /generate POST
pub(crate) async fn generate_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Response {
    match generate(&state, multipart).await {
        Ok(outcome) => ResultTemplate::from(outcome).into_response(),
        Err(err) => error_page(err),
    }
}

#[instrument(skip_all)]
async fn generate(state: &AppState, multipart: Multipart) -> Result<PipelineOutcome, CaptionError> {
    let request = read_upload(multipart).await?;
    info!(
        "Received {} ({} bytes)",
        request.filename,
        request.image_bytes.len()
    );
    state.pipeline.process(&request).await
}

async fn read_upload(mut multipart: Multipart) -> Result<CaptionRequest, CaptionError> {
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut space_type = String::new();
    let mut tone = String::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "image" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                image = Some((filename, bytes.to_vec()));
            }
            "space" => space_type = field.text().await?.trim().to_string(),
            "tone" => tone = field.text().await?.trim().to_string(),
            other => debug!("Ignoring form field {other:?}"),
        }
    }

    let (filename, image_bytes) = image
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| CaptionError::BadRequest("an image is required".to_string()))?;

    Ok(CaptionRequest {
        image_bytes,
        space_type,
        tone,
        filename,
    })
}

fn error_page(err: CaptionError) -> Response {
    let status = err.status_code();
    match &err {
        CaptionError::BadRequest(_) | CaptionError::Decode(_) => info!("{}", err),
        _ => error!("{}", err),
    }
    let page = ErrorTemplate {
        message: err.to_string(),
        has_drafts: !err.drafts().is_empty(),
        drafts: err.drafts().to_vec(),
    };
    match page.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(render_err) => {
            error!("Failed to render error page: {}", render_err);
            (status, err.to_string()).into_response()
        }
    }
}
