//! One request end to end: normalize, fan out over variants, forward.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info, instrument};

use crate::config::PipelineConfig;
use crate::error::CaptionError;
use crate::generator::CaptionGenerator;
use crate::normalize::normalize;
use crate::prompt::{VariantTable, compose_prompt};
use crate::sink::{SinkReply, SubmissionRecord, SubmissionSink};

/// An uploaded photo plus the optional hints from the form.
#[derive(Clone, Debug, Default)]
pub struct CaptionRequest {
    /// Raw upload, any supported image format
    pub image_bytes: Vec<u8>,
    /// eg `LDK`, may be empty
    pub space_type: String,
    /// eg `やさしい`, may be empty
    pub tone: String,
    /// Name of the uploaded file
    pub filename: String,
}

/// Generated text for one variant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaptionDraft {
    /// Id of the variant this draft was written for
    pub variant_id: String,
    /// The caption itself
    pub text: String,
}

/// What a successful run hands back to the web layer.
#[derive(Clone, Debug)]
pub struct PipelineOutcome {
    /// One draft per variant, in variant order
    pub drafts: Vec<CaptionDraft>,
    /// What the webhook answered
    pub sink_reply: SinkReply,
    /// Size of the upload
    pub raw_bytes: usize,
    /// Size of the normalized JPEG
    pub normalized_bytes: usize,
    /// Length of the base64 form of the normalized JPEG
    pub base64_chars: usize,
}

/// Generates one draft per variant, at most `concurrency` at a time.
///
/// Drafts come back in table order whatever order the calls finish in. The
/// first failure wins and the calls still in flight are dropped.
pub async fn run_all(
    generator: &dyn CaptionGenerator,
    image_jpeg: &[u8],
    space_type: &str,
    tone: &str,
    variants: &VariantTable,
    concurrency: usize,
) -> Result<Vec<CaptionDraft>, CaptionError> {
    let limit = concurrency.clamp(1, variants.len().max(1));
    let mut drafts: Vec<(usize, CaptionDraft)> = stream::iter(variants.iter().cloned().enumerate())
        .map(|(index, variant)| async move {
            let prompt = compose_prompt(variants, &variant.id, space_type, tone);
            debug!("Generating variant {}", variant.id);
            let text = generator
                .generate(image_jpeg, &prompt)
                .await
                .map_err(|err| CaptionError::Generation {
                    variant: variant.id.clone(),
                    message: err.to_string(),
                })?;
            Ok::<_, CaptionError>((
                index,
                CaptionDraft {
                    variant_id: variant.id,
                    text,
                },
            ))
        })
        .buffer_unordered(limit)
        .try_collect()
        .await?;
    drafts.sort_by_key(|(index, _)| *index);
    Ok(drafts.into_iter().map(|(_, draft)| draft).collect())
}

/// Long lived handles shared by every request.
#[derive(Clone)]
pub struct Pipeline {
    generator: Arc<dyn CaptionGenerator>,
    sink: Arc<dyn SubmissionSink>,
    variants: Arc<VariantTable>,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("variants", &self.variants)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Wires the injected clients together.
    pub fn new(
        generator: Arc<dyn CaptionGenerator>,
        sink: Arc<dyn SubmissionSink>,
        variants: VariantTable,
        config: PipelineConfig,
    ) -> Self {
        Self {
            generator,
            sink,
            variants: Arc::new(variants),
            config,
        }
    }

    /// Configured variants.
    pub fn variants(&self) -> &VariantTable {
        &self.variants
    }

    /// Runs one request. Nothing reaches the sink unless every variant
    /// produced a draft.
    #[instrument(skip_all, fields(filename = %request.filename, space = %request.space_type, tone = %request.tone))]
    pub async fn process(&self, request: &CaptionRequest) -> Result<PipelineOutcome, CaptionError> {
        let normalized = normalize(
            &request.image_bytes,
            self.config.max_side,
            self.config.quality,
        )?;
        debug!(
            "Normalized {} bytes to {} bytes",
            request.image_bytes.len(),
            normalized.len()
        );

        let drafts = run_all(
            self.generator.as_ref(),
            &normalized,
            &request.space_type,
            &request.tone,
            &self.variants,
            self.config.concurrency,
        )
        .await?;
        info!("Generated {} drafts", drafts.len());

        let image_base64 = general_purpose::STANDARD.encode(&normalized);
        let base64_chars = image_base64.len();
        let record = SubmissionRecord::new(
            &request.filename,
            &request.space_type,
            &request.tone,
            drafts,
            self.config.forward_image.then_some(image_base64),
        );

        match self.sink.submit(&record).await {
            Ok(sink_reply) => {
                info!("Webhook accepted submission with {}", sink_reply.status);
                Ok(PipelineOutcome {
                    drafts: record.into_drafts(),
                    sink_reply,
                    raw_bytes: request.image_bytes.len(),
                    normalized_bytes: normalized.len(),
                    base64_chars,
                })
            }
            Err(err) => Err(CaptionError::Sink {
                message: err.to_string(),
                drafts: record.into_drafts(),
            }),
        }
    }
}
