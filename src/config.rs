//! Config handling

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::log::LevelFilter;

use crate::cli::CliOptions;
use crate::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_SIDE};
use crate::generator::OpenAiCaptioner;
use crate::pipeline::Pipeline;
use crate::prompt::VariantTable;
use crate::sink::WebhookSink;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// The knobs the core pipeline needs for each request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineConfig {
    /// Longest side of the normalized image
    pub max_side: u32,
    /// JPEG quality of the normalized image
    pub quality: u8,
    /// Send the normalized image along to the webhook
    pub forward_image: bool,
    /// Variants generated at the same time
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_side: DEFAULT_MAX_SIDE,
            quality: DEFAULT_JPEG_QUALITY,
            forward_image: true,
            concurrency: 3,
        }
    }
}

impl From<&CliOptions> for PipelineConfig {
    fn from(cli: &CliOptions) -> Self {
        Self {
            max_side: cli.max_side,
            quality: cli.quality,
            forward_image: cli.forward_image,
            concurrency: cli.concurrency.get(),
        }
    }
}

/// Loads the variant table and builds the real clients.
pub fn build_pipeline(cli: &CliOptions) -> Result<Pipeline, anyhow::Error> {
    let variants = match &cli.variants_file {
        Some(path) => VariantTable::from_file(path)
            .with_context(|| format!("Failed to load variants from {}", path.display()))?,
        None => VariantTable::default(),
    };

    let generator = OpenAiCaptioner::new(
        &cli.openai_base_url,
        &cli.openai_api_key,
        &cli.model,
        Duration::from_secs(cli.generation_timeout),
    )
    .context("Failed to build generation client")?;
    let sink = WebhookSink::new(cli.webhook_url.clone(), Duration::from_secs(cli.sink_timeout))
        .context("Failed to build webhook client")?;

    Ok(Pipeline::new(
        Arc::new(generator),
        Arc::new(sink),
        variants,
        PipelineConfig::from(cli),
    ))
}
