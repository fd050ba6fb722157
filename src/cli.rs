//! CLI parser
use clap::Parser;
use std::num::{NonZeroU16, NonZeroUsize};
use std::path::PathBuf;
use url::Url;

use crate::constants::{
    DEFAULT_GENERATION_TIMEOUT_SECONDS, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_SIDE,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_SINK_TIMEOUT_SECONDS,
};

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "POSTDRAFT_DEBUG")]
    /// Enable debug logging. Env: POSTDRAFT_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9000", env = "POSTDRAFT_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: POSTDRAFT_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "POSTDRAFT_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: POSTDRAFT_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// API key for the generation service. Env: OPENAI_API_KEY
    pub openai_api_key: String,
    #[clap(long, default_value = DEFAULT_MODEL, env = "POSTDRAFT_MODEL")]
    /// Vision capable model used for the drafts. Env: POSTDRAFT_MODEL
    pub model: String,
    #[clap(long, default_value = DEFAULT_OPENAI_BASE_URL, env = "POSTDRAFT_OPENAI_BASE_URL")]
    /// Base URL of the OpenAI compatible API. Env: POSTDRAFT_OPENAI_BASE_URL
    pub openai_base_url: Url,

    #[clap(long, env = "POSTDRAFT_WEBHOOK_URL")]
    /// Record keeping webhook the drafts are POSTed to.
    /// Env: POSTDRAFT_WEBHOOK_URL
    pub webhook_url: Url,
    #[clap(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "POSTDRAFT_FORWARD_IMAGE"
    )]
    /// Include the normalized image (base64) in the webhook payload.
    /// Env: POSTDRAFT_FORWARD_IMAGE
    pub forward_image: bool,

    #[clap(long, default_value_t = DEFAULT_MAX_SIDE, env = "POSTDRAFT_MAX_SIDE")]
    /// Longest side of the normalized image, in pixels. Env: POSTDRAFT_MAX_SIDE
    pub max_side: u32,
    #[clap(
        long,
        default_value_t = DEFAULT_JPEG_QUALITY,
        value_parser = clap::value_parser!(u8).range(1..=100),
        env = "POSTDRAFT_QUALITY"
    )]
    /// JPEG quality (1-100) of the normalized image. Env: POSTDRAFT_QUALITY
    pub quality: u8,
    #[clap(long, default_value = "3", env = "POSTDRAFT_CONCURRENCY")]
    /// How many variants are generated at the same time. Env: POSTDRAFT_CONCURRENCY
    pub concurrency: NonZeroUsize,

    #[clap(
        long,
        default_value_t = DEFAULT_GENERATION_TIMEOUT_SECONDS,
        env = "POSTDRAFT_GENERATION_TIMEOUT"
    )]
    /// Seconds allowed per generation call. Env: POSTDRAFT_GENERATION_TIMEOUT
    pub generation_timeout: u64,
    #[clap(
        long,
        default_value_t = DEFAULT_SINK_TIMEOUT_SECONDS,
        env = "POSTDRAFT_SINK_TIMEOUT"
    )]
    /// Seconds allowed for the webhook call. Env: POSTDRAFT_SINK_TIMEOUT
    pub sink_timeout: u64,
    #[clap(
        long,
        default_value_t = DEFAULT_MAX_UPLOAD_BYTES,
        env = "POSTDRAFT_MAX_UPLOAD_BYTES"
    )]
    /// Largest accepted upload, in bytes. Env: POSTDRAFT_MAX_UPLOAD_BYTES
    pub max_upload_bytes: usize,

    #[clap(long, env = "POSTDRAFT_VARIANTS_FILE")]
    /// JSON file replacing the built-in variant table, eg `/data/variants.json`.
    /// Env: POSTDRAFT_VARIANTS_FILE
    pub variants_file: Option<PathBuf>,
}
