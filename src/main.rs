use clap::Parser;
use postdraft::config::{build_pipeline, setup_logging};
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = postdraft::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let pipeline = match build_pipeline(&cli) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            error!("Failed to set up pipeline: {:#}", err);
            return;
        }
    };
    info!(
        "Generating {} variants with {}, forwarding to {}",
        pipeline.variants().len(),
        cli.model,
        cli.webhook_url.host_str().unwrap_or("webhook")
    );

    if let Err(err) = postdraft::web::setup_server(
        &cli.listen_address,
        cli.port,
        pipeline,
        cli.max_upload_bytes,
    )
    .await
    {
        error!("Application error: {}", err);
    }
}
