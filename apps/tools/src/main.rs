use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use classifier::{build_classifier, ClassifierSettings, DEFAULT_TIMEOUT_MS};
use gallery_api::{
    list_gallery, GalleryContext, GalleryView, ImageSource, TemplateRenderer,
    DEFAULT_PUBLIC_PREFIX,
};
use shared::domain::FailurePolicy;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "./public/images")]
    image_root: PathBuf,
    #[arg(long, default_value = DEFAULT_PUBLIC_PREFIX)]
    public_prefix: String,
    #[arg(long)]
    classifier_url: Option<String>,
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    classifier_timeout_ms: u64,
    /// Fail instead of titling an image by path when classification fails.
    #[arg(long)]
    abort_on_failure: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the gallery items as JSON.
    List,
    /// Print the rendered gallery HTML.
    Render {
        /// Wrap the gallery in the page layout.
        #[arg(long)]
        layout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let classifier = build_classifier(&ClassifierSettings {
        endpoint: cli.classifier_url,
        timeout_ms: cli.classifier_timeout_ms,
    })?;
    let ctx = GalleryContext {
        source: ImageSource::new(cli.image_root, &cli.public_prefix),
        classifier,
        failure_policy: if cli.abort_on_failure {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Fallback
        },
        renderer: Arc::new(TemplateRenderer::new()?),
    };

    let imgs = list_gallery(&ctx).await?;
    match cli.command {
        Command::List => {
            println!("{}", serde_json::to_string_pretty(&imgs)?);
        }
        Command::Render { layout } => {
            let html = ctx
                .renderer
                .render(&GalleryView { imgs, layout })
                .context("failed to render gallery")?;
            println!("{html}");
        }
    }

    Ok(())
}
