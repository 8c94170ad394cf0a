use camera_motion_common::config::SourceConfig;
use camera_motion_source::cli::SourceArgs;
use clap::Parser;
use tracing::info;

/// Load frames and report grayscale frame identifiers.
#[derive(Debug, Parser)]
#[command(name = "load-frames", version)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SourceConfig::default();
    let spec = cli.source.spec(&config);
    let options = cli.source.options(&config);
    info!(?spec, ?options, "loading frames");

    let frames = camera_motion_source::load(&spec, &options);
    let ids: Vec<String> = frames.ids().iter().map(|id| id.to_string()).collect();
    println!("Loaded {} frames: [{}]", frames.len(), ids.join(", "));
}
