use clap::Parser as _;
use tor_archive_indexer::args::{IndexerArgs, IndexerCommand};
use tor_archive_indexer::crawl::CrawlEngine;
use tor_archive_indexer::error::IndexerError;
use tor_archive_indexer::inspect::BinaryInspector;
use tor_archive_indexer::layout::DataLayout;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

fn main() {
    let indicatif_layer = tracing_indicatif::IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_env(
            "TOR_ARCHIVE_INDEXER_LOG",
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .init();

    let args = IndexerArgs::parse();

    let result = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build() {
        Ok(v) => v.block_on(async_main(args)),
        Err(err) => {
            tracing::error!("Failed to create tokio runtime: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = result {
        tracing::error!("Error: {:?}", err);
        std::process::exit(1);
    }
}

async fn async_main(args: IndexerArgs) -> Result<(), IndexerError> {
    tracing::trace!("args = {:#?}", args);

    let layout = DataLayout::new(&args.data_directory, args.base_url.clone());
    layout.bootstrap().await?;

    match args.command {
        IndexerCommand::Crawl => {
            let engine = CrawlEngine::new(layout)?;

            tracing::info!("Starting to crawl the package archive...");
            let summary = engine.run().await?;

            tracing::info!("Done.");
            tracing::info!("Total versions processed: {}", summary.total_versions);
            tracing::info!("Export versions with data: {}", summary.export_versions);
            tracing::info!("Browser versions with data: {}", summary.browser_versions);
            tracing::info!("Total blank versions: {}", summary.blank_versions);
        }
        IndexerCommand::Enrich { hashes_only } => {
            let inspector = BinaryInspector::new(layout, args.os_filter.clone(), hashes_only)?;

            tracing::info!("Starting to enrich the export catalog...");
            let summary = inspector.run().await?;

            tracing::info!("Done.");
            tracing::info!("Updated entries: {}", summary.updated);
            tracing::info!("Skipped entries: {}", summary.skipped);
            tracing::info!("Failed entries: {}", summary.failed);
        }
    }

    Ok(())
}
