use std::path::PathBuf;
use clap::{Parser, Subcommand};
use url::Url;

#[derive(Debug, Clone, Parser)]
pub struct IndexerArgs {
    /// Root directory for cache tiers and catalog documents.
    #[arg(
        short,
        long,
        default_value = "data",
        env = "TOR_ARCHIVE_INDEXER_DATA"
    )]
    pub data_directory: PathBuf,

    /// Root of the package archive directory listing.
    #[arg(
        long,
        default_value = "https://archive.torproject.org/tor-package-archive/torbrowser/",
        env = "TOR_ARCHIVE_INDEXER_BASE_URL"
    )]
    pub base_url: Url,

    /// Restrict the enrichment pass to file names containing this token.
    #[arg(long, env = "OS_FILTER")]
    pub os_filter: Option<String>,

    #[command(subcommand)]
    pub command: IndexerCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum IndexerCommand {
    /// Crawl the archive listing and rebuild the catalog documents.
    Crawl,

    /// Download the latest export bundles and derive binary facts
    /// (hashes and embedded daemon versions) into the catalog.
    Enrich {
        /// Only compute hashes, skip daemon version extraction.
        #[arg(long, default_value_t = false)]
        hashes_only: bool,
    },
}
