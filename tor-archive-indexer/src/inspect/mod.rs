mod locate;
mod version;

pub use locate::find_daemon_binary;
pub use version::{determine_version, scan_bytes_for_version};

use crate::archive::TorArchiveApi;
use crate::catalog::{self, FileEntry, LatestVersion};
use crate::error::IndexerError;
use crate::layout::DataLayout;
use md5::Md5;
use sha2::{Digest as _, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt as _;

const HASH_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Default)]
pub struct EnrichSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Derived facts for a single daemon binary.
pub struct BinaryFacts {
    pub md5: String,
    pub sha256: String,
    pub daemon_version: Option<String>,
}

/// Fold derived facts into a catalog entry. In version-extraction runs
/// the daemon hash is recorded whenever the binary was hashed, even if
/// no version could be determined.
pub fn apply_facts(entry: &mut FileEntry, facts: BinaryFacts, hashes_only: bool) {
    entry.binary_md5 = Some(facts.md5);
    entry.binary_sha256 = Some(facts.sha256);

    if !hashes_only {
        entry.daemon_hash = entry.binary_sha256.clone();

        if let Some(daemon_version) = facts.daemon_version {
            entry.daemon_version = Some(daemon_version);
        }
    }
}

/// Second pass over the built catalog: download each export bundle,
/// extract the daemon, and record its hashes and embedded version.
pub struct BinaryInspector {
    layout: DataLayout,
    api: TorArchiveApi,
    os_filter: Option<String>,
    hashes_only: bool,
}

impl BinaryInspector {
    /// Prepare the inspector.
    pub fn new(
        layout: DataLayout,
        os_filter: Option<String>,
        hashes_only: bool,
    ) -> Result<Self, IndexerError> {
        let api = TorArchiveApi::new(layout.base_url.clone())?;

        Ok(Self {
            layout,
            api,
            os_filter: os_filter.map(|filter| filter.to_lowercase()),
            hashes_only,
        })
    }

    pub async fn run(&self) -> Result<EnrichSummary, IndexerError> {
        let catalog_path = &self.layout.latest_export_versions;
        if !catalog_path.is_file() {
            return Err(IndexerError::MissingCatalog(catalog_path.clone()));
        }

        let data = tokio::fs::read(catalog_path).await?;
        let mut document: LatestVersion = match serde_json::from_slice(&data) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!("Malformed catalog document, nothing to enrich: {}", err);
                LatestVersion::default()
            }
        };

        tracing::info!("Found {} files in the catalog", document.files.len());
        if let Some(filter) = &self.os_filter {
            tracing::info!("OS filter active: only file names containing '{}'", filter);
        }

        let scratch = tempfile::tempdir()?;
        let mut summary = EnrichSummary::default();

        for entry in document.files.iter_mut() {
            if let Some(filter) = &self.os_filter {
                if !entry.file_name.to_lowercase().contains(filter) {
                    tracing::debug!("{}: outside the OS filter, skipping", entry.file_name);
                    summary.skipped += 1;
                    continue;
                }
            }

            if already_enriched(entry, self.hashes_only) {
                tracing::info!("{}: already enriched, skipping", entry.file_name);
                summary.skipped += 1;
                continue;
            }

            match self.process_entry(entry, scratch.path()).await {
                Ok(facts) => {
                    apply_facts(entry, facts, self.hashes_only);
                    summary.updated += 1;
                }
                Err(err) => {
                    tracing::warn!("{}: {}", entry.file_name, err);
                    summary.failed += 1;
                }
            }
        }

        if summary.updated > 0 {
            tracing::info!(
                "Updated {} entries, saving {}",
                summary.updated,
                catalog_path.display()
            );
            catalog::write_document(catalog_path, &document).await?;
        } else {
            tracing::info!("No entries were updated");
        }

        Ok(summary)
    }

    #[tracing::instrument(skip(self, entry, scratch), fields(file_name = entry.file_name.as_str()))]
    async fn process_entry(
        &self,
        entry: &FileEntry,
        scratch: &Path,
    ) -> Result<BinaryFacts, IndexerError> {
        let work_dir = scratch.join(entry.file_name.trim_end_matches(".tar.gz"));
        tokio::fs::create_dir_all(&work_dir).await?;

        let archive_path = work_dir.join(&entry.file_name);
        tracing::info!("Downloading {}", entry.url);
        self.api.download_to(&entry.url, &archive_path).await?;

        let extract_dir = work_dir.join("extracted");
        tokio::fs::create_dir_all(&extract_dir).await?;
        extract_archive(&archive_path, &extract_dir).await?;

        let binary = find_daemon_binary(&extract_dir).ok_or_else(|| {
            IndexerError::NotFound(format!("no daemon binary in {}", entry.file_name))
        })?;
        tracing::info!("Found binary: {}", binary.display());

        let (md5, sha256) = hash_file(&binary).await?;

        let daemon_version = if self.hashes_only {
            None
        } else {
            determine_version(&binary).await
        };

        Ok(BinaryFacts {
            md5,
            sha256,
            daemon_version,
        })
    }
}

/// Per-entry idempotence: the presence of the required fields is itself
/// the "already processed" signal.
pub fn already_enriched(entry: &FileEntry, hashes_only: bool) -> bool {
    if hashes_only {
        entry.binary_md5.as_deref().is_some_and(|v| !v.is_empty())
            && entry.binary_sha256.as_deref().is_some_and(|v| !v.is_empty())
    } else {
        entry
            .daemon_version
            .as_deref()
            .is_some_and(|v| !v.is_empty() && !v.starts_with("Error"))
            && entry.daemon_hash.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Unpack a gzip-compressed tarball.
async fn extract_archive(archive_path: &Path, dest: &Path) -> Result<(), IndexerError> {
    let archive_path = archive_path.to_owned();
    let dest = dest.to_owned();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive_path)?;
        let decoder = flate2::read::GzDecoder::new(std::io::BufReader::new(file));
        let mut archive = tar::Archive::new(decoder);

        archive
            .unpack(&dest)
            .map_err(|err| IndexerError::Extract(archive_path.clone(), err))?;

        Ok::<_, IndexerError>(())
    })
    .await
    .unwrap()?;

    Ok(())
}

/// MD5 and SHA-256 of a file, streamed in fixed-size chunks so large
/// binaries are never held in memory at once.
async fn hash_file(path: &Path) -> Result<(String, String), IndexerError> {
    let mut file = tokio::fs::File::open(path).await?;

    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }

        md5.update(&buffer[..read]);
        sha256.update(&buffer[..read]);
    }

    Ok((
        hex_digest(md5.finalize().as_slice()),
        hex_digest(sha256.finalize().as_slice()),
    ))
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, byte| {
            acc.push(std::char::from_digit((byte >> 4) as u32, 16).unwrap());
            acc.push(std::char::from_digit((byte & 0xF) as u32, 16).unwrap());
            acc
        })
}
