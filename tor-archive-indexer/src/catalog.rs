use crate::cache::{CacheStore, Tier};
use crate::classify::Platform;
use crate::error::IndexerError;
use crate::layout::DataLayout;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// Strictly numeric version identifiers, e.g. "14.0.3" but not
/// "14.0.4-alpha". Only these can become the latest version.
static NUMERIC_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)*$").unwrap());

static DIGIT_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// One distributable file of a version, plus the facts the enrichment
/// pass derives from the binary itself. Enrichment fields are absent
/// from the JSON until they are populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_name: String,
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_md5: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_sha256: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon_hash: Option<String>,
}

impl FileEntry {
    pub fn new(file_name: String, url: String) -> Self {
        Self {
            file_name,
            url,
            binary_md5: None,
            binary_sha256: None,
            daemon_version: None,
            daemon_hash: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    pub files: Vec<FileEntry>,
}

/// Every file of a catalog bucketed by platform.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GroupedCatalog {
    pub windows: Vec<FileEntry>,
    pub macos: Vec<FileEntry>,
    pub linux: Vec<FileEntry>,
    pub android: Vec<FileEntry>,
    pub other: Vec<FileEntry>,
}

/// Latest strictly-numeric version, or the explicit null sentinel when
/// no version qualifies. Both fields default so the seeded `{}`
/// document parses as "no version, no files".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatestVersion {
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// Embedded integer runs of a version identifier, used as the natural
/// sort key so "10.0.1" orders after "9.9.9".
pub fn natural_key(version: &str) -> Vec<u64> {
    DIGIT_RUNS
        .find_iter(version)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Rebuild a tier's catalog from its cache documents. Malformed cache
/// documents are logged and skipped, never fatal.
pub async fn build_tier_catalog(
    cache: &CacheStore,
    tier: Tier,
    layout: &DataLayout,
) -> Result<Vec<VersionEntry>, IndexerError> {
    let mut entries = Vec::new();

    for version in cache.versions_present(tier).await? {
        let file_names = match cache.read(tier, &version).await {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!("Skipping malformed cache document for {}: {}", version, err);
                continue;
            }
        };

        let files = file_names
            .into_iter()
            .map(|file_name| {
                let url = layout.file_url(&version, &file_name);
                FileEntry::new(file_name, url)
            })
            .collect();

        entries.push(VersionEntry { version, files });
    }

    entries.sort_by_key(|entry| natural_key(&entry.version));

    Ok(entries)
}

/// Bucket every file of every version by its platform verdict.
pub fn group_by_platform(entries: &[VersionEntry]) -> GroupedCatalog {
    let mut grouped = GroupedCatalog::default();

    for entry in entries {
        for file in &entry.files {
            let bucket = match Platform::classify(&file.file_name) {
                Platform::Windows => &mut grouped.windows,
                Platform::MacOs => &mut grouped.macos,
                Platform::Linux => &mut grouped.linux,
                Platform::Android => &mut grouped.android,
                Platform::Other => &mut grouped.other,
            };

            bucket.push(file.clone());
        }
    }

    grouped
}

/// Latest strictly-numeric version with its files. Alpha/beta/rc
/// suffixed identifiers never become "latest".
pub fn latest_version(entries: &[VersionEntry]) -> LatestVersion {
    entries
        .iter()
        .filter(|entry| NUMERIC_VERSION.is_match(&entry.version))
        .max_by_key(|entry| natural_key(&entry.version))
        .map(|entry| LatestVersion {
            version: Some(entry.version.clone()),
            files: entry.files.clone(),
        })
        .unwrap_or(LatestVersion {
            version: None,
            files: Vec::new(),
        })
}

/// Pretty JSON with a trailing newline, the format every document in
/// the data directory uses.
pub async fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), IndexerError> {
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');
    tokio::fs::write(path, data).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn entry(version: &str, file_names: &[&str]) -> VersionEntry {
        VersionEntry {
            version: version.to_owned(),
            files: file_names
                .iter()
                .map(|name| FileEntry::new((*name).to_owned(), format!("u/{name}")))
                .collect(),
        }
    }

    #[test]
    fn natural_key_orders_by_numeric_components() {
        let mut versions = vec!["2.0".to_owned(), "10.0".to_owned(), "2.0.1".to_owned()];
        versions.sort_by_key(|v| natural_key(v));

        assert_eq!(
            versions,
            vec!["2.0".to_owned(), "2.0.1".to_owned(), "10.0".to_owned()]
        );
    }

    #[test]
    fn latest_version_skips_suffixed_identifiers() {
        let entries = vec![entry("14.0.3", &["a"]), entry("14.0.4-alpha", &["b"])];

        let latest = latest_version(&entries);
        assert_eq!(latest.version.as_deref(), Some("14.0.3"));
        assert_eq!(latest.files.len(), 1);
    }

    #[test]
    fn latest_version_of_nothing_is_the_null_sentinel() {
        let latest = latest_version(&[entry("14.0.4-alpha", &["a"])]);
        assert_eq!(latest.version, None);
        assert!(latest.files.is_empty());

        let latest = latest_version(&[]);
        assert_eq!(latest.version, None);
    }

    #[test]
    fn grouping_is_a_partition() {
        let entries = vec![
            entry(
                "14.0.3",
                &[
                    "tor-expert-bundle-windows-x86_64-14.0.3.tar.gz",
                    "tor-expert-bundle-macos-x86_64-14.0.3.tar.gz",
                    "tor-expert-bundle-linux-x86_64-14.0.3.tar.gz",
                    "tor-expert-bundle-android-aarch64-14.0.3.tar.gz",
                    "mystery-artifact-14.0.3.tar.gz",
                ],
            ),
            entry("13.0", &["tor-expert-bundle-linux-i686-13.0.tar.gz"]),
        ];

        let grouped = group_by_platform(&entries);

        let total: usize = entries.iter().map(|e| e.files.len()).sum();
        let bucketed = grouped.windows.len()
            + grouped.macos.len()
            + grouped.linux.len()
            + grouped.android.len()
            + grouped.other.len();

        // Disjoint and exhaustive: every file lands in exactly one bucket.
        assert_eq!(total, bucketed);
        assert_eq!(grouped.windows.len(), 1);
        assert_eq!(grouped.macos.len(), 1);
        assert_eq!(grouped.linux.len(), 2);
        assert_eq!(grouped.android.len(), 1);
        assert_eq!(grouped.other.len(), 1);
    }

    #[tokio::test]
    async fn tier_catalog_is_rebuilt_sorted_with_urls() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(
            dir.path(),
            Url::parse("https://archive.example.org/torbrowser/").unwrap(),
        );
        layout.bootstrap().await.unwrap();
        let cache = CacheStore::new(&layout);

        cache
            .write(Tier::Export, "10.0", &["b.tar.gz".to_owned()])
            .await
            .unwrap();
        cache
            .write(Tier::Export, "2.0.1", &["a.tar.gz".to_owned()])
            .await
            .unwrap();

        let entries = build_tier_catalog(&cache, Tier::Export, &layout)
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].version, "2.0.1");
        assert_eq!(entries[1].version, "10.0");
        assert_eq!(
            entries[0].files[0].url,
            "https://archive.example.org/torbrowser/2.0.1/a.tar.gz"
        );
    }

    #[tokio::test]
    async fn malformed_cache_documents_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(
            dir.path(),
            Url::parse("https://archive.example.org/torbrowser/").unwrap(),
        );
        layout.bootstrap().await.unwrap();
        let cache = CacheStore::new(&layout);

        cache
            .write(Tier::Export, "14.0.3", &["a.tar.gz".to_owned()])
            .await
            .unwrap();
        tokio::fs::write(layout.cache_export_dir.join("13.0.json"), b"not json")
            .await
            .unwrap();

        let entries = build_tier_catalog(&cache, Tier::Export, &layout)
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, "14.0.3");
    }

    #[test]
    fn enrichment_fields_stay_out_of_the_json_until_set() {
        let plain = FileEntry::new("a.tar.gz".to_owned(), "u/a.tar.gz".to_owned());
        let json = serde_json::to_string(&plain).unwrap();
        assert!(!json.contains("binary_md5"));
        assert!(!json.contains("daemon_version"));

        let mut enriched = plain.clone();
        enriched.daemon_version = Some("0.4.8.19".to_owned());
        let json = serde_json::to_string(&enriched).unwrap();
        assert!(json.contains("\"daemon_version\":\"0.4.8.19\""));

        // Documents written before enrichment existed still parse.
        let parsed: FileEntry =
            serde_json::from_str(r#"{"file_name":"a","url":"u"}"#).unwrap();
        assert_eq!(parsed.daemon_version, None);
    }
}
