use crate::archive::TorArchiveApi;
use crate::cache::{CacheStore, Tier};
use crate::catalog;
use crate::classify;
use crate::error::IndexerError;
use crate::layout::DataLayout;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct CrawlSummary {
    pub total_versions: usize,
    pub export_versions: usize,
    pub browser_versions: usize,
    pub blank_versions: usize,
}

pub struct CrawlEngine {
    layout: DataLayout,
    cache: CacheStore,
    api: TorArchiveApi,
}

impl CrawlEngine {
    /// Prepare the crawl engine.
    pub fn new(layout: DataLayout) -> Result<Self, IndexerError> {
        let api = TorArchiveApi::new(layout.base_url.clone())?;
        let cache = CacheStore::new(&layout);

        Ok(Self { layout, cache, api })
    }

    pub async fn run(&self) -> Result<CrawlSummary, IndexerError> {
        let blank_list = self.load_blank_list().await;

        tracing::info!("Fetching version list from the archive root...");
        let versions = self.discover_versions().await?;
        tracing::info!("Found {} unique versions", versions.len());

        let (export_blanks, browser_blanks) =
            self.process_versions(&versions, &blank_list).await;

        self.build_documents(versions.len(), blank_list, export_blanks, browser_blanks)
            .await
    }

    /// Discover the version set from the archive root and persist it.
    #[tracing::instrument(skip(self))]
    pub async fn discover_versions(&self) -> Result<Vec<String>, IndexerError> {
        let found = self.api.fetch_root_versions().await?;
        let versions = normalize_versions(found);

        catalog::write_document(&self.layout.versions_list, &versions).await?;

        Ok(versions)
    }

    /// Walk the version set in increasing order, populating the cache
    /// tiers. A single version's failure marks it blank for both tiers
    /// and never aborts the run.
    pub async fn process_versions(
        &self,
        versions: &[String],
        blank_list: &HashSet<String>,
    ) -> (Vec<String>, Vec<String>) {
        let mut export_blanks = Vec::new();
        let mut browser_blanks = Vec::new();

        let total = versions.len();
        let width = total.to_string().len();

        for (index, version) in versions.iter().enumerate() {
            let count = format!("{:0width$}", index + 1);

            let result = self
                .process_version(version, blank_list, &mut export_blanks, &mut browser_blanks, &count, total)
                .await;

            if let Err(err) = result {
                tracing::warn!("[{}/{}] {} - Error: {}", count, total, version, err);
                export_blanks.push(version.clone());
                browser_blanks.push(version.clone());
            }
        }

        (export_blanks, browser_blanks)
    }

    async fn process_version(
        &self,
        version: &str,
        blank_list: &HashSet<String>,
        export_blanks: &mut Vec<String>,
        browser_blanks: &mut Vec<String>,
        count: &str,
        total: usize,
    ) -> Result<(), IndexerError> {
        // Both derived tiers cached means fully processed.
        if self.cache.has(Tier::Export, version) && self.cache.has(Tier::Browser, version) {
            tracing::info!("[{}/{}] {} - Already processed (E+B)", count, total, version);
            return Ok(());
        }

        let raw_files = if self.cache.has(Tier::All, version) {
            tracing::info!("[{}/{}] {} - Using cached data", count, total, version);
            self.cache.read(Tier::All, version).await?
        } else {
            if blank_list.contains(version) {
                tracing::info!("[{}/{}] {} - In blank list, skipping", count, total, version);
                export_blanks.push(version.to_owned());
                browser_blanks.push(version.to_owned());
                return Ok(());
            }

            tracing::info!("[{}/{}] {} - Fetching", count, total, version);
            let listing = self.api.fetch_version_listing(version).await?;

            let raw_files: Vec<String> = listing
                .into_iter()
                .filter(|name| !classify::is_excluded(name, classify::COMMON_EXCLUDES))
                .collect();

            if raw_files.is_empty() {
                tracing::info!("[{}/{}] {} - No valid files", count, total, version);
                export_blanks.push(version.to_owned());
                browser_blanks.push(version.to_owned());
                return Ok(());
            }

            self.cache.write(Tier::All, version, &raw_files).await?;
            raw_files
        };

        // A tier cached by an earlier run still reports its real count.
        let export_count = if self.cache.has(Tier::Export, version) {
            self.cache
                .read(Tier::Export, version)
                .await
                .map(|files| files.len())
                .unwrap_or(0)
        } else {
            let export_files: Vec<String> = raw_files
                .iter()
                .filter(|name| !classify::excluded_from_export(name))
                .cloned()
                .collect();

            if export_files.is_empty() {
                export_blanks.push(version.to_owned());
                0
            } else {
                self.cache.write(Tier::Export, version, &export_files).await?;
                export_files.len()
            }
        };

        let browser_count = if self.cache.has(Tier::Browser, version) {
            self.cache
                .read(Tier::Browser, version)
                .await
                .map(|files| files.len())
                .unwrap_or(0)
        } else {
            let browser_files: Vec<String> = raw_files
                .iter()
                .filter(|name| !classify::excluded_from_browser(name))
                .cloned()
                .collect();

            if browser_files.is_empty() {
                browser_blanks.push(version.to_owned());
                0
            } else {
                self.cache
                    .write(Tier::Browser, version, &browser_files)
                    .await?;
                browser_files.len()
            }
        };

        tracing::info!(
            "[{}/{}] {} - E:{} B:{}",
            count,
            total,
            version,
            export_count,
            browser_count
        );

        Ok(())
    }

    /// Reassemble the public catalog documents from the cache tiers and
    /// fold this run's blanks into the persistent blank list.
    pub async fn build_documents(
        &self,
        total_versions: usize,
        blank_list: HashSet<String>,
        export_blanks: Vec<String>,
        browser_blanks: Vec<String>,
    ) -> Result<CrawlSummary, IndexerError> {
        tracing::info!("Building catalog documents...");

        let export = catalog::build_tier_catalog(&self.cache, Tier::Export, &self.layout).await?;
        let browser =
            catalog::build_tier_catalog(&self.cache, Tier::Browser, &self.layout).await?;

        catalog::write_document(&self.layout.export_versions, &export).await?;
        catalog::write_document(
            &self.layout.export_versions_grouped,
            &catalog::group_by_platform(&export),
        )
        .await?;

        catalog::write_document(&self.layout.browser_versions, &browser).await?;
        catalog::write_document(
            &self.layout.browser_versions_grouped,
            &catalog::group_by_platform(&browser),
        )
        .await?;

        let latest_export = catalog::latest_version(&export);
        let latest_browser = catalog::latest_version(&browser);
        catalog::write_document(&self.layout.latest_export_versions, &latest_export).await?;
        catalog::write_document(&self.layout.latest_browser_versions, &latest_browser).await?;

        // Blank markings are additive across runs and never pruned.
        let mut combined: HashSet<String> = blank_list;
        combined.extend(export_blanks);
        combined.extend(browser_blanks);
        let mut combined: Vec<String> = combined.into_iter().collect();
        combined.sort_by_key(|version| catalog::natural_key(version));
        catalog::write_document(&self.layout.blanks, &combined).await?;

        tracing::info!(
            "Latest export version: {} ({} files)",
            latest_export.version.as_deref().unwrap_or("none"),
            latest_export.files.len()
        );
        tracing::info!(
            "Latest browser version: {} ({} files)",
            latest_browser.version.as_deref().unwrap_or("none"),
            latest_browser.files.len()
        );

        Ok(CrawlSummary {
            total_versions,
            export_versions: export.len(),
            browser_versions: browser.len(),
            blank_versions: combined.len(),
        })
    }

    /// The persistent blank list. A missing or malformed document is
    /// treated as empty, never fatal.
    pub async fn load_blank_list(&self) -> HashSet<String> {
        let data = match tokio::fs::read(&self.layout.blanks).await {
            Ok(v) => v,
            Err(_) => return HashSet::new(),
        };

        match serde_json::from_slice(&data) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!("Malformed blank list, starting empty: {}", err);
                HashSet::new()
            }
        }
    }
}

/// Dedupe and naturally sort a discovered version set.
pub fn normalize_versions(found: Vec<String>) -> Vec<String> {
    let unique: HashSet<String> = found.into_iter().collect();

    let mut versions: Vec<String> = unique.into_iter().collect();
    versions.sort_by_key(|version| catalog::natural_key(version));

    versions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_dedupes_and_sorts_naturally() {
        let found = vec![
            "10.0".to_owned(),
            "2.0".to_owned(),
            "2.0.1".to_owned(),
            "2.0".to_owned(),
            "9.9.9".to_owned(),
        ];

        assert_eq!(
            normalize_versions(found),
            vec![
                "2.0".to_owned(),
                "2.0.1".to_owned(),
                "9.9.9".to_owned(),
                "10.0".to_owned()
            ]
        );
    }
}
