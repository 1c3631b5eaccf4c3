use crate::error::IndexerError;
use crate::layout::DataLayout;
use std::path::PathBuf;

/// Cache partition, from raw listing to successively filtered subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    All,
    Export,
    Browser,
}

/// On-disk mapping from version to file-name list, one pretty-printed
/// JSON array per (tier, version). Existence of a document is the
/// "already processed" signal that makes re-runs resumable.
#[derive(Debug, Clone)]
pub struct CacheStore {
    all_dir: PathBuf,
    export_dir: PathBuf,
    browser_dir: PathBuf,
}

impl CacheStore {
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            all_dir: layout.cache_all_dir.clone(),
            export_dir: layout.cache_export_dir.clone(),
            browser_dir: layout.cache_browser_dir.clone(),
        }
    }

    fn tier_dir(&self, tier: Tier) -> &PathBuf {
        match tier {
            Tier::All => &self.all_dir,
            Tier::Export => &self.export_dir,
            Tier::Browser => &self.browser_dir,
        }
    }

    pub fn document_path(&self, tier: Tier, version: &str) -> PathBuf {
        self.tier_dir(tier).join(format!("{version}.json"))
    }

    pub fn has(&self, tier: Tier, version: &str) -> bool {
        self.document_path(tier, version).is_file()
    }

    pub async fn read(&self, tier: Tier, version: &str) -> Result<Vec<String>, IndexerError> {
        let path = self.document_path(tier, version);

        if !path.is_file() {
            return Err(IndexerError::NotFound(format!(
                "cache document {}",
                path.display()
            )));
        }

        let data = tokio::fs::read(&path).await?;
        serde_json::from_slice(&data).map_err(IndexerError::from)
    }

    /// Write-once: an existing tier document is the proof that a version
    /// has been processed, so it must never be overwritten.
    pub async fn write(
        &self,
        tier: Tier,
        version: &str,
        file_names: &[String],
    ) -> Result<(), IndexerError> {
        let path = self.document_path(tier, version);

        if path.exists() {
            return Err(IndexerError::CacheConflict(path));
        }

        let mut data = serde_json::to_vec_pretty(file_names)?;
        data.push(b'\n');
        tokio::fs::write(&path, data).await?;

        Ok(())
    }

    /// Versions that have a document in the given tier.
    pub async fn versions_present(&self, tier: Tier) -> Result<Vec<String>, IndexerError> {
        let dir = self.tier_dir(tier);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            if let Some(version) = name.strip_suffix(".json") {
                versions.push(version.to_owned());
            }
        }

        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn store(dir: &std::path::Path) -> CacheStore {
        let layout = DataLayout::new(
            dir,
            Url::parse("https://archive.example.org/torbrowser/").unwrap(),
        );
        CacheStore::new(&layout)
    }

    async fn bootstrapped_store(dir: &std::path::Path) -> CacheStore {
        let layout = DataLayout::new(
            dir,
            Url::parse("https://archive.example.org/torbrowser/").unwrap(),
        );
        layout.bootstrap().await.unwrap();
        CacheStore::new(&layout)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = bootstrapped_store(dir.path()).await;

        let files = vec![
            "tor-expert-bundle-linux-x86_64-14.0.3.tar.gz".to_owned(),
            "tor-expert-bundle-windows-x86_64-14.0.3.tar.gz".to_owned(),
        ];

        assert!(!store.has(Tier::Export, "14.0.3"));
        store.write(Tier::Export, "14.0.3", &files).await.unwrap();
        assert!(store.has(Tier::Export, "14.0.3"));

        let read_back = store.read(Tier::Export, "14.0.3").await.unwrap();
        assert_eq!(read_back, files);

        // Tiers are independent.
        assert!(!store.has(Tier::All, "14.0.3"));
        assert!(!store.has(Tier::Browser, "14.0.3"));
    }

    #[tokio::test]
    async fn write_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = bootstrapped_store(dir.path()).await;

        store
            .write(Tier::All, "13.0", &["a.tar.gz".to_owned()])
            .await
            .unwrap();

        let err = store
            .write(Tier::All, "13.0", &["b.tar.gz".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::CacheConflict(_)));

        // The original document is untouched.
        let read_back = store.read(Tier::All, "13.0").await.unwrap();
        assert_eq!(read_back, vec!["a.tar.gz".to_owned()]);
    }

    #[tokio::test]
    async fn read_of_absent_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = bootstrapped_store(dir.path()).await;

        let err = store.read(Tier::Browser, "9.9.9").await.unwrap_err();
        assert!(matches!(err, IndexerError::NotFound(_)));
    }

    #[tokio::test]
    async fn versions_present_lists_cached_versions() {
        let dir = tempfile::tempdir().unwrap();
        let store = bootstrapped_store(dir.path()).await;

        store
            .write(Tier::Browser, "13.0", &["a".to_owned()])
            .await
            .unwrap();
        store
            .write(Tier::Browser, "14.0.3", &["b".to_owned()])
            .await
            .unwrap();

        let mut versions = store.versions_present(Tier::Browser).await.unwrap();
        versions.sort();
        assert_eq!(versions, vec!["13.0".to_owned(), "14.0.3".to_owned()]);
    }

    #[tokio::test]
    async fn versions_present_tolerates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(store.versions_present(Tier::All).await.unwrap().is_empty());
    }
}
