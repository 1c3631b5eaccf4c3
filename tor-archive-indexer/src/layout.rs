use crate::error::IndexerError;
use std::path::{Path, PathBuf};
use url::Url;

/// Every path the indexer touches, derived once from the data directory
/// at batch start. Nothing outside this struct knows the on-disk layout.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub json_dir: PathBuf,
    pub cache_all_dir: PathBuf,
    pub cache_export_dir: PathBuf,
    pub cache_browser_dir: PathBuf,

    pub blanks: PathBuf,
    pub versions_list: PathBuf,
    pub export_versions: PathBuf,
    pub browser_versions: PathBuf,
    pub export_versions_grouped: PathBuf,
    pub browser_versions_grouped: PathBuf,
    pub latest_export_versions: PathBuf,
    pub latest_browser_versions: PathBuf,

    pub base_url: Url,
}

impl DataLayout {
    pub fn new(data_directory: impl AsRef<Path>, mut base_url: Url) -> Self {
        let data_directory = data_directory.as_ref();
        let json_dir = data_directory.join("json");
        let cache_dir = data_directory.join("cache");

        // Download URLs are built by appending "<version>/<file_name>".
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            cache_all_dir: cache_dir.join("all"),
            cache_export_dir: cache_dir.join("export"),
            cache_browser_dir: cache_dir.join("browser"),

            blanks: json_dir.join("blanks.json"),
            versions_list: json_dir.join("versions_list.json"),
            export_versions: json_dir.join("export_versions.json"),
            browser_versions: json_dir.join("browser_versions.json"),
            export_versions_grouped: json_dir.join("export_versions_grouped.json"),
            browser_versions_grouped: json_dir.join("browser_versions_grouped.json"),
            latest_export_versions: json_dir.join("latest_export_versions.json"),
            latest_browser_versions: json_dir.join("latest_browser_versions.json"),

            json_dir,
            base_url,
        }
    }

    /// Create the directory tree and seed missing documents, so a first
    /// run starts from a well-formed data directory.
    pub async fn bootstrap(&self) -> Result<(), IndexerError> {
        for dir in [
            &self.json_dir,
            &self.cache_all_dir,
            &self.cache_export_dir,
            &self.cache_browser_dir,
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }

        let seeds: [(&PathBuf, &str); 8] = [
            (&self.blanks, "[]"),
            (&self.versions_list, "[]"),
            (&self.export_versions, "[]"),
            (&self.browser_versions, "[]"),
            (&self.export_versions_grouped, "{}"),
            (&self.browser_versions_grouped, "{}"),
            (&self.latest_export_versions, "{}"),
            (&self.latest_browser_versions, "{}"),
        ];

        for (path, initial) in seeds {
            if path.exists() {
                continue;
            }

            tokio::fs::write(path, format!("{initial}\n")).await?;
            tracing::debug!("Seeded {}", path.display());
        }

        Ok(())
    }

    /// Download URL for a file within a version's archive directory.
    pub fn file_url(&self, version: &str, file_name: &str) -> String {
        format!("{}{}/{}", self.base_url, version, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(base: &str) -> DataLayout {
        DataLayout::new("/tmp/indexer-data", Url::parse(base).unwrap())
    }

    #[test]
    fn file_url_concatenates_version_and_name() {
        let layout = layout("https://archive.example.org/torbrowser/");

        assert_eq!(
            layout.file_url("14.0.3", "tor-expert-bundle-linux-x86_64-14.0.3.tar.gz"),
            "https://archive.example.org/torbrowser/14.0.3/tor-expert-bundle-linux-x86_64-14.0.3.tar.gz"
        );
    }

    #[test]
    fn missing_trailing_slash_is_added() {
        let layout = layout("https://archive.example.org/torbrowser");

        assert_eq!(
            layout.file_url("14.0.3", "a.tar.gz"),
            "https://archive.example.org/torbrowser/14.0.3/a.tar.gz"
        );
    }

    #[tokio::test]
    async fn bootstrap_seeds_missing_documents() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(
            dir.path(),
            Url::parse("https://archive.example.org/torbrowser/").unwrap(),
        );

        layout.bootstrap().await.unwrap();

        assert!(layout.cache_all_dir.is_dir());
        assert!(layout.cache_export_dir.is_dir());
        assert!(layout.cache_browser_dir.is_dir());

        let blanks = tokio::fs::read_to_string(&layout.blanks).await.unwrap();
        assert_eq!(blanks, "[]\n");

        let grouped = tokio::fs::read_to_string(&layout.export_versions_grouped)
            .await
            .unwrap();
        assert_eq!(grouped, "{}\n");

        // Existing documents are left alone on a second bootstrap.
        tokio::fs::write(&layout.blanks, "[\"13.5\"]\n").await.unwrap();
        layout.bootstrap().await.unwrap();
        let blanks = tokio::fs::read_to_string(&layout.blanks).await.unwrap();
        assert_eq!(blanks, "[\"13.5\"]\n");
    }
}
