use crate::error::IndexerError;
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt as _;

/// Relative version anchors in the archive root listing,
/// e.g. `<a href="14.0.3/">`.
static RELATIVE_VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="([\d\.]+[a-zA-Z0-9\-\_]*)/">"#).unwrap());

/// Generic anchor pattern, only ever applied to per-version file listings.
static ANCHOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="([^"]+)">"#).unwrap());

const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TorArchiveApi {
    client: Client,
    base: Url,
    absolute_version_pattern: Regex,
}

impl TorArchiveApi {
    /// Prepare the archive client.
    pub fn new(base: Url) -> Result<Self, IndexerError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .redirect(Policy::limited(10))
            .hickory_dns(true)
            .build()?;

        // Mirrors sometimes emit absolute anchors back into the listing.
        let absolute_version_pattern = Regex::new(&format!(
            r"{}(\d+\.\d+\.\d+)/",
            regex::escape(base.as_str())
        ))
        .unwrap();

        Ok(Self {
            client,
            base,
            absolute_version_pattern,
        })
    }

    /// Version identifiers anchored in the archive root listing. One
    /// fetch per version-bearing pattern; duplicates are left to the
    /// caller to resolve.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_root_versions(&self) -> Result<Vec<String>, IndexerError> {
        let mut versions = Vec::new();

        for pattern in [&self.absolute_version_pattern, &*RELATIVE_VERSION_PATTERN] {
            let body = self.fetch_with_retry(self.base.clone()).await?;

            for capture in pattern.captures_iter(&body) {
                versions.push(capture[1].to_owned());
            }
        }

        Ok(versions)
    }

    /// File names anchored in a version's directory listing.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_version_listing(
        &self,
        version: &str,
    ) -> Result<Vec<String>, IndexerError> {
        let url = self.base.join(&format!("{version}/"))?;
        let body = self.fetch_with_retry(url).await?;

        Ok(ANCHOR_PATTERN
            .captures_iter(&body)
            .map(|capture| capture[1].to_owned())
            .collect())
    }

    /// Stream an archive to disk without buffering it in memory. Single
    /// attempt; a failed download is terminal for that item.
    #[tracing::instrument(skip(self, dest))]
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<(), IndexerError> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }

    /// GET a listing with up to three attempts and exponential backoff.
    #[tracing::instrument(skip(self), fields(url = url.as_str()))]
    async fn fetch_with_retry(&self, url: Url) -> Result<String, IndexerError> {
        let mut delay = Duration::from_secs(1);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.fetch_once(&url).await {
                Ok(body) => return Ok(body),
                Err(err) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt,
                        MAX_ATTEMPTS,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => {
                    return Err(IndexerError::Network {
                        url: url.to_string(),
                        attempts: MAX_ATTEMPTS,
                        source: err,
                    });
                }
            }
        }

        unreachable!("the final attempt either returns the body or the error")
    }

    async fn fetch_once(&self, url: &Url) -> Result<String, reqwest::Error> {
        let response = self
            .client
            .get(url.clone())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        response.text().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_version_pattern_captures_suffixed_versions() {
        let body = r#"
            <a href="13.0.1/">13.0.1/</a>
            <a href="14.0.4-alpha/">14.0.4-alpha/</a>
            <a href="?C=N;O=D">Name</a>
            <a href="/tor-package-archive/">Parent Directory</a>
        "#;

        let versions: Vec<&str> = RELATIVE_VERSION_PATTERN
            .captures_iter(body)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();

        assert_eq!(versions, vec!["13.0.1", "14.0.4-alpha"]);
    }

    #[test]
    fn anchor_pattern_captures_every_href() {
        let body = r#"<a href="tor-expert-bundle-linux-x86_64-14.0.3.tar.gz">file</a>
            <a href="tor-expert-bundle-linux-x86_64-14.0.3.tar.gz.asc">sig</a>"#;

        let files: Vec<&str> = ANCHOR_PATTERN
            .captures_iter(body)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();

        assert_eq!(
            files,
            vec![
                "tor-expert-bundle-linux-x86_64-14.0.3.tar.gz",
                "tor-expert-bundle-linux-x86_64-14.0.3.tar.gz.asc"
            ]
        );
    }

    #[test]
    fn absolute_version_pattern_is_anchored_to_the_base_url() {
        let api = TorArchiveApi::new(
            Url::parse("https://archive.example.org/torbrowser/").unwrap(),
        )
        .unwrap();

        let body = r#"<a href="https://archive.example.org/torbrowser/13.0.1/">13.0.1</a>
            <a href="https://elsewhere.example.org/torbrowser/9.9.9/">9.9.9</a>"#;

        let versions: Vec<&str> = api
            .absolute_version_pattern
            .captures_iter(body)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();

        assert_eq!(versions, vec!["13.0.1"]);
    }
}
