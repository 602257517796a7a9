//! Cover art download.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Default timeout for thumbnail fetch requests.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Downloads an image URL to a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThumbnailFetcher: Send + Sync {
    /// Fetch `url` into `dest`.
    ///
    /// On failure no partial file is left at `dest`.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// [`ThumbnailFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpThumbnailFetcher {
    client: reqwest::Client,
}

impl HttpThumbnailFetcher {
    /// Create a fetcher with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::thumbnail(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::thumbnail(url, format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.starts_with("image/") {
            warn!("Unexpected content type for thumbnail: {}", content_type);
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::thumbnail(url, e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(Error::thumbnail(url, "Empty thumbnail data"));
        }
        Ok(written)
    }
}

#[async_trait]
impl ThumbnailFetcher for HttpThumbnailFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Fetching thumbnail {}", url);
        match self.download(url, dest).await {
            Ok(bytes) => {
                debug!("Saved thumbnail to {} ({} bytes)", dest.display(), bytes);
                Ok(())
            }
            Err(e) => {
                if dest.exists() {
                    if let Err(remove_err) = tokio::fs::remove_file(dest).await {
                        warn!(
                            "Failed to remove partial thumbnail {}: {}",
                            dest.display(),
                            remove_err
                        );
                    }
                }
                Err(e)
            }
        }
    }
}

/// Guess an image MIME type from its leading bytes.
#[must_use]
pub fn sniff_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if data.starts_with(b"GIF8") {
        "image/gif"
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the URL to hit.
    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "{status_line}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/thumb.jpg")
    }

    #[test]
    fn test_sniff_image_mime() {
        assert_eq!(sniff_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(
            sniff_image_mime(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]),
            "image/png"
        );
        assert_eq!(sniff_image_mime(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_image_mime(&[]), "image/jpeg");
    }

    #[tokio::test]
    async fn test_fetch_writes_file() {
        let url = serve_once("HTTP/1.1 200 OK", b"\xFF\xD8\xFFjpegdata").await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("thumb.jpg");

        let fetcher = HttpThumbnailFetcher::new(Duration::from_secs(5)).unwrap();
        fetcher.fetch(&url, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"\xFF\xD8\xFFjpegdata");
    }

    #[tokio::test]
    async fn test_fetch_non_success_leaves_no_file() {
        let url = serve_once("HTTP/1.1 404 Not Found", b"missing").await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("thumb.jpg");

        let fetcher = HttpThumbnailFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&url, &dest).await.unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::NetworkTransient);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_empty_body_leaves_no_file() {
        let url = serve_once("HTTP/1.1 200 OK", b"").await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("thumb.jpg");

        let fetcher = HttpThumbnailFetcher::new(Duration::from_secs(5)).unwrap();
        assert!(fetcher.fetch(&url, &dest).await.is_err());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("thumb.jpg");
        let fetcher = HttpThumbnailFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&format!("http://{addr}/x.jpg"), &dest)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NetworkTransient);
        assert!(!dest.exists());
    }
}
