use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAll;
use anyhow::{Result, anyhow, bail};

/// Bytes requested per Range request.
const CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Archive served over HTTP(S).
///
/// Servers that advertise `Accept-Ranges: bytes` are read in ranged chunks
/// so a dropped connection only repeats the current chunk; others are
/// fetched with a single GET.
pub struct HttpSource {
    client: Client,
    url: String,
    size: u64,
    ranges: bool,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpSource {
    /// Create a new HTTP source
    ///
    /// This sends a HEAD request to learn the size and Range support
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let resp = client.head(&url).send().await?;

        if !resp.status().is_success() {
            bail!("HTTP request failed with status: {}", resp.status());
        }

        let ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("bytes"));

        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("Remote server did not return Content-Length"))?;

        Ok(Self {
            client,
            url,
            size,
            ranges,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    async fn read_range(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset + buf.len() as u64 - 1;
        let mut received = 0;
        let mut retry_count = 0;

        while received < buf.len() {
            let current_start = offset + received as u64;
            let range = format!("bytes={}-{}", current_start, end);

            let result = self
                .client
                .get(&self.url)
                .header("Range", &range)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
                        bail!("HTTP request failed with status: {}", resp.status());
                    }

                    let bytes = resp.bytes().await?;
                    if bytes.is_empty() {
                        bail!("Empty response for range {}", range);
                    }
                    let chunk_len = bytes.len().min(buf.len() - received);
                    buf[received..received + chunk_len].copy_from_slice(&bytes[..chunk_len]);
                    received += chunk_len;

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded");
                    }
                    log::warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count,
                        self.max_retry,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ReadAll for HttpSource {
    async fn read_all(&self) -> Result<Vec<u8>> {
        if !self.ranges {
            let resp = self.client.get(&self.url).send().await?.error_for_status()?;
            let bytes = resp.bytes().await?;
            self.transferred_bytes
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);
            return Ok(bytes.to_vec());
        }

        let size = usize::try_from(self.size)?;
        let mut data = vec![0u8; size];
        let mut offset = 0u64;
        while offset < self.size {
            let len = CHUNK_SIZE.min(self.size - offset) as usize;
            let start = offset as usize;
            self.read_range(offset, &mut data[start..start + len]).await?;
            offset += len as u64;
        }
        log::debug!("fetched {} bytes from {}", self.size, self.url);

        Ok(data)
    }
}
