// Media acquisition: download the requested video and, when the URL does not
// look like an MP4, transcode it with an external ffmpeg.

use crate::error::{AnalysisError, AnalysisResult};
use anyhow::{anyhow, bail, Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Places the transcoder binary is looked up, in order.
pub const TRANSCODER_CANDIDATES: [&str; 3] = ["ffmpeg", "/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg"];

/// Client used for every video download. Certificate validation is off so
/// that self-signed storage endpoints keep working.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .context("Failed to build HTTP client")
}

/// URLs without "mp4" anywhere in them go through the transcoder.
pub fn needs_conversion(url: &str) -> bool {
    !url.to_lowercase().contains("mp4")
}

/// Fetch `url` into `workdir` and return the path of an MP4 ready for analysis.
pub async fn fetch_video(
    client: &reqwest::Client,
    url: &str,
    workdir: &Path,
    transcode_timeout: Duration,
) -> AnalysisResult<PathBuf> {
    if needs_conversion(url) {
        let input = workdir.join("source");
        let output = workdir.join("converted.mp4");
        tracing::info!("Converting {} to MP4", url);

        download_and_convert(client, url, &input, &output, transcode_timeout)
            .await
            .map_err(|e| AnalysisError::conversion(format!("Video conversion failed: {:#}", e)))?;
        return Ok(output);
    }

    let path = workdir.join("video.mp4");
    download_to_file(client, url, &path)
        .await
        .map_err(|e| AnalysisError::download(format!("{:#}", e)))?;

    let size = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        Err(_) => return Err(AnalysisError::DownloadFailed { details: None }),
    };
    if size == 0 {
        return Err(AnalysisError::EmptyVideo);
    }
    Ok(path)
}

async fn download_and_convert(
    client: &reqwest::Client,
    url: &str,
    input: &Path,
    output: &Path,
    timeout: Duration,
) -> Result<()> {
    download_to_file(client, url, input).await?;
    transcode_to_mp4(input, output, timeout).await
}

/// Stream `url` to `dest`. A partially written file is removed on failure.
pub async fn download_to_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    let result = stream_to_file(client, url, dest).await;
    if result.is_err() && dest.exists() {
        let _ = tokio::fs::remove_file(dest).await;
    }
    result
}

async fn stream_to_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        bail!("Failed to download file: {}", status.as_u16());
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("Download interrupted")?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    tracing::debug!("Downloaded {} bytes to {}", written, dest.display());
    Ok(written)
}

pub fn find_transcoder() -> Result<PathBuf> {
    TRANSCODER_CANDIDATES
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
        .ok_or_else(|| anyhow!("ffmpeg not found"))
}

/// `ffmpeg -i <input> -c:v libx264 -c:a aac -y <output>`, killed after `timeout`.
pub async fn transcode_to_mp4(input: &Path, output: &Path, timeout: Duration) -> Result<()> {
    let ffmpeg = find_transcoder()?;
    tracing::debug!("Running {} on {}", ffmpeg.display(), input.display());

    let child = Command::new(&ffmpeg)
        .arg("-i")
        .arg(input)
        .args(["-c:v", "libx264", "-c:a", "aac", "-y"])
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start {}", ffmpeg.display()))?;

    // Dropping the child on timeout kills the process
    let finished = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(finished) => finished.context("Failed to wait for ffmpeg")?,
        Err(_) => {
            tracing::warn!("ffmpeg timed out after {}s", timeout.as_secs());
            bail!("FFmpeg conversion timed out");
        }
    };

    if !finished.status.success() {
        bail!(
            "FFmpeg conversion failed: {}",
            String::from_utf8_lossy(&finished.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    /// Serve `/clip.mp4` (the given bytes), `/empty.mp4` (no bytes) and a 404
    /// for everything else on an ephemeral local port. Returns the base URL.
    pub async fn serve_clip(bytes: Vec<u8>) -> String {
        let app = Router::new()
            .route(
                "/clip.mp4",
                get(move || {
                    let bytes = bytes.clone();
                    async move { bytes }
                }),
            )
            .route("/empty.mp4", get(|| async { Vec::<u8>::new() }))
            .fallback(|| async { (StatusCode::NOT_FOUND, "not found") });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
