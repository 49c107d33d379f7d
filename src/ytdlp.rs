use crate::errors::{DownloaderError, Result};
use crate::tasks::download::{DownloadJob, SongFetcher};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// yt-dlp subprocess wrapper
pub struct YtDlp {
    executable_path: String,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlp {
    pub fn new() -> Self {
        Self {
            executable_path: "yt-dlp".to_string(),
        }
    }

    /// Use a custom executable path
    pub fn with_path(executable_path: String) -> Self {
        Self { executable_path }
    }

    /// Check if yt-dlp is available
    pub async fn is_available(&self) -> bool {
        AsyncCommand::new(&self.executable_path)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Download the best audio stream for a free-text search query, writing
    /// into the job's output directory named by the remote title, transcoded
    /// to the requested format and bitrate.
    pub async fn download_search(&self, query: &str, job: &DownloadJob) -> Result<()> {
        let search_url = format!("ytsearch:{}", query);
        debug!("Running yt-dlp for '{}'", search_url);

        let mut cmd = AsyncCommand::new(&self.executable_path);
        cmd.arg(&search_url)
            .arg("--format")
            .arg("bestaudio/best")
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg(job.format.to_string())
            .arg("--audio-quality")
            .arg(job.bitrate.as_u32().to_string())
            .arg("--output")
            .arg(format!("{}/%(title)s.%(ext)s", job.output_dir.display()))
            .arg("--no-playlist")
            .arg("--quiet");

        let output = cmd
            .output()
            .await
            .map_err(|e| DownloaderError::Download(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloaderError::Download(format!(
                "yt-dlp failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl SongFetcher for YtDlp {
    async fn fetch(&self, query: &str, job: &DownloadJob) -> Result<()> {
        self.download_search(query, job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioFormat, Bitrate};

    #[tokio::test]
    async fn missing_executable_is_not_available() {
        let ytdlp = YtDlp::with_path("/nonexistent/yt-dlp".to_string());
        assert!(!ytdlp.is_available().await);
    }

    #[tokio::test]
    async fn missing_executable_fails_download_with_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let ytdlp = YtDlp::with_path("/nonexistent/yt-dlp".to_string());
        let job = DownloadJob {
            songs: vec!["Title - Artist".to_string()],
            output_dir: dir.path().to_path_buf(),
            format: AudioFormat::Mp3,
            bitrate: Bitrate::Kbps192,
        };

        match ytdlp.download_search("Title - Artist audio", &job).await {
            Err(DownloaderError::Download(_)) => {}
            other => panic!("expected Download error, got {:?}", other),
        }
    }
}
