use crate::config::{AudioFormat, Bitrate};
use crate::errors::Result;
use crate::tasks::TaskSlot;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// One batch-download invocation over the selected songs
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub songs: Vec<String>,
    pub output_dir: PathBuf,
    pub format: AudioFormat,
    pub bitrate: Bitrate,
}

/// Progress of a download run, counted by songs started. Percentages are
/// coarse: a large song can sit on the same value for a while.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started { song: String, percent: u8 },
    SongCompleted { song: String },
    SongFailed { song: String, error: String },
}

/// One song that could not be acquired
#[derive(Debug, Clone)]
pub struct SongFailure {
    pub song: String,
    pub error: String,
}

/// Terminal report of a download run: everything attempted, with per-song
/// outcomes. A failed song never aborts the rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub completed: Vec<String>,
    pub failed: Vec<SongFailure>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Acquires one song's audio. Implemented by the yt-dlp wrapper; tests
/// substitute their own.
pub trait SongFetcher {
    fn fetch(
        &self,
        query: &str,
        job: &DownloadJob,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Search term for one song: the entry verbatim, biased toward audio results
fn search_query(song: &str) -> String {
    format!("{} audio", song.trim())
}

/// Download the job's songs in order, one at a time. `stop` is checked once
/// per iteration before the next song starts; a song in flight always runs
/// to completion or failure.
pub async fn run<F: SongFetcher>(
    slot: &TaskSlot,
    job: &DownloadJob,
    fetcher: &F,
    events: &UnboundedSender<DownloadEvent>,
    stop: &AtomicBool,
) -> Result<BatchReport> {
    let _permit = slot.try_acquire()?;

    let total = job.songs.len();
    let mut report = BatchReport::default();

    for (index, song) in job.songs.iter().enumerate() {
        if stop.load(Ordering::Acquire) {
            info!("Download cancelled after {} of {} songs", index, total);
            report.cancelled = true;
            break;
        }

        let percent = (index * 100 / total) as u8;
        let _ = events.send(DownloadEvent::Started {
            song: song.clone(),
            percent,
        });
        info!("Downloading {} of {}: {}", index + 1, total, song);

        match fetcher.fetch(&search_query(song), job).await {
            Ok(()) => {
                let _ = events.send(DownloadEvent::SongCompleted { song: song.clone() });
                report.completed.push(song.clone());
            }
            Err(e) => {
                warn!("Download failed for '{}': {}", song, e);
                let _ = events.send(DownloadEvent::SongFailed {
                    song: song.clone(),
                    error: e.to_string(),
                });
                report.failed.push(SongFailure {
                    song: song.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DownloaderError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Records queries; fails the songs whose (0-based) attempt index is
    /// listed, and optionally raises the stop flag after each fetch.
    struct FakeFetcher<'a> {
        queries: Mutex<Vec<String>>,
        fail_on: Vec<usize>,
        calls: AtomicUsize,
        stop_after: Option<&'a AtomicBool>,
    }

    impl<'a> FakeFetcher<'a> {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                queries: Mutex::new(Vec::new()),
                fail_on,
                calls: AtomicUsize::new(0),
                stop_after: None,
            }
        }
    }

    impl SongFetcher for FakeFetcher<'_> {
        async fn fetch(&self, query: &str, _job: &DownloadJob) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(stop) = self.stop_after {
                stop.store(true, Ordering::Release);
            }
            if self.fail_on.contains(&call) {
                Err(DownloaderError::Download("no results".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn job(songs: &[&str]) -> DownloadJob {
        DownloadJob {
            songs: songs.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from("/tmp/music"),
            format: AudioFormat::Mp3,
            bitrate: Bitrate::Kbps192,
        }
    }

    fn started_percents(events: &mut mpsc::UnboundedReceiver<DownloadEvent>) -> Vec<u8> {
        let mut percents = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let DownloadEvent::Started { percent, .. } = event {
                percents.push(percent);
            }
        }
        percents
    }

    #[tokio::test]
    async fn progress_is_floor_of_songs_started() {
        let job = job(&["a - x", "b - y", "c - z"]);
        let fetcher = FakeFetcher::new(vec![]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stop = AtomicBool::new(false);

        let slot = TaskSlot::new("download");
        let report = run(&slot, &job, &fetcher, &tx, &stop).await.unwrap();
        assert_eq!(report.completed.len(), 3);
        assert_eq!(started_percents(&mut rx), vec![0, 33, 66]);
    }

    #[tokio::test]
    async fn query_is_song_verbatim_plus_audio_qualifier() {
        let job = job(&[" Title - Artist "]);
        let fetcher = FakeFetcher::new(vec![]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let stop = AtomicBool::new(false);

        let slot = TaskSlot::new("download");
        run(&slot, &job, &fetcher, &tx, &stop).await.unwrap();
        let queries = fetcher.queries.lock().unwrap().clone();
        assert_eq!(queries, vec!["Title - Artist audio"]);
    }

    #[tokio::test]
    async fn failed_song_does_not_abort_the_batch() {
        let job = job(&["first - a", "second - b"]);
        let fetcher = FakeFetcher::new(vec![0]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stop = AtomicBool::new(false);

        let slot = TaskSlot::new("download");
        let report = run(&slot, &job, &fetcher, &tx, &stop).await.unwrap();
        assert_eq!(report.completed, vec!["second - b"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].song, "first - a");
        assert_eq!(report.attempted(), 2);
        assert!(!report.cancelled);

        let mut saw_failed = false;
        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                DownloadEvent::SongFailed { ref song, .. } => {
                    assert_eq!(song, "first - a");
                    saw_failed = true;
                }
                DownloadEvent::SongCompleted { ref song } => {
                    assert_eq!(song, "second - b");
                    saw_completed = true;
                }
                DownloadEvent::Started { .. } => {}
            }
        }
        assert!(saw_failed && saw_completed);
    }

    #[tokio::test]
    async fn stop_flag_skips_remaining_songs() {
        let job = job(&["one - a", "two - b", "three - c"]);
        let stop = AtomicBool::new(false);
        let mut fetcher = FakeFetcher::new(vec![]);
        fetcher.stop_after = Some(&stop);
        let (tx, _rx) = mpsc::unbounded_channel();

        let slot = TaskSlot::new("download");
        let report = run(&slot, &job, &fetcher, &tx, &stop).await.unwrap();
        assert_eq!(report.completed, vec!["one - a"]);
        assert!(report.cancelled);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
