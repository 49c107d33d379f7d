use crate::errors::Result;
use crate::spotify::{extract_playlist_id, Playlist, SpotifyClient};
use crate::tasks::TaskSlot;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Progress of one playlist fetch run. The task is re-runnable; nothing is
/// cached between runs.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    /// Extracting the playlist id from the URL
    Parsing,
    /// Requesting playlist name and track pages
    Fetching,
    /// Terminal: playlist resolved
    Loaded(Playlist),
    /// Terminal: the run failed, with the underlying message verbatim
    Failed(String),
}

/// Resolve a playlist URL to its name and song list, reporting progress on
/// `events`. A malformed URL fails before any network traffic.
pub async fn run(
    slot: &TaskSlot,
    client: &mut SpotifyClient,
    playlist_url: &str,
    events: &UnboundedSender<FetchEvent>,
) -> Result<Playlist> {
    let _permit = slot.try_acquire()?;

    let _ = events.send(FetchEvent::Parsing);
    let playlist_id = match extract_playlist_id(playlist_url) {
        Ok(id) => id,
        Err(e) => {
            warn!("Playlist URL rejected: {}", e);
            let _ = events.send(FetchEvent::Failed(e.to_string()));
            return Err(e);
        }
    };

    let _ = events.send(FetchEvent::Fetching);
    match client.fetch_playlist(&playlist_id).await {
        Ok(playlist) => {
            let _ = events.send(FetchEvent::Loaded(playlist.clone()));
            Ok(playlist)
        }
        Err(e) => {
            warn!("Playlist fetch failed: {}", e);
            let _ = events.send(FetchEvent::Failed(e.to_string()));
            Err(e)
        }
    }
}
