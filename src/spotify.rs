use crate::errors::{DownloaderError, Result};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, info};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Track pages are requested at ascending offsets with this page size;
/// a short page is the only termination signal.
const PAGE_SIZE: usize = 100;

/// Extract the playlist id from a playlist URL. First match wins; no match
/// fails before any network call is made.
pub fn extract_playlist_id(url: &str) -> Result<String> {
    static PLAYLIST_RE: OnceLock<Regex> = OnceLock::new();
    let re = PLAYLIST_RE.get_or_init(|| Regex::new(r"playlist/([A-Za-z0-9]+)").unwrap());

    re.captures(url)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| DownloaderError::InvalidUrl(url.to_string()))
}

/// A fetched playlist: display name plus "<title> - <artist>" entries in
/// the API's track order
#[derive(Debug, Clone)]
pub struct Playlist {
    pub name: String,
    pub songs: Vec<String>,
}

/// Spotify API client using the client-credentials flow
pub struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    access_token: Option<String>,
    token_url: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl SpotifyClient {
    /// Create a new Spotify client
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self::with_endpoints(client_id, client_secret, TOKEN_URL, API_BASE)
    }

    /// Create a client against custom endpoints
    pub fn with_endpoints(
        client_id: String,
        client_secret: String,
        token_url: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            client_id,
            client_secret,
            access_token: None,
            token_url: token_url.into(),
            api_base: api_base.into(),
        }
    }

    /// Authenticate with the client-credentials flow. Called eagerly at
    /// login so bad credentials surface before they are persisted.
    pub async fn authenticate(&mut self) -> Result<()> {
        debug!("Requesting client-credentials token");

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];

        let response = self.client.post(&self.token_url).form(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DownloaderError::Auth(format!(
                "token request failed: {} - {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        self.access_token = Some(token.access_token);
        info!("Spotify authentication successful");
        Ok(())
    }

    async fn ensure_authenticated(&mut self) -> Result<()> {
        if self.access_token.is_none() {
            self.authenticate().await?;
        }
        Ok(())
    }

    /// Fetch a playlist's name and its full track list, page by page
    pub async fn fetch_playlist(&mut self, playlist_id: &str) -> Result<Playlist> {
        self.ensure_authenticated().await?;

        let name = self.fetch_playlist_name(playlist_id).await?;
        let songs = self.fetch_song_entries(playlist_id).await?;
        info!("Fetched {} tracks from '{}'", songs.len(), name);

        Ok(Playlist { name, songs })
    }

    async fn fetch_playlist_name(&self, playlist_id: &str) -> Result<String> {
        let url = format!("{}/playlists/{}", self.api_base, playlist_id);
        let response = self.get(&url, &[("fields", "name")]).await?;
        let body: serde_json::Value = response.json().await?;

        Ok(body
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or("Unknown Playlist")
            .to_string())
    }

    async fn fetch_song_entries(&self, playlist_id: &str) -> Result<Vec<String>> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let mut songs = Vec::new();
        let mut offset = 0usize;

        loop {
            debug!("Fetching track page at offset {}", offset);
            let response = self
                .get(
                    &url,
                    &[
                        ("offset", offset.to_string().as_str()),
                        ("limit", PAGE_SIZE.to_string().as_str()),
                    ],
                )
                .await?;
            let body: serde_json::Value = response.json().await?;

            let items = body
                .get("items")
                .and_then(|i| i.as_array())
                .cloned()
                .unwrap_or_default();
            let page_len = items.len();

            for item in &items {
                if let Some(song) = parse_song_entry(item) {
                    songs.push(song);
                }
            }

            if page_len < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        Ok(songs)
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let access_token = self
            .access_token
            .as_ref()
            .ok_or_else(|| DownloaderError::Auth("not authenticated".to_string()))?;

        let response = self
            .client
            .get(url)
            .query(query)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                DownloaderError::Auth(format!("{} - {}", status, body))
            }
            StatusCode::NOT_FOUND => DownloaderError::NotFound(url.to_string()),
            _ => DownloaderError::Spotify(format!("{} - {}", status, body)),
        })
    }
}

/// Format one playlist item as "<title> - <first artist>". Null tracks
/// (removed from the catalog) produce no entry.
fn parse_song_entry(item: &serde_json::Value) -> Option<String> {
    let track = item.get("track")?;
    if track.is_null() {
        return None;
    }

    let name = track.get("name").and_then(|n| n.as_str())?;
    let artist = track
        .get("artists")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|a| a.get("name"))
        .and_then(|n| n.as_str())?;

    Some(format!("{} - {}", name, artist))
}
