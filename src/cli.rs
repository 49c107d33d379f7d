use crate::config::{AudioFormat, Bitrate, Config};
use crate::credentials::{CredentialStore, Credentials};
use crate::errors::{DownloaderError, Result};
use crate::spotify::{Playlist, SpotifyClient};
use crate::tasks::download::{BatchReport, DownloadEvent, DownloadJob};
use crate::tasks::fetch::FetchEvent;
use crate::tasks::{DOWNLOAD_SLOT, FETCH_SLOT};
use crate::ytdlp::YtDlp;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Spotify Playlist Downloader - fetch a playlist's track list and download
/// the songs as audio files via yt-dlp
#[derive(Parser)]
#[command(name = "spotify-playlist-dl")]
#[command(about = "Download Spotify playlists as local audio files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate Spotify API credentials and save them for later runs
    Login {
        /// Spotify client ID
        client_id: String,
        /// Spotify client secret
        client_secret: String,
    },

    /// Remove saved credentials
    Logout,

    /// Fetch a playlist and print its track list
    Fetch {
        /// Spotify playlist URL
        url: String,
    },

    /// Download a playlist's songs
    Download {
        /// Spotify playlist URL
        url: String,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<AudioFormat>,

        /// Audio bitrate in kbps
        #[arg(short, long, value_enum)]
        bitrate: Option<Bitrate>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Songs to include, as 1-based indices into the track list,
        /// e.g. "1,3,5-8" (default: all)
        #[arg(short, long)]
        select: Option<String>,
    },

    /// Configure application defaults
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set download directory
    SetDir {
        /// Directory path
        path: PathBuf,
    },

    /// Set default audio format
    SetFormat {
        /// Audio format
        #[arg(value_enum)]
        format: AudioFormat,
    },

    /// Set default bitrate
    SetBitrate {
        /// Bitrate in kbps
        #[arg(value_enum)]
        bitrate: Bitrate,
    },

    /// Reset to default settings
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Cli as clap::Parser>::parse()
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Login {
                client_id,
                client_secret,
            } => handle_login(client_id, client_secret).await,
            Commands::Logout => handle_logout(),
            Commands::Fetch { url } => handle_fetch(&url).await,
            Commands::Download {
                url,
                format,
                bitrate,
                output,
                select,
            } => handle_download(&url, format, bitrate, output, select.as_deref()).await,
            Commands::Config { command } => handle_config(command),
        }
    }
}

async fn handle_login(client_id: String, client_secret: String) -> Result<()> {
    if client_id.is_empty() || client_secret.is_empty() {
        return Err(DownloaderError::Auth(
            "both client ID and client secret are required".to_string(),
        ));
    }

    // Credentials are only persisted after the token round-trip succeeds,
    // so a typo'd secret is caught here instead of on first use.
    let mut client = SpotifyClient::new(client_id.clone(), client_secret.clone());
    client.authenticate().await?;

    CredentialStore::default().save(&Credentials {
        client_id,
        client_secret,
    })?;
    println!("Login successful, credentials saved.");
    Ok(())
}

fn handle_logout() -> Result<()> {
    CredentialStore::default().clear()?;
    println!("Credentials cleared.");
    Ok(())
}

/// Load saved credentials. A corrupt file is reported but treated as "no
/// saved credentials" rather than a hard failure.
fn saved_credentials() -> Option<Credentials> {
    match CredentialStore::default().load() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("Warning: could not read saved credentials: {}", e);
            None
        }
    }
}

fn authenticated_client() -> Result<SpotifyClient> {
    let credentials = saved_credentials().ok_or_else(|| {
        DownloaderError::Auth("not logged in. Run `spotify-playlist-dl login` first".to_string())
    })?;
    Ok(SpotifyClient::new(
        credentials.client_id,
        credentials.client_secret,
    ))
}

/// Run the playlist fetch task, echoing its progress events
async fn run_fetch(client: SpotifyClient, url: String) -> Result<Playlist> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut client = client;
        crate::tasks::fetch::run(&FETCH_SLOT, &mut client, &url, &tx).await
    });

    while let Some(event) = rx.recv().await {
        match event {
            FetchEvent::Parsing => println!("Extracting playlist ID..."),
            FetchEvent::Fetching => println!("Fetching tracks..."),
            FetchEvent::Loaded(_) | FetchEvent::Failed(_) => {}
        }
    }

    handle.await.map_err(|e| DownloaderError::TaskAborted {
        name: "fetch",
        reason: e.to_string(),
    })?
}

async fn handle_fetch(url: &str) -> Result<()> {
    let client = authenticated_client()?;
    let playlist = run_fetch(client, url.to_string()).await?;

    println!("\n{} ({} songs)", playlist.name, playlist.songs.len());
    for (i, song) in playlist.songs.iter().enumerate() {
        println!("{:4}. {}", i + 1, song);
    }
    Ok(())
}

async fn handle_download(
    url: &str,
    format: Option<AudioFormat>,
    bitrate: Option<Bitrate>,
    output: Option<PathBuf>,
    select: Option<&str>,
) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(dir) = output {
        config.download_directory = dir;
    }
    let format = format.unwrap_or(config.default_format);
    let bitrate = bitrate.unwrap_or(config.default_bitrate);

    let ytdlp = YtDlp::new();
    if !ytdlp.is_available().await {
        return Err(DownloaderError::Download(
            "yt-dlp not found. Install it and make sure it is on PATH".to_string(),
        ));
    }

    let client = authenticated_client()?;
    let playlist = run_fetch(client, url.to_string()).await?;
    println!(
        "Loaded {} songs from '{}'",
        playlist.songs.len(),
        playlist.name
    );

    let songs = match select {
        Some(expr) => {
            let indices = parse_selection(expr, playlist.songs.len())?;
            indices
                .into_iter()
                .map(|i| playlist.songs[i].clone())
                .collect()
        }
        None => playlist.songs.clone(),
    };
    if songs.is_empty() {
        println!("Nothing selected, nothing to do.");
        return Ok(());
    }

    config.ensure_download_directory()?;
    let job = DownloadJob {
        songs,
        output_dir: config.download_directory.clone(),
        format,
        bitrate,
    };
    println!(
        "Downloading {} songs to {} ({}, {} kbps)",
        job.songs.len(),
        job.output_dir.display(),
        job.format,
        job.bitrate
    );

    // Ctrl-C requests a stop; the song in flight still runs to completion.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\nStopping after the current song...");
                stop.store(true, Ordering::Release);
            }
        });
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = {
        let job = job.clone();
        let stop = Arc::clone(&stop);
        tokio::spawn(
            async move { crate::tasks::download::run(&DOWNLOAD_SLOT, &job, &ytdlp, &tx, &stop).await },
        )
    };

    while let Some(event) = rx.recv().await {
        match event {
            DownloadEvent::Started { song, percent } => {
                println!("[{:3}%] Downloading: {}", percent, song)
            }
            DownloadEvent::SongCompleted { song } => println!("       Done: {}", song),
            DownloadEvent::SongFailed { song, error } => {
                println!("       Failed: {} ({})", song, error)
            }
        }
    }

    let report = handle.await.map_err(|e| DownloaderError::TaskAborted {
        name: "download",
        reason: e.to_string(),
    })??;
    print_report(&report);
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!(
        "\nFinished: {} attempted, {} downloaded, {} failed{}",
        report.attempted(),
        report.completed.len(),
        report.failed.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for failure in &report.failed {
        println!("  ✗ {}: {}", failure.song, failure.error);
    }
}

fn handle_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = Config::load()?;
            println!("Current configuration:");
            println!(
                "  Download directory: {}",
                config.download_directory.display()
            );
            println!("  Default format: {}", config.default_format);
            println!("  Default bitrate: {} kbps", config.default_bitrate);
        }
        ConfigCommands::SetDir { path } => {
            let mut config = Config::load()?;
            config.download_directory = path;
            config.save()?;
            println!("Download directory updated");
        }
        ConfigCommands::SetFormat { format } => {
            let mut config = Config::load()?;
            config.default_format = format;
            config.save()?;
            println!("Default format updated to: {}", format);
        }
        ConfigCommands::SetBitrate { bitrate } => {
            let mut config = Config::load()?;
            config.default_bitrate = bitrate;
            config.save()?;
            println!("Default bitrate updated to: {} kbps", bitrate);
        }
        ConfigCommands::Reset => {
            Config::default().save()?;
            println!("Configuration reset to defaults");
        }
    }
    Ok(())
}

/// Parse a 1-based selection like "1,3,5-8" into 0-based indices in track
/// order, deduplicated
fn parse_selection(expr: &str, total: usize) -> Result<Vec<usize>> {
    let mut indices = BTreeSet::new();

    for part in expr.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (parse_index(a, total)?, parse_index(b, total)?),
            None => {
                let i = parse_index(part, total)?;
                (i, i)
            }
        };
        if start > end {
            return Err(DownloaderError::InvalidSelection(format!(
                "range '{}' is reversed",
                part
            )));
        }
        indices.extend(start..=end);
    }

    Ok(indices.into_iter().collect())
}

fn parse_index(s: &str, total: usize) -> Result<usize> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| DownloaderError::InvalidSelection(format!("'{}' is not a number", s)))?;
    if n < 1 || n > total {
        return Err(DownloaderError::InvalidSelection(format!(
            "{} is out of range 1-{}",
            n, total
        )));
    }
    Ok(n - 1)
}
