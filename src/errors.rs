use thiserror::Error;

/// Main error type for the playlist downloader application
#[derive(Error, Debug)]
pub enum DownloaderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid playlist URL: {0}")]
    InvalidUrl(String),

    #[error("Spotify authentication error: {0}")]
    Auth(String),

    #[error("Playlist not found: {0}")]
    NotFound(String),

    #[error("Spotify API error: {0}")]
    Spotify(String),

    #[error("Credential file error: {0}")]
    Decode(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid bitrate: {0}")]
    InvalidBitrate(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("A {0} task is already running")]
    Busy(&'static str),

    #[error("The {name} task aborted unexpectedly: {reason}")]
    TaskAborted { name: &'static str, reason: String },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, DownloaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_abort_message_names_the_task() {
        let err = DownloaderError::TaskAborted {
            name: "fetch",
            reason: "panicked".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "The fetch task aborted unexpectedly: panicked"
        );
    }
}
