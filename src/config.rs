use crate::errors::{DownloaderError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Aac,
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioFormat::Mp3 => write!(f, "mp3"),
            AudioFormat::Wav => write!(f, "wav"),
            AudioFormat::Flac => write!(f, "flac"),
            AudioFormat::Aac => write!(f, "aac"),
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = DownloaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            "flac" => Ok(AudioFormat::Flac),
            "aac" => Ok(AudioFormat::Aac),
            _ => Err(DownloaderError::InvalidFormat(s.to_string())),
        }
    }
}

/// Supported bitrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Bitrate {
    #[value(name = "128")]
    Kbps128,
    #[value(name = "192")]
    Kbps192,
    #[value(name = "256")]
    Kbps256,
    #[value(name = "320")]
    Kbps320,
}

impl std::fmt::Display for Bitrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

impl std::str::FromStr for Bitrate {
    type Err = DownloaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "128" => Ok(Bitrate::Kbps128),
            "192" => Ok(Bitrate::Kbps192),
            "256" => Ok(Bitrate::Kbps256),
            "320" => Ok(Bitrate::Kbps320),
            _ => Err(DownloaderError::InvalidBitrate(s.to_string())),
        }
    }
}

impl Bitrate {
    pub fn as_u32(&self) -> u32 {
        match self {
            Bitrate::Kbps128 => 128,
            Bitrate::Kbps192 => 192,
            Bitrate::Kbps256 => 256,
            Bitrate::Kbps320 => 320,
        }
    }
}

/// Persisted application defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub download_directory: PathBuf,
    pub default_format: AudioFormat,
    pub default_bitrate: Bitrate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_directory: dirs::audio_dir()
                .or_else(|| dirs::home_dir().map(|d| d.join("Music")))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("SpotifyDownloads"),
            default_format: AudioFormat::Mp3,
            default_bitrate: Bitrate::Kbps192,
        }
    }
}

impl Config {
    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| DownloaderError::Config("Could not find config directory".to_string()))
            .map(|dir| dir.join("spotify-playlist-dl"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.toml"))
    }

    /// Load configuration, falling back to defaults when no file exists yet
    pub fn load() -> Result<Self> {
        let settings_path = Self::settings_path()?;

        if !settings_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&settings_path)
            .map_err(|e| DownloaderError::Config(format!("Failed to read settings file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to the settings file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir).map_err(|e| {
            DownloaderError::Config(format!("Failed to create config directory: {}", e))
        })?;

        let content = toml::to_string_pretty(self)?;

        std::fs::write(Self::settings_path()?, content)
            .map_err(|e| DownloaderError::Config(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Ensure download directory exists
    pub fn ensure_download_directory(&self) -> Result<()> {
        std::fs::create_dir_all(&self.download_directory).map_err(|e| {
            DownloaderError::Config(format!("Failed to create download directory: {}", e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!(AudioFormat::from_str("MP3").unwrap(), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_str("flac").unwrap(), AudioFormat::Flac);
        assert!(AudioFormat::from_str("ogg").is_err());
    }

    #[test]
    fn bitrate_round_trips_through_display() {
        for s in ["128", "192", "256", "320"] {
            let b = Bitrate::from_str(s).unwrap();
            assert_eq!(b.to_string(), s);
        }
        assert!(Bitrate::from_str("64").is_err());
    }

    #[test]
    fn default_bitrate_is_192() {
        assert_eq!(Config::default().default_bitrate, Bitrate::Kbps192);
    }

    #[test]
    fn ensure_download_directory_creates_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            download_directory: dir.path().join("music").join("spotify"),
            ..Config::default()
        };

        config.ensure_download_directory().unwrap();
        assert!(config.download_directory.is_dir());
        // Already existing is fine too
        config.ensure_download_directory().unwrap();
    }
}
