use crate::tracker::JobKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the generation backend.
    pub base_url: String,
    pub data_dir: PathBuf,

    /// Minutes before the client gives up waiting on a podcast job.
    pub podcast_timeout_mins: u64,
    /// Minutes before the client gives up waiting on a conversation job.
    pub conversation_timeout_mins: u64,

    /// Client-side abort for a single generation request, in seconds.
    /// Default: 2100 (35 minutes).
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("gentrack"))
            .unwrap_or_else(|| PathBuf::from(".gentrack"));

        Self {
            base_url: "http://localhost:8000/api".to_string(),
            data_dir,
            podcast_timeout_mins: JobKind::Podcast.default_timeout().as_secs() / 60,
            conversation_timeout_mins: JobKind::Conversation.default_timeout().as_secs() / 60,
            request_timeout_secs: 2100,
        }
    }
}

/// Path to the gentrack config directory.
#[must_use]
pub fn gentrack_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("gentrack"))
        .unwrap_or_else(|| PathBuf::from(".gentrack"))
}

impl Config {
    /// Give-up threshold for a job kind.
    #[must_use]
    pub fn timeout_for(&self, kind: JobKind) -> Duration {
        let mins = match kind {
            JobKind::Podcast => self.podcast_timeout_mins,
            JobKind::Conversation => self.conversation_timeout_mins,
        };
        Duration::from_secs(mins * 60)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = gentrack_config_dir().join("config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let dir = gentrack_config_dir();
        std::fs::create_dir_all(&dir)?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(dir.join("config.toml"), content)?;
        Ok(())
    }
}
