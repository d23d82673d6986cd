//! Runtime settings.
//!
//! Everything here has a working default; the optional settings file only
//! needs the keys it wants to change.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checkpoint::DEFAULT_LOOKBACK_DAYS;
use crate::scheduler::AdvancePolicy;
use crate::source::{MailSource, MaildirSource, Selector, SourceId};

/// Errors in the settings file or the resulting configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("Failed to read settings from {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`Settings`].
    #[error("Failed to parse settings in {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Which items of a configured source get ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    /// Flagged messages only.
    #[default]
    Flagged,
    /// Every message.
    All,
    /// Unflagged messages only.
    Unflagged,
}

impl From<SelectorKind> for Selector {
    fn from(kind: SelectorKind) -> Self {
        match kind {
            SelectorKind::Flagged => Self::Flagged,
            SelectorKind::All => Self::All,
            SelectorKind::Unflagged => Self::Unflagged,
        }
    }
}

/// One configured Maildir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Maildir root (the directory holding `cur/` and `new/`).
    pub maildir: PathBuf,
    /// Checkpoint key; defaults to one derived from the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Which messages to ingest.
    #[serde(default)]
    pub select: SelectorKind,
}

impl SourceSettings {
    /// A flagged-only source for `maildir`.
    #[must_use]
    pub fn flagged(maildir: impl Into<PathBuf>) -> Self {
        Self {
            maildir: maildir.into(),
            id: None,
            select: SelectorKind::Flagged,
        }
    }

    /// Builds the source and its selector.
    #[must_use]
    pub fn to_source(&self) -> (MaildirSource, Selector) {
        let source = match &self.id {
            Some(id) => MaildirSource::new(&self.maildir).with_id(SourceId::new(id.as_str())),
            None => MaildirSource::new(&self.maildir),
        };
        (source, self.select.into())
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between scheduler ticks.
    pub tick_interval_secs: u64,
    /// Days of history fetched for a source seen for the first time.
    pub lookback_days: i64,
    /// Milliseconds without store activity before startup continues.
    pub idle_millis: u64,
    /// When checkpoints move forward.
    pub advance_policy: AdvancePolicy,
    /// Mail sources to ingest.
    pub sources: Vec<SourceSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            idle_millis: 1000,
            advance_policy: AdvancePolicy::default(),
            sources: Vec::new(),
        }
    }
}

impl Settings {
    /// Default settings file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailferry")
            .join("settings.json")
    }

    /// Loads settings from `path`, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks that the settings can drive a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero or out-of-range durations,
    /// when no source is configured, or when two sources share an id and so
    /// would share a checkpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid("tick_interval_secs must be positive".into()));
        }
        let lookback_fits = chrono::Duration::try_days(self.lookback_days)
            .and_then(|lookback| chrono::Utc::now().checked_sub_signed(lookback))
            .is_some();
        if self.lookback_days <= 0 || !lookback_fits {
            return Err(ConfigError::Invalid("lookback_days out of range".into()));
        }
        if self.idle_millis == 0 {
            return Err(ConfigError::Invalid("idle_millis must be positive".into()));
        }
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no mail source configured".into()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let (source, _) = source.to_source();
            if !seen.insert(source.id().clone()) {
                return Err(ConfigError::Invalid(format!(
                    "source {} is configured more than once; give each entry a distinct id",
                    source.id()
                )));
            }
        }
        Ok(())
    }

    /// Time between ticks.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Initial lookback for new sources.
    #[must_use]
    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.lookback_days)
            .unwrap_or_else(|| chrono::Duration::days(DEFAULT_LOOKBACK_DAYS))
    }

    /// Quiet period awaited at startup.
    #[must_use]
    pub const fn idle_duration(&self) -> Duration {
        Duration::from_millis(self.idle_millis)
    }
}
