//! On-disk persistence of the conversation.
//!
//! The store owns a single JSON file. Loading never fails: anything short of
//! a well-formed, unexpired conversation yields a fresh one, and the
//! [`LoadStatus`] says why.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{from_reader, to_writer_pretty};
use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result};
use crate::observability::{
    STORE_EXPIRED, STORE_LOAD_ERRORS, STORE_LOADS, STORE_SAVE_ERRORS, STORE_SAVES,
};
use crate::types::Conversation;

/// Longest accepted expiry window, in hours.
pub const MAX_EXPIRY_HOURS: f64 = 1_000_000.0;

/// How [`ConversationStore::load`] arrived at its conversation.
#[derive(Debug, Clone)]
pub enum LoadStatus {
    /// A persisted, unexpired conversation was restored.
    Restored,

    /// No persisted conversation existed.
    Fresh,

    /// The persisted conversation was older than the expiry and was dropped.
    Expired,

    /// The file exists but does not hold a valid conversation.
    Corrupt(Error),

    /// The file could not be read.
    Unreadable(Error),
}

/// The result of loading the conversation.
#[derive(Debug, Clone)]
pub struct Loaded {
    /// The conversation to continue with.
    pub conversation: Conversation,
    /// Why this conversation was chosen.
    pub status: LoadStatus,
}

/// Persists one conversation as JSON and restores it with expiry.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    path: PathBuf,
    expiry: Duration,
    system_prompt: String,
    default_model: String,
}

impl ConversationStore {
    /// Creates a store for `path`.
    ///
    /// `system_prompt` and `default_model` seed every fresh conversation.
    /// `expiry_hours` is clamped to `0..=MAX_EXPIRY_HOURS`.
    pub fn new(
        path: impl Into<PathBuf>,
        expiry_hours: f64,
        system_prompt: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        let expiry_hours = if expiry_hours.is_nan() {
            MAX_EXPIRY_HOURS
        } else {
            expiry_hours.clamp(0.0, MAX_EXPIRY_HOURS)
        };
        Self {
            path: path.into(),
            expiry: Duration::seconds_f64(expiry_hours * 3600.0),
            system_prompt: system_prompt.into(),
            default_model: default_model.into(),
        }
    }

    /// Returns the path of the conversation file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the expiry window.
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Builds a conversation from the configured defaults.
    pub fn fresh(&self) -> Conversation {
        Conversation::new(self.system_prompt.clone(), self.default_model.clone())
    }

    /// Loads the persisted conversation, measuring expiry from now.
    pub fn load(&self) -> Loaded {
        self.load_at(OffsetDateTime::now_utc())
    }

    /// Loads the persisted conversation, measuring expiry from `now`.
    ///
    /// A conversation whose last assistant turn is at least the expiry window
    /// before `now` is discarded.
    pub fn load_at(&self, now: OffsetDateTime) -> Loaded {
        STORE_LOADS.click();
        let conversation = match self.read() {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "no conversation file");
                return self.fresh_with(LoadStatus::Fresh);
            }
            Err(err) => {
                STORE_LOAD_ERRORS.click();
                tracing::debug!(path = %self.path.display(), error = %err, "conversation file rejected");
                let status = if err.is_io() {
                    LoadStatus::Unreadable(err)
                } else {
                    LoadStatus::Corrupt(err)
                };
                return self.fresh_with(status);
            }
        };

        if let Some(last) = conversation.last_message_time()
            && now - last >= self.expiry
        {
            STORE_EXPIRED.click();
            tracing::debug!(
                path = %self.path.display(),
                idle_seconds = (now - last).whole_seconds(),
                "conversation expired"
            );
            return self.fresh_with(LoadStatus::Expired);
        }

        Loaded {
            conversation,
            status: LoadStatus::Restored,
        }
    }

    /// Stamps the conversation with the current time and writes it out.
    pub fn save(&self, conversation: &mut Conversation) -> Result<()> {
        self.save_at(conversation, OffsetDateTime::now_utc())
    }

    /// Stamps the conversation with `now` and writes it out.
    ///
    /// The file is written beside the target and renamed over it, so a crash
    /// leaves either the old content or the new.
    pub fn save_at(&self, conversation: &mut Conversation, now: OffsetDateTime) -> Result<()> {
        conversation.stamp(now);
        let result = self.write(conversation);
        match &result {
            Ok(()) => STORE_SAVES.click(),
            Err(err) => {
                STORE_SAVE_ERRORS.click();
                tracing::debug!(path = %self.path.display(), error = %err, "conversation save failed");
            }
        }
        result
    }

    /// Removes the conversation file. A missing file is not an error.
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::io("failed to delete conversation file", err)),
        }
    }

    fn read(&self) -> Result<Option<Conversation>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::io("failed to open conversation file", err)),
        };
        let reader = BufReader::new(file);
        let conversation = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse conversation file", Some(Box::new(err)))
        })?;
        Ok(Some(conversation))
    }

    fn write(&self, conversation: &Conversation) -> Result<()> {
        let staging = self.staging_path();
        let file = File::create(&staging)
            .map_err(|err| Error::io("failed to create conversation file", err))?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, conversation).map_err(|err| {
            Error::serialization("failed to serialize conversation", Some(Box::new(err)))
        })?;
        writer
            .flush()
            .map_err(|err| Error::io("failed to write conversation file", err))?;
        drop(writer);
        fs::rename(&staging, &self.path)
            .map_err(|err| Error::io("failed to replace conversation file", err))
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn fresh_with(&self, status: LoadStatus) -> Loaded {
        Loaded {
            conversation: self.fresh(),
            status,
        }
    }
}
