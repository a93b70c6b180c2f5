//! Output naming and delivery of finished audio files.

use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::capture::{CaptureError, EncodedAudio};
use crate::config::{get_output_dir, AppConfig};

/// Title used when the page has none.
pub const DEFAULT_TITLE: &str = "social-audio";

const MAX_TITLE_CHARS: usize = 120;

fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || ('\u{0}'..='\u{1F}').contains(&c)
}

/// Make a page title safe to use as a file name.
///
/// Drops reserved and control characters, collapses whitespace runs to a
/// single space, trims, and keeps at most 120 characters.
pub fn sanitize_file_name(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !is_forbidden(*c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

/// Build `{title}-{timestamp}.{ext}` for a capture finished at `now`.
pub fn build_file_name(title: Option<&str>, extension: &str, now: DateTime<Utc>) -> String {
    let sanitized = title.map(sanitize_file_name).unwrap_or_default();
    let title = if sanitized.is_empty() {
        DEFAULT_TITLE
    } else {
        sanitized.as_str()
    };
    let timestamp = now.format("%Y-%m-%dT%H-%M-%S-%3fZ");
    format!("{}-{}.{}", title, timestamp, extension.to_ascii_lowercase())
}

/// Destination for finished captures.
pub trait DeliverySink: Send + Sync {
    /// Hand over a finished file. Returns where it ended up.
    fn deliver(&self, audio: &EncodedAudio, file_name: &str) -> Result<PathBuf, CaptureError>;
}

/// Saves captures into a directory without overwriting existing files.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Sink for the configured output directory, or the user's Downloads.
    pub fn from_config(config: &AppConfig) -> Result<Self, String> {
        Ok(Self::new(get_output_dir(config)?))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// `name.wav`, then `name (1).wav`, `name (2).wav`, ...
fn candidate_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({}){}", &file_name[..dot], attempt, &file_name[dot..]),
        _ => format!("{} ({})", file_name, attempt),
    }
}

impl DeliverySink for DirectorySink {
    fn deliver(&self, audio: &EncodedAudio, file_name: &str) -> Result<PathBuf, CaptureError> {
        std::fs::create_dir_all(&self.directory)?;

        let mut attempt = 0;
        loop {
            let path = self.directory.join(candidate_name(file_name, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&audio.bytes)?;
                    file.sync_all()?;
                    info!("Saved {} bytes to {:?}", audio.bytes.len(), path);
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
