use std::future::Future;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open wordlist: {locator}: {source}")]
    Unavailable {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read wordlist: {locator}: {source}")]
    Read {
        locator: String,
        #[source]
        source: std::io::Error,
    },
}

/// Lazy, finite, ordered producer of candidate strings. The dispatcher drains
/// it from a single coordinating task, so implementations need no locking.
pub trait CandidateSource {
    /// `Ok(None)` marks the end of the sequence.
    fn next_candidate(&mut self) -> impl Future<Output = Result<Option<String>, SourceError>> + Send;
}

fn clean_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let word = line.trim();
    if word.is_empty() {
        None
    } else {
        Some(word.to_string())
    }
}

/// Streams a wordlist file line by line. Lines are trimmed, blank lines are
/// skipped and invalid UTF-8 is replaced rather than rejected.
#[derive(Debug)]
pub struct FileWordlist {
    locator: String,
    reader: BufReader<File>,
    buf: Vec<u8>,
}

impl FileWordlist {
    pub async fn open(locator: &str) -> Result<Self, SourceError> {
        let path = crate::config::expand_tilde_string(locator);
        let handle = File::open(&path)
            .await
            .map_err(|e| SourceError::Unavailable {
                locator: path.clone(),
                source: e,
            })?;
        let is_dir = handle
            .metadata()
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir {
            return Err(SourceError::Unavailable {
                locator: path,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "is a directory"),
            });
        }
        Ok(Self {
            locator: path,
            reader: BufReader::new(handle),
            buf: Vec::with_capacity(256),
        })
    }
}

impl CandidateSource for FileWordlist {
    async fn next_candidate(&mut self) -> Result<Option<String>, SourceError> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .await
                .map_err(|e| SourceError::Read {
                    locator: self.locator.clone(),
                    source: e,
                })?;
            if read == 0 {
                return Ok(None);
            }
            if let Some(word) = clean_line(&self.buf) {
                return Ok(Some(word));
            }
        }
    }
}

/// In-memory candidates, mostly for library callers and tests.
#[derive(Debug, Default)]
pub struct InlineWordlist {
    words: std::vec::IntoIter<String>,
}

impl InlineWordlist {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        Self {
            words: words.into_iter(),
        }
    }
}

impl CandidateSource for InlineWordlist {
    async fn next_candidate(&mut self) -> Result<Option<String>, SourceError> {
        for word in self.words.by_ref() {
            if let Some(word) = clean_line(word.as_bytes()) {
                return Ok(Some(word));
            }
        }
        Ok(None)
    }
}

/// Opens the candidate source named by `locator`.
pub async fn open(locator: &str) -> Result<FileWordlist, SourceError> {
    FileWordlist::open(locator).await
}
