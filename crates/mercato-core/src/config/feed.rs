use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the file-backed event feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Directory holding `events-*.log` segments and `meta.json`
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Segment size that triggers rotation (bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Buffer size for writes
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,

    /// Largest accepted entry (bytes)
    #[serde(default = "default_max_event_size")]
    pub max_event_size: usize,

    /// Flush the write buffer after each append.
    ///
    /// Readers in other processes only see flushed entries.
    #[serde(default = "default_flush_on_append")]
    pub flush_on_append: bool,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("./data/feed")
}

fn default_max_file_size() -> u64 {
    64 * 1024 * 1024
}

fn default_write_buffer_size() -> usize {
    64 * 1024
}

fn default_max_event_size() -> usize {
    64 * 1024
}

fn default_flush_on_append() -> bool {
    true
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::new(default_base_dir())
    }
}

impl FeedConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            max_file_size: default_max_file_size(),
            write_buffer_size: default_write_buffer_size(),
            max_event_size: default_max_event_size(),
            flush_on_append: default_flush_on_append(),
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_max_event_size(mut self, bytes: usize) -> Self {
        self.max_event_size = bytes;
        self
    }
}
