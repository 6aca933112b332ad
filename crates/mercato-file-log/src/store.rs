use fs2::FileExt;
use mercato_core::{
    error::{MercatoError, Result},
    event_log::{EventLog, EventLogIterator, EventLogStats},
    types::EventId,
    FeedConfig,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

const HEADER_LEN: usize = 12;
const LOCK_FILE: &str = "LOCK";
const META_FILE: &str = "meta.json";

/// Metadata stored in meta.json
///
/// Saved after the entries it describes, so it may trail the segments but
/// never runs ahead of them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct FeedMeta {
    /// Next EventId to assign
    next_event_id: EventId,

    /// Segment currently appended to
    current_file_num: u64,

    /// Total number of entries across all segments
    total_events: u64,
}

struct Writer {
    file: BufWriter<File>,
    current_size: u64,
    meta: FeedMeta,
    /// Exclusive lock on the feed directory, released on drop
    _lock: File,
}

/// Last complete entry seen by a scan of the segments
#[derive(Debug, Clone, Copy)]
struct Tail {
    file_num: u64,
    /// Offset just past the last complete entry in `file_num`
    offset: u64,
    next_event_id: EventId,
}

/// File-based event feed
///
/// One writer per directory, enforced with a lock file. Any number of
/// read-only handles, in this process or others, may tail the feed; they
/// pick up new entries from disk on every call.
pub struct FileEventLog {
    config: FeedConfig,
    /// `None` for read-only handles
    writer: Option<Mutex<Writer>>,
    tail: Mutex<Tail>,
    next_event_id: AtomicU64,
    notify: Arc<Notify>,
}

impl FileEventLog {
    /// Open or create a feed under `config.base_dir` for appending
    ///
    /// Fails if another handle already writes to the directory.
    pub fn open(config: FeedConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.base_dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(config.base_dir.join(LOCK_FILE))?;
        lock.try_lock_exclusive().map_err(|e| {
            MercatoError::InvalidState(format!(
                "Event feed {} is locked by another writer: {}",
                config.base_dir.display(),
                e
            ))
        })?;

        let mut meta = Self::load_meta(&config.base_dir)?.unwrap_or_default();
        let tail = Self::recover(&config, &mut meta)?;

        let log_path = Self::log_file_path(&config.base_dir, meta.current_file_num);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let writer = Writer {
            file: BufWriter::with_capacity(config.write_buffer_size, file),
            current_size: tail.offset,
            meta,
            _lock: lock,
        };
        Self::save_meta(&config.base_dir, &writer.meta)?;

        Ok(Self {
            next_event_id: AtomicU64::new(writer.meta.next_event_id),
            writer: Some(Mutex::new(writer)),
            tail: Mutex::new(tail),
            config,
            notify: Arc::new(Notify::new()),
        })
    }

    /// Open an existing feed for reading only
    ///
    /// Never takes the writer lock, truncates or rewrites `meta.json`. A
    /// directory that does not exist yet reads as an empty feed.
    pub fn open_read_only(config: FeedConfig) -> Result<Self> {
        // A half-written meta.json only costs a longer first scan
        let meta = Self::load_meta(&config.base_dir).ok().flatten();
        let mut tail = match meta {
            Some(meta) => Tail {
                file_num: meta.current_file_num,
                offset: 0,
                next_event_id: meta.next_event_id,
            },
            None => Tail {
                file_num: 0,
                offset: 0,
                next_event_id: 0,
            },
        };
        advance_tail(&config.base_dir, &mut tail, config.max_event_size)?;

        Ok(Self {
            next_event_id: AtomicU64::new(tail.next_event_id),
            writer: None,
            tail: Mutex::new(tail),
            config,
            notify: Arc::new(Notify::new()),
        })
    }

    /// Fires after every append through this handle
    pub fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    pub fn is_read_only(&self) -> bool {
        self.writer.is_none()
    }

    fn log_file_path(base_dir: &Path, file_num: u64) -> PathBuf {
        base_dir.join(format!("events-{:08}.log", file_num))
    }

    fn load_meta(base_dir: &Path) -> Result<Option<FeedMeta>> {
        let data = match std::fs::read_to_string(base_dir.join(META_FILE)) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| MercatoError::Serialization(format!("Failed to parse meta.json: {}", e)))
    }

    /// Write meta.json through a rename so readers never see a partial file
    fn save_meta(base_dir: &Path, meta: &FeedMeta) -> Result<()> {
        let data = serde_json::to_string(meta)
            .map_err(|e| MercatoError::Serialization(format!("Failed to serialize meta: {}", e)))?;
        let tmp_path = base_dir.join("meta.json.tmp");
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(tmp_path, base_dir.join(META_FILE))?;
        Ok(())
    }

    /// Reconcile meta.json with the segments after a crash
    ///
    /// Scans forward from the segment meta.json names, across any later
    /// segments, counting entries written after the last metadata save. A
    /// torn entry at the tail is truncated away.
    fn recover(config: &FeedConfig, meta: &mut FeedMeta) -> Result<Tail> {
        let mut tail = Tail {
            file_num: meta.current_file_num,
            offset: 0,
            next_event_id: meta.next_event_id,
        };
        advance_tail(&config.base_dir, &mut tail, config.max_event_size)?;

        let path = Self::log_file_path(&config.base_dir, tail.file_num);
        if path.exists() {
            let len = std::fs::metadata(&path)?.len();
            if len > tail.offset {
                tracing::warn!(
                    "Truncating {} torn bytes at the end of {}",
                    len - tail.offset,
                    path.display()
                );
                OpenOptions::new().write(true).open(&path)?.set_len(tail.offset)?;
            }
        }

        if tail.next_event_id > meta.next_event_id {
            tracing::info!(
                "Recovered {} feed entries missing from meta.json",
                tail.next_event_id - meta.next_event_id
            );
        }
        meta.next_event_id = tail.next_event_id;
        meta.total_events = tail.next_event_id;
        meta.current_file_num = tail.file_num;

        Ok(tail)
    }

    fn writer(&self) -> Result<&Mutex<Writer>> {
        self.writer.as_ref().ok_or_else(|| {
            MercatoError::InvalidState(format!(
                "Event feed {} is open read-only",
                self.config.base_dir.display()
            ))
        })
    }

    fn check_entry_size(&self, event_bytes: &[u8]) -> Result<()> {
        if event_bytes.len() > self.config.max_event_size {
            return Err(MercatoError::InvalidState(format!(
                "Event size {} exceeds max_event_size {}",
                event_bytes.len(),
                self.config.max_event_size
            )));
        }
        Ok(())
    }

    fn write_entry(writer: &mut Writer, event_id: EventId, event_bytes: &[u8]) -> Result<()> {
        writer.file.write_all(&event_id.to_be_bytes())?;
        writer.file.write_all(&(event_bytes.len() as u32).to_be_bytes())?;
        writer.file.write_all(event_bytes)?;
        writer.current_size += (HEADER_LEN + event_bytes.len()) as u64;
        Ok(())
    }

    /// Start a new segment once the current one is full
    fn maybe_rotate(&self, writer: &mut Writer) -> Result<()> {
        if writer.current_size < self.config.max_file_size {
            return Ok(());
        }

        writer.file.flush()?;
        let old_path = Self::log_file_path(&self.config.base_dir, writer.meta.current_file_num);

        writer.meta.current_file_num += 1;
        let new_path = Self::log_file_path(&self.config.base_dir, writer.meta.current_file_num);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&new_path)?;

        writer.file = BufWriter::with_capacity(self.config.write_buffer_size, file);
        writer.current_size = 0;

        tracing::info!(
            "Rotated event feed: {} -> {}",
            old_path.display(),
            new_path.display()
        );
        Ok(())
    }

    fn finish_append(&self, writer: &mut Writer, appended: u64) -> Result<()> {
        if self.config.flush_on_append {
            writer.file.flush()?;
        }

        writer.meta.next_event_id += appended;
        writer.meta.total_events += appended;
        self.maybe_rotate(writer)?;
        Self::save_meta(&self.config.base_dir, &writer.meta)?;

        self.next_event_id
            .store(writer.meta.next_event_id, Ordering::SeqCst);
        Ok(())
    }

    /// Pick up entries other processes appended since the last call
    fn refresh(&self) -> Result<Tail> {
        let mut tail = self.tail.lock();
        advance_tail(&self.config.base_dir, &mut tail, self.config.max_event_size)?;
        self.next_event_id
            .fetch_max(tail.next_event_id, Ordering::SeqCst);
        Ok(*tail)
    }
}

impl EventLog for FileEventLog {
    fn append(&self, event_bytes: &[u8]) -> Result<EventId> {
        self.check_entry_size(event_bytes)?;

        let event_id = {
            let mut writer = self.writer()?.lock();
            let event_id = writer.meta.next_event_id;
            Self::write_entry(&mut writer, event_id, event_bytes)?;
            self.finish_append(&mut writer, 1)?;
            event_id
        };

        self.notify.notify_waiters();
        Ok(event_id)
    }

    fn append_batch(&self, events: &[Vec<u8>]) -> Result<EventId> {
        if events.is_empty() {
            return Err(MercatoError::InvalidState("Cannot append empty batch".into()));
        }
        for event in events {
            self.check_entry_size(event)?;
        }

        let first_id = {
            let mut writer = self.writer()?.lock();
            let first_id = writer.meta.next_event_id;
            for (offset, event_bytes) in events.iter().enumerate() {
                Self::write_entry(&mut writer, first_id + offset as u64, event_bytes)?;
            }
            self.finish_append(&mut writer, events.len() as u64)?;
            first_id
        };

        self.notify.notify_waiters();
        Ok(first_id)
    }

    fn next_event_id(&self) -> Result<EventId> {
        if self.writer.is_none() {
            return Ok(self.refresh()?.next_event_id);
        }
        Ok(self.next_event_id.load(Ordering::SeqCst))
    }

    fn iter_range(
        &self,
        start: EventId,
        end: Option<EventId>,
    ) -> Result<Box<dyn EventLogIterator>> {
        // Make buffered entries visible to the reader
        if let Some(writer) = &self.writer {
            writer.lock().file.flush()?;
        }

        Ok(Box::new(FeedIter {
            base_dir: self.config.base_dir.clone(),
            file_num: 0,
            reader: None,
            offset: 0,
            start,
            end: end.unwrap_or(EventId::MAX),
            max_event_size: self.config.max_event_size,
            done: false,
        }))
    }

    fn sync(&self) -> Result<()> {
        let writer = match &self.writer {
            Some(writer) => writer,
            None => return Ok(()),
        };
        let mut writer = writer.lock();
        writer.file.flush()?;
        writer.file.get_ref().sync_all()?;
        Self::save_meta(&self.config.base_dir, &writer.meta)?;
        Ok(())
    }

    fn stats(&self) -> Result<EventLogStats> {
        let (next_event_id, last_file) = match &self.writer {
            Some(writer) => {
                let writer = writer.lock();
                (writer.meta.next_event_id, writer.meta.current_file_num)
            }
            None => {
                let tail = self.refresh()?;
                (tail.next_event_id, tail.file_num)
            }
        };

        let mut total_bytes = 0u64;
        let mut file_count = 0usize;
        for file_num in 0..=last_file {
            let path = Self::log_file_path(&self.config.base_dir, file_num);
            if path.exists() {
                total_bytes += std::fs::metadata(&path)?.len();
                file_count += 1;
            }
        }

        Ok(EventLogStats {
            event_count: next_event_id,
            newest_event_id: next_event_id.checked_sub(1),
            total_bytes,
            file_count,
        })
    }
}

impl Drop for FileEventLog {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            tracing::warn!("Failed to sync event feed on drop: {}", e);
        }
    }
}

/// Move `tail` past every complete entry on disk
///
/// A segment is only left behind once its successor exists, and it is
/// drained again after that check so entries written just before a
/// rotation are not skipped.
fn advance_tail(base_dir: &Path, tail: &mut Tail, max_event_size: usize) -> Result<()> {
    loop {
        let path = FileEventLog::log_file_path(base_dir, tail.file_num);
        let sealed = FileEventLog::log_file_path(base_dir, tail.file_num + 1).exists();

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound && sealed => {
                tail.file_num += 1;
                tail.offset = 0;
                continue;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(tail.offset))?;
        while let Some((id, data)) = read_entry(&mut reader, max_event_size)? {
            tail.offset += (HEADER_LEN + data.len()) as u64;
            tail.next_event_id = tail.next_event_id.max(id + 1);
        }

        if !sealed {
            return Ok(());
        }
        tail.file_num += 1;
        tail.offset = 0;
    }
}

/// Fill `buf` as far as the reader allows; returns bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Read one framed entry. `None` at end of data, including a torn tail.
fn read_entry<R: Read>(reader: &mut R, max_event_size: usize) -> Result<Option<(EventId, Vec<u8>)>> {
    let mut header = [0u8; HEADER_LEN];
    if read_full(reader, &mut header)? < HEADER_LEN {
        return Ok(None);
    }

    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&header[0..8]);
    let mut size_bytes = [0u8; 4];
    size_bytes.copy_from_slice(&header[8..12]);

    let event_id = u64::from_be_bytes(id_bytes);
    let size = u32::from_be_bytes(size_bytes) as usize;

    if size > max_event_size {
        return Err(MercatoError::InvalidState(format!(
            "Event {} size {} exceeds max_event_size {}",
            event_id, size, max_event_size
        )));
    }

    let mut data = vec![0u8; size];
    if read_full(reader, &mut data)? < size {
        return Ok(None);
    }

    Ok(Some((event_id, data)))
}

/// Iterator over feed segments in order
struct FeedIter {
    base_dir: PathBuf,
    file_num: u64,
    reader: Option<BufReader<File>>,
    /// Offset just past the last complete entry read from `file_num`
    offset: u64,
    start: EventId,
    end: EventId,
    max_event_size: usize,
    done: bool,
}

impl FeedIter {
    fn read_next(&mut self) -> Result<Option<(EventId, Vec<u8>)>> {
        loop {
            if self.reader.is_none() {
                let path = FileEventLog::log_file_path(&self.base_dir, self.file_num);
                if !path.exists() {
                    return Ok(None);
                }
                self.reader = Some(BufReader::new(File::open(&path)?));
                self.offset = 0;
            }

            let reader = match self.reader.as_mut() {
                Some(reader) => reader,
                None => return Ok(None),
            };

            match read_entry(reader, self.max_event_size)? {
                Some((id, data)) => {
                    self.offset += (HEADER_LEN + data.len()) as u64;
                    if id < self.start {
                        continue;
                    }
                    if id >= self.end {
                        return Ok(None);
                    }
                    return Ok(Some((id, data)));
                }
                None => {
                    // A missing successor means we are at the tip
                    let next = FileEventLog::log_file_path(&self.base_dir, self.file_num + 1);
                    if !next.exists() {
                        return Ok(None);
                    }

                    // The segment is sealed; drain whatever landed before the rotation
                    reader.seek(SeekFrom::Start(self.offset))?;
                    if let Some((id, data)) = read_entry(reader, self.max_event_size)? {
                        self.offset += (HEADER_LEN + data.len()) as u64;
                        if id >= self.end {
                            return Ok(None);
                        }
                        if id >= self.start {
                            return Ok(Some((id, data)));
                        }
                        continue;
                    }

                    self.file_num += 1;
                    self.reader = None;
                }
            }
        }
    }
}

impl Iterator for FeedIter {
    type Item = Result<(EventId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
