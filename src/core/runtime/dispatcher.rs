//! Routing of runtime events into the streams of a repository.
//!
//! Per-thread events go to the stream of their thread, opened on demand;
//! start and join events go to the single shared `start_join` stream. The
//! writer as a whole sits behind a read-write lock so that swapping the
//! repository is atomic with respect to in-flight notifications, while the
//! notifications themselves only contend on the stream they touch.

use crate::core::errors::RuntimeError;
use crate::core::events::Event;
use crate::core::repository::START_JOIN_FILE;
use crate::core::types::ThreadId;
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Dispatches events to the repository currently set, if any.
#[derive(Debug, Default)]
pub(crate) struct FilesystemDispatcher {
    writer: RwLock<Option<RepositoryWriter>>,
}

impl FilesystemDispatcher {
    /// Point the dispatcher at the repository rooted at `path`, creating the
    /// directory if needed. Streams already open for a previous repository
    /// are flushed and closed.
    pub(crate) fn set_repository(&self, path: &Path) -> Result<(), RuntimeError> {
        let writer = RepositoryWriter::create(path)?;
        *self.writer.write() = Some(writer);
        Ok(())
    }

    pub(crate) fn unset_repository(&self) {
        self.writer.write().take();
    }

    /// Write one event to the stream it belongs to. A dispatcher with no
    /// repository accepts and drops everything.
    pub(crate) fn dispatch(&self, event: &Event) -> io::Result<()> {
        let guard = self.writer.read();
        let Some(writer) = guard.as_ref() else {
            return Ok(());
        };
        match event.thread() {
            Some(thread) => writer.write_thread_event(thread, event),
            None => writer.write_start_join(event),
        }
    }
}

#[derive(Debug)]
struct RepositoryWriter {
    root: PathBuf,
    threads: Mutex<FxHashMap<ThreadId, Arc<Mutex<File>>>>,
    start_join: Mutex<Option<File>>,
}

impl RepositoryWriter {
    fn create(root: &Path) -> Result<Self, RuntimeError> {
        std::fs::create_dir_all(root).map_err(|source| RuntimeError::RepositoryIo {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(RepositoryWriter {
            root: root.to_path_buf(),
            threads: Mutex::new(FxHashMap::default()),
            start_join: Mutex::new(None),
        })
    }

    fn open_stream(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn write_record(file: &mut File, event: &Event) -> io::Result<()> {
        writeln!(file, "{event}")?;
        file.flush()
    }

    fn write_thread_event(&self, thread: ThreadId, event: &Event) -> io::Result<()> {
        // Only the stream lookup goes through the map mutex; the write
        // itself is under the per-stream mutex, which the owning thread
        // holds uncontended.
        let stream = {
            let mut threads = self.threads.lock();
            match threads.entry(thread) {
                Entry::Occupied(entry) => Arc::clone(entry.get()),
                Entry::Vacant(entry) => {
                    let file = Self::open_stream(&self.root.join(thread.to_string()))?;
                    Arc::clone(entry.insert(Arc::new(Mutex::new(file))))
                }
            }
        };

        let mut file = stream.lock();
        Self::write_record(&mut file, event)
    }

    fn write_start_join(&self, event: &Event) -> io::Result<()> {
        let mut stream = self.start_join.lock();
        if stream.is_none() {
            *stream = Some(Self::open_stream(&self.root.join(START_JOIN_FILE))?);
        }
        let Some(file) = stream.as_mut() else {
            return Ok(());
        };
        Self::write_record(file, event)
    }
}
