//! Analysis-side view of an event repository.
//!
//! A repository is a directory containing one file per thread, named by the
//! decimal representation of the thread's id, and at most one `start_join`
//! file holding every start and join event in arrival order. Files whose
//! names are not decimal thread ids are ignored.

use crate::core::errors::AnalysisError;
use crate::core::events::Event;
use crate::core::types::ThreadId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub(crate) const START_JOIN_FILE: &str = "start_join";

/// A repository of recorded events, opened for analysis.
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
}

impl Repository {
    /// Open the repository rooted at `root`, which must be an existing
    /// directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AnalysisError> {
        let root = root.into();
        let io_error = |source| AnalysisError::RepositoryIo {
            path: root.clone(),
            source,
        };

        let metadata = fs::metadata(&root).map_err(io_error)?;
        if !metadata.is_dir() {
            return Err(io_error(io::Error::other("not a directory")));
        }
        Ok(Repository { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// The events of the shared start/join stream, or `None` if the stream
    /// was never written, e.g. because the traced program stayed
    /// single-threaded.
    pub fn start_join_events(&self) -> Result<Option<Vec<Event>>, AnalysisError> {
        let path = self.root.join(START_JOIN_FILE);
        if !path.exists() {
            return Ok(None);
        }
        self.read_stream(&path).map(Some)
    }

    /// The per-thread streams, sorted by thread id so analysis is
    /// deterministic.
    pub fn thread_streams(&self) -> Result<Vec<(ThreadId, Vec<Event>)>, AnalysisError> {
        let io_error = |source| AnalysisError::RepositoryIo {
            path: self.root.clone(),
            source,
        };

        let mut streams = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Ok(thread) = name.parse::<ThreadId>() else {
                continue;
            };
            streams.push((thread, self.read_stream(&entry.path())?));
        }
        streams.sort_by_key(|(thread, _)| *thread);
        Ok(streams)
    }

    fn read_stream(&self, path: &Path) -> Result<Vec<Event>, AnalysisError> {
        let contents = fs::read_to_string(path).map_err(|source| AnalysisError::RepositoryIo {
            path: path.to_path_buf(),
            source,
        })?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}
