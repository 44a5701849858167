use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Thread & lock identifier types
pub type ThreadId = usize;
pub type LockId = usize;

/// Identifies a contiguous region of one thread's execution that is not
/// interrupted by a start or join involving that thread.
///
/// Segments are ordered, start at zero and are never reused. They are the
/// vertices of the segmentation graph, over which the happens-before
/// relation is computed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Segment(usize);

impl Segment {
    pub fn new(value: usize) -> Self {
        Segment(value)
    }

    /// The segment immediately following this one. Allocation always goes
    /// through this so two distinct segments can never share a value.
    pub(crate) fn next(self) -> Segment {
        Segment(self.0 + 1)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Segment {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Segment)
    }
}

/// Source location recorded when an acquisition site is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Diagnostic metadata attached to a lock acquisition: the call stack and the
/// source location of the acquisition site, when the caller provided them.
///
/// Defaults to empty; the C notification path has no way to supply either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcquireInfo {
    pub call_stack: Vec<String>,
    pub location: Option<SourceLocation>,
}

impl AcquireInfo {
    /// Metadata carrying only an acquisition site.
    pub fn at(file: impl Into<String>, line: u32) -> Self {
        AcquireInfo {
            call_stack: Vec::new(),
            location: Some(SourceLocation {
                file: file.into(),
                line,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.call_stack.is_empty() && self.location.is_none()
    }
}
