//! The event model and its textual wire format.
//!
//! Every record is one line of text. The delimiter that follows the leading
//! integer selects the event kind, so the mixed per-thread streams and the
//! shared start/join stream are both parseable line by line:
//!
//! | event             | record                          |
//! |-------------------|---------------------------------|
//! | acquire           | `tid;;lid;;stack;;location`     |
//! | release           | `tid;lid;`                      |
//! | recursive acquire | `tid::lid::stack::location`     |
//! | recursive release | `tid:lid:`                      |
//! | start             | `parent~new_parent~child~`      |
//! | join              | `parent^new_parent^child^`      |
//! | segment hop       | `tid>segment>`                  |
//!
//! Call-stack frames are joined with `|` and the location is `file:line`;
//! both fields may be empty. Parsing tolerates surrounding whitespace in
//! every field and writing is deterministic, so records round-trip
//! byte-for-byte.

use crate::core::errors::AnalysisError;
use crate::core::types::{AcquireInfo, LockId, Segment, SourceLocation, ThreadId};
use std::fmt;
use std::str::FromStr;

/// A thread acquired a lock, possibly with diagnostic metadata about the
/// acquisition site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireEvent {
    pub thread: ThreadId,
    pub lock: LockId,
    pub info: AcquireInfo,
}

/// A thread released a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEvent {
    pub thread: ThreadId,
    pub lock: LockId,
}

/// A parent thread started a child thread: the parent's segment `parent` is
/// split into `new_parent`, and the child begins executing in `child`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartEvent {
    pub parent: Segment,
    pub new_parent: Segment,
    pub child: Segment,
}

/// A parent thread joined a child thread: the parent's segment `parent` is
/// split into `new_parent`, which also inherits from the child's final
/// segment `child`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinEvent {
    pub parent: Segment,
    pub new_parent: Segment,
    pub child: Segment,
}

/// A thread entered a new segment. Emitted right after each start and join
/// for every thread whose segment changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHopEvent {
    pub thread: ThreadId,
    pub segment: Segment,
}

/// Any event of the trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquire(AcquireEvent),
    Release(ReleaseEvent),
    RecursiveAcquire(AcquireEvent),
    RecursiveRelease(ReleaseEvent),
    Start(StartEvent),
    Join(JoinEvent),
    SegmentHop(SegmentHopEvent),
}

impl Event {
    /// Human-readable kind, used in error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Acquire(_) => "acquire",
            Event::Release(_) => "release",
            Event::RecursiveAcquire(_) => "recursive acquire",
            Event::RecursiveRelease(_) => "recursive release",
            Event::Start(_) => "start",
            Event::Join(_) => "join",
            Event::SegmentHop(_) => "segment hop",
        }
    }

    /// The thread a per-thread event belongs to. Start and join events are
    /// not specific to a thread and return `None`.
    pub fn thread(&self) -> Option<ThreadId> {
        match self {
            Event::Acquire(e) | Event::RecursiveAcquire(e) => Some(e.thread),
            Event::Release(e) | Event::RecursiveRelease(e) => Some(e.thread),
            Event::SegmentHop(e) => Some(e.thread),
            Event::Start(_) | Event::Join(_) => None,
        }
    }
}

fn write_acquire(f: &mut fmt::Formatter<'_>, e: &AcquireEvent, sep: &str) -> fmt::Result {
    let location = e
        .info
        .location
        .as_ref()
        .map(SourceLocation::to_string)
        .unwrap_or_default();
    write!(
        f,
        "{}{sep}{}{sep}{}{sep}{}",
        e.thread,
        e.lock,
        e.info.call_stack.join("|"),
        location
    )
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Acquire(e) => write_acquire(f, e, ";;"),
            Event::RecursiveAcquire(e) => write_acquire(f, e, "::"),
            Event::Release(e) => write!(f, "{};{};", e.thread, e.lock),
            Event::RecursiveRelease(e) => write!(f, "{}:{}:", e.thread, e.lock),
            Event::Start(e) => write!(f, "{}~{}~{}~", e.parent, e.new_parent, e.child),
            Event::Join(e) => write!(f, "{}^{}^{}^", e.parent, e.new_parent, e.child),
            Event::SegmentHop(e) => write!(f, "{}>{}>", e.thread, e.segment),
        }
    }
}

/// Split `record` on `sep` and expect exactly `arity` numeric fields plus an
/// optional empty trailer left by the trailing delimiter.
fn numeric_fields(record: &str, sep: char, arity: usize) -> Option<Vec<usize>> {
    let mut fields: Vec<&str> = record.split(sep).collect();
    if fields.len() == arity + 1 && fields[arity].trim().is_empty() {
        fields.pop();
    }
    if fields.len() != arity {
        return None;
    }
    fields
        .into_iter()
        .map(|field| field.trim().parse().ok())
        .collect()
}

fn parse_info(stack: &str, location: &str) -> Option<AcquireInfo> {
    let stack = stack.trim();
    let call_stack = if stack.is_empty() {
        Vec::new()
    } else {
        stack.split('|').map(|frame| frame.trim().to_string()).collect()
    };
    let location = location.trim();
    let location = if location.is_empty() {
        None
    } else {
        let (file, line) = location.rsplit_once(':')?;
        Some(SourceLocation {
            file: file.trim().to_string(),
            line: line.trim().parse().ok()?,
        })
    };
    Some(AcquireInfo {
        call_stack,
        location,
    })
}

fn parse_acquire(record: &str, sep: &str) -> Option<AcquireEvent> {
    let fields: Vec<&str> = record.split(sep).collect();
    if fields.len() != 4 {
        return None;
    }
    Some(AcquireEvent {
        thread: fields[0].trim().parse().ok()?,
        lock: fields[1].trim().parse().ok()?,
        info: parse_info(fields[2], fields[3])?,
    })
}

impl FromStr for Event {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let corrupt = || AnalysisError::CorruptRecord {
            record: s.to_string(),
        };
        let record = s.trim();

        // The leading integer, then the delimiter selecting the event kind.
        let digits = record
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(corrupt)?;
        if digits == 0 {
            return Err(corrupt());
        }
        let delimiter = record[digits..].trim_start();

        let event = if delimiter.starts_with(";;") {
            parse_acquire(record, ";;").map(Event::Acquire)
        } else if delimiter.starts_with("::") {
            parse_acquire(record, "::").map(Event::RecursiveAcquire)
        } else if delimiter.starts_with(';') {
            numeric_fields(record, ';', 2).map(|f| {
                Event::Release(ReleaseEvent {
                    thread: f[0],
                    lock: f[1],
                })
            })
        } else if delimiter.starts_with(':') {
            numeric_fields(record, ':', 2).map(|f| {
                Event::RecursiveRelease(ReleaseEvent {
                    thread: f[0],
                    lock: f[1],
                })
            })
        } else if delimiter.starts_with('~') {
            numeric_fields(record, '~', 3).map(|f| {
                Event::Start(StartEvent {
                    parent: Segment::new(f[0]),
                    new_parent: Segment::new(f[1]),
                    child: Segment::new(f[2]),
                })
            })
        } else if delimiter.starts_with('^') {
            numeric_fields(record, '^', 3).map(|f| {
                Event::Join(JoinEvent {
                    parent: Segment::new(f[0]),
                    new_parent: Segment::new(f[1]),
                    child: Segment::new(f[2]),
                })
            })
        } else if delimiter.starts_with('>') {
            numeric_fields(record, '>', 2).map(|f| {
                Event::SegmentHop(SegmentHopEvent {
                    thread: f[0],
                    segment: Segment::new(f[1]),
                })
            })
        } else {
            None
        };

        event.ok_or_else(corrupt)
    }
}
