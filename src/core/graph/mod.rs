mod lock_graph;
mod segmentation;

pub use lock_graph::{Gatelocks, GatelockInterner, LockEdge, LockGraph, LockGraphLabel};
pub use segmentation::SegmentationGraph;

pub(crate) use lock_graph::feed_thread_stream;
