mod activity;
mod chunks;
pub mod demo;
mod engine;
mod models;
mod resolver;
mod snapshot;
mod tree;
mod value;

pub use crate::activity::ActivityLog;
pub use crate::chunks::{
  chunk_from_json, source_view, ChunkRegistry, LineContent, LineHighlight, RenderedLine,
  SourceOrigins, SourceView,
};
pub use crate::engine::{BrowserOptions, BrowserState};
pub use crate::models::{
  format_bytes, ActivityLogEntry, ChunkPayload, LogPhase, NodePath, PathSegment, PointerId,
  SelectedValue, SourceAnchor, SourceLine, SourceRef, SourceViewerCursor, TransferStats,
  ValueType, DEFAULT_CHUNK_SUFFIX,
};
pub use crate::resolver::{
  ChunkFetcher, Dispatch, FetchError, FetchedChunk, PendingFetch, ResolutionOutcome,
};
pub use crate::snapshot::{BrowserSeed, BrowserSnapshot};
pub use crate::tree::{materialize, ExpansionSet, TreeNode};
pub use crate::value::{classify, classify_raw, PathError, PointerPolicy, Value, POINTER_TAG};

pub use crate::engine::CoreError;
