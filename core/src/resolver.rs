use std::{
  panic::{self, AssertUnwindSafe},
  sync::Arc,
  thread::{self, JoinHandle},
  time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  engine::{BrowserOptions, CoreError},
  models::{
    format_bytes, ActivityLogEntry, ChunkPayload, LogPhase, NodePath, PointerId, SourceAnchor,
  },
  snapshot::BrowserSnapshot,
  value::{PointerPolicy, Value},
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  #[error("chunk for pointer {pointer} is unavailable")]
  Unavailable { pointer: PointerId },
  #[error("transport error: {0}")]
  Transport(String),
  #[error("fetch worker for pointer {pointer} panicked")]
  WorkerPanicked { pointer: PointerId },
  #[error("{path} no longer holds pointer {pointer}")]
  TargetVanished { pointer: PointerId, path: NodePath },
}

/// What the backing store returns for a pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedChunk {
  /// Logical value replacing the pointer. Imported with the browser's pointer policy, so it may
  /// carry further pointers.
  pub value: serde_json::Value,
  pub chunk: ChunkPayload,
  pub transferred_bytes: u64,
  /// Line anchors for paths inside `value`. The value itself maps to the chunk's first line.
  pub anchors: Vec<SourceAnchor>,
}

/// The chunk transport. Called on a worker thread; may block for as long as it likes.
pub trait ChunkFetcher: Send + Sync + 'static {
  fn fetch(&self, pointer: PointerId) -> Result<FetchedChunk, FetchError>;
}

impl<F> ChunkFetcher for F
where
  F: Fn(PointerId) -> Result<FetchedChunk, FetchError> + Send + Sync + 'static,
{
  fn fetch(&self, pointer: PointerId) -> Result<FetchedChunk, FetchError> {
    self(pointer)
  }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ResolutionOutcome {
  Loaded {
    pointer: PointerId,
    chunk_name: String,
    bytes: u64,
  },
  Failed {
    pointer: PointerId,
    reason: String,
  },
  /// The browser was reset while the fetch was in flight; nothing was applied.
  Discarded { pointer: PointerId },
}

/// A fetch running on its worker.
#[derive(Debug)]
pub struct PendingFetch {
  pointer: PointerId,
  entry_id: String,
  handle: JoinHandle<ResolutionOutcome>,
}

impl PendingFetch {
  pub fn pointer(&self) -> PointerId {
    self.pointer
  }

  /// Correlation id of the activity-log entry tracking this fetch.
  pub fn entry_id(&self) -> &str {
    &self.entry_id
  }

  pub fn is_finished(&self) -> bool {
    self.handle.is_finished()
  }

  /// Block until the result has been applied (or discarded).
  pub fn wait(self) -> Result<ResolutionOutcome, CoreError> {
    self
      .handle
      .join()
      .map_err(|_| CoreError::Task(format!("resolution worker for {} panicked", self.pointer)))
  }
}

/// Result of a pointer click.
#[derive(Debug)]
pub enum Dispatch {
  Started(PendingFetch),
  /// Already in flight; the click was a no-op.
  AlreadyLoading,
  /// The path does not hold that pointer (anymore); the click was a no-op.
  NotAPointer,
}

impl Dispatch {
  pub fn is_started(&self) -> bool {
    matches!(self, Dispatch::Started(_))
  }

  pub fn into_pending(self) -> Option<PendingFetch> {
    match self {
      Dispatch::Started(p) => Some(p),
      _ => None,
    }
  }
}

/// Everything the apply phase needs to find its way back.
#[derive(Debug, Clone)]
pub(crate) struct Ticket {
  pub pointer: PointerId,
  pub path: NodePath,
  pub entry_id: String,
  pub chunk_name: String,
  pub epoch: u64,
}

pub(crate) enum DispatchCheck {
  Ready(Ticket),
  AlreadyLoading,
  NotAPointer,
}

/// Dispatch phase: check-then-set on the loading set, and open the `loading` log entry.
pub(crate) fn dispatch(
  snap: &mut BrowserSnapshot,
  pointer: PointerId,
  path: &NodePath,
  options: &BrowserOptions,
  epoch: u64,
) -> DispatchCheck {
  if snap.loading.contains(&pointer) {
    return DispatchCheck::AlreadyLoading;
  }
  match snap.document.at(path) {
    Ok(Value::Pointer(id)) if *id == pointer => {}
    _ => return DispatchCheck::NotAPointer,
  }

  snap.loading.insert(pointer);
  let chunk_name = options.chunk_name(pointer);
  let entry_id = Uuid::new_v4().to_string();
  snap.activity.append(ActivityLogEntry {
    id: entry_id.clone(),
    pointer_id: pointer,
    timestamp_ms: now_ms(),
    phase: LogPhase::Loading,
    chunk_name: chunk_name.clone(),
    message: format!("Fetching chunk {chunk_name}..."),
    size_bytes: None,
  });

  DispatchCheck::Ready(Ticket {
    pointer,
    path: path.clone(),
    entry_id,
    chunk_name,
    epoch,
  })
}

/// Apply phase. The only place the document changes.
pub(crate) fn apply(
  snap: &mut BrowserSnapshot,
  ticket: &Ticket,
  result: Result<FetchedChunk, FetchError>,
  policy: &PointerPolicy,
) -> ResolutionOutcome {
  snap.loading.remove(&ticket.pointer);

  let fetched = match result {
    Ok(f) => f,
    Err(e) => return apply_failure(snap, ticket, e),
  };

  match snap.document.at(&ticket.path) {
    Ok(Value::Pointer(id)) if *id == ticket.pointer => {}
    _ => {
      return apply_failure(
        snap,
        ticket,
        FetchError::TargetVanished {
          pointer: ticket.pointer,
          path: ticket.path.clone(),
        },
      )
    }
  }
  let value = Value::from_json(&fetched.value, policy);
  if let Err(e) = Arc::make_mut(&mut snap.document).replace_at(&ticket.path, value) {
    return apply_failure(snap, ticket, FetchError::Transport(e.to_string()));
  }

  let FetchedChunk {
    chunk,
    transferred_bytes,
    anchors,
    ..
  } = fetched;
  let chunk_name = chunk.chunk_name.clone();

  snap.origins.drop_under(&ticket.path);
  snap.origins.record(&ticket.path, &chunk, &anchors);
  snap.chunks.put(chunk_name.clone(), chunk);

  snap.stats.chunks_loaded += 1;
  snap.stats.bytes_transferred = snap.stats.bytes_transferred.saturating_add(transferred_bytes);

  snap.activity.finalize_or_append(ActivityLogEntry {
    id: ticket.entry_id.clone(),
    pointer_id: ticket.pointer,
    timestamp_ms: now_ms(),
    phase: LogPhase::Success,
    chunk_name: chunk_name.clone(),
    message: format!(
      "Loaded chunk {chunk_name} (+{})",
      format_bytes(transferred_bytes)
    ),
    size_bytes: Some(transferred_bytes),
  });

  let cursor = &mut snap.source_cursor;
  let tracking = match cursor.chunk_name.as_deref() {
    None => true,
    Some(current) => current == ticket.chunk_name || current == chunk_name,
  };
  if tracking && cursor.chunk_name.as_deref() != Some(chunk_name.as_str()) {
    cursor.chunk_name = Some(chunk_name.clone());
    cursor.selected_line = None;
    cursor.hovered_line = None;
  }

  snap.refresh_selection(&ticket.path);

  ResolutionOutcome::Loaded {
    pointer: ticket.pointer,
    chunk_name,
    bytes: transferred_bytes,
  }
}

fn apply_failure(
  snap: &mut BrowserSnapshot,
  ticket: &Ticket,
  error: FetchError,
) -> ResolutionOutcome {
  snap.activity.finalize_or_append(ActivityLogEntry {
    id: ticket.entry_id.clone(),
    pointer_id: ticket.pointer,
    timestamp_ms: now_ms(),
    phase: LogPhase::Error,
    chunk_name: ticket.chunk_name.clone(),
    message: format!("Failed to load chunk {}: {error}", ticket.chunk_name),
    size_bytes: None,
  });
  ResolutionOutcome::Failed {
    pointer: ticket.pointer,
    reason: error.to_string(),
  }
}

/// Runs fetches on worker threads and hands their results to an apply callback.
#[derive(Clone)]
pub(crate) struct PointerResolver {
  fetcher: Arc<dyn ChunkFetcher>,
}

impl PointerResolver {
  pub(crate) fn new(fetcher: Arc<dyn ChunkFetcher>) -> Self {
    Self { fetcher }
  }

  pub(crate) fn spawn<F>(&self, ticket: Ticket, apply: F) -> PendingFetch
  where
    F: FnOnce(Ticket, Result<FetchedChunk, FetchError>) -> ResolutionOutcome + Send + 'static,
  {
    let fetcher = self.fetcher.clone();
    let pointer = ticket.pointer;
    let entry_id = ticket.entry_id.clone();

    let handle = thread::spawn(move || {
      // A panicking transport must still release the pointer.
      let result = panic::catch_unwind(AssertUnwindSafe(|| fetcher.fetch(pointer)))
        .unwrap_or(Err(FetchError::WorkerPanicked { pointer }));
      apply(ticket, result)
    });

    PendingFetch {
      pointer,
      entry_id,
      handle,
    }
  }
}

pub(crate) fn now_ms() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as i64
}
