use std::sync::{
  mpsc::{self, Receiver, Sender},
  Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  models::{NodePath, PointerId, SelectedValue, DEFAULT_CHUNK_SUFFIX},
  resolver::{
    self, ChunkFetcher, Dispatch, DispatchCheck, FetchError, FetchedChunk, PointerResolver,
    ResolutionOutcome, Ticket,
  },
  snapshot::{BrowserSeed, BrowserSnapshot},
  value::PointerPolicy,
};

#[derive(Debug, Error)]
pub enum CoreError {
  #[error("invalid argument: {0}")]
  InvalidArg(String),
  #[error("task error: {0}")]
  Task(String),
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserOptions {
  /// Keep at most this many activity-log entries (oldest dropped). `None` keeps everything.
  pub log_capacity: Option<usize>,
  pub pointer_policy: PointerPolicy,
  /// Appended to a pointer id to name the chunk it loads from.
  pub chunk_suffix: String,
}

impl Default for BrowserOptions {
  fn default() -> Self {
    Self {
      log_capacity: Some(500),
      pointer_policy: PointerPolicy::default(),
      chunk_suffix: DEFAULT_CHUNK_SUFFIX.to_string(),
    }
  }
}

impl BrowserOptions {
  /// Parse options from JSON; missing fields take their defaults.
  pub fn from_json_str(s: &str) -> Result<Self, CoreError> {
    let opts: Self = serde_json::from_str(s)?;
    opts.validate()?;
    Ok(opts)
  }

  pub fn validate(&self) -> Result<(), CoreError> {
    if self.log_capacity == Some(0) {
      return Err(CoreError::InvalidArg("log_capacity must be at least 1".into()));
    }
    if self.chunk_suffix.is_empty() {
      return Err(CoreError::InvalidArg("chunk_suffix is empty".into()));
    }
    Ok(())
  }

  pub fn chunk_name(&self, pointer: PointerId) -> String {
    format!("{pointer}{}", self.chunk_suffix)
  }
}

struct Shared {
  current: Arc<BrowserSnapshot>,
  /// Bumped by reset; completions from an older epoch are dropped.
  epoch: u64,
  subscribers: Vec<Sender<Arc<BrowserSnapshot>>>,
}

impl Shared {
  fn publish(&mut self, next: Arc<BrowserSnapshot>) {
    self.current = next.clone();
    self.subscribers.retain(|tx| tx.send(next.clone()).is_ok());
  }
}

/// The browser aggregate. Cheap to clone; clones share state.
///
/// Every action runs to completion under one lock and publishes a fresh snapshot, so observers
/// never see a half-applied transition. Fetches run outside the lock.
#[derive(Clone)]
pub struct BrowserState {
  options: BrowserOptions,
  initial: Arc<BrowserSnapshot>,
  shared: Arc<Mutex<Shared>>,
  resolver: PointerResolver,
}

impl BrowserState {
  pub fn new(
    seed: BrowserSeed,
    fetcher: impl ChunkFetcher,
    options: BrowserOptions,
  ) -> Result<Self, CoreError> {
    Self::with_fetcher(seed, Arc::new(fetcher), options)
  }

  pub fn with_fetcher(
    seed: BrowserSeed,
    fetcher: Arc<dyn ChunkFetcher>,
    options: BrowserOptions,
  ) -> Result<Self, CoreError> {
    options.validate()?;
    let initial = Arc::new(BrowserSnapshot::initial(&seed, &options));
    Ok(Self {
      options,
      shared: Arc::new(Mutex::new(Shared {
        current: initial.clone(),
        epoch: 0,
        subscribers: Vec::new(),
      })),
      initial,
      resolver: PointerResolver::new(fetcher),
    })
  }

  pub fn options(&self) -> &BrowserOptions {
    &self.options
  }

  pub fn snapshot(&self) -> Arc<BrowserSnapshot> {
    self.shared.lock().current.clone()
  }

  /// Receive every snapshot published from now on.
  pub fn subscribe(&self) -> Receiver<Arc<BrowserSnapshot>> {
    let (tx, rx) = mpsc::channel();
    self.shared.lock().subscribers.push(tx);
    rx
  }

  /// Returns whether `path` is expanded afterwards.
  pub fn toggle_expand(&self, path: &NodePath) -> bool {
    self.transition(|snap| (snap.toggle_expand(path), true))
  }

  /// Inspect the value at `path`. A path that does not resolve is ignored.
  pub fn select_value(&self, path: &NodePath) -> Option<SelectedValue> {
    self.transition(|snap| {
      let selected = snap.select(path);
      let changed = selected.is_some();
      (selected, changed)
    })
  }

  /// Track the source line under the pointer in the source viewer.
  pub fn hover_line(&self, line: Option<u64>) {
    self.transition(|snap| ((), snap.hover(line)))
  }

  pub fn clear_log(&self) {
    self.transition(|snap| {
      snap.activity.clear();
      ((), true)
    })
  }

  /// Back to the initial snapshot. In-flight fetches finish but are not applied, and their
  /// pointers are clickable again right away.
  pub fn reset(&self) {
    let mut shared = self.shared.lock();
    shared.epoch += 1;
    let in_flight = shared.current.loading.len();
    shared.publish(self.initial.clone());
    debug!(epoch = shared.epoch, in_flight, "browser reset");
  }

  /// Resolve the pointer at `path`. Clicking a pointer that is already loading is a no-op.
  pub fn click_pointer(&self, pointer: PointerId, path: &NodePath) -> Dispatch {
    let ticket = {
      let mut shared = self.shared.lock();
      let mut next = BrowserSnapshot::clone(&shared.current);
      let epoch = shared.epoch;
      match resolver::dispatch(&mut next, pointer, path, &self.options, epoch) {
        DispatchCheck::Ready(ticket) => {
          shared.publish(Arc::new(next));
          ticket
        }
        DispatchCheck::AlreadyLoading => {
          debug!(pointer, "pointer already loading, click ignored");
          return Dispatch::AlreadyLoading;
        }
        DispatchCheck::NotAPointer => {
          debug!(pointer, path = %path, "path does not hold pointer, click ignored");
          return Dispatch::NotAPointer;
        }
      }
    };

    debug!(pointer, chunk = %ticket.chunk_name, "dispatching chunk fetch");
    let state = self.clone();
    Dispatch::Started(
      self
        .resolver
        .spawn(ticket, move |ticket, result| state.complete(ticket, result)),
    )
  }

  fn complete(
    &self,
    ticket: Ticket,
    result: Result<FetchedChunk, FetchError>,
  ) -> ResolutionOutcome {
    let mut shared = self.shared.lock();
    if shared.epoch != ticket.epoch {
      debug!(
        pointer = ticket.pointer,
        "fetch finished after reset, result discarded"
      );
      return ResolutionOutcome::Discarded {
        pointer: ticket.pointer,
      };
    }

    let mut next = BrowserSnapshot::clone(&shared.current);
    let outcome = resolver::apply(&mut next, &ticket, result, &self.options.pointer_policy);
    shared.publish(Arc::new(next));

    match &outcome {
      ResolutionOutcome::Loaded {
        pointer,
        chunk_name,
        bytes,
      } => info!(pointer, chunk = %chunk_name, bytes, "pointer resolved"),
      ResolutionOutcome::Failed { pointer, reason } => {
        warn!(pointer, reason = %reason, "pointer resolution failed")
      }
      ResolutionOutcome::Discarded { .. } => {}
    }
    outcome
  }

  fn transition<R>(&self, f: impl FnOnce(&mut BrowserSnapshot) -> (R, bool)) -> R {
    let mut shared = self.shared.lock();
    let mut next = BrowserSnapshot::clone(&shared.current);
    let (out, changed) = f(&mut next);
    if changed {
      shared.publish(Arc::new(next));
    }
    out
  }
}
