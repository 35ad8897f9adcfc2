use std::{collections::BTreeSet, sync::Arc};

use crate::{
  activity::ActivityLog,
  chunks::{self, ChunkRegistry, SourceOrigins, SourceView},
  engine::BrowserOptions,
  models::{
    ChunkPayload, NodePath, PointerId, SelectedValue, SourceAnchor, SourceViewerCursor,
    TransferStats,
  },
  tree::{self, ExpansionSet, TreeNode},
  value::{PathError, Value},
};

/// What a browser starts from, and returns to on reset.
#[derive(Debug, Clone)]
pub struct BrowserSeed {
  pub document: serde_json::Value,
  pub stats: TransferStats,
  /// Chunk the initial document was read from, if any.
  pub manifest: Option<(ChunkPayload, Vec<SourceAnchor>)>,
}

impl BrowserSeed {
  pub fn new(document: serde_json::Value) -> Self {
    Self {
      document,
      stats: TransferStats::default(),
      manifest: None,
    }
  }

  pub fn with_stats(mut self, stats: TransferStats) -> Self {
    self.stats = stats;
    self
  }

  pub fn with_manifest(mut self, chunk: ChunkPayload, anchors: Vec<SourceAnchor>) -> Self {
    self.manifest = Some((chunk, anchors));
    self
  }
}

/// One consistent, immutable view of the whole browser.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSnapshot {
  pub document: Arc<Value>,
  pub expansion: ExpansionSet,
  pub loading: BTreeSet<PointerId>,
  pub chunks: ChunkRegistry,
  pub origins: SourceOrigins,
  pub activity: ActivityLog,
  pub selected: Option<SelectedValue>,
  pub source_cursor: SourceViewerCursor,
  pub stats: TransferStats,
}

impl BrowserSnapshot {
  pub(crate) fn initial(seed: &BrowserSeed, options: &BrowserOptions) -> Self {
    let document = Value::from_json(&seed.document, &options.pointer_policy);
    let mut chunks = ChunkRegistry::new();
    let mut origins = SourceOrigins::new();
    if let Some((manifest, anchors)) = &seed.manifest {
      origins.record(&NodePath::root(), manifest, anchors);
      chunks.put(manifest.chunk_name.clone(), manifest.clone());
    }
    Self {
      document: Arc::new(document),
      expansion: ExpansionSet::with_root(),
      loading: BTreeSet::new(),
      chunks,
      origins,
      activity: ActivityLog::new(options.log_capacity),
      selected: None,
      source_cursor: SourceViewerCursor::default(),
      stats: seed.stats.clone(),
    }
  }

  pub fn tree(&self) -> TreeNode<'_> {
    tree::materialize(&self.document, &self.expansion)
  }

  pub fn source_view(&self) -> Option<SourceView> {
    chunks::source_view(&self.chunks, &self.source_cursor)
  }

  pub fn is_loading(&self, pointer: PointerId) -> bool {
    self.loading.contains(&pointer)
  }

  pub fn value_at(&self, path: &NodePath) -> Result<&Value, PathError> {
    self.document.at(path)
  }

  /// What selecting `path` would record, without changing anything.
  pub fn selection_for(&self, path: &NodePath) -> Option<SelectedValue> {
    let value = self.document.at(path).ok()?;
    let origin = self.origins.lookup(path);
    Some(SelectedValue {
      value_type: value.kind(),
      value: value.clone(),
      path: path.clone(),
      size_chars: value.size_chars(),
      source_line: origin.map(|o| o.line_number),
      source_chunk: origin.map(|o| o.chunk_name.clone()),
    })
  }

  pub(crate) fn toggle_expand(&mut self, path: &NodePath) -> bool {
    self.expansion.toggle(path)
  }

  /// Record the selection and point the source viewer at its origin line, when known.
  pub(crate) fn select(&mut self, path: &NodePath) -> Option<SelectedValue> {
    let selected = self.selection_for(path)?;
    if let (Some(chunk), Some(line)) = (&selected.source_chunk, selected.source_line) {
      if self.source_cursor.chunk_name.as_deref() != Some(chunk.as_str()) {
        self.source_cursor.hovered_line = None;
      }
      self.source_cursor.chunk_name = Some(chunk.clone());
      self.source_cursor.selected_line = Some(line);
    }
    self.selected = Some(selected.clone());
    Some(selected)
  }

  pub(crate) fn hover(&mut self, line: Option<u64>) -> bool {
    if self.source_cursor.hovered_line == line {
      return false;
    }
    self.source_cursor.hovered_line = line;
    true
  }

  /// Recompute the selection when `changed` overlaps it, so it never shows a replaced value.
  pub(crate) fn refresh_selection(&mut self, changed: &NodePath) {
    let Some(path) = self.selected.as_ref().map(|s| s.path.clone()) else {
      return;
    };
    if path.starts_with(changed) || changed.starts_with(&path) {
      self.selected = self.selection_for(&path);
    }
  }
}
