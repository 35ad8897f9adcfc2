use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Identifier carried by a deferred reference in the document.
pub type PointerId = u64;

/// Default suffix appended to a pointer id to name its backing chunk (`12345.d2.jsonl`).
pub const DEFAULT_CHUNK_SUFFIX: &str = ".d2.jsonl";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
  Null,
  Boolean,
  Number,
  String,
  Array,
  Object,
  Pointer,
}

impl ValueType {
  pub fn is_container(self) -> bool {
    matches!(self, ValueType::Array | ValueType::Object)
  }

  /// Label used by the value inspector.
  pub fn display_name(self) -> &'static str {
    match self {
      ValueType::Null => "Null",
      ValueType::Boolean => "Boolean",
      ValueType::Number => "Number",
      ValueType::String => "String",
      ValueType::Array => "Array",
      ValueType::Object => "Object",
      ValueType::Pointer => "D2 Pointer",
    }
  }
}

/// One step of a [`NodePath`].
///
/// Untagged so a path serializes as a plain array like `["user", "settings", 0]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(untagged)]
pub enum PathSegment {
  Key(String),
  Index(usize),
}

impl fmt::Display for PathSegment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PathSegment::Key(k) => f.write_str(k),
      PathSegment::Index(i) => write!(f, "{i}"),
    }
  }
}

impl From<&str> for PathSegment {
  fn from(key: &str) -> Self {
    PathSegment::Key(key.to_string())
  }
}

impl From<String> for PathSegment {
  fn from(key: String) -> Self {
    PathSegment::Key(key)
  }
}

impl From<usize> for PathSegment {
  fn from(index: usize) -> Self {
    PathSegment::Index(index)
  }
}

/// Position of a value in the document, from the root. The empty path is the root.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
  pub fn root() -> Self {
    Self(Vec::new())
  }

  pub fn new(segments: Vec<PathSegment>) -> Self {
    Self(segments)
  }

  pub fn key(mut self, key: impl Into<String>) -> Self {
    self.0.push(PathSegment::Key(key.into()));
    self
  }

  pub fn index(mut self, index: usize) -> Self {
    self.0.push(PathSegment::Index(index));
    self
  }

  pub fn child(&self, segment: PathSegment) -> Self {
    let mut segments = self.0.clone();
    segments.push(segment);
    Self(segments)
  }

  pub fn join(&self, rel: &NodePath) -> Self {
    let mut segments = self.0.clone();
    segments.extend(rel.0.iter().cloned());
    Self(segments)
  }

  pub fn parent(&self) -> Option<NodePath> {
    if self.0.is_empty() {
      return None;
    }
    Some(Self(self.0[..self.0.len() - 1].to_vec()))
  }

  pub fn segments(&self) -> &[PathSegment] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_root(&self) -> bool {
    self.0.is_empty()
  }

  /// True when `prefix` is this path or one of its ancestors.
  pub fn starts_with(&self, prefix: &NodePath) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for NodePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() {
      return f.write_str("root");
    }
    for (i, seg) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(" → ")?;
      }
      write!(f, "{seg}")?;
    }
    Ok(())
  }
}

impl<S: Into<PathSegment>> FromIterator<S> for NodePath {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self(iter.into_iter().map(Into::into).collect())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceLine {
  pub line_number: u64,
  pub content: String,
  pub chunk_name: String,
}

/// The literal backing-store lines that produced a resolved subtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkPayload {
  pub chunk_name: String,
  pub lines: Vec<SourceLine>,
}

impl ChunkPayload {
  /// Build a payload whose lines are numbered consecutively from `start_line`.
  pub fn from_lines<I, S>(chunk_name: impl Into<String>, start_line: u64, lines: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let chunk_name = chunk_name.into();
    let lines = lines
      .into_iter()
      .enumerate()
      .map(|(i, content)| SourceLine {
        line_number: start_line + i as u64,
        content: content.into(),
        chunk_name: chunk_name.clone(),
      })
      .collect();
    Self { chunk_name, lines }
  }

  pub fn start_line(&self) -> Option<u64> {
    self.lines.first().map(|l| l.line_number)
  }

  pub fn end_line(&self) -> Option<u64> {
    self.lines.last().map(|l| l.line_number)
  }

  pub fn line(&self, line_number: u64) -> Option<&SourceLine> {
    self.lines.iter().find(|l| l.line_number == line_number)
  }

  /// Bytes the lines occupy on the wire, newline-terminated.
  pub fn byte_len(&self) -> u64 {
    self.lines.iter().map(|l| l.content.len() as u64 + 1).sum()
  }
}

/// Ties a path (relative to the resolved subtree) to the chunk line it was read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceAnchor {
  pub path: NodePath,
  pub line_number: u64,
}

/// A resolved chunk location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
  pub chunk_name: String,
  pub line_number: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogPhase {
  Loading,
  Success,
  Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityLogEntry {
  /// Correlation id, shared by the `loading` entry and its terminal replacement.
  pub id: String,
  pub pointer_id: PointerId,
  pub timestamp_ms: i64,
  pub phase: LogPhase,
  pub chunk_name: String,
  pub message: String,
  pub size_bytes: Option<u64>,
}

/// The last value the user inspected.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SelectedValue {
  pub value_type: ValueType,
  pub value: Value,
  pub path: NodePath,
  /// Length in characters: the string itself for strings, the JSON text otherwise.
  pub size_chars: usize,
  pub source_line: Option<u64>,
  pub source_chunk: Option<String>,
}

impl SelectedValue {
  pub fn size_label(&self) -> String {
    format!("{} characters", self.size_chars)
  }

  /// Text shown (and copied) by the inspector.
  pub fn display_text(&self) -> String {
    self.value.display_text()
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceViewerCursor {
  pub chunk_name: Option<String>,
  pub selected_line: Option<u64>,
  pub hovered_line: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferStats {
  pub logical_size_bytes: u64,
  pub manifest_size_bytes: u64,
  pub chunks_loaded: u64,
  pub total_chunks: u64,
  pub bytes_transferred: u64,
}

impl TransferStats {
  /// Share of the logical document transferred so far, in percent (two decimals).
  pub fn efficiency_pct(&self) -> f64 {
    if self.logical_size_bytes == 0 {
      return 0.0;
    }
    let pct = self.bytes_transferred as f64 / self.logical_size_bytes as f64 * 100.0;
    (pct * 100.0).round() / 100.0
  }
}

/// Human-readable size, e.g. `4.2 KB`.
pub fn format_bytes(bytes: u64) -> String {
  const KB: f64 = 1024.0;
  let b = bytes as f64;
  if b < KB {
    format!("{bytes} B")
  } else if b < KB * KB {
    format!("{:.1} KB", b / KB)
  } else if b < KB * KB * KB {
    format!("{:.1} MB", b / (KB * KB))
  } else {
    format!("{:.1} GB", b / (KB * KB * KB))
  }
}
