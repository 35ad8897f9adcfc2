use std::{
  collections::{BTreeMap, HashMap},
  sync::Arc,
};

use serde::Serialize;

use crate::models::{
  ChunkPayload, NodePath, PathSegment, SourceAnchor, SourceRef, SourceViewerCursor,
};

/// Chunk name -> chunk content, backing the source viewer.
///
/// Later writes for a name replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkRegistry {
  chunks: HashMap<String, Arc<ChunkPayload>>,
}

impl ChunkRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, chunk_name: &str) -> Option<Arc<ChunkPayload>> {
    self.chunks.get(chunk_name).cloned()
  }

  pub fn put(&mut self, chunk_name: impl Into<String>, payload: ChunkPayload) {
    self.chunks.insert(chunk_name.into(), Arc::new(payload));
  }

  pub fn contains(&self, chunk_name: &str) -> bool {
    self.chunks.contains_key(chunk_name)
  }

  pub fn len(&self) -> usize {
    self.chunks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.chunks.is_empty()
  }

  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.chunks.keys().cloned().collect();
    names.sort();
    names
  }
}

/// Absolute document path -> the chunk line it was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOrigins {
  anchors: BTreeMap<NodePath, SourceRef>,
}

impl SourceOrigins {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record `anchors` (relative to `base`) for `chunk`. The base itself always maps to the
  /// chunk's first line unless an anchor says otherwise.
  pub fn record(&mut self, base: &NodePath, chunk: &ChunkPayload, anchors: &[SourceAnchor]) {
    if let Some(start) = chunk.start_line() {
      self.anchors.insert(
        base.clone(),
        SourceRef {
          chunk_name: chunk.chunk_name.clone(),
          line_number: start,
        },
      );
    }
    for anchor in anchors {
      self.anchors.insert(
        base.join(&anchor.path),
        SourceRef {
          chunk_name: chunk.chunk_name.clone(),
          line_number: anchor.line_number,
        },
      );
    }
  }

  /// Forget every anchor at or below `base`.
  pub fn drop_under(&mut self, base: &NodePath) {
    self.anchors.retain(|path, _| !path.starts_with(base));
  }

  /// The anchor of `path` or of its nearest anchored ancestor.
  pub fn lookup(&self, path: &NodePath) -> Option<&SourceRef> {
    let mut current = Some(path.clone());
    while let Some(p) = current {
      if let Some(found) = self.anchors.get(&p) {
        return Some(found);
      }
      current = p.parent();
    }
    None
  }

  pub fn len(&self) -> usize {
    self.anchors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.anchors.is_empty()
  }
}

/// Lay a JSON value out as chunk lines: one line per object entry (`{"key": value}`) or array
/// item, a single line for scalars. Returns the anchors tying each child to its line.
pub fn chunk_from_json(
  chunk_name: impl Into<String>,
  start_line: u64,
  value: &serde_json::Value,
) -> (ChunkPayload, Vec<SourceAnchor>) {
  let mut lines = Vec::new();
  let mut anchors = Vec::new();
  match value {
    serde_json::Value::Object(map) => {
      for (i, (k, v)) in map.iter().enumerate() {
        let mut one = serde_json::Map::new();
        one.insert(k.clone(), v.clone());
        lines.push(serde_json::Value::Object(one).to_string());
        anchors.push(SourceAnchor {
          path: NodePath::new(vec![PathSegment::Key(k.clone())]),
          line_number: start_line + i as u64,
        });
      }
    }
    serde_json::Value::Array(items) => {
      for (i, item) in items.iter().enumerate() {
        lines.push(item.to_string());
        anchors.push(SourceAnchor {
          path: NodePath::new(vec![PathSegment::Index(i)]),
          line_number: start_line + i as u64,
        });
      }
    }
    scalar => lines.push(scalar.to_string()),
  }
  (ChunkPayload::from_lines(chunk_name, start_line, lines), anchors)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LineHighlight {
  None,
  Selected,
  Hover,
}

/// A chunk line prepared for display. Lines that do not parse as JSON are kept as text.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "content")]
pub enum LineContent {
  Json(serde_json::Value),
  Plain(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderedLine {
  pub line_number: u64,
  pub content: LineContent,
  pub highlight: LineHighlight,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceView {
  pub chunk_name: String,
  pub start_line: Option<u64>,
  pub end_line: Option<u64>,
  pub lines: Vec<RenderedLine>,
}

/// Project the chunk under `cursor` into display lines. `None` when no chunk is tracked or the
/// tracked chunk is not registered.
pub fn source_view(registry: &ChunkRegistry, cursor: &SourceViewerCursor) -> Option<SourceView> {
  let chunk = registry.get(cursor.chunk_name.as_deref()?)?;
  let lines = chunk
    .lines
    .iter()
    .map(|line| {
      let content = match serde_json::from_str::<serde_json::Value>(&line.content) {
        Ok(v) => LineContent::Json(v),
        Err(_) => LineContent::Plain(line.content.clone()),
      };
      let highlight = if cursor.selected_line == Some(line.line_number) {
        LineHighlight::Selected
      } else if cursor.hovered_line == Some(line.line_number) {
        LineHighlight::Hover
      } else {
        LineHighlight::None
      };
      RenderedLine {
        line_number: line.line_number,
        content,
        highlight,
      }
    })
    .collect();
  Some(SourceView {
    chunk_name: chunk.chunk_name.clone(),
    start_line: chunk.start_line(),
    end_line: chunk.end_line(),
    lines,
  })
}
