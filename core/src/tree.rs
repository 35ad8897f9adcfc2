use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
  models::{NodePath, PathSegment, ValueType},
  value::Value,
};

/// Paths whose children are currently revealed. The root path is `[]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ExpansionSet {
  paths: BTreeSet<NodePath>,
}

impl ExpansionSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// The initial state of a browser: only the root is open.
  pub fn with_root() -> Self {
    let mut set = Self::new();
    set.paths.insert(NodePath::root());
    set
  }

  pub fn contains(&self, path: &NodePath) -> bool {
    self.paths.contains(path)
  }

  pub fn insert(&mut self, path: NodePath) -> bool {
    self.paths.insert(path)
  }

  /// Flip membership of `path`. Returns whether it is expanded afterwards.
  ///
  /// Collapsing keeps the expansion of descendants, so re-opening restores them.
  pub fn toggle(&mut self, path: &NodePath) -> bool {
    if self.paths.remove(path) {
      false
    } else {
      self.paths.insert(path.clone());
      true
    }
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &NodePath> {
    self.paths.iter()
  }
}

/// A visible node. Borrows the document, so building a tree never copies values.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode<'a> {
  /// Object key, or the index rendered as text for array items. `None` for the root.
  pub key: Option<String>,
  pub value: &'a Value,
  pub value_type: ValueType,
  pub path: NodePath,
  pub level: usize,
  pub is_last: bool,
  pub is_expanded: bool,
  /// Present only for expanded containers.
  pub children: Option<Vec<TreeNode<'a>>>,
}

impl<'a> TreeNode<'a> {
  pub fn child_count(&self) -> usize {
    self.value.child_count()
  }

  /// Collapsed summary, e.g. `{...} (3 properties)` or `[10]`.
  pub fn summary(&self) -> Option<String> {
    match self.value_type {
      ValueType::Object => Some(format!("{{...}} ({} properties)", self.child_count())),
      ValueType::Array => Some(format!("[{}]", self.child_count())),
      _ => None,
    }
  }

  /// Depth-first, pre-order walk over this node and every materialized descendant.
  pub fn visit(&self, f: &mut impl FnMut(&TreeNode<'a>)) {
    f(self);
    if let Some(children) = &self.children {
      for child in children {
        child.visit(f);
      }
    }
  }

  /// Paths of all materialized nodes, pre-order.
  pub fn visible_paths(&self) -> Vec<NodePath> {
    let mut out = Vec::new();
    self.visit(&mut |n| out.push(n.path.clone()));
    out
  }

  pub fn find(&self, path: &NodePath) -> Option<&TreeNode<'a>> {
    if &self.path == path {
      return Some(self);
    }
    if !path.starts_with(&self.path) {
      return None;
    }
    self.children.as_ref()?.iter().find_map(|c| c.find(path))
  }
}

/// Build the visible tree for `document` under `expansion`.
///
/// Only expanded containers get their children computed; the work is proportional to the
/// expanded part of the document, not its total size. Pointers never have children.
pub fn materialize<'a>(document: &'a Value, expansion: &ExpansionSet) -> TreeNode<'a> {
  build_node(document, None, NodePath::root(), 0, true, expansion)
}

fn build_node<'a>(
  value: &'a Value,
  key: Option<String>,
  path: NodePath,
  level: usize,
  is_last: bool,
  expansion: &ExpansionSet,
) -> TreeNode<'a> {
  let value_type = value.kind();
  let is_expanded = value_type.is_container() && expansion.contains(&path);
  let children = if is_expanded {
    Some(build_children(value, &path, level + 1, expansion))
  } else {
    None
  };
  TreeNode {
    key,
    value,
    value_type,
    path,
    level,
    is_last,
    is_expanded,
    children,
  }
}

fn build_children<'a>(
  value: &'a Value,
  path: &NodePath,
  level: usize,
  expansion: &ExpansionSet,
) -> Vec<TreeNode<'a>> {
  match value {
    Value::Object(entries) => {
      let n = entries.len();
      entries
        .iter()
        .enumerate()
        .map(|(i, (k, v))| {
          let child_path = path.child(PathSegment::Key(k.clone()));
          build_node(v, Some(k.clone()), child_path, level, i + 1 == n, expansion)
        })
        .collect()
    }
    Value::Array(items) => {
      let n = items.len();
      items
        .iter()
        .enumerate()
        .map(|(i, v)| {
          let child_path = path.child(PathSegment::Index(i));
          build_node(v, Some(i.to_string()), child_path, level, i + 1 == n, expansion)
        })
        .collect()
    }
    _ => Vec::new(),
  }
}
