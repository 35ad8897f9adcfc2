use std::collections::VecDeque;

use serde::Serialize;

use crate::models::ActivityLogEntry;

/// Transfer events, most recent first.
///
/// With a capacity set, the oldest entries fall off the back.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ActivityLog {
  entries: VecDeque<ActivityLogEntry>,
  #[serde(skip)]
  capacity: Option<usize>,
}

impl ActivityLog {
  pub fn new(capacity: Option<usize>) -> Self {
    Self {
      entries: VecDeque::new(),
      capacity,
    }
  }

  pub fn append(&mut self, entry: ActivityLogEntry) {
    self.entries.push_front(entry);
    if let Some(cap) = self.capacity {
      self.entries.truncate(cap);
    }
  }

  /// Substitute position 0. Appends instead when the log is empty.
  pub fn replace_head(&mut self, entry: ActivityLogEntry) {
    match self.entries.front_mut() {
      Some(head) => *head = entry,
      None => self.append(entry),
    }
  }

  /// Rewrite the entry sharing `entry.id` in place, keeping its position.
  ///
  /// Returns false when no such entry remains (cleared or evicted).
  pub fn finalize(&mut self, entry: ActivityLogEntry) -> bool {
    match self.entries.iter_mut().find(|e| e.id == entry.id) {
      Some(slot) => {
        *slot = entry;
        true
      }
      None => false,
    }
  }

  /// Like [`ActivityLog::finalize`], but a terminal entry whose `loading` entry is gone is
  /// appended at the front instead of being lost.
  pub fn finalize_or_append(&mut self, entry: ActivityLogEntry) {
    if let Some(slot) = self.entries.iter_mut().find(|e| e.id == entry.id) {
      *slot = entry;
      return;
    }
    self.append(entry);
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn get(&self, id: &str) -> Option<&ActivityLogEntry> {
    self.entries.iter().find(|e| e.id == id)
  }

  pub fn head(&self) -> Option<&ActivityLogEntry> {
    self.entries.front()
  }

  pub fn iter(&self) -> impl Iterator<Item = &ActivityLogEntry> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn capacity(&self) -> Option<usize> {
    self.capacity
  }
}
