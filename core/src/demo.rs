//! The demo document and a canned in-process backing store.

use std::{
  collections::BTreeSet,
  sync::atomic::{AtomicUsize, Ordering},
  thread,
  time::Duration,
};

use serde_json::json;

use crate::{
  chunks::chunk_from_json,
  models::{PointerId, TransferStats, DEFAULT_CHUNK_SUFFIX},
  resolver::{ChunkFetcher, FetchError, FetchedChunk},
  snapshot::BrowserSeed,
};

pub const MANIFEST_CHUNK: &str = "manifest.d2.jsonl";

const MB: u64 = 1024 * 1024;

pub fn demo_document() -> serde_json::Value {
  json!({
    "user": {
      "id": 1,
      "name": "John Doe",
      "email": "john@example.com",
      "profile": 12345,
      "settings": {
        "theme": "dark",
        "notifications": true,
        "language": "en",
        "timezone": "America/New_York",
        "categories": 67890
      },
      "preferences": {
        "newsletter": false,
        "analytics": true
      }
    },
    "application": {
      "version": "2.1.4",
      "build": "20250916",
      "features": ["lazy-loading", "chunked-data", "compression"],
      "config": {
        "maxChunkSize": "2MB",
        "compressionLevel": 9,
        "cacheTimeout": 3600
      }
    },
    "metadata": {
      "created": "2025-09-16T10:00:00Z",
      "lastModified": "2025-09-16T15:30:00Z",
      "items": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
      "statistics": {
        "totalRecords": 1000000,
        "averageSize": "512 bytes",
        "compressionRatio": 0.23
      },
      "references": 99999
    }
  })
}

/// 500 MB logical document behind a 14 MB manifest; the manifest chunk is already loaded.
pub fn demo_stats() -> TransferStats {
  TransferStats {
    logical_size_bytes: 500 * MB,
    manifest_size_bytes: 14 * MB,
    chunks_loaded: 1,
    total_chunks: 1400,
    bytes_transferred: 4300,
  }
}

pub fn demo_seed() -> BrowserSeed {
  let document = demo_document();
  let (manifest, anchors) = chunk_from_json(MANIFEST_CHUNK, 1, &document);
  BrowserSeed::new(document)
    .with_stats(demo_stats())
    .with_manifest(manifest, anchors)
}

/// Logical content behind a demo pointer.
pub fn demo_payload(pointer: PointerId) -> serde_json::Value {
  match pointer {
    12345 => json!({
      "bio": "Software developer with 10+ years experience in distributed systems and data compression",
      "avatar": "https://example.com/avatars/johndoe.jpg",
      "location": "San Francisco, CA",
      "joined": "2015-03-20T14:30:00Z",
      "social": {
        "twitter": "@johndoe",
        "github": "johndoe",
        "linkedin": "john-doe",
        "website": "https://johndoe.dev"
      },
      "achievements": ["D2 Format Contributor", "Open Source Advocate", "Tech Speaker"],
      "projects": 42
    }),
    67890 => json!([
      "Technology",
      "Science",
      "Art",
      "Music",
      "Travel",
      "Food",
      "Photography",
      "Gaming",
      "Books",
      "Fitness"
    ]),
    99999 => json!({
      "external_id": "ext_abc123def456",
      "source": "api.example.com/v2",
      "last_sync": "2025-09-16T09:30:00Z",
      "sync_frequency": "hourly",
      "data_retention": "30 days",
      "endpoints": {
        "users": "/api/v2/users",
        "profiles": "/api/v2/profiles",
        "categories": "/api/v2/categories"
      },
      "rate_limits": {
        "requests_per_minute": 1000,
        "burst_limit": 100
      }
    }),
    other => json!({
      "loaded": true,
      "chunk_id": other,
      "size_bytes": 1000 + other % 9000
    }),
  }
}

#[derive(Debug, Clone)]
pub struct DemoFetcherOptions {
  /// Simulated network latency per fetch.
  pub latency: Duration,
  /// Pointers whose fetch always fails.
  pub fail_pointers: BTreeSet<PointerId>,
  pub chunk_suffix: String,
}

impl Default for DemoFetcherOptions {
  fn default() -> Self {
    Self {
      latency: Duration::from_millis(800),
      fail_pointers: BTreeSet::new(),
      chunk_suffix: DEFAULT_CHUNK_SUFFIX.to_string(),
    }
  }
}

/// Serves [`demo_payload`] as single chunks, one line per entry.
#[derive(Debug, Default)]
pub struct DemoFetcher {
  opts: DemoFetcherOptions,
  calls: AtomicUsize,
}

impl DemoFetcher {
  pub fn new(opts: DemoFetcherOptions) -> Self {
    Self {
      opts,
      calls: AtomicUsize::new(0),
    }
  }

  /// Number of fetches served so far, failed ones included.
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl ChunkFetcher for DemoFetcher {
  fn fetch(&self, pointer: PointerId) -> Result<FetchedChunk, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if !self.opts.latency.is_zero() {
      thread::sleep(self.opts.latency);
    }
    if self.opts.fail_pointers.contains(&pointer) {
      return Err(FetchError::Unavailable { pointer });
    }

    let value = demo_payload(pointer);
    let chunk_name = format!("{pointer}{}", self.opts.chunk_suffix);
    let (chunk, anchors) = chunk_from_json(chunk_name, 1, &value);
    let transferred_bytes = chunk.byte_len();
    Ok(FetchedChunk {
      value,
      chunk,
      transferred_bytes,
      anchors,
    })
  }
}
