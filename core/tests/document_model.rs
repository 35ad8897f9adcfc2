use d2_core::{
  chunk_from_json, classify_raw, demo::demo_document, format_bytes, materialize, source_view,
  ActivityLog, ActivityLogEntry, ChunkPayload, ChunkRegistry, ExpansionSet, LineContent,
  LineHighlight, LogPhase, NodePath, PathError, PointerPolicy, SourceViewerCursor, TransferStats,
  Value, ValueType,
};
use serde_json::json;

fn doc(raw: serde_json::Value) -> Value {
  Value::from_json(&raw, &PointerPolicy::default())
}

#[test]
fn numeric_policy_classifies_large_integers_as_pointers() {
  let policy = PointerPolicy::default();
  assert_eq!(classify_raw(&json!(10000), &policy), ValueType::Number);
  assert_eq!(classify_raw(&json!(10001), &policy), ValueType::Pointer);
  assert_eq!(classify_raw(&json!(-20000), &policy), ValueType::Number);
  assert_eq!(classify_raw(&json!(12345.5), &policy), ValueType::Number);
  assert_eq!(classify_raw(&json!("12345"), &policy), ValueType::String);
  assert_eq!(classify_raw(&json!(null), &policy), ValueType::Null);
  assert_eq!(classify_raw(&json!([1]), &policy), ValueType::Array);
  assert_eq!(classify_raw(&json!({"$pointer": 3}), &policy), ValueType::Object);

  let tagged = PointerPolicy::Tagged;
  assert_eq!(classify_raw(&json!(99999), &tagged), ValueType::Number);
  assert_eq!(classify_raw(&json!({"$pointer": 3}), &tagged), ValueType::Pointer);
  assert_eq!(
    classify_raw(&json!({"$pointer": 3, "x": 1}), &tagged),
    ValueType::Object
  );
}

#[test]
fn root_only_expansion_materializes_top_level() {
  let document = doc(demo_document());
  let tree = materialize(&document, &ExpansionSet::with_root());

  assert!(tree.key.is_none());
  assert!(tree.is_expanded);
  let children = tree.children.as_ref().unwrap();
  let keys: Vec<_> = children.iter().map(|c| c.key.clone().unwrap()).collect();
  assert_eq!(keys, vec!["user", "application", "metadata"]);
  assert!(children.iter().all(|c| c.children.is_none() && !c.is_expanded));
  assert!(children[2].is_last);
  assert_eq!(children[0].summary().as_deref(), Some("{...} (6 properties)"));
  assert_eq!(tree.visible_paths().len(), 4);
}

#[test]
fn collapsed_root_has_no_children() {
  let document = doc(demo_document());
  let tree = materialize(&document, &ExpansionSet::new());
  assert!(tree.children.is_none());
  assert_eq!(tree.visible_paths(), vec![NodePath::root()]);
}

#[test]
fn visible_nodes_follow_expanded_paths_only() {
  let document = doc(demo_document());
  let before = document.clone();
  let user = NodePath::root().key("user");
  let settings = user.clone().key("settings");
  let features = NodePath::root().key("application").key("features");

  let mut expansion = ExpansionSet::with_root();
  expansion.insert(user.clone());
  expansion.insert(settings.clone());
  // not reachable: its parent is collapsed
  expansion.insert(features.clone());

  let tree = materialize(&document, &expansion);
  let paths = tree.visible_paths();
  assert!(paths.contains(&settings.clone().key("theme")));
  assert!(paths.contains(&NodePath::root().key("application")));
  assert!(!paths.contains(&features));
  // root + 3 top-level + 6 user fields + 5 settings fields
  assert_eq!(paths.len(), 15);

  // collapse user: its subtree disappears, the document stays as it was
  expansion.toggle(&user);
  let tree = materialize(&document, &expansion);
  assert_eq!(tree.visible_paths().len(), 4);
  assert_eq!(document, before);

  // re-open restores the nested expansion
  expansion.toggle(&user);
  let tree = materialize(&document, &expansion);
  assert!(tree.find(&settings).unwrap().is_expanded);
}

#[test]
fn array_children_use_index_order() {
  let document = doc(json!({"items": [10, "b", null]}));
  let items = NodePath::root().key("items");
  let mut expansion = ExpansionSet::with_root();
  expansion.insert(items.clone());

  let tree = materialize(&document, &expansion);
  let node = tree.find(&items).unwrap();
  let kids = node.children.as_ref().unwrap();
  let keys: Vec<_> = kids.iter().map(|k| k.key.clone().unwrap()).collect();
  assert_eq!(keys, vec!["0", "1", "2"]);
  assert_eq!(kids[2].path, items.clone().index(2));
  assert_eq!(kids[2].value_type, ValueType::Null);
  assert_eq!(kids[1].level, 2);
  assert_eq!(node.summary().as_deref(), Some("[3]"));
}

#[test]
fn object_children_keep_insertion_order() {
  let document = doc(json!({"zeta": 1, "alpha": 2, "mid": 3}));
  let tree = materialize(&document, &ExpansionSet::with_root());
  let keys: Vec<_> = tree
    .children
    .unwrap()
    .into_iter()
    .map(|c| c.key.unwrap())
    .collect();
  assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn empty_containers_expand_to_no_children() {
  let document = doc(json!({"obj": {}, "arr": []}));
  let mut expansion = ExpansionSet::with_root();
  expansion.insert(NodePath::root().key("obj"));
  expansion.insert(NodePath::root().key("arr"));

  let tree = materialize(&document, &expansion);
  for child in tree.children.as_ref().unwrap() {
    assert!(child.is_expanded);
    assert_eq!(child.children.as_ref().map(Vec::len), Some(0));
  }
}

#[test]
fn pointer_nodes_never_have_children() {
  let document = doc(json!({"profile": 12345}));
  let profile = NodePath::root().key("profile");
  let mut expansion = ExpansionSet::with_root();
  expansion.insert(profile.clone());

  let tree = materialize(&document, &expansion);
  let node = tree.find(&profile).unwrap();
  assert_eq!(node.value_type, ValueType::Pointer);
  assert!(!node.is_expanded);
  assert!(node.children.is_none());
}

#[test]
fn path_walk_reports_where_it_stopped() {
  let mut document = doc(json!({"a": {"b": [1, 2]}, "s": "text"}));

  let two = NodePath::root().key("a").key("b").index(1);
  assert_eq!(document.at(&two).unwrap(), &doc(json!(2)));

  let missing = NodePath::root().key("a").key("nope");
  assert_eq!(
    document.at(&missing),
    Err(PathError::Missing {
      path: missing.clone(),
      depth: 1
    })
  );
  let through_scalar = NodePath::root().key("s").key("x");
  assert!(matches!(
    document.at(&through_scalar),
    Err(PathError::NotAContainer { depth: 1, .. })
  ));
  assert!(document.at(&NodePath::root().key("a").index(0)).is_err());

  let old = document.replace_at(&two, Value::Pointer(20000)).unwrap();
  assert_eq!(old, doc(json!(2)));
  assert_eq!(document.at(&two).unwrap().as_pointer(), Some(20000));
  assert!(document.replace_at(&missing, Value::Null).is_err());
}

#[test]
fn values_serialize_with_explicit_pointers() {
  let document = doc(json!({"name": "x", "ref": 12345, "n": 1.5}));
  let text = serde_json::to_string(&document).unwrap();
  assert_eq!(text, r#"{"name":"x","ref":{"$pointer":12345},"n":1.5}"#);
  assert_eq!(
    document.to_json(),
    json!({"name": "x", "ref": {"$pointer": 12345}, "n": 1.5})
  );
  assert_eq!(Value::String("héllo".into()).size_chars(), 5);
  // chars, not UTF-16 units: the emoji is one
  assert_eq!(Value::String("ok \u{1F680}".into()).size_chars(), 4);
  assert_eq!(doc(json!({"a": 1})).size_chars(), 7);
  assert_eq!(doc(json!({"a": 1})).display_text(), "{\n  \"a\": 1\n}");
}

#[test]
fn path_display_and_prefixes() {
  let path = NodePath::root().key("user").key("settings").index(0);
  assert_eq!(path.to_string(), "user → settings → 0");
  assert_eq!(NodePath::root().to_string(), "root");
  assert!(path.starts_with(&NodePath::root().key("user")));
  assert!(path.starts_with(&NodePath::root()));
  assert!(!NodePath::root().key("user").starts_with(&path));
  assert_eq!(
    serde_json::to_value(&path).unwrap(),
    json!(["user", "settings", 0])
  );
  let parsed: NodePath = serde_json::from_value(json!(["a", 2])).unwrap();
  assert_eq!(parsed, NodePath::root().key("a").index(2));
}

fn entry(id: &str, pointer: u64, phase: LogPhase) -> ActivityLogEntry {
  ActivityLogEntry {
    id: id.to_string(),
    pointer_id: pointer,
    timestamp_ms: 0,
    phase,
    chunk_name: format!("{pointer}.d2.jsonl"),
    message: String::new(),
    size_bytes: None,
  }
}

#[test]
fn activity_log_is_most_recent_first() {
  let mut log = ActivityLog::new(None);
  log.append(entry("a", 1, LogPhase::Loading));
  log.append(entry("b", 2, LogPhase::Loading));
  assert_eq!(log.head().unwrap().id, "b");

  log.replace_head(entry("b", 2, LogPhase::Error));
  assert_eq!(log.get("b").unwrap().phase, LogPhase::Error);
  assert_eq!(log.len(), 2);

  // finalize by id leaves positions alone
  assert!(log.finalize(entry("a", 1, LogPhase::Success)));
  let ids: Vec<_> = log.iter().map(|e| e.id.as_str()).collect();
  assert_eq!(ids, vec!["b", "a"]);
  assert_eq!(log.get("a").unwrap().phase, LogPhase::Success);

  assert!(!log.finalize(entry("zzz", 9, LogPhase::Success)));
  log.clear();
  assert!(log.is_empty());
  log.finalize_or_append(entry("a", 1, LogPhase::Success));
  assert_eq!(log.len(), 1);
}

#[test]
fn bounded_log_evicts_from_the_back() {
  let mut log = ActivityLog::new(Some(2));
  for (i, id) in ["a", "b", "c"].iter().enumerate() {
    log.append(entry(id, i as u64, LogPhase::Loading));
  }
  let ids: Vec<_> = log.iter().map(|e| e.id.as_str()).collect();
  assert_eq!(ids, vec!["c", "b"]);
  assert_eq!(log.capacity(), Some(2));
}

#[test]
fn chunk_lines_are_laid_out_per_entry() {
  let (chunk, anchors) = chunk_from_json("x.d2.jsonl", 5, &json!({"a": 1, "b": [true]}));
  assert_eq!(chunk.start_line(), Some(5));
  assert_eq!(chunk.end_line(), Some(6));
  assert_eq!(chunk.line(6).unwrap().content, r#"{"b":[true]}"#);
  assert_eq!(chunk.byte_len(), 8 + 13);
  assert_eq!(anchors[1].path, NodePath::root().key("b"));
  assert_eq!(anchors[1].line_number, 6);

  let (scalar, anchors) = chunk_from_json("s.d2.jsonl", 1, &json!("plain"));
  assert_eq!(scalar.lines.len(), 1);
  assert!(anchors.is_empty());
}

#[test]
fn source_view_degrades_malformed_lines_to_text() {
  let mut registry = ChunkRegistry::new();
  registry.put(
    "c.d2.jsonl",
    ChunkPayload::from_lines("c.d2.jsonl", 1, [r#"{"ok":1}"#, "not json {", "[1,2]"]),
  );
  // later writes replace earlier ones
  registry.put(
    "c.d2.jsonl",
    ChunkPayload::from_lines("c.d2.jsonl", 1, [r#"{"ok":2}"#, "not json {", "[1,2]"]),
  );
  assert_eq!(registry.len(), 1);

  let cursor = SourceViewerCursor {
    chunk_name: Some("c.d2.jsonl".into()),
    selected_line: Some(1),
    hovered_line: Some(2),
  };
  let view = source_view(&registry, &cursor).unwrap();
  assert_eq!(view.lines[0].content, LineContent::Json(json!({"ok": 2})));
  assert_eq!(view.lines[1].content, LineContent::Plain("not json {".into()));
  assert_eq!(view.lines[0].highlight, LineHighlight::Selected);
  assert_eq!(view.lines[1].highlight, LineHighlight::Hover);
  assert_eq!(view.lines[2].highlight, LineHighlight::None);

  let nothing = SourceViewerCursor::default();
  assert!(source_view(&registry, &nothing).is_none());
  let unknown = SourceViewerCursor {
    chunk_name: Some("missing".into()),
    ..Default::default()
  };
  assert!(source_view(&registry, &unknown).is_none());
}

#[test]
fn stats_helpers() {
  assert_eq!(format_bytes(512), "512 B");
  assert_eq!(format_bytes(4300), "4.2 KB");
  assert_eq!(format_bytes(14 * 1024 * 1024), "14.0 MB");

  let stats = TransferStats {
    logical_size_bytes: 1000,
    bytes_transferred: 25,
    ..Default::default()
  };
  assert_eq!(stats.efficiency_pct(), 2.5);
  assert_eq!(TransferStats::default().efficiency_pct(), 0.0);
  assert_eq!(ValueType::Pointer.display_name(), "D2 Pointer");
}
