use std::time::Duration;

use d2_core::{
  demo::{demo_seed, DemoFetcher, DemoFetcherOptions},
  format_bytes, BrowserOptions, BrowserState, NodePath,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), String> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let latency_ms = std::env::args()
    .nth(1)
    .map(|s| s.parse::<u64>().map_err(|e| format!("bad latency: {e}")))
    .transpose()?
    .unwrap_or(200);

  let fetcher = DemoFetcher::new(DemoFetcherOptions {
    latency: Duration::from_millis(latency_ms),
    ..Default::default()
  });
  let browser = BrowserState::new(demo_seed(), fetcher, BrowserOptions::default())
    .map_err(|e| e.to_string())?;

  let user = NodePath::root().key("user");
  browser.toggle_expand(&user);

  let profile = user.clone().key("profile");
  let pending = browser.click_pointer(12345, &profile).into_pending();
  // second click while loading is ignored
  let again = browser.click_pointer(12345, &profile);
  println!("second click started={}", again.is_started());

  if let Some(p) = pending {
    let outcome = p.wait().map_err(|e| e.to_string())?;
    println!("outcome={outcome:?}");
  }

  browser.toggle_expand(&profile);
  browser.select_value(&profile.clone().key("location"));

  let snap = browser.snapshot();
  snap.tree().visit(&mut |node| {
    let indent = "  ".repeat(node.level);
    let key = node.key.as_deref().unwrap_or("root");
    let shown = node
      .summary()
      .unwrap_or_else(|| node.value.display_text());
    println!("{indent}{key}: {shown}");
  });

  for entry in snap.activity.iter() {
    println!("log [{:?}] {}", entry.phase, entry.message);
  }
  println!(
    "chunks={}/{} transferred={} efficiency={}%",
    snap.stats.chunks_loaded,
    snap.stats.total_chunks,
    format_bytes(snap.stats.bytes_transferred),
    snap.stats.efficiency_pct()
  );
  if let Some(view) = snap.source_view() {
    println!("source: {} lines {:?}-{:?}", view.chunk_name, view.start_line, view.end_line);
  }
  Ok(())
}
