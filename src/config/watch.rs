// src/config/watch.rs
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

use super::AppConfig;

const POLL: Duration = Duration::from_secs(2);

/// Poll `path`'s mtime every 2s and hand each newly parsed config to
/// `on_change`. Unparseable edits are logged and skipped; the previous
/// config stays in force until a valid one lands.
pub fn spawn_config_watcher<F>(path: PathBuf, mut on_change: F) -> JoinHandle<()>
where
    F: FnMut(AppConfig) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(POLL);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            ticker.tick().await;
            let mtime = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
                Ok(m) => m,
                // Missing or unreadable; keep trying.
                Err(_) => continue,
            };
            let changed = match last_mtime {
                None => {
                    last_mtime = Some(mtime);
                    false
                }
                Some(prev) => mtime > prev,
            };
            if !changed {
                continue;
            }
            last_mtime = Some(mtime);

            match AppConfig::load_from(&path) {
                Ok(cfg) => {
                    tracing::info!(target: "config", path = %path.display(), "config changed; reloading");
                    on_change(cfg);
                }
                Err(e) => {
                    tracing::warn!(target: "config", error = %format!("{e:#}"), "config reload failed; keeping previous");
                }
            }
        }
    })
}
